//! MCP Error Handling
//!
//! Error classification for the MCP surface and its mapping onto JSON-RPC
//! error objects.

use crate::client::ApiError;
use crate::mcp::protocol::*;
use thiserror::Error;
use tracing::{error, warn};

/// MCP-specific errors that can occur during server operation
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Protocol version not supported: {version}. Supported versions: {supported:?}")]
    UnsupportedProtocolVersion {
        version: String,
        supported: Vec<String>,
    },

    #[error("Unknown tool: {name}")]
    ToolNotFound { name: String },

    #[error("Unknown resource: {uri}")]
    ResourceNotFound { uri: String },

    #[error("Missing required argument '{argument}' for tool {tool}")]
    MissingArgument { tool: String, argument: String },

    #[error("Invalid tool parameters for {tool}: {message}")]
    InvalidToolParameters { tool: String, message: String },

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] ApiError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

impl McpError {
    /// Convert MCP error to JSON-RPC error
    #[inline]
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        let code = match self {
            Self::UnsupportedProtocolVersion { .. } => mcp_error_codes::INVALID_PROTOCOL_VERSION,
            Self::ToolNotFound { .. } => mcp_error_codes::TOOL_NOT_FOUND,
            Self::ResourceNotFound { .. } => mcp_error_codes::RESOURCE_NOT_FOUND,
            Self::MissingArgument { .. }
            | Self::InvalidToolParameters { .. }
            | Self::InvalidParameters { .. }
            | Self::ValidationError { .. } => error_codes::INVALID_PARAMS,
            Self::InvalidRequest { .. } => error_codes::INVALID_REQUEST,
            Self::MethodNotFound { .. } => error_codes::METHOD_NOT_FOUND,
            Self::Upstream(_) | Self::InternalError { .. } => error_codes::INTERNAL_ERROR,
        };

        let data = match self {
            Self::Upstream(ApiError::Upstream { status, .. }) => {
                Some(serde_json::json!({ "status": status }))
            }
            _ => None,
        };

        JsonRpcError::new(code, self.to_string(), data)
    }

    /// Create error response message
    #[inline]
    pub fn to_error_response(&self, id: Option<RequestId>) -> JsonRpcMessage {
        JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(self.to_jsonrpc_error(), id))
    }

    /// Log the error with appropriate level
    #[inline]
    pub fn log(&self) {
        match self {
            Self::InvalidRequest { .. }
            | Self::InvalidParameters { .. }
            | Self::InvalidToolParameters { .. }
            | Self::MissingArgument { .. }
            | Self::ValidationError { .. }
            | Self::MethodNotFound { .. }
            | Self::UnsupportedProtocolVersion { .. } => {
                warn!("Client error: {}", self);
            }
            Self::ToolNotFound { .. } | Self::ResourceNotFound { .. } => {
                warn!("Not found error: {}", self);
            }
            Self::Upstream(_) | Self::InternalError { .. } => {
                error!("Server error: {}", self);
            }
        }
    }
}

/// Error handler utility for consistent error processing
pub struct ErrorHandler;

impl ErrorHandler {
    /// Handle any error and convert to appropriate JSON-RPC response
    #[inline]
    pub fn handle_error(error: &anyhow::Error, id: Option<RequestId>) -> JsonRpcMessage {
        if let Some(mcp_error) = error.downcast_ref::<McpError>() {
            mcp_error.log();
            return mcp_error.to_error_response(id);
        }

        if let Some(api_error) = error.downcast_ref::<ApiError>() {
            error!("Upstream error: {}", api_error);
            return JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(
                JsonRpcError::new(
                    error_codes::INTERNAL_ERROR,
                    format!("Upstream request failed: {}", api_error),
                    None,
                ),
                id,
            ));
        }

        error!("Unexpected error: {:#}", error);
        McpError::InternalError {
            message: format!("{:#}", error),
        }
        .to_error_response(id)
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

impl From<serde_json::Error> for McpError {
    #[inline]
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidParameters {
            message: error.to_string(),
        }
    }
}

impl From<jsonschema::ValidationError<'_>> for McpError {
    #[inline]
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        Self::ValidationError {
            message: format!("{}:{}", error.instance_path, error),
        }
    }
}
