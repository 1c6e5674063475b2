//! MCP Message Validation
//!
//! JSON schema validation for incoming JSON-RPC messages, method parameters
//! and tool arguments. Tool argument schemas come straight from the tool
//! catalog, so `required`, `minimum` and `maximum` are enforced here rather
//! than in the dispatcher.

use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::*;
use anyhow::{Result, anyhow};
use jsonschema::{Draft, JSONSchema};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;

const TOOL_SCHEMA_PREFIX: &str = "tool:";

/// JSON Schema validator for MCP messages
#[derive(Debug)]
pub struct McpValidator {
    schemas: HashMap<String, JSONSchema>,
}

impl McpValidator {
    /// Create a validator with the built-in envelope schemas and one schema per tool
    #[inline]
    pub fn new(tools: &[Tool]) -> Result<Self> {
        let mut validator = Self {
            schemas: HashMap::new(),
        };

        validator.load_builtin_schemas()?;
        for tool in tools {
            validator.add_schema(
                &format!("{}{}", TOOL_SCHEMA_PREFIX, tool.name),
                &tool.input_schema,
            )?;
        }

        debug!("Loaded {} JSON schemas", validator.schemas.len());
        Ok(validator)
    }

    fn load_builtin_schemas(&mut self) -> Result<()> {
        let request_schema = json!({
            "type": "object",
            "properties": {
                "jsonrpc": {
                    "type": "string",
                    "const": "2.0"
                },
                "method": {"type": "string"},
                "params": {"type": "object"},
                "id": {
                    "oneOf": [
                        {"type": "string"},
                        {"type": "integer"}
                    ]
                }
            },
            "required": ["jsonrpc", "method", "id"]
        });
        self.add_schema("jsonrpc_request", &request_schema)?;

        let notification_schema = json!({
            "type": "object",
            "properties": {
                "jsonrpc": {
                    "type": "string",
                    "const": "2.0"
                },
                "method": {"type": "string"},
                "params": {"type": "object"}
            },
            "required": ["jsonrpc", "method"]
        });
        self.add_schema("jsonrpc_notification", &notification_schema)?;

        let initialize_schema = json!({
            "type": "object",
            "properties": {
                "protocolVersion": {"type": "string"},
                "capabilities": {"type": "object"},
                "clientInfo": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "version": {"type": "string"}
                    },
                    "required": ["name", "version"]
                }
            },
            "required": ["protocolVersion", "capabilities", "clientInfo"]
        });
        self.add_schema("initialize_params", &initialize_schema)?;

        let tool_call_schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "arguments": {"type": "object"}
            },
            "required": ["name"]
        });
        self.add_schema("call_tool_params", &tool_call_schema)?;

        let read_resource_schema = json!({
            "type": "object",
            "properties": {
                "uri": {"type": "string"}
            },
            "required": ["uri"]
        });
        self.add_schema("read_resource_params", &read_resource_schema)?;

        Ok(())
    }

    /// Add a JSON schema to the validator
    #[inline]
    pub fn add_schema(&mut self, name: &str, schema: &Value) -> Result<()> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| anyhow!("Failed to compile schema '{}': {}", name, e))?;

        self.schemas.insert(name.to_string(), compiled);
        Ok(())
    }

    /// Validate a value against a named schema, collecting every violation
    #[inline]
    pub fn validate_with_schema(&self, schema_name: &str, value: &Value) -> McpResult<()> {
        let schema = self
            .schemas
            .get(schema_name)
            .ok_or_else(|| McpError::InternalError {
                message: format!("Schema '{}' not found", schema_name),
            })?;

        if let Err(errors) = schema.validate(value) {
            let error_messages: Vec<String> = errors
                .map(|e| format!("{}:{}", e.instance_path, e))
                .collect();

            return Err(McpError::ValidationError {
                message: format!(
                    "Schema validation failed for '{}': {}",
                    schema_name,
                    error_messages.join(", ")
                ),
            });
        }

        Ok(())
    }

    /// Validate the arguments of a `tools/call` against the tool's input schema.
    ///
    /// Unknown tool names pass through untouched; the dispatcher reports them.
    #[inline]
    pub fn validate_tool_arguments(&self, tool: &str, arguments: &Value) -> McpResult<()> {
        let schema_name = format!("{}{}", TOOL_SCHEMA_PREFIX, tool);
        if !self.schemas.contains_key(&schema_name) {
            return Ok(());
        }

        self.validate_with_schema(&schema_name, arguments)
            .map_err(|e| McpError::InvalidToolParameters {
                tool: tool.to_string(),
                message: match e {
                    McpError::ValidationError { message } => message,
                    other => other.to_string(),
                },
            })
    }

    fn validate_method_params(&self, method: &str, params: &Value) -> McpResult<()> {
        let schema_name = match method {
            "initialize" => "initialize_params",
            "tools/call" => "call_tool_params",
            "resources/read" => "read_resource_params",
            _ => {
                debug!("No parameter validation schema for method: {}", method);
                return Ok(());
            }
        };

        self.validate_with_schema(schema_name, params)
    }

    /// Validate a raw JSON value as a JSON-RPC message
    #[inline]
    pub fn validate_raw_message(&self, value: &Value) -> McpResult<JsonRpcMessage> {
        let is_request = value.get("id").is_some_and(|id| !id.is_null());
        let has_method = value.get("method").is_some();

        if has_method && is_request {
            self.validate_with_schema("jsonrpc_request", value)?;
            let request: JsonRpcRequest = serde_json::from_value(value.clone())?;
            if let Some(params) = &request.params {
                self.validate_method_params(&request.method, params)?;
            }
            return Ok(JsonRpcMessage::Request(request));
        }

        if has_method {
            self.validate_with_schema("jsonrpc_notification", value)?;
            let notification: JsonRpcNotification = serde_json::from_value(value.clone())?;
            return Ok(JsonRpcMessage::Notification(notification));
        }

        serde_json::from_value::<JsonRpcMessage>(value.clone()).map_err(|_| {
            McpError::InvalidRequest {
                message: "Value does not match any known JSON-RPC message type".to_string(),
            }
        })
    }

    /// Check if a protocol version is supported
    #[inline]
    pub fn is_protocol_version_supported(&self, version: &str) -> bool {
        SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
    }

    /// Get supported protocol versions
    #[inline]
    pub fn supported_protocol_versions(&self) -> Vec<&'static str> {
        SUPPORTED_PROTOCOL_VERSIONS.to_vec()
    }
}
