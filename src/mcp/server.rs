//! MCP Server Implementation
//!
//! Connection lifecycle and message routing over newline-delimited JSON-RPC.
//! The transport loop is generic over its reader and writer; `serve_stdio`
//! binds it to the process's stdin and stdout.

use crate::client::Upstream;
use crate::config::ServerConfig;
use crate::mcp::errors::{ErrorHandler, McpError};
use crate::mcp::protocol::*;
use crate::mcp::resources::ResourceCatalog;
use crate::mcp::tools::{ToolDispatcher, tool_definitions};
use crate::mcp::validation::McpValidator;
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// MCP Server state and configuration
pub struct McpServer {
    /// Server implementation information
    pub server_info: Implementation,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Optional usage hints returned from `initialize`
    pub instructions: Option<String>,
    tools: Vec<Tool>,
    dispatcher: ToolDispatcher,
    resources: ResourceCatalog,
    connection_state: Arc<RwLock<ConnectionState>>,
    /// Message validator
    pub validator: Arc<McpValidator>,
}

/// Connection state tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

impl ConnectionState {
    /// Whether catalog requests may be served in this state
    #[inline]
    pub fn accepts_requests(&self) -> bool {
        matches!(self, Self::Initializing | Self::Ready)
    }
}

/// Message handler for processing incoming messages
pub struct MessageHandler {
    server: Arc<McpServer>,
}

impl McpServer {
    /// Create a server answering tool calls and resource reads through `upstream`
    #[inline]
    pub fn new(config: &ServerConfig, upstream: Arc<dyn Upstream>) -> Result<Self> {
        let server_info = Implementation {
            name: config.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let capabilities = ServerCapabilities {
            resources: Some(ResourcesCapability {
                subscribe: false,
                list_changed: false,
            }),
            tools: Some(ToolsCapability {
                list_changed: false,
            }),
        };

        let tools = tool_definitions();
        let validator = McpValidator::new(&tools)?;

        Ok(Self {
            server_info,
            capabilities,
            instructions: config.instructions.clone(),
            tools,
            dispatcher: ToolDispatcher::new(Arc::clone(&upstream)),
            resources: ResourceCatalog::new(upstream),
            connection_state: Arc::new(RwLock::new(ConnectionState::Uninitialized)),
            validator: Arc::new(validator),
        })
    }

    /// Start the server using stdio transport
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        self.serve(BufReader::new(io::stdin()), io::stdout()).await
    }

    /// Read one JSON-RPC message per line from `reader` until EOF, writing
    /// every response as a single line to `writer`.
    #[inline]
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    let raw_value: Value = match serde_json::from_str(line) {
                        Ok(value) => value,
                        Err(e) => {
                            error!("Failed to parse JSON: {}", e);
                            let error_response =
                                JsonRpcErrorResponse::new(JsonRpcError::parse_error(), None);
                            self.send_message(
                                &mut writer,
                                &JsonRpcMessage::ErrorResponse(error_response),
                            )
                            .await?;
                            continue;
                        }
                    };

                    match self.validator.validate_raw_message(&raw_value) {
                        Ok(message) => {
                            let handler = MessageHandler::new(Arc::clone(&self));
                            if let Err(e) = handler.process_message(message, &mut writer).await {
                                error!("Error processing message: {}", e);
                            }
                        }
                        Err(e) => {
                            e.log();
                            let id = raw_value
                                .get("id")
                                .cloned()
                                .and_then(|id| serde_json::from_value::<RequestId>(id).ok());
                            self.send_message(&mut writer, &e.to_error_response(id))
                                .await?;
                        }
                    }
                }
                Err(e) => {
                    error!("Error reading from transport: {}", e);
                    break;
                }
            }
        }

        {
            let mut state = self.connection_state.write().await;
            *state = ConnectionState::Closed;
        }

        info!("MCP server stopped");
        Ok(())
    }

    /// Send a message to the client
    async fn send_message<W>(&self, writer: &mut W, message: &JsonRpcMessage) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let json = serde_json::to_string(message)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Get current connection state
    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        self.connection_state.read().await.clone()
    }
}

impl MessageHandler {
    /// Create a new message handler
    #[inline]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }

    /// Process an incoming message
    #[inline]
    pub async fn process_message<W>(&self, message: JsonRpcMessage, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match message {
            JsonRpcMessage::Request(request) => self.handle_request(request, writer).await,
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification).await
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
                Ok(())
            }
        }
    }

    /// Handle a JSON-RPC request
    async fn handle_request<W>(&self, request: JsonRpcRequest, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        debug!("Handling request {}", request.method);
        let response = match request.method.as_str() {
            "tools/list" | "tools/call" | "resources/list" | "resources/read"
                if !self.server.connection_state().await.accepts_requests() =>
            {
                Err(McpError::InvalidRequest {
                    message: format!("{} received before initialize", request.method),
                }
                .into())
            }
            "initialize" => self.handle_initialize(request.params).await,
            "ping" => Ok(self.handle_ping()),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(request.params).await,
            "resources/list" => self.handle_list_resources().await,
            "resources/read" => self.handle_read_resource(request.params).await,
            _ => Err(McpError::MethodNotFound {
                method: request.method.clone(),
            }
            .into()),
        };

        match response {
            Ok(result) => {
                let response = JsonRpcResponse::new(result, request.id);
                self.server
                    .send_message(writer, &JsonRpcMessage::Response(response))
                    .await
            }
            Err(e) => {
                let message = ErrorHandler::handle_error(&e, Some(request.id));
                self.server.send_message(writer, &message).await
            }
        }
    }

    /// Handle a JSON-RPC notification
    async fn handle_notification(&self, notification: JsonRpcNotification) -> Result<()> {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => self.handle_initialized().await,
            "notifications/cancelled" => {
                debug!("Received cancellation notification");
                Ok(())
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
                Ok(())
            }
        }
    }

    /// Handle initialize request
    #[inline]
    pub async fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        let params: InitializeParams = match params {
            Some(p) => serde_json::from_value(p).map_err(McpError::from)?,
            None => {
                return Err(McpError::InvalidParameters {
                    message: "Initialize request missing parameters".to_string(),
                }
                .into());
            }
        };

        let validator = &self.server.validator;
        if !validator.is_protocol_version_supported(&params.protocol_version) {
            return Err(McpError::UnsupportedProtocolVersion {
                version: params.protocol_version,
                supported: validator
                    .supported_protocol_versions()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            }
            .into());
        }

        {
            let mut state = self.server.connection_state.write().await;
            *state = ConnectionState::Initializing;
        }

        let result = InitializeResult {
            protocol_version: params.protocol_version,
            capabilities: self.server.capabilities.clone(),
            server_info: self.server.server_info.clone(),
            instructions: self.server.instructions.clone(),
        };

        info!(
            "Client initialized: {} {} (protocol {})",
            params.client_info.name, params.client_info.version, result.protocol_version
        );
        Ok(serde_json::to_value(result)?)
    }

    async fn handle_initialized(&self) -> Result<()> {
        {
            let mut state = self.server.connection_state.write().await;
            *state = ConnectionState::Ready;
        }

        info!("Server ready to handle requests");
        Ok(())
    }

    /// Handle ping request
    #[inline]
    pub fn handle_ping(&self) -> Value {
        serde_json::json!({})
    }

    /// Handle list tools request
    #[inline]
    pub fn handle_list_tools(&self) -> Result<Value> {
        let result = ListToolsResult {
            tools: self.server.tools.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle call tool request.
    ///
    /// Upstream failures become an `isError` tool result so the model can see
    /// them; everything else is a JSON-RPC error.
    #[inline]
    pub async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value> {
        let params: CallToolParams = match params {
            Some(p) => serde_json::from_value(p).map_err(McpError::from)?,
            None => {
                return Err(McpError::InvalidParameters {
                    message: "Tool call request missing parameters".to_string(),
                }
                .into());
            }
        };

        let arguments = params.arguments.unwrap_or_default();
        self.server
            .validator
            .validate_tool_arguments(&params.name, &Value::Object(arguments.clone()))?;

        let result = match self.server.dispatcher.dispatch(&params.name, &arguments).await {
            Ok(result) => result,
            Err(McpError::Upstream(e)) => {
                warn!("Tool {} failed upstream: {}", params.name, e);
                CallToolResult::error(format!("Error: {}", e))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::to_value(result)?)
    }

    /// Handle list resources request
    #[inline]
    pub async fn handle_list_resources(&self) -> Result<Value> {
        let resources = self
            .server
            .resources
            .list()
            .await
            .map_err(McpError::from)?;

        Ok(serde_json::to_value(ListResourcesResult { resources })?)
    }

    /// Handle read resource request
    #[inline]
    pub async fn handle_read_resource(&self, params: Option<Value>) -> Result<Value> {
        let params: ReadResourceParams = match params {
            Some(p) => serde_json::from_value(p).map_err(McpError::from)?,
            None => {
                return Err(McpError::InvalidParameters {
                    message: "Read resource request missing parameters".to_string(),
                }
                .into());
            }
        };

        let text = self.server.resources.read(&params.uri).await?;
        let result = ReadResourceResult {
            contents: vec![ResourceContents {
                uri: params.uri,
                mime_type: RESOURCE_MIME_TYPE.to_string(),
                text,
            }],
        };
        Ok(serde_json::to_value(result)?)
    }
}
