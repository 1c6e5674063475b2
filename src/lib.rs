use thiserror::Error;

pub type Result<T> = std::result::Result<T, RememberizerError>;

#[derive(Error, Debug)]
pub enum RememberizerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Upstream API error: {0}")]
    Api(#[from] client::ApiError),

    #[error("MCP error: {0}")]
    Mcp(#[from] mcp::McpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod client;
pub mod commands;
pub mod config;
pub mod mcp;
