use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::client::RememberizerClient;
use crate::config::Config;
use crate::mcp::server::McpServer;
use crate::mcp::tools::tool_definitions;

/// Start the MCP server on stdio against the configured upstream API
#[inline]
pub async fn serve_mcp(config: &Config) -> Result<()> {
    info!(
        "Starting {} against {}",
        config.server.name, config.api.base_url
    );

    let client = RememberizerClient::new(&config.api);
    let server = McpServer::new(&config.server, Arc::new(client))
        .context("Failed to create MCP server")?;

    Arc::new(server).serve_stdio().await
}

/// Print the effective configuration with the token redacted
#[inline]
pub fn show_config(config: &Config, config_file: Option<&Path>) -> Result<()> {
    eprintln!("Current Configuration");
    eprintln!();
    eprintln!("API Settings:");
    eprintln!("  Base URL: {}", config.api.base_url);
    eprintln!("  Token: {:?}", config.api.api_token);
    eprintln!();
    eprintln!("Server Settings:");
    eprintln!("  Name: {}", config.server.name);
    if let Some(instructions) = &config.server.instructions {
        eprintln!("  Instructions: {}", instructions);
    }

    let config_path = match config_file {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_file().context("Failed to get config file path")?,
    };
    eprintln!();
    eprintln!("Config file: {}", config_path.display());

    Ok(())
}

/// Print the tool catalog as JSON
#[inline]
pub fn print_tools() -> Result<()> {
    let tools = serde_json::to_string_pretty(&tool_definitions())
        .context("Failed to render tool catalog")?;
    println!("{}", tools);
    Ok(())
}
