//! MCP (Model Context Protocol) Server Implementation
//!
//! JSON-RPC 2.0 server exposing the Rememberizer tool and resource catalogs.

pub mod errors;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;
pub mod validation;

#[cfg(test)]
mod tests;

pub use errors::{McpError, McpResult};
pub use server::{ConnectionState, McpServer, MessageHandler};
pub use tools::{ToolDispatcher, ToolName};
