//! MCP Tools Implementation
//!
//! The tool catalog and the dispatcher that turns a `tools/call` into exactly
//! one upstream request. Tool names form a closed enum, so every catalog entry
//! has exactly one dispatch branch.

use crate::client::{
    ACCOUNT_INFORMATION_PATH, AGENTIC_SEARCH_PATH, LIST_DOCUMENTS_PATH, LIST_INTEGRATIONS_PATH,
    SEARCH_PATH, Upstream, UpstreamCall,
};
use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::{CallToolResult, Tool};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_SEARCH_RESULTS: u64 = 5;
const DEFAULT_AGENTIC_CHUNKS: u64 = 5;
const DEFAULT_PAGE: u64 = 1;
const DEFAULT_PAGE_SIZE: u64 = 100;
const MAX_PAGE_SIZE: u64 = 1000;

const FROM_DESCRIPTION: &str = "Start date in ISO 8601 format with timezone (e.g., 2023-01-01T00:00:00Z). \
     Only knowledge from this point on is considered.";
const TO_DESCRIPTION: &str = "End date in ISO 8601 format with timezone (e.g., 2024-01-01T00:00:00Z). \
     Only knowledge up to this point is considered.";
const QUERY_DESCRIPTION: &str =
    "Up to a 400-word sentence for which you wish to find semantically similar chunks of knowledge.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    AccountInformation,
    Search,
    AgenticSearch,
    ListIntegrations,
    ListDocuments,
}

impl ToolName {
    /// Catalog order
    pub const ALL: [Self; 5] = [
        Self::AccountInformation,
        Self::Search,
        Self::AgenticSearch,
        Self::ListIntegrations,
        Self::ListDocuments,
    ];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccountInformation => "account_information",
            Self::Search => "search",
            Self::AgenticSearch => "agentic_search",
            Self::ListIntegrations => "list_integrations",
            Self::ListDocuments => "list_documents",
        }
    }

    /// Protocol-facing definition, including the JSON schema for its arguments
    #[inline]
    pub fn definition(self) -> Tool {
        let (description, input_schema) = match self {
            Self::AccountInformation => (
                "Get information about the Rememberizer account the server is connected to",
                json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
            Self::Search => (
                "Search for documents by semantic similarity",
                json!({
                    "type": "object",
                    "properties": {
                        "q": {
                            "type": "string",
                            "description": QUERY_DESCRIPTION
                        },
                        "n": {
                            "type": "integer",
                            "description": "Number of semantically similar chunks of text to return. \
                                Use 3 for a quick answer and 10 or more for broader coverage.",
                            "minimum": 1,
                            "default": DEFAULT_SEARCH_RESULTS
                        },
                        "from": {
                            "type": "string",
                            "description": FROM_DESCRIPTION
                        },
                        "to": {
                            "type": "string",
                            "description": TO_DESCRIPTION
                        }
                    },
                    "required": ["q"]
                }),
            ),
            Self::AgenticSearch => (
                "Search for documents with an LLM agent that refines the query using the \
                 conversation context",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": QUERY_DESCRIPTION
                        },
                        "user_context": {
                            "type": "string",
                            "description": "Additional context for the query, such as a summary \
                                of the conversation so far."
                        },
                        "n_chunks": {
                            "type": "integer",
                            "description": "Number of semantically similar chunks of text to return.",
                            "minimum": 1,
                            "default": DEFAULT_AGENTIC_CHUNKS
                        },
                        "from": {
                            "type": "string",
                            "description": FROM_DESCRIPTION
                        },
                        "to": {
                            "type": "string",
                            "description": TO_DESCRIPTION
                        }
                    },
                    "required": ["query"]
                }),
            ),
            Self::ListIntegrations => (
                "List the data source integrations connected to the account",
                json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
            Self::ListDocuments => (
                "Retrieve a paginated list of all documents in the knowledge base.\n\
                 Examples:\n\
                 - First 100 documents: {\"page\": 1, \"page_size\": 100}\n\
                 - Next page: {\"page\": 2, \"page_size\": 100}\n\
                 - Largest page allowed: {\"page\": 1, \"page_size\": 1000}",
                json!({
                    "type": "object",
                    "properties": {
                        "page": {
                            "type": "integer",
                            "description": "Page number for pagination (starts at 1)",
                            "minimum": 1,
                            "default": DEFAULT_PAGE
                        },
                        "page_size": {
                            "type": "integer",
                            "description": "Number of documents per page (1-1000)",
                            "minimum": 1,
                            "maximum": MAX_PAGE_SIZE,
                            "default": DEFAULT_PAGE_SIZE
                        }
                    }
                }),
            ),
        };

        Tool {
            name: self.as_str().to_string(),
            description: description.to_string(),
            input_schema,
        }
    }

    /// Build the single upstream request for this tool, applying defaults for
    /// omitted optional arguments.
    #[inline]
    pub fn upstream_call(self, args: &Map<String, Value>) -> McpResult<UpstreamCall> {
        let call = match self {
            Self::AccountInformation => UpstreamCall::get(ACCOUNT_INFORMATION_PATH),
            Self::Search => UpstreamCall::get(SEARCH_PATH)
                .with_query("q", self.required(args, "q")?)
                .with_query("n", &optional(args, "n", DEFAULT_SEARCH_RESULTS)),
            Self::AgenticSearch => UpstreamCall::post(
                AGENTIC_SEARCH_PATH,
                json!({
                    "query": self.required(args, "query")?,
                    "user_context": args.get("user_context").cloned().unwrap_or(Value::Null),
                    "n_chunks": optional(args, "n_chunks", DEFAULT_AGENTIC_CHUNKS),
                    "from": args.get("from").cloned().unwrap_or(Value::Null),
                    "to": args.get("to").cloned().unwrap_or(Value::Null),
                }),
            ),
            Self::ListIntegrations => UpstreamCall::get(LIST_INTEGRATIONS_PATH),
            Self::ListDocuments => UpstreamCall::get(LIST_DOCUMENTS_PATH)
                .with_query("page", &optional(args, "page", DEFAULT_PAGE))
                .with_query("page_size", &optional(args, "page_size", DEFAULT_PAGE_SIZE)),
        };
        Ok(call)
    }

    /// Select the part of the upstream payload surfaced to the caller
    #[inline]
    pub fn shape(self, data: Value) -> Value {
        match self {
            Self::ListIntegrations => match data {
                Value::Object(mut fields) => match fields.remove("data") {
                    Some(Value::Null) | None => json!([]),
                    Some(inner) => inner,
                },
                _ => json!([]),
            },
            _ => data,
        }
    }

    fn required<'a>(self, args: &'a Map<String, Value>, key: &str) -> McpResult<&'a Value> {
        args.get(key)
            .filter(|value| !value.is_null())
            .ok_or_else(|| McpError::MissingArgument {
                tool: self.as_str().to_string(),
                argument: key.to_string(),
            })
    }
}

fn optional(args: &Map<String, Value>, key: &str, default: u64) -> Value {
    args.get(key)
        .filter(|value| !value.is_null())
        .cloned()
        .unwrap_or_else(|| json!(default))
}

impl FromStr for ToolName {
    type Err = McpError;

    #[inline]
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| McpError::ToolNotFound {
                name: name.to_string(),
            })
    }
}

impl fmt::Display for ToolName {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns every tool definition, in catalog order
#[inline]
pub fn tool_definitions() -> Vec<Tool> {
    ToolName::ALL.into_iter().map(ToolName::definition).collect()
}

/// Routes tool invocations to the upstream API
#[derive(Clone)]
pub struct ToolDispatcher {
    upstream: Arc<dyn Upstream>,
}

impl ToolDispatcher {
    #[inline]
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    /// Run one tool invocation.
    ///
    /// Unknown names and missing arguments fail before anything is sent
    /// upstream. The successful result is a single text item holding the
    /// selected JSON.
    #[inline]
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> McpResult<CallToolResult> {
        let tool: ToolName = name.parse()?;
        let call = tool.upstream_call(arguments)?;

        debug!("Dispatching tool {} to {} {}", tool, call.method.as_str(), call.path);
        let data = self.upstream.execute(call).await?;
        let shaped = tool.shape(data);

        info!("Tool {} completed", tool);
        Ok(CallToolResult::text(serde_json::to_string_pretty(&shaped).map_err(
            |e| McpError::InternalError {
                message: format!("failed to render tool result: {}", e),
            },
        )?))
    }
}
