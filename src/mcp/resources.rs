//! MCP Resources
//!
//! Lists the documents of the knowledge base as resources and resolves a
//! resource URI back to the upstream endpoint holding its contents.

use crate::client::{
    ApiError, LIST_DOCUMENTS_PATH, RETRIEVE_DOCUMENT_PATH, RETRIEVE_SLACK_PATH, Upstream,
    UpstreamCall, expand_path,
};
use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::{RESOURCE_MIME_TYPE, Resource};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Kind of resource, taken from the authority of its URI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Document,
    Slack,
}

impl ResourceKind {
    #[inline]
    pub fn from_host(host: &str) -> Option<Self> {
        match host {
            "document" => Some(Self::Document),
            "slack" => Some(Self::Slack),
            _ => None,
        }
    }

    /// Upstream path template holding the contents of this kind
    #[inline]
    pub fn template(self) -> &'static str {
        match self {
            Self::Document => RETRIEVE_DOCUMENT_PATH,
            Self::Slack => RETRIEVE_SLACK_PATH,
        }
    }
}

/// URI under which a document is listed
#[inline]
pub fn document_uri(id: &str) -> String {
    format!("document://document/{}", id)
}

/// Split a resource URI into its kind and upstream identifier
#[inline]
pub fn parse_resource_uri(uri: &str) -> McpResult<(ResourceKind, String)> {
    let not_found = || McpError::ResourceNotFound {
        uri: uri.to_string(),
    };

    let parsed = Url::parse(uri).map_err(|_| not_found())?;
    let kind = parsed
        .host_str()
        .and_then(ResourceKind::from_host)
        .ok_or_else(not_found)?;
    let id = parsed.path().trim_start_matches('/');
    if id.is_empty() {
        return Err(not_found());
    }

    Ok((kind, id.to_string()))
}

#[derive(Clone)]
pub struct ResourceCatalog {
    upstream: Arc<dyn Upstream>,
}

impl ResourceCatalog {
    #[inline]
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    /// Fetch the first page of documents and describe each one as a resource
    #[inline]
    pub async fn list(&self) -> Result<Vec<Resource>, ApiError> {
        let data = self
            .upstream
            .execute(UpstreamCall::get(LIST_DOCUMENTS_PATH))
            .await?;

        let results = data
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ApiError::Protocol("document listing has no 'results' array".to_string())
            })?;

        let resources: Vec<Resource> = results.iter().filter_map(document_resource).collect();
        debug!("Listed {} document resources", resources.len());
        Ok(resources)
    }

    /// Fetch the contents behind `uri`, pretty-printed
    #[inline]
    pub async fn read(&self, uri: &str) -> McpResult<String> {
        let (kind, id) = parse_resource_uri(uri)?;
        let path = expand_path(kind.template(), &id);

        debug!("Reading resource {} from {}", uri, path);
        let data = self.upstream.execute(UpstreamCall::get(path)).await?;

        serde_json::to_string_pretty(&data).map_err(|e| McpError::InternalError {
            message: format!("failed to render resource {}: {}", uri, e),
        })
    }
}

fn document_resource(entry: &Value) -> Option<Resource> {
    let id = match entry.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            warn!("Skipping document without an id: {}", entry);
            return None;
        }
    };

    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .map_or_else(|| id.clone(), str::to_string);

    Some(Resource {
        uri: document_uri(&id),
        name,
        mime_type: RESOURCE_MIME_TYPE.to_string(),
    })
}
