//! Rememberizer REST API client
//!
//! Thin authenticated JSON client over the upstream API. Every request is
//! described by an [`UpstreamCall`] so callers can be exercised against a fake
//! [`Upstream`] implementation in tests.


use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ApiConfig, ApiToken};

pub const ACCOUNT_INFORMATION_PATH: &str = "account/";
pub const SEARCH_PATH: &str = "documents/search/";
pub const AGENTIC_SEARCH_PATH: &str = "documents/agentic_search/";
pub const LIST_INTEGRATIONS_PATH: &str = "integrations/";
pub const LIST_DOCUMENTS_PATH: &str = "documents/";
pub const RETRIEVE_DOCUMENT_PATH: &str = "documents/{id}/contents/";
pub const RETRIEVE_SLACK_PATH: &str = "discussions/{id}/contents/?integration_type=slack";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request path: {0}")]
    InvalidPath(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Malformed upstream response: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// One outbound request: method, relative path and either query or body
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamCall {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl UpstreamCall {
    #[inline]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[inline]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    /// Append a query parameter. JSON strings are sent unquoted, `null` is dropped.
    #[inline]
    #[must_use]
    pub fn with_query(mut self, key: &str, value: &Value) -> Self {
        let rendered = match value {
            Value::Null => return self,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.query.push((key.to_string(), rendered));
        self
    }
}

/// Substitute `{id}` in an endpoint template.
#[inline]
pub fn expand_path(template: &str, id: &str) -> String {
    template.replace("{id}", id)
}

/// Anything able to run an [`UpstreamCall`] and hand back the parsed JSON body
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn execute(&self, call: UpstreamCall) -> Result<Value, ApiError>;
}

#[derive(Debug, Clone)]
pub struct RememberizerClient {
    base_url: Url,
    api_token: ApiToken,
    agent: ureq::Agent,
}

impl RememberizerClient {
    #[inline]
    pub fn new(config: &ApiConfig) -> Self {
        // Status handling is done here so error bodies can be surfaced.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            base_url: config.base_url.clone(),
            api_token: config.api_token.clone(),
            agent,
        }
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET `path` with the given query parameters
    #[inline]
    pub async fn get(&self, path: &str, query: &[(&str, Value)]) -> Result<Value, ApiError> {
        let call = query
            .iter()
            .fold(UpstreamCall::get(path), |call, (key, value)| {
                call.with_query(key, value)
            });
        self.execute(call).await
    }

    /// POST `body` as JSON to `path`
    #[inline]
    pub async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.execute(UpstreamCall::post(path, body)).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        if path.starts_with('/') || path.contains("://") {
            return Err(ApiError::InvalidPath(path.to_string()));
        }
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidPath(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl Upstream for RememberizerClient {
    async fn execute(&self, call: UpstreamCall) -> Result<Value, ApiError> {
        let url = self.endpoint(&call.path)?;
        debug!("{} {} query={:?}", call.method.as_str(), url, call.query);

        let agent = self.agent.clone();
        let authorization = format!("Bearer {}", self.api_token.expose());

        tokio::task::spawn_blocking(move || send_blocking(&agent, &url, &authorization, &call))
            .await
            .map_err(|e| ApiError::Transport(format!("request task failed: {}", e)))?
    }
}

fn send_blocking(
    agent: &ureq::Agent,
    url: &Url,
    authorization: &str,
    call: &UpstreamCall,
) -> Result<Value, ApiError> {
    let result = match call.method {
        Method::Get => call
            .query
            .iter()
            .fold(agent.get(url.as_str()), |request, (key, value)| {
                request.query(key, value)
            })
            .header("Authorization", authorization)
            .header("Accept", "application/json")
            .call(),
        Method::Post => {
            let body = serde_json::to_string(call.body.as_ref().unwrap_or(&Value::Null))
                .map_err(|e| ApiError::Protocol(format!("failed to encode request body: {}", e)))?;
            agent
                .post(url.as_str())
                .header("Authorization", authorization)
                .header("Accept", "application/json")
                .header("Content-Type", "application/json")
                .send(body.as_str())
        }
    };

    let mut response = result.map_err(|e| {
        warn!("{} {} failed: {}", call.method.as_str(), url, e);
        ApiError::Transport(e.to_string())
    })?;

    let status = response.status();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ApiError::Transport(format!("failed to read response body: {}", e)))?;

    if !status.is_success() {
        warn!("{} {} returned HTTP {}", call.method.as_str(), url, status.as_u16());
        return Err(ApiError::Upstream {
            status: status.as_u16(),
            body: text,
        });
    }

    serde_json::from_str(&text).map_err(|e| ApiError::Protocol(e.to_string()))
}
