//! MCP Implementation Tests
//!
//! Unit tests for the tool catalog, the dispatcher and the resource catalog,
//! run against a recording in-memory upstream.

#[cfg(test)]
mod support {
    use crate::client::{ApiError, Upstream, UpstreamCall};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    pub enum Canned {
        Json(Value),
        Status(u16, &'static str),
    }

    /// Records every call and answers with a canned outcome
    pub struct RecordingUpstream {
        calls: Mutex<Vec<UpstreamCall>>,
        canned: Canned,
    }

    impl RecordingUpstream {
        pub fn replying(value: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                canned: Canned::Json(value),
            })
        }

        pub fn failing(status: u16, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                canned: Canned::Status(status, body),
            })
        }

        /// The same recorder, typed as the trait object the catalogs take
        pub fn shared(self: &Arc<Self>) -> Arc<dyn Upstream> {
            let recorder: Arc<Self> = Arc::clone(self);
            recorder
        }

        pub fn calls(&self) -> Vec<UpstreamCall> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl Upstream for RecordingUpstream {
        async fn execute(&self, call: UpstreamCall) -> Result<Value, ApiError> {
            self.calls.lock().expect("calls lock").push(call);
            match &self.canned {
                Canned::Json(value) => Ok(value.clone()),
                Canned::Status(status, body) => Err(ApiError::Upstream {
                    status: *status,
                    body: (*body).to_string(),
                }),
            }
        }
    }

    pub fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tool_catalog_tests {
    use crate::mcp::tools::{ToolName, tool_definitions};

    #[test]
    fn catalog_is_ordered_and_unique() {
        let names: Vec<String> = tool_definitions().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "account_information",
                "search",
                "agentic_search",
                "list_integrations",
                "list_documents"
            ]
        );
    }

    #[test]
    fn every_name_parses_back() {
        for tool in ToolName::ALL {
            let parsed: ToolName = tool.as_str().parse().expect("catalog name parses");
            assert_eq!(parsed, tool);
            assert_eq!(tool.to_string(), tool.as_str());
        }
        assert!("Search".parse::<ToolName>().is_err());
    }

    #[test]
    fn search_tool_definition() {
        let tool = ToolName::Search.definition();
        assert_eq!(tool.description, "Search for documents by semantic similarity");

        let schema = tool.input_schema;
        let properties = schema["properties"].as_object().expect("has properties");
        for key in ["q", "n", "from", "to"] {
            assert!(properties.contains_key(key), "missing {}", key);
        }
        assert_eq!(schema["properties"]["q"]["type"], "string");
        assert_eq!(schema["properties"]["n"]["type"], "integer");

        let required = schema["required"].as_array().expect("has required array");
        assert_eq!(required.len(), 1);
        assert_eq!(required[0], "q");
    }

    #[test]
    fn agentic_search_tool_definition() {
        let schema = ToolName::AgenticSearch.definition().input_schema;
        let properties = schema["properties"].as_object().expect("has properties");
        for key in ["query", "user_context", "n_chunks", "from", "to"] {
            assert!(properties.contains_key(key), "missing {}", key);
        }
        assert_eq!(schema["required"][0], "query");
    }

    #[test]
    fn list_documents_bounds() {
        let schema = ToolName::ListDocuments.definition().input_schema;

        let page = &schema["properties"]["page"];
        assert_eq!(page["minimum"], 1);
        assert_eq!(page["default"], 1);

        let page_size = &schema["properties"]["page_size"];
        assert_eq!(page_size["minimum"], 1);
        assert_eq!(page_size["maximum"], 1000);
        assert_eq!(page_size["default"], 100);

        assert!(schema.get("required").is_none());
    }

    #[test]
    fn parameterless_tools_have_empty_properties() {
        for tool in [ToolName::AccountInformation, ToolName::ListIntegrations] {
            let schema = tool.definition().input_schema;
            let properties = schema["properties"].as_object().expect("has properties");
            assert!(properties.is_empty());
        }
    }
}

#[cfg(test)]
mod dispatcher_tests {
    use super::support::{RecordingUpstream, query};
    use crate::client::{Method, UpstreamCall};
    use crate::mcp::errors::McpError;
    use crate::mcp::protocol::{CallToolResult, ToolContent};
    use crate::mcp::tools::ToolDispatcher;
    use serde_json::{Map, Value, json};

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("arguments must be an object, got {}", other),
        }
    }

    fn text_json(result: &CallToolResult) -> Value {
        assert!(!result.is_error);
        assert_eq!(result.content.len(), 1);
        let ToolContent::Text { text } = &result.content[0];
        serde_json::from_str(text).expect("tool text is JSON")
    }

    #[tokio::test]
    async fn account_information_returns_upstream_json() {
        let upstream = RecordingUpstream::replying(json!({"plan": "pro"}));
        let dispatcher = ToolDispatcher::new(upstream.shared());

        let result = dispatcher
            .dispatch("account_information", &Map::new())
            .await
            .expect("dispatch succeeds");

        assert_eq!(text_json(&result), json!({"plan": "pro"}));
        assert_eq!(upstream.calls(), vec![UpstreamCall::get("account/")]);
    }

    #[tokio::test]
    async fn search_defaults_result_count() {
        let upstream = RecordingUpstream::replying(json!({"matched_chunks": []}));
        let dispatcher = ToolDispatcher::new(upstream.shared());

        dispatcher
            .dispatch("search", &args(json!({"q": "roadmap"})))
            .await
            .expect("dispatch succeeds");

        let calls = upstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::Get);
        assert_eq!(calls[0].path, "documents/search/");
        assert_eq!(calls[0].query, query(&[("q", "roadmap"), ("n", "5")]));
    }

    #[tokio::test]
    async fn search_sends_only_query_and_count() {
        let upstream = RecordingUpstream::replying(json!({"matched_chunks": []}));
        let dispatcher = ToolDispatcher::new(upstream.shared());

        dispatcher
            .dispatch(
                "search",
                &args(json!({
                    "q": "standup",
                    "n": 10,
                    "from": "2024-01-01T00:00:00Z",
                    "to": "2024-02-01T00:00:00Z"
                })),
            )
            .await
            .expect("dispatch succeeds");

        assert_eq!(
            upstream.calls()[0].query,
            query(&[
                ("q", "standup"),
                ("n", "10"),
            ])
        );
    }

    #[tokio::test]
    async fn agentic_search_posts_body_with_defaults() {
        let upstream = RecordingUpstream::replying(json!({"matched_chunks": []}));
        let dispatcher = ToolDispatcher::new(upstream.shared());

        dispatcher
            .dispatch("agentic_search", &args(json!({"query": "launch plan"})))
            .await
            .expect("dispatch succeeds");

        let calls = upstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::Post);
        assert_eq!(calls[0].path, "documents/agentic_search/");
        assert!(calls[0].query.is_empty());
        assert_eq!(
            calls[0].body,
            Some(json!({
                "query": "launch plan",
                "user_context": null,
                "n_chunks": 5,
                "from": null,
                "to": null
            }))
        );
    }

    #[tokio::test]
    async fn agentic_search_returns_upstream_payload() {
        let payload = json!({"matched_chunks": [{"matched_content": "ship it"}]});
        let upstream = RecordingUpstream::replying(payload.clone());
        let dispatcher = ToolDispatcher::new(upstream);

        let result = dispatcher
            .dispatch(
                "agentic_search",
                &args(json!({"query": "launch", "user_context": "planning", "n_chunks": 2})),
            )
            .await
            .expect("dispatch succeeds");

        assert_eq!(text_json(&result), payload);
    }

    #[tokio::test]
    async fn list_integrations_surfaces_data_field() {
        let upstream = RecordingUpstream::replying(json!({
            "data": [{"integration_type": "slack"}],
            "message": "ok"
        }));
        let dispatcher = ToolDispatcher::new(upstream.shared());

        let result = dispatcher
            .dispatch("list_integrations", &Map::new())
            .await
            .expect("dispatch succeeds");

        assert_eq!(text_json(&result), json!([{"integration_type": "slack"}]));
        assert_eq!(upstream.calls(), vec![UpstreamCall::get("integrations/")]);
    }

    #[tokio::test]
    async fn list_integrations_without_data_is_empty() {
        let upstream = RecordingUpstream::replying(json!({"message": "ok"}));
        let dispatcher = ToolDispatcher::new(upstream);

        let result = dispatcher
            .dispatch("list_integrations", &Map::new())
            .await
            .expect("dispatch succeeds");

        assert_eq!(result, CallToolResult::text("[]".to_string()));
    }

    #[tokio::test]
    async fn list_documents_defaults_pagination() {
        let upstream = RecordingUpstream::replying(json!({"results": []}));
        let dispatcher = ToolDispatcher::new(upstream.shared());

        dispatcher
            .dispatch("list_documents", &Map::new())
            .await
            .expect("dispatch succeeds");
        dispatcher
            .dispatch("list_documents", &args(json!({"page": 3, "page_size": 20})))
            .await
            .expect("dispatch succeeds");

        let calls = upstream.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].path, "documents/");
        assert_eq!(calls[0].query, query(&[("page", "1"), ("page_size", "100")]));
        assert_eq!(calls[1].query, query(&[("page", "3"), ("page_size", "20")]));
    }

    #[tokio::test]
    async fn unknown_tool_makes_no_upstream_call() {
        let upstream = RecordingUpstream::replying(json!({}));
        let dispatcher = ToolDispatcher::new(upstream.shared());

        let error = dispatcher
            .dispatch("delete_everything", &Map::new())
            .await
            .expect_err("unknown tool fails");

        match error {
            McpError::ToolNotFound { name } => assert_eq!(name, "delete_everything"),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_query_names_the_argument() {
        let upstream = RecordingUpstream::replying(json!({}));
        let dispatcher = ToolDispatcher::new(upstream.shared());

        let error = dispatcher
            .dispatch("search", &args(json!({"n": 3})))
            .await
            .expect_err("q is required");
        assert!(matches!(
            error,
            McpError::MissingArgument { ref argument, .. } if argument == "q"
        ));

        let error = dispatcher
            .dispatch("agentic_search", &args(json!({"query": null})))
            .await
            .expect_err("null counts as missing");
        assert!(matches!(
            error,
            McpError::MissingArgument { ref argument, .. } if argument == "query"
        ));

        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn upstream_failures_are_reported_as_upstream_errors() {
        let upstream = RecordingUpstream::failing(503, "maintenance");
        let dispatcher = ToolDispatcher::new(upstream.shared());

        let error = dispatcher
            .dispatch("account_information", &Map::new())
            .await
            .expect_err("503 fails");

        assert!(matches!(error, McpError::Upstream(_)));
        assert!(error.to_string().contains("503"));
        assert_eq!(upstream.calls().len(), 1);
    }
}

#[cfg(test)]
mod resource_tests {
    use super::support::RecordingUpstream;
    use crate::client::{ApiError, UpstreamCall};
    use crate::mcp::errors::McpError;
    use crate::mcp::protocol::Resource;
    use crate::mcp::resources::{ResourceCatalog, ResourceKind, document_uri, parse_resource_uri};
    use serde_json::{Value, json};

    #[tokio::test]
    async fn documents_are_listed_as_resources() {
        let upstream = RecordingUpstream::replying(json!({
            "results": [{"id": "42", "name": "Spec.pdf"}]
        }));
        let catalog = ResourceCatalog::new(upstream.shared());

        let resources = catalog.list().await.expect("listing succeeds");

        assert_eq!(
            resources,
            vec![Resource {
                uri: "document://document/42".to_string(),
                name: "Spec.pdf".to_string(),
                mime_type: "text/json".to_string(),
            }]
        );
        assert_eq!(upstream.calls(), vec![UpstreamCall::get("documents/")]);
    }

    #[tokio::test]
    async fn listing_tolerates_loose_entries() {
        let upstream = RecordingUpstream::replying(json!({
            "results": [
                {"id": 7, "name": "Numbers.xlsx"},
                {"id": "abc"},
                {"name": "orphan.txt"}
            ]
        }));
        let catalog = ResourceCatalog::new(upstream);

        let resources = catalog.list().await.expect("listing succeeds");

        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].uri, "document://document/7");
        assert_eq!(resources[1].uri, "document://document/abc");
        assert_eq!(resources[1].name, "abc");
    }

    #[tokio::test]
    async fn listing_without_results_is_a_protocol_error() {
        let upstream = RecordingUpstream::replying(json!({"detail": "unexpected"}));
        let catalog = ResourceCatalog::new(upstream);

        let error = catalog.list().await.expect_err("results is required");
        assert!(matches!(error, ApiError::Protocol(_)));
    }

    #[tokio::test]
    async fn reading_a_document_fetches_its_contents() {
        let upstream = RecordingUpstream::replying(json!({"content": "hello"}));
        let catalog = ResourceCatalog::new(upstream.shared());

        let text = catalog
            .read(&document_uri("42"))
            .await
            .expect("read succeeds");

        assert_eq!(upstream.calls(), vec![UpstreamCall::get("documents/42/contents/")]);
        assert_eq!(text, "{\n  \"content\": \"hello\"\n}");
    }

    #[tokio::test]
    async fn reading_a_slack_discussion() {
        let upstream = RecordingUpstream::replying(json!({"messages": []}));
        let catalog = ResourceCatalog::new(upstream.shared());

        let text = catalog
            .read("slack://slack/C01-1700000000.000100")
            .await
            .expect("read succeeds");

        assert_eq!(
            upstream.calls(),
            vec![UpstreamCall::get(
                "discussions/C01-1700000000.000100/contents/?integration_type=slack"
            )]
        );
        let value: Value = serde_json::from_str(&text).expect("pretty JSON");
        assert_eq!(value, json!({"messages": []}));
    }

    #[tokio::test]
    async fn unknown_kinds_are_rejected_without_upstream_calls() {
        let upstream = RecordingUpstream::replying(json!({}));
        let catalog = ResourceCatalog::new(upstream.shared());

        for uri in ["unknown://unknown/x", "unknown://unknown/", "not a uri"] {
            let error = catalog.read(uri).await.expect_err("unknown kind fails");
            match error {
                McpError::ResourceNotFound { uri: reported } => assert_eq!(reported, uri),
                other => panic!("unexpected error {:?}", other),
            }
        }
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_identifiers_are_rejected_without_upstream_calls() {
        let upstream = RecordingUpstream::replying(json!({}));
        let catalog = ResourceCatalog::new(upstream.shared());

        for uri in ["document://document/", "document://document", "slack://slack/"] {
            let error = catalog.read(uri).await.expect_err("empty id fails");
            assert!(matches!(error, McpError::ResourceNotFound { .. }), "{}", uri);
        }
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_while_reading() {
        let upstream = RecordingUpstream::failing(404, r#"{"detail":"Not found."}"#);
        let catalog = ResourceCatalog::new(upstream);

        let error = catalog
            .read(&document_uri("99"))
            .await
            .expect_err("404 fails");
        assert!(matches!(
            error,
            McpError::Upstream(ApiError::Upstream { status: 404, .. })
        ));
    }

    #[test]
    fn uri_parsing() {
        assert_eq!(
            parse_resource_uri("document://document/42").expect("parses"),
            (ResourceKind::Document, "42".to_string())
        );
        assert_eq!(
            parse_resource_uri("slack://slack/C042").expect("parses"),
            (ResourceKind::Slack, "C042".to_string())
        );
        assert_eq!(ResourceKind::Document.template(), "documents/{id}/contents/");
    }
}
