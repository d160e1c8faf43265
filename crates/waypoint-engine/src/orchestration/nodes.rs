//! Per-node execution
//!
//! [`NodeExecutor::execute`] dispatches on the node's configuration and
//! applies its side effect to an [`ExecutionContext`]. The boolean outcome
//! separates action failures (transport error, missing variable) from
//! success; configuration problems surface as `Err`.

use std::sync::Arc;
use std::time::Duration;

use super::context::{ExecutionContext, VariableValue};
use super::types::{HttpRequestConfig, Node, NodeConfig};
use crate::constants::log_format::{RESPONSE_BODY_PREVIEW, VARIABLE_PREVIEW};
use crate::error::{ConfigurationError, Result};
use crate::http::{parse_headers, HttpClient, HttpMethod, HttpRequest, ReqwestHttpClient};

/// Executes single nodes against an execution context
#[derive(Clone)]
pub struct NodeExecutor {
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for NodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeExecutor").finish_non_exhaustive()
    }
}

impl Default for NodeExecutor {
    fn default() -> Self {
        Self::with_reqwest()
    }
}

impl NodeExecutor {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// Executor backed by a default [`ReqwestHttpClient`]
    pub fn with_reqwest() -> Self {
        Self::new(Arc::new(ReqwestHttpClient::new()))
    }

    /// Execute one node
    ///
    /// Returns `Ok(true)` on success and `Ok(false)` when the node's action
    /// failed; the reason is in the context log either way. Node kinds with no
    /// behaviour yet log a warning and succeed so partial graphs still run.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidDelay`] when a DELAY node's text is not a
    /// non-negative integer.
    pub async fn execute(&self, node: &Node, ctx: &mut ExecutionContext) -> Result<bool> {
        ctx.log(format!(
            "Executing node: {} (ID: {})",
            node.type_tag(),
            node.id()
        ));

        match node.config() {
            NodeConfig::Start => {
                ctx.log("Starting workflow execution");
                Ok(true)
            }
            NodeConfig::HttpGet(http) => Ok(self.send(HttpMethod::Get, http, ctx).await),
            NodeConfig::HttpPost(http) => Ok(self.send(HttpMethod::Post, http, ctx).await),
            NodeConfig::HttpPut(http) => Ok(self.send(HttpMethod::Put, http, ctx).await),
            NodeConfig::HttpDelete(http) => Ok(self.send(HttpMethod::Delete, http, ctx).await),
            NodeConfig::SetVariable { var_name } => {
                let value = ctx.last_response_body().to_string();
                ctx.log(format!(
                    "Set variable '{}' = {}",
                    var_name,
                    preview(&value, VARIABLE_PREVIEW)
                ));
                ctx.set_variable(var_name.clone(), value);
                Ok(true)
            }
            NodeConfig::GetVariable { var_name } => Ok(get_variable(var_name, ctx)),
            NodeConfig::Log { message } => {
                ctx.log(format!("LOG: {}", message));
                Ok(true)
            }
            NodeConfig::Delay { delay_ms } => {
                let millis = parse_delay(delay_ms).ok_or_else(|| ConfigurationError::InvalidDelay {
                    node_id: node.id(),
                    value: delay_ms.clone(),
                })?;
                ctx.log(format!("Delaying for {}ms", millis));
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(true)
            }
            NodeConfig::JsonExtract { .. }
            | NodeConfig::IfCondition { .. }
            | NodeConfig::Assert { .. } => {
                ctx.log(format!(
                    "WARNING: Node type '{}' execution not implemented yet",
                    node.type_tag()
                ));
                Ok(true)
            }
        }
    }

    async fn send(
        &self,
        method: HttpMethod,
        config: &HttpRequestConfig,
        ctx: &mut ExecutionContext,
    ) -> bool {
        let request = HttpRequest {
            method,
            url: config.url.clone(),
            headers: parse_headers(&config.headers),
            body: method.sends_body().then(|| config.body.clone()),
        };

        ctx.log(format!("{} Request to: {}", method, config.url));
        let response = self.http.perform(request).await;

        if !response.success {
            ctx.log(format!("ERROR: {}", response.error_message));
            return false;
        }

        ctx.log(format!("Response: Status {}", response.status_code));
        ctx.log(format!(
            "Body: {}",
            preview(&response.body, RESPONSE_BODY_PREVIEW)
        ));
        ctx.set_last_response(response.body, response.status_code);
        true
    }
}

fn get_variable(var_name: &str, ctx: &mut ExecutionContext) -> bool {
    let value = match ctx.get_variable(var_name) {
        Some(VariableValue::String(value)) => value.clone(),
        Some(_) => {
            ctx.log(format!("ERROR: Variable '{}' is not a string", var_name));
            return false;
        }
        None => {
            ctx.log(format!("ERROR: Variable '{}' not found", var_name));
            return false;
        }
    };

    ctx.log(format!(
        "Get variable '{}' = {}",
        var_name,
        preview(&value, VARIABLE_PREVIEW)
    ));
    ctx.set_last_response_body(value);
    true
}

/// Parse delay text as whole milliseconds. Surrounding whitespace is allowed.
fn parse_delay(text: &str) -> Option<u64> {
    text.trim().parse().ok()
}

/// First `limit` characters of `text`, with `...` appended if anything was cut
fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use crate::http::HttpResponse;
    use crate::orchestration::NodeType;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Scripted client that records every request it receives
    struct MockHttpClient {
        response: HttpResponse,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl MockHttpClient {
        fn new(response: HttpResponse) -> Arc<Self> {
            Arc::new(Self {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn ok(status_code: u16, body: &str) -> Arc<Self> {
            Self::new(HttpResponse {
                status_code,
                body: body.to_string(),
                headers: Vec::new(),
                success: true,
                error_message: String::new(),
            })
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn perform(&self, request: HttpRequest) -> HttpResponse {
            self.requests.lock().push(request);
            self.response.clone()
        }
    }

    fn http_node(id: i32, node_type: NodeType, url: &str, headers: &str, body: &str) -> Node {
        let http = HttpRequestConfig {
            url: url.to_string(),
            headers: headers.to_string(),
            body: body.to_string(),
        };
        let config = match node_type {
            NodeType::HttpGet => NodeConfig::HttpGet(http),
            NodeType::HttpPost => NodeConfig::HttpPost(http),
            NodeType::HttpPut => NodeConfig::HttpPut(http),
            NodeType::HttpDelete => NodeConfig::HttpDelete(http),
            other => panic!("not an HTTP type: {other}"),
        };
        Node::with_config(id, config)
    }

    #[tokio::test]
    async fn test_start_logs() {
        let executor = NodeExecutor::new(MockHttpClient::ok(200, ""));
        let mut ctx = ExecutionContext::new();

        let ok = executor.execute(&Node::new(1, NodeType::Start), &mut ctx).await.unwrap();
        assert!(ok);
        assert_eq!(
            ctx.log_lines().collect::<Vec<_>>(),
            vec!["Executing node: Start (ID: 1)", "Starting workflow execution"]
        );
    }

    #[tokio::test]
    async fn test_post_sends_body_and_headers() {
        let client = MockHttpClient::ok(201, "{\"id\":7}");
        let executor = NodeExecutor::new(client.clone());
        let mut ctx = ExecutionContext::new();
        let node = http_node(
            11,
            NodeType::HttpPost,
            "http://api.test/items",
            "Content-Type: application/json\nX-Trace: 1",
            "{\"name\":\"a\"}",
        );

        assert!(executor.execute(&node, &mut ctx).await.unwrap());
        assert_eq!(ctx.last_status_code(), 201);
        assert_eq!(ctx.last_response_body(), "{\"id\":7}");

        let requests = client.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].body.as_deref(), Some("{\"name\":\"a\"}"));
        assert_eq!(requests[0].headers.len(), 2);
        assert!(ctx.execution_log().contains("POST Request to: http://api.test/items"));
        assert!(ctx.execution_log().contains("Response: Status 201"));
    }

    #[tokio::test]
    async fn test_get_sends_no_body() {
        let client = MockHttpClient::ok(200, "ok");
        let executor = NodeExecutor::new(client.clone());
        let mut ctx = ExecutionContext::new();
        let node = http_node(11, NodeType::HttpGet, "http://api.test", "", "ignored");

        assert!(executor.execute(&node, &mut ctx).await.unwrap());
        assert_eq!(client.requests.lock()[0].body, None);
    }

    #[tokio::test]
    async fn test_non_2xx_status_is_success() {
        let executor = NodeExecutor::new(MockHttpClient::ok(500, "boom"));
        let mut ctx = ExecutionContext::new();
        let node = http_node(11, NodeType::HttpDelete, "http://api.test/1", "", "");

        assert!(executor.execute(&node, &mut ctx).await.unwrap());
        assert_eq!(ctx.last_status_code(), 500);
    }

    #[tokio::test]
    async fn test_transport_failure_logs_error() {
        let executor = NodeExecutor::new(MockHttpClient::new(HttpResponse::transport_error(
            "connection refused",
        )));
        let mut ctx = ExecutionContext::new();
        ctx.set_last_response("previous", 200);
        let node = http_node(11, NodeType::HttpPut, "http://api.test", "", "");

        assert!(!executor.execute(&node, &mut ctx).await.unwrap());
        assert!(ctx.execution_log().contains("ERROR: connection refused"));
        assert_eq!(ctx.last_response_body(), "previous");
    }

    #[tokio::test]
    async fn test_long_body_is_truncated_in_log() {
        let body = "x".repeat(250);
        let executor = NodeExecutor::new(MockHttpClient::ok(200, &body));
        let mut ctx = ExecutionContext::new();
        let node = http_node(11, NodeType::HttpGet, "http://api.test", "", "");

        executor.execute(&node, &mut ctx).await.unwrap();
        let expected = format!("Body: {}...", "x".repeat(200));
        assert!(ctx.log_lines().any(|line| line == expected));
        assert_eq!(ctx.last_response_body().len(), 250);
    }

    #[tokio::test]
    async fn test_set_then_get_variable() {
        let executor = NodeExecutor::new(MockHttpClient::ok(200, ""));
        let mut ctx = ExecutionContext::new();
        ctx.set_last_response("token-123", 200);

        let set = Node::with_config(
            11,
            NodeConfig::SetVariable {
                var_name: "token".to_string(),
            },
        );
        assert!(executor.execute(&set, &mut ctx).await.unwrap());
        assert!(ctx.execution_log().contains("Set variable 'token' = token-123"));

        ctx.set_last_response("other", 200);
        let get = Node::with_config(
            21,
            NodeConfig::GetVariable {
                var_name: "token".to_string(),
            },
        );
        assert!(executor.execute(&get, &mut ctx).await.unwrap());
        assert_eq!(ctx.last_response_body(), "token-123");
        assert!(ctx.execution_log().contains("Get variable 'token' = token-123"));
    }

    #[tokio::test]
    async fn test_get_missing_variable_fails() {
        let executor = NodeExecutor::new(MockHttpClient::ok(200, ""));
        let mut ctx = ExecutionContext::new();
        let get = Node::with_config(
            11,
            NodeConfig::GetVariable {
                var_name: "nope".to_string(),
            },
        );

        assert!(!executor.execute(&get, &mut ctx).await.unwrap());
        assert!(ctx.execution_log().contains("ERROR: Variable 'nope' not found"));
    }

    #[tokio::test]
    async fn test_get_non_string_variable_fails() {
        let executor = NodeExecutor::new(MockHttpClient::ok(200, ""));
        let mut ctx = ExecutionContext::new();
        ctx.set_variable("flag", VariableValue::Bool(true));
        let get = Node::with_config(
            11,
            NodeConfig::GetVariable {
                var_name: "flag".to_string(),
            },
        );

        assert!(!executor.execute(&get, &mut ctx).await.unwrap());
        assert!(ctx.execution_log().contains("ERROR: Variable 'flag' is not a string"));
    }

    #[tokio::test]
    async fn test_delay() {
        let executor = NodeExecutor::new(MockHttpClient::ok(200, ""));
        let mut ctx = ExecutionContext::new();
        let delay = Node::with_config(
            11,
            NodeConfig::Delay {
                delay_ms: " 5 ".to_string(),
            },
        );

        assert!(executor.execute(&delay, &mut ctx).await.unwrap());
        assert!(ctx.execution_log().contains("Delaying for 5ms"));
    }

    #[tokio::test]
    async fn test_invalid_delay_is_configuration_error() {
        let executor = NodeExecutor::new(MockHttpClient::ok(200, ""));

        for text in ["abc", "-5", "", "1.5"] {
            let mut ctx = ExecutionContext::new();
            let delay = Node::with_config(
                31,
                NodeConfig::Delay {
                    delay_ms: text.to_string(),
                },
            );
            let err = executor.execute(&delay, &mut ctx).await.unwrap_err();
            assert!(matches!(
                err,
                WorkflowError::Configuration(ConfigurationError::InvalidDelay { node_id: 31, .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_unimplemented_types_warn_and_succeed() {
        let executor = NodeExecutor::new(MockHttpClient::ok(200, ""));

        for node_type in [NodeType::JsonExtract, NodeType::IfCondition, NodeType::Assert] {
            let mut ctx = ExecutionContext::new();
            let ok = executor
                .execute(&Node::new(1, node_type), &mut ctx)
                .await
                .unwrap();
            assert!(ok);
            let expected = format!(
                "WARNING: Node type '{}' execution not implemented yet",
                node_type.tag()
            );
            assert!(ctx.log_lines().any(|line| line == expected));
        }
    }

    #[test]
    fn test_preview_counts_chars() {
        assert_eq!(preview("héllo", 3), "hél...");
        assert_eq!(preview("abc", 3), "abc");
        assert_eq!(preview("", 3), "");
    }
}
