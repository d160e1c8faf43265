//! HTTP client boundary
//!
//! The executor never talks to the network directly. It hands an
//! [`HttpRequest`] to an [`HttpClient`] and gets an [`HttpResponse`] back,
//! which lets tests swap in a scripted client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};

/// HTTP methods the request nodes issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether requests with this method carry a body
    pub fn sends_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Header pairs in the order they were written
    pub headers: Vec<(String, String)>,
    /// Only sent for POST and PUT
    pub body: Option<String>,
}

/// Outcome of one request
///
/// `success` reports the transport only. A completed round trip is a success
/// whatever its status code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub success: bool,
    pub error_message: String,
}

impl HttpResponse {
    /// Response for a request that never completed
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: message.into(),
            ..Self::default()
        }
    }
}

/// Performs HTTP requests for the executor
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform one request. Never retries.
    async fn perform(&self, request: HttpRequest) -> HttpResponse;
}

/// [`HttpClient`] backed by `reqwest`
///
/// No timeout is configured: a slow server holds the run until it answers.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Build a client that sends the given `User-Agent`
    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| WorkflowError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn perform(&self, request: HttpRequest) -> HttpResponse {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if request.method.sends_body() {
            if let Some(body) = request.body {
                builder = builder.body(body);
            }
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("{} {} failed: {}", request.method, request.url, e);
                return HttpResponse::transport_error(e.to_string());
            }
        };

        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        match response.text().await {
            Ok(body) => HttpResponse {
                status_code,
                body,
                headers,
                success: true,
                error_message: String::new(),
            },
            Err(e) => HttpResponse::transport_error(e.to_string()),
        }
    }
}

/// Parse raw header text into ordered `(name, value)` pairs
///
/// One header per line, split on the first `:`, with both sides trimmed.
/// Blank lines and lines without a `:` are skipped.
pub fn parse_headers(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(
            "Content-Type: application/json\n\n  Authorization :Bearer a:b  \r\nno colon here\n",
        );
        assert_eq!(
            headers,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), "Bearer a:b".to_string()),
            ]
        );
        assert!(parse_headers("").is_empty());
    }

    #[test]
    fn test_method_body_rules() {
        assert!(HttpMethod::Post.sends_body());
        assert!(HttpMethod::Put.sends_body());
        assert!(!HttpMethod::Get.sends_body());
        assert!(!HttpMethod::Delete.sends_body());
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_with_user_agent() {
        assert!(ReqwestHttpClient::with_user_agent("waypoint/0.1").is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let client = ReqwestHttpClient::new();
        let response = client
            .perform(HttpRequest {
                method: HttpMethod::Get,
                url: "http://127.0.0.1:1/".to_string(),
                headers: Vec::new(),
                body: None,
            })
            .await;

        assert!(!response.success);
        assert!(!response.error_message.is_empty());
        assert_eq!(response.status_code, 0);
    }
}
