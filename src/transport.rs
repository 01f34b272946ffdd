//! The page's two outbound network surfaces, as ports.
//!
//! - [`HttpTransport`] is the fetch-like surface: a whole request (with a
//!   map-like header object) goes in, a response comes out.
//! - [`HeaderSink`] is the XHR-like surface: headers are registered one
//!   name/value pair at a time before the request is sent.
//!
//! The interceptor wraps both without changing what they deliver.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Request, StatusCode};

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Fetch-like outbound surface.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: Request) -> anyhow::Result<HttpResponse>;
}

/// Default transport backed by a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: Request) -> anyhow::Result<HttpResponse> {
        let response = self.client.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!("Request timeout: {}", e)
            } else if e.is_connect() {
                anyhow::anyhow!("Connection failed: {}", e)
            } else {
                anyhow::anyhow!("Request failed: {}", e)
            }
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok(HttpResponse { status, body })
    }
}

/// XHR-like outbound surface: one header registration per call.
pub trait HeaderSink {
    fn set_request_header(&mut self, name: &str, value: &str);
}

impl HeaderSink for HeaderMap {
    fn set_request_header(&mut self, name: &str, value: &str) {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            tracing::debug!("Dropping unrepresentable request header {:?}", name);
            return;
        };
        self.append(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_sink_appends() {
        let mut headers = HeaderMap::new();
        headers.set_request_header("X-Custom", "one");
        headers.set_request_header("x-custom", "two");
        let values: Vec<_> = headers.get_all("x-custom").iter().collect();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_header_map_sink_ignores_invalid_name() {
        let mut headers = HeaderMap::new();
        headers.set_request_header("bad name", "value");
        assert!(headers.is_empty());
    }

    #[test]
    fn test_response_success() {
        assert!(HttpResponse::new(StatusCode::OK, "{}").is_success());
        assert!(!HttpResponse::new(StatusCode::FORBIDDEN, "").is_success());
    }
}
