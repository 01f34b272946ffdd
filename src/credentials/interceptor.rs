//! Transparent wrappers around the outbound surfaces that capture the bearer token.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::Request;

use super::CredentialCell;
use crate::transport::{HeaderSink, HttpResponse, HttpTransport};

/// Inspects outgoing headers and stores recognizable bearer tokens.
///
/// Must be installed before the host issues its first authenticated request,
/// otherwise the token is only seen on a later one.
#[derive(Debug, Clone)]
pub struct CredentialInterceptor {
    cell: CredentialCell,
    marker: Arc<str>,
}

impl CredentialInterceptor {
    pub fn new(cell: CredentialCell, marker: impl Into<Arc<str>>) -> Self {
        Self {
            cell,
            marker: marker.into(),
        }
    }

    pub fn cell(&self) -> &CredentialCell {
        &self.cell
    }

    /// XHR-style observation of one header registration.
    pub fn observe_header(&self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
            self.capture(value);
        }
    }

    /// Fetch-style observation of a whole header object.
    pub fn observe_header_map(&self, headers: &HeaderMap) {
        for value in headers.get_all(AUTHORIZATION) {
            if let Ok(value) = value.to_str() {
                self.capture(value);
            }
        }
    }

    fn capture(&self, value: &str) {
        if !self.marker.is_empty() && value.contains(&*self.marker) {
            self.cell.store(value.to_string());
        }
    }

    /// Wrap a fetch-like transport.
    pub fn wrap_transport<T: HttpTransport>(&self, inner: T) -> InterceptingTransport<T> {
        InterceptingTransport {
            inner,
            interceptor: self.clone(),
        }
    }

    /// Wrap an XHR-like header sink.
    pub fn wrap_header_sink<S: HeaderSink>(&self, inner: S) -> InterceptingHeaderSink<S> {
        InterceptingHeaderSink {
            inner,
            interceptor: self.clone(),
        }
    }
}

/// Fetch-like transport that observes headers before delegating.
pub struct InterceptingTransport<T> {
    inner: T,
    interceptor: CredentialInterceptor,
}

impl<T> InterceptingTransport<T> {
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for InterceptingTransport<T> {
    async fn execute(&self, request: Request) -> anyhow::Result<HttpResponse> {
        self.interceptor.observe_header_map(request.headers());
        self.inner.execute(request).await
    }
}

/// XHR-like header sink that observes each registration before forwarding it.
pub struct InterceptingHeaderSink<S> {
    inner: S,
    interceptor: CredentialInterceptor,
}

impl<S> InterceptingHeaderSink<S> {
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: HeaderSink> HeaderSink for InterceptingHeaderSink<S> {
    fn set_request_header(&mut self, name: &str, value: &str) {
        self.interceptor.observe_header(name, value);
        self.inner.set_request_header(name, value);
    }
}
