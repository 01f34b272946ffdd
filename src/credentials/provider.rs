//! Assembles the header set every remote call needs.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use super::{CookieStore, CredentialCell};
use crate::config::Config;
use crate::error::{AgentError, AgentResult};

/// Source of the document's declared language (`<html lang>`).
pub trait LanguageSource: Send + Sync {
    fn language(&self) -> Option<String>;
}

/// Credentials and client markers for one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub authorization: String,
    pub csrf_token: String,
    pub client_language: String,
}

impl AuthHeaders {
    /// Render as request headers, with the given content type.
    pub fn to_header_map(&self, content_type: &str) -> AgentResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&self.authorization)?);
        headers.insert(
            HeaderName::from_static("x-csrf-token"),
            header_value(&self.csrf_token)?,
        );
        headers.insert(
            HeaderName::from_static("x-twitter-auth-type"),
            HeaderValue::from_static("OAuth2Session"),
        );
        headers.insert(
            HeaderName::from_static("x-twitter-active-user"),
            HeaderValue::from_static("yes"),
        );
        headers.insert(
            HeaderName::from_static("x-twitter-client-language"),
            header_value(&self.client_language)?,
        );
        headers.insert(CONTENT_TYPE, header_value(content_type)?);
        Ok(headers)
    }
}

fn header_value(value: &str) -> AgentResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| AgentError::InvalidHeader(e.to_string()))
}

/// Reads the anti-forgery cookie and waits (bounded) for the bearer token.
pub struct CredentialProvider {
    cell: CredentialCell,
    cookies: Arc<dyn CookieStore>,
    language: Option<Arc<dyn LanguageSource>>,
    csrf_cookie: String,
    default_language: String,
    poll_attempts: u32,
    poll_delay: Duration,
}

impl CredentialProvider {
    pub fn new(cell: CredentialCell, cookies: Arc<dyn CookieStore>, config: &Config) -> Self {
        Self {
            cell,
            cookies,
            language: None,
            csrf_cookie: config.csrf_cookie.clone(),
            default_language: config.default_language.clone(),
            poll_attempts: config.poll_attempts,
            poll_delay: config.poll_delay(),
        }
    }

    pub fn with_language_source(mut self, source: Arc<dyn LanguageSource>) -> Self {
        self.language = Some(source);
        self
    }

    /// Poll the cell until a token shows up or the attempt budget runs out.
    ///
    /// Sleeps between attempts only, so a permanently empty cell returns after
    /// `(attempts - 1) * delay`.
    pub async fn wait_for_bearer(&self) -> Option<String> {
        for attempt in 0..self.poll_attempts {
            if let Some(token) = self.cell.get() {
                return Some(token);
            }
            if attempt + 1 < self.poll_attempts {
                tokio::time::sleep(self.poll_delay).await;
            }
        }
        None
    }

    /// Build a fresh header set. Call once per remote request: the
    /// anti-forgery cookie may rotate between calls.
    pub async fn auth_headers(&self) -> AgentResult<AuthHeaders> {
        let csrf_token = self.cookies.get(&self.csrf_cookie);

        let bearer = match self.cell.get() {
            Some(token) => Some(token),
            None => {
                tracing::info!("Waiting for Bearer token...");
                self.wait_for_bearer().await
            }
        };

        let csrf_token = csrf_token.ok_or(AgentError::MissingCsrfToken)?;
        let authorization = bearer.ok_or(AgentError::MissingBearerToken)?;

        let client_language = self
            .language
            .as_ref()
            .and_then(|source| source.language())
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| self.default_language.clone());

        Ok(AuthHeaders {
            authorization,
            csrf_token,
            client_language,
        })
    }
}
