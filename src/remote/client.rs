//! Client for the profile lookup and block endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Request};
use serde_json::Value;
use url::Url;

use super::identity::extract_user_id;
use super::RemoteActions;
use crate::config::Config;
use crate::credentials::CredentialProvider;
use crate::error::{AgentError, AgentResult};
use crate::transport::HttpTransport;

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Remote action client that authenticates with harvested page credentials.
pub struct XApiClient {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<CredentialProvider>,
    profile_lookup_url: Url,
    block_create_url: Url,
}

impl XApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<CredentialProvider>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            transport,
            credentials,
            profile_lookup_url: Url::parse(&config.profile_lookup_url)?,
            block_create_url: Url::parse(&config.block_create_url)?,
        })
    }

    fn lookup_url(&self, handle: &str) -> Url {
        let variables = serde_json::json!({ "screenName": handle }).to_string();
        let mut url = self.profile_lookup_url.clone();
        url.query_pairs_mut().append_pair("variables", &variables);
        url
    }
}

#[async_trait]
impl RemoteActions for XApiClient {
    async fn resolve_identity(&self, handle: &str) -> AgentResult<String> {
        let headers = self.credentials.auth_headers().await?;

        let mut request = Request::new(Method::GET, self.lookup_url(handle));
        *request.headers_mut() = headers.to_header_map(JSON_CONTENT_TYPE)?;

        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| AgentError::RemoteQueryFailed(e.to_string()))?;

        if !response.is_success() {
            tracing::error!(
                "Profile query for @{} returned {}: {}",
                handle,
                response.status,
                response.body
            );
            return Err(AgentError::RemoteQueryFailed(format!(
                "status {}",
                response.status
            )));
        }

        let data: Value = serde_json::from_str(&response.body).map_err(|e| {
            AgentError::RemoteQueryFailed(format!("unparseable response: {}", e))
        })?;
        tracing::debug!("Profile query response for @{}: {}", handle, data);

        let user_id =
            extract_user_id(&data).ok_or_else(|| AgentError::IdentityNotFound(handle.to_string()))?;
        tracing::debug!("Extracted user ID for @{}: {}", handle, user_id);
        Ok(user_id)
    }

    async fn block_subject(&self, numeric_id: &str) -> AgentResult<Value> {
        // Separate credential round; ct0 may have rotated since the lookup.
        let headers = self.credentials.auth_headers().await?;

        let mut request = Request::new(Method::POST, self.block_create_url.clone());
        *request.headers_mut() = headers.to_header_map(FORM_CONTENT_TYPE)?;
        *request.body_mut() = Some(format!("user_id={}", urlencoding::encode(numeric_id)).into());

        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| AgentError::RemoteMutationFailed(e.to_string()))?;

        if !response.is_success() {
            return Err(AgentError::RemoteMutationFailed(format!(
                "status {}: {}",
                response.status, response.body
            )));
        }

        serde_json::from_str(&response.body)
            .map_err(|e| AgentError::RemoteMutationFailed(format!("unparseable response: {}", e)))
    }
}
