//! Failures of a single block activation.
//!
//! None of these are fatal to the agent: they are caught at the activation
//! boundary, logged, and shown as the control's `error` state.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Could not get CSRF token - are you logged in?")]
    MissingCsrfToken,

    #[error("Could not get Bearer token - try scrolling or refreshing")]
    MissingBearerToken,

    #[error("Header value is not representable: {0}")]
    InvalidHeader(String),

    #[error("Profile lookup failed: {0}")]
    RemoteQueryFailed(String),

    #[error("No user id in profile lookup response for @{0}")]
    IdentityNotFound(String),

    #[error("Block request failed: {0}")]
    RemoteMutationFailed(String),

    #[error("Could not find username in post")]
    HandleNotFound,
}

impl AgentError {
    /// Pipeline stage the failure belongs to, for log context.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::MissingCsrfToken | Self::MissingBearerToken | Self::InvalidHeader(_) => {
                "credentials"
            }
            Self::RemoteQueryFailed(_) | Self::IdentityNotFound(_) => "resolve",
            Self::RemoteMutationFailed(_) => "block",
            Self::HandleNotFound => "extract",
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
