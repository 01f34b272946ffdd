//! Remote operations performed on behalf of a block control.
//!
//! Exactly two calls: resolve a handle to its numeric id, then block that id.
//! Each obtains its own credentials, and neither is retried.

mod client;
mod identity;

pub use client::XApiClient;
pub use identity::{decode_user_id, extract_user_id};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentResult;

#[async_trait]
pub trait RemoteActions: Send + Sync {
    /// Look up the numeric user id for `handle`.
    async fn resolve_identity(&self, handle: &str) -> AgentResult<String>;

    /// Block the user with `numeric_id`. Returns the parsed response body.
    async fn block_subject(&self, numeric_id: &str) -> AgentResult<Value>;
}
