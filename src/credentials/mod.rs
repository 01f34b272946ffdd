//! Credential capture and assembly.
//!
//! The bearer token is never handed to the agent; the [`CredentialInterceptor`]
//! picks it out of the host page's own traffic and drops it into a shared
//! [`CredentialCell`]. The [`CredentialProvider`] combines it with the
//! anti-forgery cookie whenever a remote call is about to be made.

mod interceptor;
mod provider;

pub use interceptor::{CredentialInterceptor, InterceptingHeaderSink, InterceptingTransport};
pub use provider::{AuthHeaders, CredentialProvider, LanguageSource};

use std::sync::{Arc, PoisonError, RwLock};

/// Single-slot holder for the captured bearer token.
///
/// Cloning shares the slot. The interceptor is the only writer; once set the
/// slot is never cleared, only replaced by a newer matching value.
#[derive(Debug, Clone, Default)]
pub struct CredentialCell {
    slot: Arc<RwLock<Option<String>>>,
}

impl CredentialCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cell that already holds `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        let cell = Self::new();
        cell.store(token.into());
        cell
    }

    pub fn get(&self) -> Option<String> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_present(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn store(&self, token: String) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_deref() != Some(token.as_str()) {
            tracing::debug!("Captured bearer token");
            *slot = Some(token);
        }
    }
}

/// Synchronous cookie lookup.
pub trait CookieStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// Cookie store over a `document.cookie`-style string (`a=1; b=2`).
///
/// The raw string can be swapped at runtime, which is how cookie rotation
/// shows up to the provider.
#[derive(Debug, Default)]
pub struct CookieJar {
    raw: RwLock<String>,
}

impl CookieJar {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: RwLock::new(raw.into()),
        }
    }

    pub fn set_raw(&self, raw: impl Into<String>) {
        *self.raw.write().unwrap_or_else(PoisonError::into_inner) = raw.into();
    }
}

impl CookieStore for CookieJar {
    fn get(&self, name: &str) -> Option<String> {
        let raw = self.raw.read().unwrap_or_else(PoisonError::into_inner);
        raw.split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
            .filter(|value| !value.is_empty())
    }
}
