//! Agent configuration.
//!
//! Every timing constant and endpoint the agent relies on lives here so tests
//! (and embedders) can override them. Values come from `Config::default()`,
//! a serialized config, or environment variables via [`Config::from_env`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PROFILE_LOOKUP_URL: &str = "https://x.com/i/api/graphql/vqu78dKcEkW-UAYLw5rriA/useFetchProfileSections_canViewExpandedProfileQuery";
pub const DEFAULT_BLOCK_CREATE_URL: &str = "https://x.com/i/api/1.1/blocks/create.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Times the provider checks for a bearer token before giving up.
    pub poll_attempts: u32,
    /// Delay between bearer-token checks, in milliseconds.
    pub poll_delay_ms: u64,
    /// Quiet window before a mutation-triggered re-scan, in milliseconds.
    pub debounce_ms: u64,
    /// How long success/error feedback stays visible, in milliseconds.
    pub feedback_ms: u64,
    /// Substring that identifies an app bearer token in an `authorization` header.
    pub bearer_marker: String,
    /// Cookie holding the anti-forgery token.
    pub csrf_cookie: String,
    /// Client language when the document declares none.
    pub default_language: String,
    pub profile_lookup_url: String,
    pub block_create_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_attempts: 20,
            poll_delay_ms: 250,
            debounce_ms: 100,
            feedback_ms: 2000,
            bearer_marker: "AAAAAAA".to_string(),
            csrf_cookie: "ct0".to_string(),
            default_language: "en".to_string(),
            profile_lookup_url: DEFAULT_PROFILE_LOOKUP_URL.to_string(),
            block_create_url: DEFAULT_BLOCK_CREATE_URL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `EASY_BLOCK_POLL_ATTEMPTS`, `EASY_BLOCK_POLL_DELAY_MS`
    /// - `EASY_BLOCK_DEBOUNCE_MS`, `EASY_BLOCK_FEEDBACK_MS`
    /// - `EASY_BLOCK_BEARER_MARKER`, `EASY_BLOCK_CSRF_COOKIE`, `EASY_BLOCK_DEFAULT_LANGUAGE`
    /// - `EASY_BLOCK_PROFILE_LOOKUP_URL`, `EASY_BLOCK_BLOCK_CREATE_URL`
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("EASY_BLOCK_POLL_ATTEMPTS") {
            config.poll_attempts = parse_number("EASY_BLOCK_POLL_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("EASY_BLOCK_POLL_DELAY_MS") {
            config.poll_delay_ms = parse_number("EASY_BLOCK_POLL_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("EASY_BLOCK_DEBOUNCE_MS") {
            config.debounce_ms = parse_number("EASY_BLOCK_DEBOUNCE_MS", &v)?;
        }
        if let Some(v) = lookup("EASY_BLOCK_FEEDBACK_MS") {
            config.feedback_ms = parse_number("EASY_BLOCK_FEEDBACK_MS", &v)?;
        }
        if let Some(v) = lookup("EASY_BLOCK_BEARER_MARKER").filter(|v| !v.is_empty()) {
            config.bearer_marker = v;
        }
        if let Some(v) = lookup("EASY_BLOCK_CSRF_COOKIE").filter(|v| !v.is_empty()) {
            config.csrf_cookie = v;
        }
        if let Some(v) = lookup("EASY_BLOCK_DEFAULT_LANGUAGE").filter(|v| !v.is_empty()) {
            config.default_language = v;
        }
        if let Some(v) = lookup("EASY_BLOCK_PROFILE_LOOKUP_URL") {
            url::Url::parse(&v)
                .map_err(|e| anyhow::anyhow!("EASY_BLOCK_PROFILE_LOOKUP_URL is not a URL: {}", e))?;
            config.profile_lookup_url = v;
        }
        if let Some(v) = lookup("EASY_BLOCK_BLOCK_CREATE_URL") {
            url::Url::parse(&v)
                .map_err(|e| anyhow::anyhow!("EASY_BLOCK_BLOCK_CREATE_URL is not a URL: {}", e))?;
            config.block_create_url = v;
        }

        Ok(config)
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn feedback(&self) -> Duration {
        Duration::from_millis(self.feedback_ms)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {:?} ({})", key, value, e))
}
