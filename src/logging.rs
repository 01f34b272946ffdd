//! Tracing subscriber setup for hosts embedding the agent.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "easy_block=info";

/// Install a global fmt subscriber filtered by `RUST_LOG`.
///
/// Returns an error if a global subscriber is already set.
pub fn init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        // The first call may lose to another global subscriber; either way one is set now.
        let _ = init();
        assert!(init().is_err());
        tracing::info!("subscriber installed");
    }
}
