//! Wiring: interceptor first, then provider, client and agent on top of it.

use std::sync::Arc;

use crate::agent::BlockAgent;
use crate::config::Config;
use crate::credentials::{CookieStore, CredentialCell, CredentialInterceptor, CredentialProvider};
use crate::dom::Document;
use crate::remote::XApiClient;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Everything the host needs after installing the agent.
pub struct Installation {
    /// Observes XHR-style header registrations made by the host.
    pub interceptor: CredentialInterceptor,
    /// Intercepting fetch surface; the host page's own requests go through here.
    pub transport: Arc<dyn HttpTransport>,
    pub credentials: CredentialCell,
    pub agent: Arc<BlockAgent>,
}

/// Install over a default `reqwest` transport.
pub fn install(
    document: Arc<Document>,
    cookies: Arc<dyn CookieStore>,
    config: Config,
) -> anyhow::Result<Installation> {
    install_with_transport(document, cookies, config, ReqwestTransport::default())
}

/// Install over `transport`. The interceptor wraps it before anything else
/// is built, so no request made through the returned transport goes unseen.
pub fn install_with_transport<T>(
    document: Arc<Document>,
    cookies: Arc<dyn CookieStore>,
    config: Config,
    transport: T,
) -> anyhow::Result<Installation>
where
    T: HttpTransport + 'static,
{
    let credentials = CredentialCell::new();
    let interceptor = CredentialInterceptor::new(credentials.clone(), config.bearer_marker.as_str());
    let transport: Arc<dyn HttpTransport> = Arc::new(interceptor.wrap_transport(transport));

    let provider = CredentialProvider::new(credentials.clone(), cookies, &config)
        .with_language_source(document.clone());
    let client = XApiClient::new(transport.clone(), Arc::new(provider), &config)?;
    let agent = BlockAgent::with_credentials(document, Arc::new(client), config, credentials.clone())?;

    tracing::debug!("Credential interceptor installed");

    Ok(Installation {
        interceptor,
        transport,
        credentials,
        agent,
    })
}
