//! Discovery service client.

use url::Url;

use crate::config::DiscoveryClientConfig;
use crate::error::ClientResult;
use crate::http::{HttpBackend, ReqwestBackend};

/// Discovery client using the reqwest HTTP backend.
pub type DefaultDiscoveryClient = DiscoveryClient<ReqwestBackend>;

/// Client for the discovery service REST API.
///
/// Generic over the HTTP backend so tests can substitute canned responses.
/// Use [`DefaultDiscoveryClient`] in production code.
pub struct DiscoveryClient<B: HttpBackend> {
    pub(crate) backend: B,
    pub(crate) base_url: Url,
}

impl DefaultDiscoveryClient {
    pub fn new(config: &DiscoveryClientConfig) -> ClientResult<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let backend = ReqwestBackend::new(config)?;
        tracing::debug!(base_url = %base_url, "discovery client configured");
        Ok(Self { backend, base_url })
    }
}

impl<B: HttpBackend> DiscoveryClient<B> {
    /// Create a client with a custom backend.
    #[cfg(test)]
    pub(crate) const fn with_backend(base_url: Url, backend: B) -> Self {
        Self { backend, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}
