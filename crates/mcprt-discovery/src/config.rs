//! Public configuration for the discovery client.

use std::time::Duration;

use mcprt_core::RuntimeSettings;

/// Configuration for the discovery client.
///
/// # Example
///
/// ```
/// use mcprt_discovery::DiscoveryClientConfig;
/// use std::time::Duration;
///
/// let config = DiscoveryClientConfig::new()
///     .with_base_url("https://index.example.org")
///     .with_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DiscoveryClientConfig {
    pub(crate) base_url: String,
    pub(crate) user_agent: String,
    pub(crate) timeout: Duration,
    pub(crate) api_key: Option<String>,
    pub(crate) encryption_key: Option<String>,
    /// Retries for 5xx responses and network errors
    pub(crate) max_retries: u8,
    pub(crate) retry_base_delay: Duration,
}

impl Default for DiscoveryClientConfig {
    fn default() -> Self {
        Self {
            base_url: mcprt_core::settings::DEFAULT_DISCOVERY_URL.to_string(),
            user_agent: concat!("mcprt-discovery/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: mcprt_core::settings::DEFAULT_DISCOVERY_TIMEOUT,
            api_key: None,
            encryption_key: None,
            max_retries: 2,
            retry_base_delay: Duration::from_millis(250),
        }
    }
}

impl DiscoveryClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Client configuration matching the runtime settings.
    #[must_use]
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self::new()
            .with_base_url(settings.discovery_url.clone())
            .with_optional_api_key(settings.api_key.clone())
            .with_optional_encryption_key(settings.encryption_key.clone())
            .with_timeout(settings.discovery_timeout)
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Per-request timeout. Defaults to 30 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sent as a bearer token.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_optional_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    /// Sent as `X-Encryption-Key`; lets the service decrypt stored secrets
    /// in startup configurations.
    #[must_use]
    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_optional_encryption_key(mut self, key: Option<String>) -> Self {
        self.encryption_key = key;
        self
    }

    #[must_use]
    pub const fn with_max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Base delay for exponential backoff.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoveryClientConfig::new();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert!(config.user_agent.contains("mcprt-discovery"));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.api_key.is_none());
        assert!(config.encryption_key.is_none());
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_builder_pattern() {
        let config = DiscoveryClientConfig::new()
            .with_base_url("https://index.example.org")
            .with_user_agent("test-agent")
            .with_timeout(Duration::from_secs(5))
            .with_api_key("key")
            .with_encryption_key("enc")
            .with_max_retries(0);

        assert_eq!(config.base_url, "https://index.example.org");
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.api_key.as_deref(), Some("key"));
        assert_eq!(config.encryption_key.as_deref(), Some("enc"));
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_from_settings() {
        let mut settings = RuntimeSettings::with_offload_dir("/tmp/offloaded");
        settings.discovery_url = "http://index:9000".to_string();
        settings.api_key = Some("k".to_string());
        settings.discovery_timeout = Duration::from_secs(3);

        let config = DiscoveryClientConfig::from_settings(&settings);
        assert_eq!(config.base_url, "http://index:9000");
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert!(config.encryption_key.is_none());
        assert_eq!(config.timeout, Duration::from_secs(3));
    }
}
