//! HTTP backend abstraction for the discovery API.
//!
//! The production backend uses reqwest with retries for transient errors.
//! Tests swap in the fake backend from `testing`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::DiscoveryClientConfig;
use crate::error::{ClientError, ClientResult};

/// Longest response body excerpt kept in errors.
const ERROR_BODY_LIMIT: usize = 200;

// ============================================================================
// HTTP Backend Trait
// ============================================================================

/// Trait for HTTP backends that exchange JSON.
///
/// Implementation detail; external code goes through `DiscoveryPort`.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn get_json<T: DeserializeOwned + Send>(&self, url: &Url) -> ClientResult<T>;

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned + Send>(
        &self,
        url: &Url,
        body: &B,
    ) -> ClientResult<T>;
}

// ============================================================================
// Reqwest Backend
// ============================================================================

/// Production HTTP backend using reqwest with retry logic.
///
/// Server errors (5xx) and network errors are retried with exponential
/// backoff; 4xx responses fail immediately.
pub struct ReqwestBackend {
    client: reqwest::Client,
    max_retries: u8,
    retry_base_delay: Duration,
    api_key: Option<String>,
    encryption_key: Option<String>,
}

impl ReqwestBackend {
    pub fn new(config: &DiscoveryClientConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay,
            api_key: config.api_key.clone(),
            encryption_key: config.encryption_key.clone(),
        })
    }

    /// Build a request carrying the configured credentials.
    pub(crate) fn build_request(&self, method: Method, url: &Url) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, url.as_str())
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(ref key) = self.encryption_key {
            request = request.header("X-Encryption-Key", key);
        }
        request
    }

    async fn send_with_retry(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> ClientResult<reqwest::Response> {
        let mut last_error: Option<ClientError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.retry_base_delay * 2u32.pow(u32::from(attempt) - 1);
                tracing::debug!(url = %url, attempt, ?delay, "retrying discovery request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.build_request(method.clone(), url);
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let error = ClientError::ApiRequestFailed {
                        status: status.as_u16(),
                        url: url.to_string(),
                        body: excerpt(response.text().await.unwrap_or_default()),
                    };
                    if status.is_server_error() && attempt < self.max_retries {
                        last_error = Some(error);
                        continue;
                    }
                    return Err(error);
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tracing::debug!(url = %url, error = %e, "discovery request failed");
                        last_error = Some(e.into());
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ClientError::InvalidResponse {
            message: "Unknown error during request".to_string(),
        }))
    }
}

fn excerpt(mut body: String) -> String {
    if let Some((idx, _)) = body.char_indices().nth(ERROR_BODY_LIMIT) {
        body.truncate(idx);
    }
    body
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn get_json<T: DeserializeOwned + Send>(&self, url: &Url) -> ClientResult<T> {
        let response = self.send_with_retry(Method::GET, url, None).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned + Send>(
        &self,
        url: &Url,
        body: &B,
    ) -> ClientResult<T> {
        let body = serde_json::to_value(body)?;
        let response = self.send_with_retry(Method::POST, url, Some(&body)).await?;
        Ok(response.json().await?)
    }
}

// ============================================================================
// Fake Backend for Testing
// ============================================================================
