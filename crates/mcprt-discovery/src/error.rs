//! Internal error types for discovery requests.
//!
//! Mapped to `mcprt_core::DiscoveryError` at the port boundary.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors from the discovery HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Non-success HTTP status.
    #[error("Discovery request failed with status {status}: {url}")]
    ApiRequestFailed {
        status: u16,
        url: String,
        /// Start of the response body, for diagnostics.
        body: String,
    },

    #[error("Invalid response from discovery service: {message}")]
    InvalidResponse { message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),
}
