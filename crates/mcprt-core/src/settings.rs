//! Runtime settings and validation.
//!
//! Settings come from the process environment (the binary loads `.env`
//! first). Tests build them from a lookup closure instead so they never
//! touch the real environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::paths::{PathError, default_offload_dir};

/// Default discovery service address.
pub const DEFAULT_DISCOVERY_URL: &str = "http://localhost:8000";

/// Default token budget per content block.
pub const DEFAULT_MAX_RESULT_TOKENS: usize = 10_000;

/// Default number of background workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Upper bound on background workers.
pub const MAX_WORKER_COUNT: usize = 64;

/// Default per-call deadline for tool execution.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default deadline for discovery requests.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Base URL of the discovery service.
    pub discovery_url: String,

    /// Sent as `Authorization: Bearer <key>`.
    pub api_key: Option<String>,

    /// Sent as `X-Encryption-Key`.
    pub encryption_key: Option<String>,

    pub discovery_timeout: Duration,

    /// Where oversized tool output is written.
    pub offload_dir: PathBuf,

    /// Largest estimated token count returned inline per content block.
    pub max_result_tokens: usize,

    /// Ask the captioner for image descriptions.
    pub describe_images: bool,

    pub worker_count: usize,

    /// Timeout applied when a caller does not give one.
    pub default_tool_timeout: Duration,
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Discovery URL must be an absolute http(s) URL, got '{0}'")]
    InvalidDiscoveryUrl(String),

    #[error("Max result tokens must be at least 1")]
    InvalidBudget,

    #[error("Worker count must be between 1 and 64, got {0}")]
    InvalidWorkerCount(usize),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error(transparent)]
    Path(#[from] PathError),
}

impl RuntimeSettings {
    /// Settings with defaults and an explicit offload directory.
    pub fn with_offload_dir(offload_dir: impl Into<PathBuf>) -> Self {
        Self {
            discovery_url: DEFAULT_DISCOVERY_URL.to_string(),
            api_key: None,
            encryption_key: None,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            offload_dir: offload_dir.into(),
            max_result_tokens: DEFAULT_MAX_RESULT_TOKENS,
            describe_images: false,
            worker_count: DEFAULT_WORKER_COUNT,
            default_tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Load from the process environment and validate.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup and validate.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let offload_dir = match get("TOOL_OFFLOADED_DATA_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_offload_dir()?,
        };

        let mut settings = Self::with_offload_dir(offload_dir);
        if let Some(url) = get("DISCOVERY_URL") {
            settings.discovery_url = url;
        }
        settings.api_key = get("DISCOVERY_API_KEY");
        settings.encryption_key = get("DISCOVERY_ENCRYPTION_KEY");
        if let Some(raw) = get("DISCOVERY_TIMEOUT_SECS") {
            settings.discovery_timeout = parse_secs("DISCOVERY_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("MAX_RESULT_TOKENS") {
            settings.max_result_tokens = parse_number("MAX_RESULT_TOKENS", &raw)?;
        }
        if let Some(raw) = get("DESCRIBE_IMAGES") {
            settings.describe_images = parse_bool("DESCRIBE_IMAGES", &raw)?;
        }
        if let Some(raw) = get("BACKGROUND_WORKERS") {
            settings.worker_count = parse_number("BACKGROUND_WORKERS", &raw)?;
        }
        if let Some(raw) = get("DEFAULT_TOOL_TIMEOUT_SECS") {
            settings.default_tool_timeout = parse_secs("DEFAULT_TOOL_TIMEOUT_SECS", &raw)?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        match Url::parse(&self.discovery_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => return Err(SettingsError::InvalidDiscoveryUrl(self.discovery_url.clone())),
        }

        if self.max_result_tokens == 0 {
            return Err(SettingsError::InvalidBudget);
        }

        if !(1..=MAX_WORKER_COUNT).contains(&self.worker_count) {
            return Err(SettingsError::InvalidWorkerCount(self.worker_count));
        }

        if self.discovery_timeout.is_zero() {
            return Err(SettingsError::ZeroTimeout("Discovery timeout"));
        }
        if self.default_tool_timeout.is_zero() {
            return Err(SettingsError::ZeroTimeout("Default tool timeout"));
        }

        Ok(())
    }
}

fn invalid(name: &'static str, value: &str, reason: impl ToString) -> SettingsError {
    SettingsError::InvalidValue {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number(name: &'static str, raw: &str) -> Result<usize, SettingsError> {
    raw.trim().parse().map_err(|e| invalid(name, raw, e))
}

fn parse_secs(name: &'static str, raw: &str) -> Result<Duration, SettingsError> {
    let secs: f64 = raw.trim().parse().map_err(|e| invalid(name, raw, e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| invalid(name, raw, e))
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, SettingsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, raw, "expected true or false")),
    }
}
