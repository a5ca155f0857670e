//! Tool-server startup configuration.
//!
//! A `StartupConfig` is fetched from the discovery service the first time a
//! server is started. It can only be obtained through [`StartupConfig::new`]
//! (serde deserialization goes through the same constructor), so every value
//! in circulation has already been validated.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: f64 = 30.0;

/// How the runtime talks to a tool-server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// The runtime spawns the server and speaks JSON-RPC over its stdin/stdout.
    #[default]
    Stdio,
    /// The server is an external HTTP endpoint (streamable HTTP).
    #[serde(alias = "streamable-http", alias = "streamable_http")]
    Http,
}

impl TransportKind {
    /// Stable lowercase name used in logs and messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated startup configuration as it arrives on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStartupConfig {
    pub server_name: String,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout: Option<f64>,
}

/// Validated configuration needed to start or connect to a tool-server.
///
/// For stdio servers `command` is guaranteed non-empty; for http servers
/// `url` is guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStartupConfig", into = "RawStartupConfig")]
pub struct StartupConfig {
    server_name: String,
    transport: TransportKind,
    command: Option<String>,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    url: Option<String>,
    headers: BTreeMap<String, String>,
    connect_timeout: Duration,
}

impl StartupConfig {
    /// Validate a raw configuration.
    pub fn new(raw: RawStartupConfig) -> Result<Self, ConfigError> {
        let command = raw.command.filter(|c| !c.trim().is_empty());
        let url = raw.url.filter(|u| !u.trim().is_empty());

        match raw.transport {
            TransportKind::Stdio if command.is_none() => {
                return Err(ConfigError::MissingField {
                    transport: TransportKind::Stdio,
                    field: "command",
                });
            }
            TransportKind::Http if url.is_none() => {
                return Err(ConfigError::MissingField {
                    transport: TransportKind::Http,
                    field: "url",
                });
            }
            _ => {}
        }

        let timeout_secs = raw.timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
        let connect_timeout = Duration::try_from_secs_f64(timeout_secs)
            .ok()
            .filter(|t| !t.is_zero())
            .ok_or(ConfigError::InvalidTimeout(timeout_secs))?;

        Ok(Self {
            server_name: raw.server_name,
            transport: raw.transport,
            command,
            args: raw.args,
            env: raw.env,
            url,
            headers: raw.headers,
            connect_timeout,
        })
    }

    /// Build a stdio configuration.
    pub fn stdio(
        server_name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> Result<Self, ConfigError> {
        Self::new(RawStartupConfig {
            server_name: server_name.into(),
            transport: TransportKind::Stdio,
            command: Some(command.into()),
            args,
            ..RawStartupConfig::default()
        })
    }

    /// Build an http configuration.
    pub fn http(server_name: impl Into<String>, url: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(RawStartupConfig {
            server_name: server_name.into(),
            transport: TransportKind::Http,
            url: Some(url.into()),
            ..RawStartupConfig::default()
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub const fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Executable for stdio servers.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Extra environment variables for the spawned process.
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Endpoint for http servers.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Extra request headers for http servers.
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// How long establishing the session may take.
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl TryFrom<RawStartupConfig> for StartupConfig {
    type Error = ConfigError;

    fn try_from(raw: RawStartupConfig) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<StartupConfig> for RawStartupConfig {
    fn from(config: StartupConfig) -> Self {
        Self {
            server_name: config.server_name,
            transport: config.transport,
            command: config.command,
            args: config.args,
            env: config.env,
            url: config.url,
            headers: config.headers,
            timeout: Some(config.connect_timeout.as_secs_f64()),
        }
    }
}
