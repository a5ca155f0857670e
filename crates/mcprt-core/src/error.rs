//! Error types shared by every runtime crate.
//!
//! `RuntimeError` is the error surfaced by the engine's operations. Port
//! implementations report their own narrower errors (`DiscoveryError`,
//! `SessionError`, `ConfigError`) which convert into it.

use std::time::Duration;

use thiserror::Error;

use crate::domain::TransportKind;

/// Startup configuration rejected before any spawn attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The transport needs a field that is absent or blank.
    #[error("{transport} transport requires '{field}'")]
    MissingField {
        transport: TransportKind,
        field: &'static str,
    },

    /// Connect timeout is zero, negative, not a number or too large.
    #[error("timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),
}

/// Errors from the discovery collaborator.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// The requested server or tool is not registered.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// The API key was rejected.
    #[error("Discovery service rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Service returned an unexpected status.
    #[error("Discovery service returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection, DNS or timeout failure.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Body did not match the expected shape.
    #[error("Invalid discovery response: {message}")]
    InvalidResponse { message: String },

    /// The returned startup configuration failed validation.
    #[error("Invalid startup configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Errors raised by a tool-server session or its transport.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The process could not be spawned or the endpoint not reached.
    #[error("failed to connect: {0}")]
    Connect(String),

    /// The server answered with a JSON-RPC error object.
    #[error("server error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Malformed or unexpected message on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The session ended while a request was outstanding.
    #[error("session closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors surfaced by runtime engine operations.
///
/// Every variant is a recoverable condition reported to the immediate caller.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("Invalid transport config: {0}")]
    InvalidTransportConfig(#[from] ConfigError),

    #[error("Failed to start server '{server_name}': {message}")]
    ServerStartFailed {
        server_name: String,
        message: String,
    },

    #[error("Server '{0}' is not running. Start it with manage_server first")]
    ServerNotRunning(String),

    #[error("Tool execution timed out after {} seconds", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("{0}")]
    ToolExecutionError(String),

    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Reference '{0}' not found")]
    ReferenceNotFound(String),

    #[error("Chunk index {index} out of range for '{ref_id}' ({total} chunks)")]
    ChunkIndexOutOfRange {
        ref_id: String,
        index: usize,
        total: usize,
    },

    #[error("Discovery service unavailable: {0}")]
    DiscoveryUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Stable snake-case identifier for structured replies.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransportConfig(_) => "invalid_transport_config",
            Self::ServerStartFailed { .. } => "server_start_failed",
            Self::ServerNotRunning(_) => "server_not_running",
            Self::Timeout(_) => "timeout",
            Self::ToolExecutionError(_) => "tool_execution_error",
            Self::TaskNotFound(_) => "task_not_found",
            Self::ReferenceNotFound(_) => "reference_not_found",
            Self::ChunkIndexOutOfRange { .. } => "chunk_index_out_of_range",
            Self::DiscoveryUnavailable(_) => "discovery_unavailable",
            Self::Storage(_) => "storage",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<DiscoveryError> for RuntimeError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::InvalidConfig(config) => Self::InvalidTransportConfig(config),
            other => Self::DiscoveryUnavailable(other.to_string()),
        }
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result alias for engine operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
