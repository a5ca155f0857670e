//! Tool-server session state as seen from outside the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::startup::TransportKind;

/// Lifecycle status of a tool-server session.
///
/// Only the session registry moves a session between states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum SessionStatus {
    /// Startup config is being fetched or the transport is connecting.
    Starting,
    /// Connected and accepting tool calls.
    Running,
    /// The last start attempt failed; the message is the captured error.
    Failed(String),
    /// Shut down.
    Stopped,
}

impl SessionStatus {
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Point-in-time view of one registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub server_name: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportKind>,
    /// When the session reached `Running`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

/// Outcome of a start or shutdown request.
///
/// Lifecycle operations report failures as data instead of errors so callers
/// can hand the message straight to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleReport {
    pub success: bool,
    pub message: String,
}

impl LifecycleReport {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
