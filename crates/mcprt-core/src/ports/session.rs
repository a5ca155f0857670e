//! Tool-server session ports.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::{StartupConfig, ToolOutput, TransportKind};
use crate::error::SessionError;

/// A live connection to one tool-server.
///
/// Implementations must allow concurrent `call_tool` invocations. Dropping
/// the future returned by `call_tool` abandons the request.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Invoke a tool and wait for its output.
    ///
    /// A tool that reports failure is returned as `Ok` with
    /// `ToolOutput::is_error` set; `Err` means the call never completed.
    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, SessionError>;

    /// Terminate the process or close the connection.
    async fn close(&self) -> Result<(), SessionError>;

    /// True once the session can no longer serve calls, either because it
    /// was closed or because the server went away on its own.
    fn is_closed(&self) -> bool;

    fn transport(&self) -> TransportKind;
}

/// Opens sessions from validated startup configurations.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Spawn or connect, including the protocol handshake.
    async fn connect(&self, config: &StartupConfig) -> Result<Arc<dyn ToolSession>, SessionError>;
}
