//! Tool-servers running as child processes speaking JSON-RPC over stdio.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use mcprt_core::{SessionError, StartupConfig, ToolOutput, ToolSession, TransportKind};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::channel::RpcChannel;
use crate::protocol::{call_tool_params, parse_tool_output};

/// How long a server gets to exit on its own after stdin closes.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// A live child-process session.
pub struct StdioSession {
    server_name: String,
    channel: RpcChannel,
    child: Mutex<Option<Child>>,
    stderr_task: JoinHandle<()>,
}

impl StdioSession {
    /// Spawn the configured command and run the handshake.
    ///
    /// The child inherits this process's environment with the config's
    /// `env` laid over it.
    pub async fn spawn(config: &StartupConfig) -> Result<Self, SessionError> {
        let server_name = config.server_name().to_string();
        let command = config
            .command()
            .ok_or_else(|| SessionError::Connect("stdio transport requires 'command'".to_string()))?;

        let mut child = Command::new(command)
            .args(config.args())
            .envs(config.env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::Connect(format!("Failed to spawn '{command}': {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Connect("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Connect("Failed to get stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SessionError::Connect("Failed to get stderr".to_string()))?;

        let pid = child.id();
        let label = server_name.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(server_name = %label, line = %line, "server stderr");
            }
        });

        let session = Self {
            channel: RpcChannel::new(server_name.clone(), stdout, stdin),
            server_name,
            child: Mutex::new(Some(child)),
            stderr_task,
        };

        if let Err(e) = session.channel.initialize().await {
            // kill_on_drop reaps the child
            return Err(SessionError::Connect(format!("MCP handshake failed: {e}")));
        }

        tracing::debug!(server_name = %session.server_name, ?pid, "stdio session ready");
        Ok(session)
    }

    /// Process id of the child, while it runs.
    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.as_ref().and_then(Child::id)
    }
}

#[async_trait]
impl ToolSession for StdioSession {
    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, SessionError> {
        tracing::debug!(server_name = %self.server_name, tool = tool_name, "tools/call");
        let result = self
            .channel
            .request("tools/call", Some(call_tool_params(tool_name, arguments)))
            .await?;
        parse_tool_output(result)
    }

    async fn close(&self) -> Result<(), SessionError> {
        // Closing stdin asks the server to exit.
        self.channel.shutdown().await;
        self.stderr_task.abort();

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(server_name = %self.server_name, %status, "server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                child.kill().await?;
                Ok(())
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Stdio
    }
}

impl Drop for StdioSession {
    fn drop(&mut self) {
        self.stderr_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_failure_is_connect_error() {
        let config =
            StartupConfig::stdio("ghost", "/nonexistent/mcprt-test-binary", Vec::new()).unwrap();

        let err = StdioSession::spawn(&config).await.err().unwrap();
        match err {
            SessionError::Connect(message) => assert!(message.contains("Failed to spawn")),
            other => panic!("Expected Connect, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_exiting_before_handshake_fails() {
        let config = StartupConfig::stdio("quitter", "true", Vec::new()).unwrap();

        let err = StdioSession::spawn(&config).await.err().unwrap();
        assert!(matches!(err, SessionError::Connect(ref m) if m.contains("handshake")));
    }
}
