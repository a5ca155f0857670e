//! `SessionConnector` that opens real MCP sessions.

use std::sync::Arc;

use async_trait::async_trait;
use mcprt_core::{SessionConnector, SessionError, StartupConfig, ToolSession, TransportKind};
use reqwest::Client;

use crate::http::HttpSession;
use crate::stdio::StdioSession;

/// Opens stdio or streamable HTTP sessions depending on the config.
#[derive(Clone)]
pub struct McpConnector {
    http: Client,
}

impl McpConnector {
    /// Connector with a default HTTP client.
    pub fn new() -> Result<Self, SessionError> {
        let http = Client::builder()
            .user_agent(concat!("mcp-runtime/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SessionError::Connect(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Connector sharing an existing HTTP client.
    pub const fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SessionConnector for McpConnector {
    async fn connect(&self, config: &StartupConfig) -> Result<Arc<dyn ToolSession>, SessionError> {
        tracing::debug!(
            server_name = %config.server_name(),
            transport = %config.transport(),
            "Connecting to tool-server"
        );
        match config.transport() {
            TransportKind::Stdio => Ok(Arc::new(StdioSession::spawn(config).await?)),
            TransportKind::Http => Ok(Arc::new(
                HttpSession::connect(self.http.clone(), config).await?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatches_on_transport() {
        let connector = McpConnector::new().unwrap();
        let config =
            StartupConfig::stdio("ghost", "/nonexistent/mcprt-test-binary", Vec::new()).unwrap();

        let err = connector.connect(&config).await.err().unwrap();
        assert!(matches!(err, SessionError::Connect(ref m) if m.contains("spawn")));
    }
}
