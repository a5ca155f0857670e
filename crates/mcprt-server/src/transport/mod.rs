//! MCP front-end transports.

mod error;
pub mod http;
pub mod stdio;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::engine::RuntimeEngine;
use crate::protocol::McpHandler;
use crate::router::ToolRouter;

pub use error::HttpError;

/// How agents reach the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrontendTransport {
    #[default]
    Stdio,
    Sse,
    StreamableHttp,
}

impl FrontendTransport {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Sse => "sse",
            Self::StreamableHttp => "streamable-http",
        }
    }
}

impl fmt::Display for FrontendTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrontendTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdio" => Ok(Self::Stdio),
            "sse" => Ok(Self::Sse),
            "streamable-http" | "streamable_http" | "http" => Ok(Self::StreamableHttp),
            other => Err(format!(
                "unknown transport '{other}' (expected stdio, sse or streamable-http)"
            )),
        }
    }
}

/// Front-end settings; host and port only matter for the network transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub transport: FrontendTransport,
    pub host: String,
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            transport: FrontendTransport::Stdio,
            host: "0.0.0.0".to_string(),
            port: 8001,
        }
    }
}

/// Serve MCP on the configured transport until it ends or `shutdown` fires.
///
/// The engine is not shut down here; wrap the call in
/// [`run_scoped`](crate::run_scoped) for that.
pub async fn serve(
    engine: Arc<RuntimeEngine>,
    config: &ServeConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let router = Arc::new(ToolRouter::initialize(engine).await);
    let handler = Arc::new(McpHandler::new(router));

    match config.transport {
        FrontendTransport::Stdio => {
            tracing::info!("MCP runtime serving on stdio");
            stdio::serve_stdio(handler, shutdown)
                .await
                .context("stdio transport failed")
        }
        FrontendTransport::Sse => {
            let app = http::sse_router(handler, shutdown.clone());
            serve_http(app, config, shutdown).await
        }
        FrontendTransport::StreamableHttp => {
            let app = http::streamable_http_router(handler, shutdown.clone());
            serve_http(app, config, shutdown).await
        }
    }
}

async fn serve_http(
    app: Router,
    config: &ServeConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        transport = %config.transport,
        "MCP runtime listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("HTTP server failed")
}
