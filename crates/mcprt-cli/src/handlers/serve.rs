//! `mcprt serve`: build the engine and run a front-end until it ends.

use std::sync::Arc;

use anyhow::Context;
use mcprt_core::RuntimeSettings;
use mcprt_server::{EngineDeps, RuntimeEngine, run_scoped, serve};
use tokio_util::sync::CancellationToken;

use crate::commands::ServeArgs;

pub async fn execute(args: &ServeArgs) -> anyhow::Result<()> {
    let settings = RuntimeSettings::from_env().context("Invalid runtime settings")?;
    tracing::debug!(
        discovery_url = %settings.discovery_url,
        workers = settings.worker_count,
        "Loaded runtime settings"
    );

    let deps = EngineDeps::production(&settings)?;
    let engine =
        Arc::new(RuntimeEngine::new(settings, deps).context("Failed to build runtime engine")?);

    let config = args.to_config();
    let shutdown = CancellationToken::new();
    let signal = tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    let result = run_scoped(engine, |engine| serve(engine, &config, shutdown.clone())).await;

    signal.abort();
    tracing::info!("MCP runtime stopped");
    result
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Ctrl-C received, shutting down");
            shutdown.cancel();
        }
        Err(e) => tracing::warn!(error = %e, "Could not listen for Ctrl-C"),
    }
}
