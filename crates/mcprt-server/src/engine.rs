//! Runtime engine - the composition root.
//!
//! This module is the ONLY place where the discovery client, the session
//! registry, the content store and the task executor are wired together.
//! Handlers receive the engine by `Arc`; there is no global instance.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use futures_util::FutureExt;
use mcprt_content::ContentStore;
use mcprt_core::{
    DiscoveryPort, ExecuteOutcome, ExecuteRequest, ImageCaptioner, LifecycleReport,
    NoopCaptioner, RetrievedContent, RuntimeResult, RuntimeSettings, SessionConnector, TaskId,
    TaskPoll,
};
use mcprt_discovery::{DefaultDiscoveryClient, DiscoveryClientConfig};
use mcprt_session::{McpConnector, SessionRegistry};
use mcprt_tasks::TaskExecutor;

/// Infrastructure injected into the engine.
pub struct EngineDeps {
    pub discovery: Arc<dyn DiscoveryPort>,
    pub connector: Arc<dyn SessionConnector>,
    pub captioner: Arc<dyn ImageCaptioner>,
}

impl EngineDeps {
    /// REST discovery client and real MCP transports.
    ///
    /// Images are never captioned: no captioning backend ships with the
    /// runtime, so `DESCRIBE_IMAGES` only has an effect with injected deps.
    pub fn production(settings: &RuntimeSettings) -> anyhow::Result<Self> {
        let discovery = DefaultDiscoveryClient::new(&DiscoveryClientConfig::from_settings(settings))
            .context("Failed to build discovery client")?;
        let connector = McpConnector::new().context("Failed to build tool-server connector")?;

        Ok(Self {
            discovery: Arc::new(discovery),
            connector: Arc::new(connector),
            captioner: Arc::new(NoopCaptioner),
        })
    }
}

/// Sessions, tasks and offloaded content for one runtime process.
pub struct RuntimeEngine {
    settings: RuntimeSettings,
    discovery: Arc<dyn DiscoveryPort>,
    sessions: Arc<SessionRegistry>,
    content: Arc<ContentStore>,
    executor: TaskExecutor,
    stopped: AtomicBool,
}

impl RuntimeEngine {
    /// Build the engine and start the worker pool.
    ///
    /// Must be called inside a tokio runtime. Fails when the offload
    /// directory cannot be created.
    pub fn new(settings: RuntimeSettings, deps: EngineDeps) -> RuntimeResult<Self> {
        let EngineDeps {
            discovery,
            connector,
            captioner,
        } = deps;

        let sessions = Arc::new(SessionRegistry::new(Arc::clone(&discovery), connector));
        let content = Arc::new(ContentStore::from_settings(&settings, captioner)?);
        let executor = TaskExecutor::new(
            Arc::clone(&sessions),
            Arc::clone(&content),
            settings.worker_count,
        );

        tracing::info!(
            discovery_url = %settings.discovery_url,
            offload_dir = %settings.offload_dir.display(),
            max_result_tokens = settings.max_result_tokens,
            workers = settings.worker_count,
            "Runtime engine ready"
        );

        Ok(Self {
            settings,
            discovery,
            sessions,
            content,
            executor,
            stopped: AtomicBool::new(false),
        })
    }

    pub const fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn discovery(&self) -> &dyn DiscoveryPort {
        self.discovery.as_ref()
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub const fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    pub async fn start_server(&self, server_name: &str) -> LifecycleReport {
        self.sessions.start(server_name).await
    }

    pub async fn shutdown_server(&self, server_name: &str) -> LifecycleReport {
        self.sessions.shutdown(server_name).await
    }

    pub async fn list_running_servers(&self) -> Vec<String> {
        self.sessions.list_running().await
    }

    pub async fn execute_tool(&self, request: ExecuteRequest) -> RuntimeResult<ExecuteOutcome> {
        self.executor.execute(request).await
    }

    pub fn poll_task_result(&self, task_id: &TaskId) -> RuntimeResult<TaskPoll> {
        self.executor.poll(task_id)
    }

    pub async fn get_content(
        &self,
        ref_id: &str,
        chunk_index: Option<usize>,
    ) -> RuntimeResult<RetrievedContent> {
        self.content.get_content(ref_id, chunk_index).await
    }

    /// Stop workers, close every session, then close the content store.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Shutting down runtime engine");
        self.executor.shutdown().await;
        self.sessions.shutdown_all().await;
        self.content.close();
        tracing::info!("Runtime engine stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Run `f` with the engine, then shut the engine down.
///
/// Teardown happens whether `f` returns `Ok`, `Err` or panics; a panic is
/// resumed once the engine is stopped.
pub async fn run_scoped<F, Fut, T>(engine: Arc<RuntimeEngine>, f: F) -> T
where
    F: FnOnce(Arc<RuntimeEngine>) -> Fut,
    Fut: Future<Output = T>,
{
    let outcome = AssertUnwindSafe(f(Arc::clone(&engine)))
        .catch_unwind()
        .await;
    engine.shutdown().await;
    match outcome {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
