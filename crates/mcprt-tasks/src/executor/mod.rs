//! Task executor.
//!
//! # Architecture
//!
//! - **Executor**: validates requests, runs synchronous calls inline, queues
//!   background calls and answers polls
//! - **Workers**: a fixed pool draining the queue (see `worker`)
//!
//! # Concurrency Model
//!
//! - Queue and ledger share one mutex; it is never held across an await
//! - `Notify` for wake-on-work
//! - `CancellationToken` stops the workers at shutdown

mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mcprt_content::ContentStore;
use mcprt_core::{
    ContentBlock, ExecuteOutcome, ExecuteRequest, RuntimeError, RuntimeResult, TaskId, TaskPoll,
    TaskRecord, ToolCall,
};
use mcprt_session::SessionRegistry;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ledger::{LedgerError, TaskLedger};
use crate::queue::TaskQueue;

/// Error recorded on tasks that never ran because the executor stopped.
pub const SHUTDOWN_MESSAGE: &str = "runtime shutting down";

/// Queue and ledger, guarded together.
#[derive(Default)]
struct State {
    queue: TaskQueue,
    ledger: TaskLedger,
}

/// Shared between the executor handle and its workers.
struct Inner {
    sessions: Arc<SessionRegistry>,
    content: Arc<ContentStore>,
    state: Mutex<State>,
    work: Notify,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one call against the live session and process its output.
    async fn run_call(&self, call: &ToolCall) -> RuntimeResult<Vec<ContentBlock>> {
        let session = self.sessions.session(&call.server_name).await?;

        let invocation = session.call_tool(&call.tool_name, call.arguments.clone());
        let output = match tokio::time::timeout(call.timeout, invocation).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(RuntimeError::ToolExecutionError(e.to_string())),
            // Dropping the call future cancels the request at the transport.
            Err(_) => return Err(RuntimeError::Timeout(call.timeout)),
        };

        if output.is_error {
            return Err(RuntimeError::ToolExecutionError(output.error_message()));
        }
        self.content.process_content(output.content).await
    }

    /// Pop the next task and mark it running.
    fn next_task(&self) -> Option<(TaskId, ToolCall)> {
        let mut state = self.state();
        while let Some(queued) = state.queue.pop() {
            match state.ledger.mark_running(&queued.task_id) {
                Ok(record) => {
                    let call = record.call.clone();
                    // Pass the wakeup on while work remains queued.
                    if !state.queue.is_empty() {
                        self.work.notify_one();
                    }
                    return Some((queued.task_id, call));
                }
                Err(e) => tracing::warn!(task_id = %queued.task_id, error = %e, "Skipping queued task"),
            }
        }
        None
    }

    /// Record the outcome of a task.
    fn finish(&self, task_id: &TaskId, outcome: Result<Vec<ContentBlock>, String>) {
        let result = match outcome {
            Ok(content) => {
                let blocks = content.len();
                self.state().ledger.complete(task_id, content).map(|()| {
                    tracing::info!(task_id = %task_id, blocks, "Task completed");
                })
            }
            Err(error) => {
                tracing::warn!(task_id = %task_id, error = %error, "Task failed");
                self.state().ledger.fail(task_id, error)
            }
        };
        if let Err(e) = result {
            tracing::warn!(task_id = %task_id, error = %e, "Rejected task state change");
        }
    }
}

/// Runs tool calls inline or through the background queue.
pub struct TaskExecutor {
    inner: Arc<Inner>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl TaskExecutor {
    /// Create the executor and start `worker_count` workers (at least one).
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        sessions: Arc<SessionRegistry>,
        content: Arc<ContentStore>,
        worker_count: usize,
    ) -> Self {
        let inner = Arc::new(Inner {
            sessions,
            content,
            state: Mutex::new(State::default()),
            work: Notify::new(),
        });
        let cancel = CancellationToken::new();

        let workers = (0..worker_count.max(1))
            .map(|worker_id| {
                tokio::spawn(worker::run(
                    Arc::clone(&inner),
                    worker_id,
                    cancel.child_token(),
                ))
            })
            .collect();

        Self {
            inner,
            cancel,
            workers: Mutex::new(workers),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Execute a tool call.
    ///
    /// The server must already be running. Inline calls return the processed
    /// content; background calls return a task id immediately.
    pub async fn execute(&self, request: ExecuteRequest) -> RuntimeResult<ExecuteOutcome> {
        let ExecuteRequest {
            call,
            in_background,
            priority,
        } = request;

        // Checked up front for both paths; never auto-starts.
        self.inner.sessions.session(&call.server_name).await?;

        if !in_background {
            tracing::debug!(server_name = %call.server_name, tool = %call.tool_name, "Executing tool inline");
            let content = self.inner.run_call(&call).await?;
            return Ok(ExecuteOutcome::Completed { content });
        }

        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(RuntimeError::Internal(SHUTDOWN_MESSAGE.to_string()));
        }

        let task_id = TaskId::new();
        {
            let mut state = self.inner.state();
            tracing::info!(
                task_id = %task_id,
                server_name = %call.server_name,
                tool = %call.tool_name,
                priority,
                "Task queued"
            );
            state
                .ledger
                .insert(TaskRecord::queued(task_id.clone(), call, priority));
            state.queue.push(task_id.clone(), priority);
        }
        self.inner.work.notify_one();

        Ok(ExecuteOutcome::Queued { task_id })
    }

    /// Current answer for a background task.
    pub fn poll(&self, task_id: &TaskId) -> RuntimeResult<TaskPoll> {
        self.inner.state().ledger.poll(task_id).map_err(into_runtime)
    }

    /// Full record of a background task.
    pub fn task(&self, task_id: &TaskId) -> RuntimeResult<TaskRecord> {
        self.inner
            .state()
            .ledger
            .get(task_id)
            .cloned()
            .ok_or_else(|| RuntimeError::TaskNotFound(task_id.to_string()))
    }

    /// Tasks waiting for a worker.
    pub fn queue_len(&self) -> usize {
        self.inner.state().queue.len()
    }

    /// Stop the workers and fail whatever is still queued.
    ///
    /// Tasks running at this point are failed with the shutdown message too.
    /// Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        let workers: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Worker ended abnormally");
            }
        }

        let mut state = self.inner.state();
        let abandoned = state.queue.drain();
        for queued in &abandoned {
            if let Err(e) = state.ledger.fail(&queued.task_id, SHUTDOWN_MESSAGE) {
                tracing::warn!(task_id = %queued.task_id, error = %e, "Rejected task state change");
            }
        }
        tracing::info!(abandoned = abandoned.len(), "Task executor stopped");
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn into_runtime(err: LedgerError) -> RuntimeError {
    match err {
        LedgerError::NotFound(id) => RuntimeError::TaskNotFound(id.to_string()),
        other @ LedgerError::InvalidTransition { .. } => RuntimeError::Internal(other.to_string()),
    }
}
