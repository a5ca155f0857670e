//! Background worker loop.
//!
//! Each task's call runs in its own spawned future, so a panicking tool
//! call fails that task and leaves the worker running.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{Inner, SHUTDOWN_MESSAGE};

/// Drain the queue until cancelled, sleeping on the work notifier when empty.
pub(super) async fn run(inner: Arc<Inner>, worker_id: usize, cancel: CancellationToken) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let Some((task_id, call)) = inner.next_task() else {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = inner.work.notified() => {}
            }
            continue;
        };

        tracing::debug!(worker_id, task_id = %task_id, tool = %call.tool_name, "Task started");

        let job_inner = Arc::clone(&inner);
        let mut job = tokio::spawn(async move { job_inner.run_call(&call).await });

        let outcome = tokio::select! {
            joined = &mut job => match joined {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(e) if e.is_panic() => Err("task panicked".to_string()),
                Err(e) => Err(e.to_string()),
            },
            () = cancel.cancelled() => {
                job.abort();
                Err(SHUTDOWN_MESSAGE.to_string())
            }
        };

        inner.finish(&task_id, outcome);
    }

    tracing::debug!(worker_id, "Worker stopped");
}
