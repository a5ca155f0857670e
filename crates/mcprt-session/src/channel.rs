//! Newline-delimited JSON-RPC over a pair of byte streams.
//!
//! A reader task routes responses to pending requests by id, so several
//! requests can be in flight on one channel at the same time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mcprt_core::SessionError;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;

use crate::protocol::{
    Incoming, JsonRpcRequest, JsonRpcResponse, cancelled_params, initialize_params, notification,
    reply_to_server_request,
};

type Writer = Box<dyn AsyncWrite + Send + Unpin>;
type SharedWriter = Arc<AsyncMutex<Option<Writer>>>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One JSON-RPC connection.
pub struct RpcChannel {
    label: String,
    writer: SharedWriter,
    pending: PendingMap,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    reader_task: JoinHandle<()>,
}

impl RpcChannel {
    /// Start the reader task and return the channel.
    ///
    /// `label` identifies the peer in logs.
    pub fn new<R, W>(label: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let label = label.into();
        let writer: SharedWriter = Arc::new(AsyncMutex::new(Some(Box::new(writer))));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader_task = tokio::spawn(read_loop(
            label.clone(),
            reader,
            Arc::clone(&writer),
            Arc::clone(&pending),
            Arc::clone(&closed),
        ));

        Self {
            label,
            writer,
            pending,
            next_id: AtomicU64::new(1),
            closed,
            reader_task,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Run the MCP `initialize` handshake.
    pub async fn initialize(&self) -> Result<Value, SessionError> {
        let result = self.request("initialize", Some(initialize_params())).await?;
        self.notify("notifications/initialized", None).await?;
        Ok(result)
    }

    /// Send a request and wait for its response.
    ///
    /// Dropping the returned future before the response arrives sends
    /// `notifications/cancelled` for the request.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        let mut guard = PendingGuard {
            channel: self,
            id,
            armed: true,
        };

        if let Err(e) = write_message(&self.writer, &JsonRpcRequest::new(id, method, params)).await {
            guard.disarm();
            return Err(e);
        }

        let response = rx.await;
        guard.disarm();
        response.map_err(|_| SessionError::Closed)?.into_result()
    }

    /// Send a notification.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        write_message(&self.writer, &notification(method, params)).await
    }

    /// Close the write half and stop reading.
    ///
    /// Outstanding requests fail with `SessionError::Closed`.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.reader_task.abort();
        lock(&self.pending).clear();
    }
}

impl Drop for RpcChannel {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Removes a pending request on every exit path and reports abandoned ones.
struct PendingGuard<'a> {
    channel: &'a RpcChannel,
    id: u64,
    armed: bool,
}

impl PendingGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
        lock(&self.channel.pending).remove(&self.id);
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        lock(&self.channel.pending).remove(&self.id);
        if self.channel.is_closed() {
            return;
        }

        tracing::debug!(peer = %self.channel.label, request_id = self.id, "Request abandoned, sending cancellation");
        let writer = Arc::clone(&self.channel.writer);
        let message = notification(
            "notifications/cancelled",
            Some(cancelled_params(self.id, "request timed out")),
        );
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = write_message(&writer, &message).await;
            });
        }
    }
}

async fn write_message<T: Serialize + Sync>(
    writer: &SharedWriter,
    message: &T,
) -> Result<(), SessionError> {
    let mut line = serde_json::to_string(message)
        .map_err(|e| SessionError::Protocol(format!("Failed to serialize message: {e}")))?;
    line.push('\n');

    let mut guard = writer.lock().await;
    let stream = guard.as_mut().ok_or(SessionError::Closed)?;
    stream.write_all(line.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_loop<R>(
    label: String,
    reader: R,
    writer: SharedWriter,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
) where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(peer = %label, error = %e, "Failed to read from server");
                break;
            }
        }

        // Invalid UTF-8 is replaced; such lines fail to parse and are skipped.
        let line = String::from_utf8_lossy(&buf);
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match Incoming::parse(trimmed) {
            Some(Incoming::Response(response)) => {
                let Some(id) = response.numeric_id() else {
                    tracing::debug!(peer = %label, "Response without a usable id");
                    continue;
                };
                // A missing sender means the caller gave up on this request.
                if let Some(tx) = lock(&pending).remove(&id) {
                    let _ = tx.send(response);
                }
            }
            Some(Incoming::Request { id, method }) => {
                tracing::debug!(peer = %label, method = %method, "Server request");
                let reply = reply_to_server_request(&id, &method);
                if let Err(e) = write_message(&writer, &reply).await {
                    tracing::debug!(peer = %label, error = %e, "Failed to answer server request");
                }
            }
            Some(Incoming::Notification { method }) => {
                tracing::debug!(peer = %label, method = %method, "Server notification");
            }
            None => {
                tracing::debug!(peer = %label, line = trimmed, "Skipping non-JSON-RPC output");
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    lock(&pending).clear();
    tracing::debug!(peer = %label, "Server output closed");
}
