//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! Requests are handled concurrently; a single writer task owns the output
//! so responses never interleave.

use std::io;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::protocol::McpHandler;

/// Serve on the process's stdin and stdout.
pub async fn serve_stdio(handler: Arc<McpHandler>, shutdown: CancellationToken) -> io::Result<()> {
    serve_lines(handler, tokio::io::stdin(), tokio::io::stdout(), shutdown).await
}

/// Serve over any line-oriented byte stream pair.
///
/// Returns at end of input once every in-flight request has been answered,
/// or as soon as `shutdown` fires (in-flight requests are dropped).
pub async fn serve_lines<R, W>(
    handler: Arc<McpHandler>,
    reader: R,
    writer: W,
    shutdown: CancellationToken,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<Value>();
    let writer_task = tokio::spawn(write_loop(writer, rx));

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut in_flight = JoinSet::new();
    let mut cancelled = false;

    loop {
        buf.clear();
        let read = tokio::select! {
            () = shutdown.cancelled() => {
                cancelled = true;
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => read?,
        };
        if read == 0 {
            break;
        }
        // Invalid UTF-8 is replaced and answered with a parse error.
        let line = String::from_utf8_lossy(&buf).into_owned();
        if line.trim().is_empty() {
            continue;
        }

        let handler = Arc::clone(&handler);
        let tx = tx.clone();
        in_flight.spawn(async move {
            if let Some(response) = handler.handle_text(&line).await {
                let _ = tx.send(response);
            }
        });
        while in_flight.try_join_next().is_some() {}
    }

    if cancelled {
        in_flight.shutdown().await;
    } else {
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "Request handler ended abnormally");
            }
        }
    }

    drop(tx);
    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(io::Error::other(e)),
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = message.to_string();
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
