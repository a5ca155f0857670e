//! Streamable-HTTP and SSE transports.
//!
//! - streamable HTTP: `POST /mcp` takes one JSON-RPC message and answers
//!   with the JSON response (202 for notifications)
//! - SSE: `GET /sse` opens an event stream whose first `endpoint` event
//!   names `/messages?session_id=<id>`; messages POSTed there get 202 and
//!   their responses are pushed onto that stream as `message` events

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::error::HttpError;
use crate::protocol::McpHandler;

/// Responses buffered per SSE client before the handler waits.
const SSE_BUFFER: usize = 64;

/// Open SSE streams by session id.
#[derive(Default)]
pub struct SseSessions {
    senders: Mutex<HashMap<String, mpsc::Sender<Value>>>,
}

impl SseSessions {
    fn senders(&self) -> MutexGuard<'_, HashMap<String, mpsc::Sender<Value>>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self) -> (String, mpsc::Receiver<Value>) {
        let id = Uuid::new_v4().simple().to_string();
        let (tx, rx) = mpsc::channel(SSE_BUFFER);
        self.senders().insert(id.clone(), tx);
        (id, rx)
    }

    fn sender(&self, session_id: &str) -> Option<mpsc::Sender<Value>> {
        self.senders().get(session_id).cloned()
    }

    fn close(&self, session_id: &str) {
        if self.senders().remove(session_id).is_some() {
            tracing::debug!(session_id, "SSE client disconnected");
        }
    }

    pub fn len(&self) -> usize {
        self.senders().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes the session when its event stream is dropped.
struct SessionGuard {
    id: String,
    sessions: Arc<SseSessions>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions.close(&self.id);
    }
}

#[derive(Clone)]
struct HttpState {
    handler: Arc<McpHandler>,
    shutdown: CancellationToken,
}

/// SSE routes also need the open streams.
#[derive(Clone)]
struct SseState {
    http: HttpState,
    sessions: Arc<SseSessions>,
}

impl HttpState {
    fn ensure_accepting(&self) -> Result<(), HttpError> {
        if self.shutdown.is_cancelled() || self.handler.router().engine().is_stopped() {
            return Err(HttpError::ServiceUnavailable(
                "runtime shutting down".to_string(),
            ));
        }
        Ok(())
    }
}

/// Router for the streamable-HTTP transport.
pub fn streamable_http_router(handler: Arc<McpHandler>, shutdown: CancellationToken) -> Router {
    let state = HttpState { handler, shutdown };
    Router::new()
        .route("/mcp", post(mcp_post))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Router for the SSE transport.
pub fn sse_router(handler: Arc<McpHandler>, shutdown: CancellationToken) -> Router {
    sse_router_with_sessions(handler, Arc::new(SseSessions::default()), shutdown)
}

/// SSE router over a caller-owned session table.
pub fn sse_router_with_sessions(
    handler: Arc<McpHandler>,
    sessions: Arc<SseSessions>,
    shutdown: CancellationToken,
) -> Router {
    let state = SseState {
        http: HttpState { handler, shutdown },
        sessions,
    };
    Router::new()
        .route("/sse", get(sse_connect))
        .route("/messages", post(sse_message))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> &'static str {
    "OK"
}

async fn mcp_post(State(state): State<HttpState>, body: String) -> Result<Response, HttpError> {
    state.ensure_accepting()?;
    Ok(match state.handler.handle_text(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    })
}

async fn sse_connect(
    State(state): State<SseState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>, HttpError> {
    state.http.ensure_accepting()?;

    let (id, rx) = state.sessions.open();
    tracing::debug!(session_id = %id, "SSE client connected");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages?session_id={id}"));
    let guard = SessionGuard {
        id,
        sessions: Arc::clone(&state.sessions),
    };

    let messages = ReceiverStream::new(rx).map(move |message| {
        let _guard = &guard;
        Ok(Event::default().event("message").data(message.to_string()))
    });
    let events = stream::once(async move { Ok::<_, Infallible>(endpoint) })
        .chain(messages)
        .take_until(state.http.shutdown.cancelled_owned());

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    ))
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: String,
}

async fn sse_message(
    State(state): State<SseState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Result<StatusCode, HttpError> {
    state.http.ensure_accepting()?;
    let sender = state.sessions.sender(&query.session_id).ok_or_else(|| {
        HttpError::NotFound(format!("Could not find session '{}'", query.session_id))
    })?;

    let handler = Arc::clone(&state.http.handler);
    tokio::spawn(async move {
        if let Some(response) = handler.handle_text(&body).await {
            if sender.send(response).await.is_err() {
                tracing::debug!("SSE client went away before its response");
            }
        }
    });
    Ok(StatusCode::ACCEPTED)
}
