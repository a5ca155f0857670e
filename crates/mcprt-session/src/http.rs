//! Tool-servers reached over the MCP streamable HTTP transport.
//!
//! Each JSON-RPC message is POSTed to the server URL. The server answers
//! either with a JSON body or with a short event stream whose `data:` lines
//! carry the response.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use mcprt_core::{SessionError, StartupConfig, ToolOutput, ToolSession, TransportKind};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};

use crate::protocol::{
    Incoming, JsonRpcRequest, JsonRpcResponse, call_tool_params, initialize_params, notification,
    parse_tool_output,
};

/// Header carrying the server-assigned session id.
pub const SESSION_HEADER: &str = "mcp-session-id";

const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// A session with a streamable HTTP server.
pub struct HttpSession {
    server_name: String,
    client: Client,
    url: String,
    headers: HeaderMap,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl HttpSession {
    /// Open a session and run the handshake.
    pub async fn connect(client: Client, config: &StartupConfig) -> Result<Self, SessionError> {
        let url = config
            .url()
            .ok_or_else(|| SessionError::Connect("http transport requires 'url'".to_string()))?
            .to_string();

        let session = Self {
            server_name: config.server_name().to_string(),
            client,
            url,
            headers: header_map(config)?,
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        };

        session
            .request("initialize", Some(initialize_params()))
            .await
            .map_err(|e| SessionError::Connect(format!("MCP handshake failed: {e}")))?;
        session.notify("notifications/initialized").await?;

        tracing::debug!(
            server_name = %session.server_name,
            session_id = ?session.session_id(),
            "http session ready"
        );
        Ok(session)
    }

    /// Session id assigned by the server, if any.
    pub fn session_id(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn post(&self, body: &impl serde::Serialize) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .header(ACCEPT, ACCEPT_BOTH)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(id) = self.session_id() {
            builder = builder.header(SESSION_HEADER, id);
        }
        builder
    }

    fn remember_session(&self, response: &reqwest::Response) {
        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(id.to_string());
        }
    }

    /// Send a request; dropping the future aborts the HTTP exchange.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let response = self
            .post(&JsonRpcRequest::new(id, method, params))
            .send()
            .await
            .map_err(|e| SessionError::Io(e.to_string()))?;
        self.remember_session(&response);

        let status = response.status();
        if status == StatusCode::NOT_FOUND && self.session_id().is_some() {
            // The server forgot our session.
            return Err(SessionError::Closed);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Protocol(format!("HTTP {status}: {}", excerpt(&body))));
        }

        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        let body = response
            .text()
            .await
            .map_err(|e| SessionError::Io(e.to_string()))?;

        let reply = if is_stream {
            find_in_event_stream(&body, id)
        } else {
            serde_json::from_str::<JsonRpcResponse>(&body).ok()
        };

        reply
            .ok_or_else(|| SessionError::Protocol(format!("No response to request {id}")))?
            .into_result()
    }

    async fn notify(&self, method: &str) -> Result<(), SessionError> {
        let response = self
            .post(&notification(method, None))
            .send()
            .await
            .map_err(|e| SessionError::Io(e.to_string()))?;
        self.remember_session(&response);
        if !response.status().is_success() {
            return Err(SessionError::Protocol(format!(
                "HTTP {} for {method}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ToolSession for HttpSession {
    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, SessionError> {
        tracing::debug!(server_name = %self.server_name, tool = tool_name, "tools/call");
        let result = self
            .request("tools/call", Some(call_tool_params(tool_name, arguments)))
            .await?;
        parse_tool_output(result)
    }

    async fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let Some(id) = self.session_id() else {
            return Ok(());
        };

        // Best-effort: servers may not support explicit termination.
        let outcome = self
            .client
            .delete(&self.url)
            .headers(self.headers.clone())
            .header(SESSION_HEADER, id)
            .send()
            .await;
        if let Err(e) = outcome {
            tracing::debug!(server_name = %self.server_name, error = %e, "session DELETE failed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn transport(&self) -> TransportKind {
        TransportKind::Http
    }
}

fn header_map(config: &StartupConfig) -> Result<HeaderMap, SessionError> {
    let mut headers = HeaderMap::new();
    for (name, value) in config.headers() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| SessionError::Connect(format!("Invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| SessionError::Connect(format!("Invalid value for header '{name}': {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Find the response with `id` among the events of an SSE body.
fn find_in_event_stream(body: &str, id: u64) -> Option<JsonRpcResponse> {
    let mut data = String::new();
    let mut events = Vec::new();
    for line in body.lines() {
        if line.is_empty() {
            if !data.is_empty() {
                events.push(std::mem::take(&mut data));
            }
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if !data.is_empty() {
        events.push(data);
    }

    events.iter().find_map(|event| match Incoming::parse(event) {
        Some(Incoming::Response(response)) if response.numeric_id() == Some(id) => Some(response),
        _ => None,
    })
}

fn excerpt(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use mcprt_core::RawStartupConfig;

    #[test]
    fn test_event_stream_parsing() {
        let body = "event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\
                    \n\
                    event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"id\":4,\"result\":{\"ok\":true}}\n\
                    \n";

        let response = find_in_event_stream(body, 4).unwrap();
        assert_eq!(response.into_result().unwrap()["ok"], true);
        assert!(find_in_event_stream(body, 5).is_none());
    }

    #[test]
    fn test_event_stream_multiline_data() {
        let body = "data: {\"jsonrpc\":\"2.0\",\n\
                    data: \"id\":1,\"result\":{}}\n";
        assert!(find_in_event_stream(body, 1).is_some());
    }

    #[test]
    fn test_configured_headers_are_validated() {
        let mut headers = BTreeMap::new();
        headers.insert("X-Api-Key".to_string(), "abc".to_string());
        let config = StartupConfig::new(RawStartupConfig {
            server_name: "remote".to_string(),
            transport: TransportKind::Http,
            url: Some("http://localhost:9/mcp".to_string()),
            headers,
            ..RawStartupConfig::default()
        })
        .unwrap();
        let map = header_map(&config).unwrap();
        assert_eq!(map.get("x-api-key").unwrap(), "abc");

        let mut bad = BTreeMap::new();
        bad.insert("bad header".to_string(), "x".to_string());
        let config = StartupConfig::new(RawStartupConfig {
            server_name: "remote".to_string(),
            transport: TransportKind::Http,
            url: Some("http://localhost:9/mcp".to_string()),
            headers: bad,
            ..RawStartupConfig::default()
        })
        .unwrap();
        assert!(matches!(header_map(&config), Err(SessionError::Connect(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_to_connect() {
        let config = StartupConfig::http("remote", "http://127.0.0.1:9/mcp").unwrap();
        let result = HttpSession::connect(Client::new(), &config).await;
        assert!(matches!(result, Err(SessionError::Connect(_))));
    }
}
