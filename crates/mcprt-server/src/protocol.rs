//! MCP server side of JSON-RPC 2.0.
//!
//! Transport-independent: every transport hands raw messages to
//! [`McpHandler::handle`] and writes back whatever it returns.

use std::sync::Arc;

use mcprt_core::JsonObject;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::router::{ToolRouter, docs};

/// Protocol revisions this server speaks, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

pub const SERVER_NAME: &str = "mcp-runtime";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct RpcMessage {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<JsonObject>,
}

fn success(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

pub fn error_response(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message.into()},
    })
}

/// Answers MCP requests with the tool router.
pub struct McpHandler {
    router: Arc<ToolRouter>,
}

impl McpHandler {
    pub const fn new(router: Arc<ToolRouter>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &ToolRouter {
        &self.router
    }

    /// Handle one raw line or body.
    ///
    /// Unparseable input yields a parse-error response with a null id.
    pub async fn handle_text(&self, text: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting unparseable message");
                Some(error_response(Value::Null, PARSE_ERROR, format!("Parse error: {e}")))
            }
        }
    }

    /// Handle one decoded message. Notifications and responses yield `None`.
    pub async fn handle(&self, message: Value) -> Option<Value> {
        let message: RpcMessage = match serde_json::from_value(message) {
            Ok(m) => m,
            Err(e) => {
                return Some(error_response(
                    Value::Null,
                    INVALID_REQUEST,
                    format!("Invalid request: {e}"),
                ));
            }
        };

        let Some(method) = message.method else {
            // A response to something we never sent; nothing to do.
            tracing::debug!(id = ?message.id, "Ignoring client response");
            return None;
        };
        let Some(id) = message.id else {
            tracing::debug!(method = %method, "Client notification");
            return None;
        };
        if message.jsonrpc.as_deref() != Some("2.0") {
            return Some(error_response(id, INVALID_REQUEST, "jsonrpc must be \"2.0\""));
        }

        Some(self.request(id, &method, message.params).await)
    }

    async fn request(&self, id: Value, method: &str, params: Option<Value>) -> Value {
        match method {
            "initialize" => success(id, initialize_result(params.as_ref())),
            "ping" => success(id, json!({})),
            "tools/list" => success(id, json!({"tools": self.router.tools()})),
            "tools/call" => {
                let params = match params
                    .map(serde_json::from_value::<CallToolParams>)
                    .transpose()
                {
                    Ok(Some(p)) => p,
                    Ok(None) => return error_response(id, INVALID_PARAMS, "Missing params"),
                    Err(e) => {
                        return error_response(id, INVALID_PARAMS, format!("Invalid params: {e}"));
                    }
                };
                tracing::debug!(tool = %params.name, "tools/call");
                let reply = self
                    .router
                    .call_tool(&params.name, params.arguments.unwrap_or_default())
                    .await;
                success(id, reply.to_call_result())
            }
            other => error_response(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
        }
    }
}

fn initialize_result(params: Option<&Value>) -> Value {
    let requested = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str);
    let version = requested
        .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);

    json!({
        "protocolVersion": version,
        "capabilities": {"tools": {"listChanged": false}},
        "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
        "instructions": docs::SERVER_INSTRUCTIONS,
    })
}
