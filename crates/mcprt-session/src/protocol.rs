//! JSON-RPC 2.0 message types and MCP payload helpers.
//!
//! Reference: <https://spec.modelcontextprotocol.io/>

use mcprt_core::{ContentBlock, SessionError, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Protocol revision requested during `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// JSON-RPC "method not found".
pub const METHOD_NOT_FOUND: i64 = -32601;

/// JSON-RPC 2.0 request.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub const fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (no id, no response).
pub fn notification(method: &str, params: Option<Value>) -> Value {
    match params {
        Some(params) => json!({"jsonrpc": "2.0", "method": method, "params": params}),
        None => json!({"jsonrpc": "2.0", "method": method}),
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    /// Numeric id, when the server echoed one of ours.
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.as_ref().and_then(Value::as_u64)
    }

    /// Unwrap the result, turning an error object into `SessionError::Rpc`.
    pub fn into_result(self) -> Result<Value, SessionError> {
        if let Some(err) = self.error {
            return Err(SessionError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        self.result
            .ok_or_else(|| SessionError::Protocol("Missing result in response".to_string()))
    }
}

/// A message received from a server.
#[derive(Debug)]
pub enum Incoming {
    /// Answer to one of our requests.
    Response(JsonRpcResponse),
    /// A request from the server that expects an answer.
    Request { id: Value, method: String },
    /// A server notification.
    Notification { method: String },
}

impl Incoming {
    /// Classify one JSON message. `None` for anything that is not JSON-RPC.
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let object = value.as_object()?;
        match (object.get("method").and_then(Value::as_str), object.get("id")) {
            (Some(method), Some(id)) => Some(Self::Request {
                id: id.clone(),
                method: method.to_string(),
            }),
            (Some(method), None) => Some(Self::Notification {
                method: method.to_string(),
            }),
            (None, Some(_)) => serde_json::from_value(value).ok().map(Self::Response),
            (None, None) => None,
        }
    }
}

/// Reply to a server-initiated request.
///
/// Only `ping` is answered; everything else gets "method not found".
pub fn reply_to_server_request(id: &Value, method: &str) -> Value {
    if method == "ping" {
        json!({"jsonrpc": "2.0", "id": id, "result": {}})
    } else {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": METHOD_NOT_FOUND, "message": format!("Method not found: {method}")}
        })
    }
}

/// Parameters of the `initialize` request.
pub fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "clientInfo": {
            "name": "mcp-runtime",
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {}
    })
}

/// Parameters of a `tools/call` request.
pub fn call_tool_params(tool_name: &str, arguments: Map<String, Value>) -> Value {
    json!({"name": tool_name, "arguments": arguments})
}

/// Parameters of `notifications/cancelled`.
pub fn cancelled_params(request_id: u64, reason: &str) -> Value {
    json!({"requestId": request_id, "reason": reason})
}

/// Convert a `tools/call` result into a `ToolOutput`.
pub fn parse_tool_output(result: Value) -> Result<ToolOutput, SessionError> {
    let Value::Object(mut object) = result else {
        return Err(SessionError::Protocol(
            "tools/call result is not an object".to_string(),
        ));
    };

    let is_error = object
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let content = match object.remove("content") {
        Some(Value::Array(items)) => items.into_iter().map(ContentBlock::from_wire).collect(),
        Some(other) => vec![ContentBlock::from_wire(other)],
        None => Vec::new(),
    };

    Ok(ToolOutput { content, is_error })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rpc_request_serialization() {
        let request = JsonRpcRequest::new(1, "tools/list", None);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"tools/list\""));
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_incoming_classification() {
        let response = Incoming::parse(r#"{"jsonrpc":"2.0","id":3,"result":{}}"#).unwrap();
        assert!(matches!(response, Incoming::Response(ref r) if r.numeric_id() == Some(3)));

        let request = Incoming::parse(r#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#).unwrap();
        assert!(matches!(request, Incoming::Request { ref method, .. } if method == "ping"));

        let note =
            Incoming::parse(r#"{"jsonrpc":"2.0","method":"notifications/message"}"#).unwrap();
        assert!(matches!(note, Incoming::Notification { .. }));

        assert!(Incoming::parse("npm WARN deprecated").is_none());
        assert!(Incoming::parse("[1,2]").is_none());
    }

    #[test]
    fn test_error_response_becomes_rpc_error() {
        let json = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"Invalid Request"}}"#;
        let response: JsonRpcResponse = serde_json::from_str(json).unwrap();
        let err = response.into_result().unwrap_err();
        assert!(matches!(err, SessionError::Rpc { code: -32600, .. }));
    }

    #[test]
    fn test_parse_tool_output() {
        let output = parse_tool_output(json!({
            "content": [
                {"type": "text", "text": "hello"},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"}
            ]
        }))
        .unwrap();
        assert!(!output.is_error);
        assert_eq!(output.content.len(), 2);
        assert_eq!(output.content[0], ContentBlock::text("hello"));

        let failed = parse_tool_output(json!({
            "content": [{"type": "text", "text": "file not found"}],
            "isError": true
        }))
        .unwrap();
        assert!(failed.is_error);
        assert_eq!(failed.error_message(), "file not found");
    }

    #[test]
    fn test_ping_is_answered_other_requests_rejected() {
        let pong = reply_to_server_request(&json!(7), "ping");
        assert_eq!(pong["id"], 7);
        assert!(pong.get("result").is_some());

        let rejected = reply_to_server_request(&json!(8), "sampling/createMessage");
        assert_eq!(rejected["error"]["code"], METHOD_NOT_FOUND);
    }
}
