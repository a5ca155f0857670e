//! Operation dispatch.
//!
//! Every operation is exposed twice: as its own MCP tool and through the
//! `semantic_router` umbrella tool that takes an `operation` field. Both
//! paths go through [`ToolRouter::dispatch`], which validates the fields
//! the operation needs before touching the engine.

mod args;
pub mod docs;
mod operation;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use mcprt_core::{
    ContentBlock, ExecuteOutcome, ExecuteRequest, JsonObject, Page, RuntimeError,
    ServerSearchQuery, TaskId, ToolCall, ToolSearchQuery, strip_tool_schemas,
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::engine::RuntimeEngine;

pub use args::ArgError;
pub use operation::{Operation, router_input_schema};

use args::Args;

/// Name of the umbrella tool.
pub const SEMANTIC_ROUTER: &str = "semantic_router";

/// Reply to one tool call, in MCP `tools/call` result shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolReply {
    pub content: Vec<ContentBlock>,
    /// The JSON value behind `content`, when the reply is structured.
    pub structured: Option<Value>,
    pub is_error: bool,
}

impl ToolReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            structured: None,
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    pub fn json(value: Value) -> Self {
        let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        Self {
            content: vec![ContentBlock::text(text)],
            structured: Some(value),
            is_error: false,
        }
    }

    /// First text block.
    pub fn text_content(&self) -> &str {
        self.content
            .iter()
            .find_map(ContentBlock::as_text)
            .unwrap_or_default()
    }

    /// `CallToolResult` body.
    pub fn to_call_result(&self) -> Value {
        let mut result = json!({
            "content": self.content,
            "isError": self.is_error,
        });
        if let Some(structured @ Value::Object(_)) = &self.structured {
            result["structuredContent"] = structured.clone();
        }
        result
    }
}

#[derive(Debug, Error)]
enum DispatchError {
    #[error(transparent)]
    Args(#[from] ArgError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Maps tool calls onto engine operations.
pub struct ToolRouter {
    engine: Arc<RuntimeEngine>,
    server_index: String,
}

impl ToolRouter {
    /// Router whose umbrella description lists `server_index`.
    pub const fn new(engine: Arc<RuntimeEngine>, server_index: String) -> Self {
        Self {
            engine,
            server_index,
        }
    }

    /// Router with the indexed servers fetched from discovery.
    ///
    /// A discovery failure is logged and leaves the listing empty.
    pub async fn initialize(engine: Arc<RuntimeEngine>) -> Self {
        let server_index = match docs::load_server_index(engine.discovery()).await {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load indexed servers for the router description");
                "No servers indexed yet".to_string()
            }
        };
        Self::new(engine, server_index)
    }

    pub fn engine(&self) -> &Arc<RuntimeEngine> {
        &self.engine
    }

    /// Tool descriptors for `tools/list`.
    pub fn tools(&self) -> Vec<Value> {
        let mut tools: Vec<Value> = Operation::ALL
            .iter()
            .map(|op| {
                json!({
                    "name": op.name(),
                    "description": op.description(),
                    "inputSchema": op.input_schema(),
                })
            })
            .collect();
        tools.push(json!({
            "name": SEMANTIC_ROUTER,
            "description": docs::router_description(&self.server_index),
            "inputSchema": router_input_schema(),
        }));
        tools
    }

    /// Handle a `tools/call` by tool name. Never panics.
    pub async fn call_tool(&self, name: &str, arguments: JsonObject) -> ToolReply {
        let call = async {
            if name == SEMANTIC_ROUTER {
                return self.route(&arguments).await;
            }
            match Operation::from_name(name) {
                Some(op) => self
                    .dispatch(op, &arguments)
                    .await
                    .unwrap_or_else(|e| ToolReply::error(e.to_string())),
                None => ToolReply::error(format!("Unknown tool: {name}")),
            }
        };

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(reply) => reply,
            Err(_) => {
                tracing::error!(tool = %name, "Tool handler panicked");
                ToolReply::error("Router failed: internal error")
            }
        }
    }

    /// Umbrella entry point: pick the operation from `arguments.operation`.
    pub async fn route(&self, arguments: &JsonObject) -> ToolReply {
        let Some(name) = arguments.get("operation").and_then(Value::as_str) else {
            return ToolReply::error(format!("Error: 'operation' is required for {SEMANTIC_ROUTER}"));
        };
        let Some(op) = Operation::from_name(name) else {
            return ToolReply::error(format!("Unknown operation: {name}"));
        };

        tracing::debug!(operation = %op, "Routing operation");
        match self.dispatch(op, arguments).await {
            Ok(reply) => reply,
            Err(DispatchError::Args(e)) => ToolReply::error(e.to_string()),
            Err(DispatchError::Runtime(e)) => ToolReply::error(format!("Router failed: {e}")),
        }
    }

    async fn dispatch(&self, op: Operation, fields: &JsonObject) -> Result<ToolReply, DispatchError> {
        let args = Args::new(op, fields)?;
        let discovery = self.engine.discovery();

        let reply = match op {
            Operation::Readme => ToolReply::text(docs::README),

            Operation::SearchTools => {
                let mut query = ToolSearchQuery::new(args.required_string("query")?);
                query.limit = args.u32_or("limit", ToolSearchQuery::DEFAULT_LIMIT)?;
                query.min_score = args.f64_or("min_score", ToolSearchQuery::DEFAULT_MIN_SCORE)?;
                query.server_names = args.string_list("server_names")?;
                query.tool_type = args.string("tool_type")?;
                query.enabled = args.bool_or("enabled", true)?;

                let mut found = discovery.search_tools(&query).await.map_err(RuntimeError::from)?;
                strip_tool_schemas(&mut found, "tools");
                ToolReply::json(Value::Object(found))
            }

            Operation::SearchServers => {
                let mut query = ServerSearchQuery::new(args.required_string("query")?);
                query.limit = args.u32_or("limit", ToolSearchQuery::DEFAULT_LIMIT)?;
                query.min_score = args.f64_or("min_score", ToolSearchQuery::DEFAULT_MIN_SCORE)?;

                let found = discovery.search_servers(&query).await.map_err(RuntimeError::from)?;
                ToolReply::json(Value::Object(found))
            }

            Operation::GetServerInfo => {
                let name = args.required_string("server_name")?;
                let info = discovery.get_server_info(&name).await.map_err(RuntimeError::from)?;
                ToolReply::json(to_json(&info)?)
            }

            Operation::GetServerTools => {
                let name = args.required_string("server_name")?;
                let page = page(&args)?;
                let mut tools = discovery
                    .get_server_tools(&name, page)
                    .await
                    .map_err(RuntimeError::from)?;
                strip_tool_schemas(&mut tools, "tools");
                ToolReply::json(Value::Object(tools))
            }

            Operation::GetToolDetails => {
                let server = args.required_string("server_name")?;
                let tool = args.required_string("tool_name")?;
                let details = discovery
                    .get_tool_details(&server, &tool)
                    .await
                    .map_err(RuntimeError::from)?;
                ToolReply::json(to_json(&details)?)
            }

            Operation::ListServers => {
                let servers = discovery.list_servers(page(&args)?).await.map_err(RuntimeError::from)?;
                ToolReply::json(Value::Object(servers))
            }

            Operation::GetStatistics => {
                let stats = discovery.get_statistics().await.map_err(RuntimeError::from)?;
                ToolReply::json(to_json(&stats)?)
            }

            Operation::ManageServer => {
                let name = args.required_string("server_name")?;
                let action = args.string("action")?.unwrap_or_else(|| "start".to_string());
                let report = match action.as_str() {
                    "start" => self.engine.start_server(&name).await,
                    "shutdown" => self.engine.shutdown_server(&name).await,
                    other => {
                        return Ok(ToolReply::json(json!({
                            "success": false,
                            "message": format!("Invalid action: {other}. Use 'start' or 'shutdown'"),
                        })));
                    }
                };
                ToolReply::json(to_json(&report)?)
            }

            Operation::ListRunningServers => {
                ToolReply::json(json!(self.engine.list_running_servers().await))
            }

            Operation::ExecuteTool => self.execute_tool(&args).await?,

            Operation::PollTaskResult => {
                let task_id = TaskId::from(args.required_string("task_id")?);
                match self.engine.poll_task_result(&task_id) {
                    Ok(poll) => ToolReply::json(to_json(&poll)?),
                    Err(e) => ToolReply::json(json!({"status": "error", "error": e.to_string()})),
                }
            }

            Operation::GetContent => {
                let ref_id = args.required_string("ref_id")?;
                let chunk_index = args.usize_opt("chunk_index")?;
                match self.engine.get_content(&ref_id, chunk_index).await {
                    Ok(content) => ToolReply::json(json!({"success": true, "content": content})),
                    Err(e) => ToolReply::json(json!({"success": false, "error": e.to_string()})),
                }
            }
        };
        Ok(reply)
    }

    async fn execute_tool(&self, args: &Args<'_>) -> Result<ToolReply, DispatchError> {
        let default_timeout = self.engine.settings().default_tool_timeout.as_secs_f64();
        let timeout = args.f64_or("timeout", default_timeout)?;
        let timeout = Duration::try_from_secs_f64(timeout)
            .ok()
            .filter(|t| !t.is_zero())
            .ok_or(ArgError::Invalid {
                operation: Operation::ExecuteTool.name(),
                field: "timeout",
                expected: "a positive number of seconds",
            })?;

        let request = ExecuteRequest {
            call: ToolCall {
                server_name: args.required_string("server_name")?,
                tool_name: args.required_string("tool_name")?,
                arguments: args.object("arguments")?,
                timeout,
            },
            in_background: args.bool_or("in_background", false)?,
            priority: args.i64_or("priority", mcprt_core::DEFAULT_PRIORITY)?,
        };

        let reply = match self.engine.execute_tool(request).await {
            Ok(ExecuteOutcome::Completed { content }) => json!({"success": true, "result": content}),
            Ok(queued @ ExecuteOutcome::Queued { .. }) => json!({"success": true, "result": queued}),
            Err(e) => json!({"success": false, "error": e.to_string()}),
        };
        Ok(ToolReply::json(reply))
    }
}

fn page(args: &Args<'_>) -> Result<Page, ArgError> {
    Ok(Page::new(
        args.u32_or("limit", Page::DEFAULT_LIMIT)?,
        args.u32_or("offset", 0)?,
    ))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, RuntimeError> {
    serde_json::to_value(value).map_err(|e| RuntimeError::Internal(e.to_string()))
}
