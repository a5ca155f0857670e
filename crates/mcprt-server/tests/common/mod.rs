//! Engine and router wired to in-memory fakes.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use mcprt_core::testing::{FakeConnector, FakeDiscovery, ScriptedSession};
use mcprt_core::{NoopCaptioner, RuntimeSettings, StartupConfig, ToolInfo};
use mcprt_server::{EngineDeps, RuntimeEngine, ToolReply, ToolRouter};
use serde_json::{Value, json};
use tempfile::TempDir;

pub struct Harness {
    pub dir: TempDir,
    pub discovery: Arc<FakeDiscovery>,
    pub connector: Arc<FakeConnector>,
    pub session: Arc<ScriptedSession>,
    pub engine: Arc<RuntimeEngine>,
}

pub fn pdf_tool() -> ToolInfo {
    ToolInfo {
        tool_name: "read_pdf".to_string(),
        tool_description: "Read a PDF document".to_string(),
        tool_schema: json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"]
        })
        .as_object()
        .cloned()
        .unwrap(),
        server_name: "svc".to_string(),
        ..ToolInfo::default()
    }
}

/// Engine with one indexed server `svc` and a 50-token budget.
pub fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let discovery = Arc::new(
        FakeDiscovery::new()
            .with_config(StartupConfig::stdio("svc", "svc-server", Vec::new()).unwrap())
            .with_tool(pdf_tool()),
    );
    let connector = Arc::new(FakeConnector::new());
    let session = Arc::new(ScriptedSession::new());
    connector.register("svc", Arc::clone(&session));

    let mut settings = RuntimeSettings::with_offload_dir(dir.path().join("offloaded"));
    settings.max_result_tokens = 50;
    settings.worker_count = 2;

    let deps = EngineDeps {
        discovery: discovery.clone(),
        connector: connector.clone(),
        captioner: Arc::new(NoopCaptioner),
    };
    let engine = Arc::new(RuntimeEngine::new(settings, deps).unwrap());

    Harness {
        dir,
        discovery,
        connector,
        session,
        engine,
    }
}

impl Harness {
    pub async fn router(&self) -> ToolRouter {
        ToolRouter::initialize(Arc::clone(&self.engine)).await
    }
}

pub fn object(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap()
}

/// Call the umbrella tool.
pub async fn route(router: &ToolRouter, args: Value) -> ToolReply {
    router.route(&object(args)).await
}

pub fn structured(reply: &ToolReply) -> Value {
    assert!(!reply.is_error, "unexpected error reply: {}", reply.text_content());
    reply
        .structured
        .clone()
        .unwrap_or_else(|| panic!("reply is not structured: {}", reply.text_content()))
}

/// Poll until the task leaves the running state.
pub async fn wait_for_task(router: &ToolRouter, task_id: &str) -> Value {
    for _ in 0..1_000 {
        let reply = route(
            router,
            json!({"operation": "poll_task_result", "task_id": task_id}),
        )
        .await;
        let poll = structured(&reply);
        if poll["status"] != "running" {
            return poll;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {task_id} never finished");
}
