//! Operation dispatch through the umbrella tool and the per-operation tools.

mod common;

use std::sync::Arc;

use common::{harness, object, route, structured, wait_for_task};
use mcprt_core::testing::Script;
use mcprt_core::{ContentBlock, ToolOutput};
use mcprt_server::{Operation, SEMANTIC_ROUTER, ToolRouter};
use serde_json::{Value, json};

fn ref_id(text: &str) -> String {
    text.split("[Reference: ")
        .nth(1)
        .and_then(|rest| rest.split(']').next())
        .unwrap_or_else(|| panic!("no reference in {text}"))
        .to_string()
}

#[tokio::test]
async fn required_fields_are_reported_per_operation() {
    let h = harness();
    let router = h.router().await;

    let cases = [
        (json!({"operation": "search_tools"}), "Error: 'query' is required for search_tools"),
        (json!({"operation": "search_servers"}), "Error: 'query' is required for search_servers"),
        (json!({"operation": "get_server_info"}), "Error: 'server_name' is required for get_server_info"),
        (json!({"operation": "get_server_tools"}), "Error: 'server_name' is required for get_server_tools"),
        (
            json!({"operation": "get_tool_details", "server_name": "svc"}),
            "Error: 'server_name' and 'tool_name' are required for get_tool_details",
        ),
        (json!({"operation": "manage_server"}), "Error: 'server_name' is required for manage_server"),
        (
            json!({"operation": "execute_tool", "tool_name": "x"}),
            "Error: 'server_name' and 'tool_name' are required for execute_tool",
        ),
        (json!({"operation": "poll_task_result"}), "Error: 'task_id' is required for poll_task_result"),
        (json!({"operation": "get_content", "ref_id": null}), "Error: 'ref_id' is required for get_content"),
    ];

    for (args, expected) in cases {
        let reply = route(&router, args).await;
        assert!(reply.is_error);
        assert_eq!(reply.text_content(), expected);
    }
}

#[tokio::test]
async fn unknown_or_missing_operation_is_rejected() {
    let h = harness();
    let router = h.router().await;

    let reply = route(&router, json!({"operation": "launch_rockets"})).await;
    assert!(reply.is_error);
    assert_eq!(reply.text_content(), "Unknown operation: launch_rockets");

    let reply = route(&router, json!({"query": "pdf"})).await;
    assert_eq!(
        reply.text_content(),
        "Error: 'operation' is required for semantic_router"
    );

    let reply = router.call_tool("launch_rockets", object(json!({}))).await;
    assert_eq!(reply.text_content(), "Unknown tool: launch_rockets");
}

#[tokio::test]
async fn search_results_never_carry_schemas() {
    let h = harness();
    let router = h.router().await;

    let reply = route(&router, json!({"operation": "search_tools", "query": "pdf"})).await;
    let found = structured(&reply);
    let tools = found["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["tool_name"], "read_pdf");
    assert!(tools[0].get("tool_schema").is_none());

    let reply = route(
        &router,
        json!({"operation": "get_server_tools", "server_name": "svc"}),
    )
    .await;
    let listing = structured(&reply);
    assert!(listing["tools"][0].get("tool_schema").is_none());

    let reply = route(
        &router,
        json!({"operation": "get_tool_details", "server_name": "svc", "tool_name": "read_pdf"}),
    )
    .await;
    let details = structured(&reply);
    assert_eq!(details["tool_schema"]["required"], json!(["path"]));
}

#[tokio::test]
async fn search_filters_are_passed_through() {
    let h = harness();
    let router = h.router().await;

    let reply = route(
        &router,
        json!({"operation": "search_tools", "query": "pdf", "server_names": ["elsewhere"]}),
    )
    .await;
    assert_eq!(structured(&reply)["tools"], json!([]));

    let reply = route(
        &router,
        json!({"operation": "search_tools", "query": "pdf", "limit": "many"}),
    )
    .await;
    assert!(reply.is_error);
    assert_eq!(
        reply.text_content(),
        "Error: 'limit' must be a non-negative integer for search_tools"
    );
}

#[tokio::test]
async fn listing_and_statistics_operations() {
    let h = harness();
    let router = h.router().await;

    let servers = structured(&route(&router, json!({"operation": "list_servers"})).await);
    assert_eq!(servers["total"], 1);
    assert_eq!(servers["servers"][0]["name"], "svc");

    let stats = structured(&router.call_tool("get_statistics", object(json!({}))).await);
    assert_eq!(stats["total_servers"], 1);
    assert_eq!(stats["total_tools"], 1);

    let info = structured(
        &route(&router, json!({"operation": "get_server_info", "server_name": "svc"})).await,
    );
    assert_eq!(info["server_name"], "svc");

    let reply = route(&router, json!({"operation": "search_servers", "query": "svc"})).await;
    assert_eq!(structured(&reply)["total_results"], 1);
}

#[tokio::test]
async fn manage_server_drives_the_registry() {
    let h = harness();
    let router = h.router().await;

    let start = json!({"operation": "manage_server", "server_name": "svc", "action": "start"});
    let report = structured(&route(&router, start.clone()).await);
    assert_eq!(report, json!({"success": true, "message": "Server 'svc' started"}));

    let report = structured(&route(&router, start).await);
    assert_eq!(report["success"], true);
    assert_eq!(report["message"], "Server 'svc' is already running");
    assert_eq!(h.connector.connects(), 1);

    let running = structured(&route(&router, json!({"operation": "list_running_servers"})).await);
    assert_eq!(running, json!(["svc"]));

    let report = structured(
        &route(
            &router,
            json!({"operation": "manage_server", "server_name": "svc", "action": "restart"}),
        )
        .await,
    );
    assert_eq!(
        report,
        json!({"success": false, "message": "Invalid action: restart. Use 'start' or 'shutdown'"})
    );

    let report = structured(
        &route(
            &router,
            json!({"operation": "manage_server", "server_name": "svc", "action": "shutdown"}),
        )
        .await,
    );
    assert_eq!(report["success"], true);
    assert!(h.session.is_closed());
    let running = structured(&route(&router, json!({"operation": "list_running_servers"})).await);
    assert_eq!(running, json!([]));
}

#[tokio::test]
async fn manage_server_defaults_to_start() {
    let h = harness();
    let router = h.router().await;

    let report = structured(
        &route(&router, json!({"operation": "manage_server", "server_name": "svc"})).await,
    );
    assert_eq!(report["success"], true);
    assert!(h.engine.sessions().is_running("svc").await);
}

#[tokio::test]
async fn execute_tool_inline_returns_content() {
    let h = harness();
    let router = h.router().await;
    assert!(h.engine.start_server("svc").await.success);

    let reply = route(
        &router,
        json!({
            "operation": "execute_tool",
            "server_name": "svc",
            "tool_name": "echo",
            "arguments": {"path": "/tmp/a.pdf"}
        }),
    )
    .await;
    let body = structured(&reply);
    assert_eq!(body["success"], true);
    assert_eq!(body["result"][0]["type"], "text");
    let echoed: Value = serde_json::from_str(body["result"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(echoed, json!({"path": "/tmp/a.pdf"}));
}

#[tokio::test]
async fn execute_tool_reports_failures_as_data() {
    let h = harness();
    let router = h.router().await;

    let call = json!({"operation": "execute_tool", "server_name": "svc", "tool_name": "echo"});
    let body = structured(&route(&router, call.clone()).await);
    assert_eq!(body["success"], false);
    assert!(
        body["error"].as_str().unwrap().contains("Server 'svc' is not running"),
        "{body}"
    );
    assert_eq!(h.connector.connects(), 0, "execute must never auto-start");

    assert!(h.engine.start_server("svc").await.success);
    h.session.script("boom", Script::Reply(ToolOutput::error("disk on fire")));
    let body = structured(
        &route(
            &router,
            json!({"operation": "execute_tool", "server_name": "svc", "tool_name": "boom"}),
        )
        .await,
    );
    assert_eq!(body, json!({"success": false, "error": "disk on fire"}));
}

#[tokio::test]
async fn execute_tool_rejects_bad_timeout() {
    let h = harness();
    let router = h.router().await;

    for timeout in [json!(0), json!(-5), json!("soon")] {
        let reply = route(
            &router,
            json!({
                "operation": "execute_tool",
                "server_name": "svc",
                "tool_name": "echo",
                "timeout": timeout
            }),
        )
        .await;
        assert!(reply.is_error);
        assert!(reply.text_content().starts_with("Error: 'timeout' must be"));
    }
}

#[tokio::test]
async fn background_execution_is_polled_to_completion() {
    let h = harness();
    let router = h.router().await;
    assert!(h.engine.start_server("svc").await.success);
    h.session.script(
        "slow",
        Script::Delay(
            std::time::Duration::from_millis(20),
            ToolOutput::success(vec![ContentBlock::text("finished")]),
        ),
    );

    let body = structured(
        &route(
            &router,
            json!({
                "operation": "execute_tool",
                "server_name": "svc",
                "tool_name": "slow",
                "in_background": true,
                "priority": 0
            }),
        )
        .await,
    );
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["status"], "queued");
    let task_id = body["result"]["task_id"].as_str().unwrap().to_string();

    let poll = wait_for_task(&router, &task_id).await;
    assert_eq!(poll["status"], "completed");
    assert_eq!(poll["result"][0]["text"], "finished");

    // Terminal answers repeat.
    assert_eq!(wait_for_task(&router, &task_id).await, poll);
}

#[tokio::test]
async fn polling_an_unknown_task_reports_an_error_status() {
    let h = harness();
    let router = h.router().await;

    let poll = structured(
        &route(&router, json!({"operation": "poll_task_result", "task_id": "does-not-exist"})).await,
    );
    assert_eq!(
        poll,
        json!({"status": "error", "error": "Task 'does-not-exist' not found"})
    );
}

#[tokio::test]
async fn oversized_results_are_retrievable_through_get_content() {
    let h = harness();
    let router = h.router().await;
    assert!(h.engine.start_server("svc").await.success);

    let original = "word ".repeat(100);
    h.session.script(
        "dump",
        Script::Reply(ToolOutput::success(vec![ContentBlock::text(original.clone())])),
    );

    let body = structured(
        &route(
            &router,
            json!({"operation": "execute_tool", "server_name": "svc", "tool_name": "dump"}),
        )
        .await,
    );
    let marker = body["result"][0]["text"].as_str().unwrap();
    assert!(marker.contains("[Content truncated: ~125 tokens exceeds budget of 50 tokens, split into 3 chunks]"));
    let id = ref_id(marker);

    let full = structured(&route(&router, json!({"operation": "get_content", "ref_id": id})).await);
    assert_eq!(full["success"], true);
    assert_eq!(full["content"]["total_chunks"], 3);
    assert_eq!(full["content"]["block"]["text"], original);

    let chunk = structured(
        &route(
            &router,
            json!({"operation": "get_content", "ref_id": id, "chunk_index": 2}),
        )
        .await,
    );
    assert_eq!(chunk["content"]["chunk_index"], 2);
    assert_eq!(chunk["content"]["block"]["text"], &original[400..]);

    let missing = structured(
        &route(
            &router,
            json!({"operation": "get_content", "ref_id": id, "chunk_index": 3}),
        )
        .await,
    );
    assert_eq!(missing["success"], false);
    assert!(missing["error"].as_str().unwrap().contains("out of range"));

    let unknown = structured(
        &route(&router, json!({"operation": "get_content", "ref_id": "nope"})).await,
    );
    assert_eq!(unknown, json!({"success": false, "error": "Reference 'nope' not found"}));
}

#[tokio::test]
async fn discovery_outage_becomes_an_error_reply() {
    let h = harness();
    let router = h.router().await;
    h.discovery.set_unavailable(true);

    let reply = route(&router, json!({"operation": "search_tools", "query": "pdf"})).await;
    assert!(reply.is_error);
    assert!(
        reply
            .text_content()
            .starts_with("Router failed: Discovery service unavailable"),
        "{}",
        reply.text_content()
    );

    let reply = router
        .call_tool("get_statistics", object(json!({})))
        .await;
    assert!(reply.is_error);
    assert!(reply.text_content().starts_with("Discovery service unavailable"));

    let report = structured(
        &route(&router, json!({"operation": "manage_server", "server_name": "svc"})).await,
    );
    assert_eq!(report["success"], false);
}

#[tokio::test]
async fn tool_list_exposes_every_operation_and_the_umbrella() {
    let h = harness();
    let router = h.router().await;

    let tools = router.tools();
    assert_eq!(tools.len(), Operation::ALL.len() + 1);
    for op in Operation::ALL {
        assert!(tools.iter().any(|t| t["name"] == op.name()), "missing {op}");
    }

    let umbrella = tools.iter().find(|t| t["name"] == SEMANTIC_ROUTER).unwrap();
    let description = umbrella["description"].as_str().unwrap();
    assert!(description.contains("server_name: svc\ntitle: svc\nnb_tools: 0"));
    assert_eq!(umbrella["inputSchema"]["required"], json!(["operation"]));
}

#[tokio::test]
async fn router_description_survives_discovery_outage() {
    let h = harness();
    h.discovery.set_unavailable(true);
    let router = ToolRouter::initialize(Arc::clone(&h.engine)).await;

    let tools = router.tools();
    let umbrella = tools.iter().find(|t| t["name"] == SEMANTIC_ROUTER).unwrap();
    assert!(
        umbrella["description"]
            .as_str()
            .unwrap()
            .contains("No servers indexed yet")
    );
}

#[tokio::test]
async fn readme_is_plain_text() {
    let h = harness();
    let router = h.router().await;

    let reply = router.call_tool("readme", object(json!({}))).await;
    assert!(!reply.is_error);
    assert!(reply.structured.is_none());
    assert!(reply.text_content().contains("get_tool_details"));

    let via_router = route(&router, json!({"operation": "readme"})).await;
    assert_eq!(via_router.text_content(), reply.text_content());
}
