//! Agent-facing documentation: the readme tool text, the umbrella tool
//! description and the indexed-server listing embedded in it.

use mcprt_core::{DiscoveryError, DiscoveryPort, Page};
use serde_json::Value;

pub const SERVER_INSTRUCTIONS: &str = "\
mcp-runtime starts MCP tool-servers on demand and runs their tools. \
Servers and tools are found through a discovery service, so no local server configuration is needed. \
Begin with search_tools, read the schema with get_tool_details, start the server with manage_server, then call execute_tool. \
Long calls can run in the background: pass in_background=true and poll the returned task id with poll_task_result.";

pub const README: &str = r#"# mcp-runtime

Runs tools hosted on MCP tool-servers. Everything about servers and tools
comes from the discovery service; the runtime keeps no local configuration.

## Operations

Discovery
- search_tools: semantic tool search (no schemas in the results)
- search_servers: semantic server search
- get_server_info: capabilities, limitations and tool count of a server
- get_server_tools: page through a server's tools (no schemas)
- get_tool_details: full parameter schema of one tool
- list_servers: page through every registered server
- get_statistics: number of indexed servers and tools

Lifecycle
- manage_server: action "start" or "shutdown"
- list_running_servers: servers with a live session

Execution
- execute_tool: run a tool on a running server
- poll_task_result: status and result of a background task

Content
- get_content: read offloaded content by reference id

## Workflow

1. search_tools(query="what you need")
2. get_server_info(server_name) and get_server_tools(server_name)
3. get_tool_details(server_name, tool_name) for the parameter schema
4. manage_server(server_name, action="start")
5. execute_tool(server_name, tool_name, arguments={...})
6. manage_server(server_name, action="shutdown") when finished

## Rules

- Read a tool's schema with get_tool_details before executing it.
- execute_tool never starts a server. Start it first with manage_server.
- Searches and tool listings omit schemas to keep replies small.
- min_score (default 0.3) tunes search sensitivity; server_names narrows a tool search.
- For slow tools pass in_background=true, keep the task_id, and call
  poll_task_result until the status is "completed" or "error".
  Lower priority values run first.

## Offloaded content

Large text results are stored and replaced by a note carrying
[Reference: <id>]. Images and audio are always stored that way.
Call get_content(ref_id="<id>") for the full entry, or add chunk_index
to read one chunk of a long text.
"#;

/// Description of the umbrella tool, listing the indexed servers.
pub fn router_description(server_index: &str) -> String {
    format!(
        r#"Single entry point to every mcp-runtime operation. Set 'operation' and the fields that operation needs; all other fields are ignored.

OPERATIONS

- search_tools: requires query; optional limit, min_score, server_names, tool_type, enabled
- search_servers: requires query; optional limit, min_score
- get_server_info: requires server_name
- get_server_tools: requires server_name; optional limit, offset (no schemas)
- get_tool_details: requires server_name, tool_name (full schema)
- list_servers: optional limit, offset
- get_statistics: no fields
- manage_server: requires server_name; action 'start' (default) or 'shutdown'
- list_running_servers: no fields
- execute_tool: requires server_name, tool_name; optional arguments, timeout, in_background, priority
- poll_task_result: requires task_id
- get_content: requires ref_id; optional chunk_index
- readme: no fields

WORKFLOW
search_tools -> get_tool_details -> manage_server(start) -> execute_tool -> manage_server(shutdown)

NOTES
- Prefer search_tools over paging through list_servers.
- Never execute a tool before reading its schema, and never on a server that is not running.
- Background tasks return a task_id; poll it with poll_task_result.
- A reply containing [Reference: <id>] was offloaded; read it with get_content, one chunk at a time with chunk_index.

INDEXED SERVERS
{server_index}
"#
    )
}

/// Fetch the indexed servers and render them for [`router_description`].
pub async fn load_server_index(discovery: &dyn DiscoveryPort) -> Result<String, DiscoveryError> {
    let stats = discovery.get_statistics().await?;
    let limit = match u32::try_from(stats.total_servers) {
        Ok(0) => Page::DEFAULT_LIMIT,
        Ok(total) => total,
        Err(_) => u32::MAX,
    };
    let listing = discovery.list_servers(Page::new(limit, 0)).await?;

    let entries: Vec<String> = listing
        .get("servers")
        .and_then(Value::as_array)
        .map(|servers| servers.iter().map(render_server).collect())
        .unwrap_or_default();

    if entries.is_empty() {
        return Ok("No servers indexed yet".to_string());
    }
    Ok(entries.join("\n###\n"))
}

fn render_server(server: &Value) -> String {
    let field = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| server.get(*k).filter(|v| !v.is_null()))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    };
    let nb_tools = keys_u64(server, &["nbTools", "nb_tools"]);
    format!(
        "server_name: {}\ntitle: {}\nnb_tools: {nb_tools}",
        field(&["name", "server_name"]),
        field(&["title"]),
    )
}

fn keys_u64(value: &Value, keys: &[&str]) -> u64 {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_u64))
        .unwrap_or(0)
}
