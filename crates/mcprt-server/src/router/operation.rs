//! The operation table: names, required fields and parameter schemas.

use serde_json::{Map, Value, json};

/// Every operation the router can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Readme,
    SearchTools,
    SearchServers,
    GetServerInfo,
    GetServerTools,
    GetToolDetails,
    ListServers,
    GetStatistics,
    ManageServer,
    ListRunningServers,
    ExecuteTool,
    PollTaskResult,
    GetContent,
}

impl Operation {
    pub const ALL: [Self; 13] = [
        Self::Readme,
        Self::SearchTools,
        Self::SearchServers,
        Self::GetServerInfo,
        Self::GetServerTools,
        Self::GetToolDetails,
        Self::ListServers,
        Self::GetStatistics,
        Self::ManageServer,
        Self::ListRunningServers,
        Self::ExecuteTool,
        Self::PollTaskResult,
        Self::GetContent,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Readme => "readme",
            Self::SearchTools => "search_tools",
            Self::SearchServers => "search_servers",
            Self::GetServerInfo => "get_server_info",
            Self::GetServerTools => "get_server_tools",
            Self::GetToolDetails => "get_tool_details",
            Self::ListServers => "list_servers",
            Self::GetStatistics => "get_statistics",
            Self::ManageServer => "manage_server",
            Self::ListRunningServers => "list_running_servers",
            Self::ExecuteTool => "execute_tool",
            Self::PollTaskResult => "poll_task_result",
            Self::GetContent => "get_content",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Fields that must be present (and non-null).
    pub const fn required(self) -> &'static [&'static str] {
        match self {
            Self::SearchTools | Self::SearchServers => &["query"],
            Self::GetServerInfo | Self::GetServerTools | Self::ManageServer => &["server_name"],
            Self::GetToolDetails | Self::ExecuteTool => &["server_name", "tool_name"],
            Self::PollTaskResult => &["task_id"],
            Self::GetContent => &["ref_id"],
            Self::Readme | Self::ListServers | Self::GetStatistics | Self::ListRunningServers => {
                &[]
            }
        }
    }

    /// Every field the operation reads.
    pub const fn params(self) -> &'static [&'static str] {
        match self {
            Self::SearchTools => &[
                "query",
                "limit",
                "min_score",
                "server_names",
                "tool_type",
                "enabled",
            ],
            Self::SearchServers => &["query", "limit", "min_score"],
            Self::GetServerInfo => &["server_name"],
            Self::GetServerTools => &["server_name", "limit", "offset"],
            Self::GetToolDetails => &["server_name", "tool_name"],
            Self::ListServers => &["limit", "offset"],
            Self::ManageServer => &["server_name", "action"],
            Self::ExecuteTool => &[
                "server_name",
                "tool_name",
                "arguments",
                "timeout",
                "in_background",
                "priority",
            ],
            Self::PollTaskResult => &["task_id"],
            Self::GetContent => &["ref_id", "chunk_index"],
            Self::Readme | Self::GetStatistics | Self::ListRunningServers => &[],
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Readme => {
                "Usage guide for the runtime. Read it first to learn the discover, start, execute workflow."
            }
            Self::SearchTools => {
                "Semantic search over indexed tools. Results carry no parameter schemas; use get_tool_details for those."
            }
            Self::SearchServers => "Semantic search over indexed servers.",
            Self::GetServerInfo => "Capabilities, limitations and tool count of one server.",
            Self::GetServerTools => {
                "One page of a server's tools, without parameter schemas. Use get_tool_details for a schema."
            }
            Self::GetToolDetails => "Full description and parameter schema of one tool.",
            Self::ListServers => "One page of all registered servers.",
            Self::GetStatistics => "Total number of indexed servers and tools.",
            Self::ManageServer => "Start or shut down a server session. action is 'start' or 'shutdown'.",
            Self::ListRunningServers => "Names of the servers with a live session.",
            Self::ExecuteTool => {
                "Run a tool on a running server, inline or as a background task (in_background=true)."
            }
            Self::PollTaskResult => "Status of a background task, with its result once finished.",
            Self::GetContent => {
                "Read offloaded content by reference id; chunk_index selects one chunk of a long text."
            }
        }
    }

    /// JSON schema of the operation's own tool.
    pub fn input_schema(self) -> Value {
        object_schema(self.params().iter().copied(), self.required())
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Schema of the umbrella tool: `operation` plus the union of all fields.
pub fn router_input_schema() -> Value {
    let mut names: Vec<&'static str> = Vec::new();
    for op in Operation::ALL {
        for param in op.params() {
            if !names.contains(param) {
                names.push(param);
            }
        }
    }

    let mut schema = object_schema(names.into_iter(), &["operation"]);
    let operations: Vec<&str> = Operation::ALL.iter().map(|op| op.name()).collect();
    if let Some(Value::Object(properties)) = schema.get_mut("properties") {
        properties.insert(
            "operation".to_string(),
            json!({
                "type": "string",
                "enum": operations,
                "description": "The operation to perform"
            }),
        );
    }
    schema
}

fn object_schema(params: impl Iterator<Item = &'static str>, required: &[&str]) -> Value {
    let properties: Map<String, Value> = params
        .map(|name| (name.to_string(), property(name)))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn property(name: &str) -> Value {
    match name {
        "query" => json!({"type": "string", "description": "Natural-language search query"}),
        "limit" => json!({
            "type": "integer",
            "minimum": 0,
            "description": "Maximum number of results (10 for searches, 50 for listings)"
        }),
        "min_score" => json!({
            "type": "number",
            "description": "Minimum similarity score between 0 and 1 (default 0.3)"
        }),
        "server_name" => json!({"type": "string", "description": "Server to operate on"}),
        "server_names" => json!({
            "type": "array",
            "items": {"type": "string"},
            "description": "Restrict tool search to these servers"
        }),
        "tool_name" => json!({"type": "string", "description": "Tool to describe or run"}),
        "tool_type" => json!({
            "type": "string",
            "enum": ["app", "mcp", "custom", "base"],
            "description": "Restrict tool search to one tool type"
        }),
        "enabled" => json!({
            "type": "boolean",
            "description": "Only enabled tools (default true)"
        }),
        "offset" => json!({"type": "integer", "minimum": 0, "description": "Pagination offset"}),
        "action" => json!({
            "type": "string",
            "enum": ["start", "shutdown"],
            "description": "Lifecycle action (default start)"
        }),
        "arguments" => json!({
            "type": "object",
            "description": "Tool arguments matching the tool's schema"
        }),
        "timeout" => json!({
            "type": "number",
            "exclusiveMinimum": 0,
            "description": "Execution timeout in seconds (default 60)"
        }),
        "in_background" => json!({
            "type": "boolean",
            "description": "Queue the call and return a task id (default false)"
        }),
        "priority" => json!({
            "type": "integer",
            "description": "Background priority; lower runs first (default 1)"
        }),
        "task_id" => json!({"type": "string", "description": "Background task id"}),
        "ref_id" => json!({"type": "string", "description": "Reference id of offloaded content"}),
        "chunk_index" => json!({
            "type": "integer",
            "minimum": 0,
            "description": "Chunk to read; omit for the whole entry"
        }),
        _ => json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name("delete_everything"), None);
    }

    #[test]
    fn required_fields_are_declared_params() {
        for op in Operation::ALL {
            for field in op.required() {
                assert!(op.params().contains(field), "{op} requires undeclared {field}");
            }
        }
    }

    #[test]
    fn router_schema_covers_every_param_once() {
        let schema = router_input_schema();
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("operation"));
        assert!(properties.contains_key("chunk_index"));
        assert!(properties.contains_key("server_names"));
        assert_eq!(schema["required"], json!(["operation"]));
        assert_eq!(
            properties["operation"]["enum"].as_array().unwrap().len(),
            Operation::ALL.len()
        );
    }

    #[test]
    fn execute_schema_requires_server_and_tool() {
        let schema = Operation::ExecuteTool.input_schema();
        assert_eq!(schema["required"], json!(["server_name", "tool_name"]));
        assert_eq!(schema["properties"]["priority"]["type"], "integer");
    }
}
