//! Request and response types for the discovery service.
//!
//! Response types keep unknown fields in `extra` so that whatever the
//! discovery service adds is passed through to the agent untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys that carry a tool's parameter schema in discovery payloads.
pub const SCHEMA_KEYS: [&str; 2] = ["tool_schema", "inputSchema"];

/// Natural-language tool search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSearchQuery {
    pub query: String,
    pub limit: u32,
    pub min_score: f64,
    /// Restrict results to these servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_names: Option<Vec<String>>,
    /// One of `app`, `mcp`, `custom`, `base`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_type: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl ToolSearchQuery {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const DEFAULT_MIN_SCORE: f64 = 0.3;

    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: Self::DEFAULT_LIMIT,
            min_score: Self::DEFAULT_MIN_SCORE,
            server_names: None,
            tool_type: None,
            enabled: true,
        }
    }
}

/// Natural-language server search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSearchQuery {
    pub query: String,
    pub limit: u32,
    pub min_score: f64,
}

impl ServerSearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: ToolSearchQuery::DEFAULT_LIMIT,
            min_score: ToolSearchQuery::DEFAULT_MIN_SCORE,
        }
    }
}

/// Pagination window for listing endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 50;

    pub const fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT, 0)
    }
}

/// Descriptive information about a registered server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub server_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub limitations: Vec<String>,
    #[serde(default)]
    pub nb_tools: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full description of one tool, including its parameter schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub tool_name: String,
    #[serde(default)]
    pub tool_description: String,
    #[serde(default)]
    pub tool_schema: Map<String, Value>,
    #[serde(default)]
    pub server_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Aggregate counts reported by the discovery service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryStatistics {
    #[serde(default)]
    pub total_servers: u64,
    #[serde(default)]
    pub total_tools: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw JSON object returned by search and listing endpoints.
pub type JsonObject = Map<String, Value>;

/// Remove parameter schemas from every entry of `object[list_key]`.
///
/// Listings sent to the agent stay small; the full schema is only returned
/// by the tool-details lookup.
pub fn strip_tool_schemas(object: &mut JsonObject, list_key: &str) {
    if let Some(Value::Array(items)) = object.get_mut(list_key) {
        for item in items {
            if let Value::Object(fields) = item {
                for key in SCHEMA_KEYS {
                    fields.remove(key);
                }
            }
        }
    }
}
