//! Discovery service port.

use async_trait::async_trait;

use crate::domain::{
    DiscoveryStatistics, JsonObject, Page, ServerInfo, ServerSearchQuery, StartupConfig, ToolInfo,
    ToolSearchQuery,
};
use crate::error::DiscoveryError;

/// Result type alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Port trait for the discovery service.
///
/// The runtime never keeps local server configuration: everything it knows
/// about servers and tools comes through this interface. The REST
/// implementation lives in `mcprt-discovery`.
///
/// Search and listing operations return the raw JSON object so that fields
/// added by the service reach the agent unchanged.
#[async_trait]
pub trait DiscoveryPort: Send + Sync {
    /// Semantic tool search.
    async fn search_tools(&self, query: &ToolSearchQuery) -> DiscoveryResult<JsonObject>;

    /// Semantic server search.
    async fn search_servers(&self, query: &ServerSearchQuery) -> DiscoveryResult<JsonObject>;

    async fn get_server_info(&self, server_name: &str) -> DiscoveryResult<ServerInfo>;

    /// One page of the tools registered for a server.
    async fn get_server_tools(&self, server_name: &str, page: Page) -> DiscoveryResult<JsonObject>;

    /// Full description of one tool, schema included.
    async fn get_tool_details(&self, server_name: &str, tool_name: &str)
    -> DiscoveryResult<ToolInfo>;

    /// One page of all registered servers.
    async fn list_servers(&self, page: Page) -> DiscoveryResult<JsonObject>;

    async fn get_statistics(&self) -> DiscoveryResult<DiscoveryStatistics>;

    /// Startup configuration used to spawn or connect to a server.
    ///
    /// The returned value has already passed validation.
    async fn get_startup_config(&self, server_name: &str) -> DiscoveryResult<StartupConfig>;
}
