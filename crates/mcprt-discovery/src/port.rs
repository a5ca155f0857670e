//! `DiscoveryPort` implementation for `DiscoveryClient`.

use async_trait::async_trait;
use mcprt_core::{
    DiscoveryError, DiscoveryPort, DiscoveryResult, DiscoveryStatistics, JsonObject, Page,
    RawStartupConfig, ServerInfo, ServerSearchQuery, StartupConfig, ToolInfo, ToolSearchQuery,
};

use crate::client::DiscoveryClient;
use crate::error::ClientError;
use crate::http::HttpBackend;
use crate::url;

// ============================================================================
// Error Mapping
// ============================================================================

fn map_error(err: ClientError) -> DiscoveryError {
    match err {
        ClientError::ApiRequestFailed { status, url, body } => match status {
            404 => DiscoveryError::NotFound { resource: url },
            401 | 403 => DiscoveryError::Unauthorized { status },
            _ => DiscoveryError::Http {
                status,
                message: if body.is_empty() { url } else { body },
            },
        },
        ClientError::InvalidResponse { message } => DiscoveryError::InvalidResponse { message },
        ClientError::Network(e) => DiscoveryError::Network {
            message: e.to_string(),
        },
        ClientError::InvalidUrl(e) => DiscoveryError::Configuration {
            message: e.to_string(),
        },
        ClientError::JsonParse(e) => DiscoveryError::InvalidResponse {
            message: e.to_string(),
        },
    }
}

// ============================================================================
// Port Implementation
// ============================================================================

#[async_trait]
impl<B: HttpBackend> DiscoveryPort for DiscoveryClient<B> {
    async fn search_tools(&self, query: &ToolSearchQuery) -> DiscoveryResult<JsonObject> {
        let url = url::tool_search_url(&self.base_url);
        self.backend.post_json(&url, query).await.map_err(map_error)
    }

    async fn search_servers(&self, query: &ServerSearchQuery) -> DiscoveryResult<JsonObject> {
        let url = url::server_search_url(&self.base_url);
        self.backend.post_json(&url, query).await.map_err(map_error)
    }

    async fn get_server_info(&self, server_name: &str) -> DiscoveryResult<ServerInfo> {
        let url = url::server_info_url(&self.base_url, server_name);
        self.backend.get_json(&url).await.map_err(map_error)
    }

    async fn get_server_tools(&self, server_name: &str, page: Page) -> DiscoveryResult<JsonObject> {
        let url = url::server_tools_url(&self.base_url, server_name, page);
        self.backend.get_json(&url).await.map_err(map_error)
    }

    async fn get_tool_details(
        &self,
        server_name: &str,
        tool_name: &str,
    ) -> DiscoveryResult<ToolInfo> {
        let url = url::tool_details_url(&self.base_url, server_name, tool_name);
        self.backend.get_json(&url).await.map_err(map_error)
    }

    async fn list_servers(&self, page: Page) -> DiscoveryResult<JsonObject> {
        let url = url::list_servers_url(&self.base_url, page);
        self.backend.get_json(&url).await.map_err(map_error)
    }

    async fn get_statistics(&self) -> DiscoveryResult<DiscoveryStatistics> {
        let url = url::statistics_url(&self.base_url);
        self.backend.get_json(&url).await.map_err(map_error)
    }

    async fn get_startup_config(&self, server_name: &str) -> DiscoveryResult<StartupConfig> {
        let url = url::startup_config_url(&self.base_url, server_name);
        let raw: RawStartupConfig = self.backend.get_json(&url).await.map_err(map_error)?;
        let config = StartupConfig::new(raw)?;
        tracing::debug!(
            server_name = %server_name,
            transport = %config.transport(),
            "fetched startup config"
        );
        Ok(config)
    }
}
