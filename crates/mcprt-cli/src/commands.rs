//! Subcommands.

use clap::{Args, Subcommand};
use mcprt_server::{FrontendTransport, ServeConfig};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the MCP runtime server
    Serve(ServeArgs),
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ServeArgs {
    /// Front-end transport: stdio, sse or streamable-http
    #[arg(long, env = "MCPRT_TRANSPORT", default_value = "stdio")]
    pub transport: FrontendTransport,

    /// Bind address for the network transports
    #[arg(long, env = "MCPRT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the network transports
    #[arg(long, env = "MCPRT_PORT", default_value_t = 8001)]
    pub port: u16,
}

impl ServeArgs {
    pub fn to_config(&self) -> ServeConfig {
        ServeConfig {
            transport: self.transport,
            host: self.host.clone(),
            port: self.port,
        }
    }
}
