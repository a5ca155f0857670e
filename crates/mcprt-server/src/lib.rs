#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tower as _;

pub mod engine;
pub mod protocol;
pub mod router;
pub mod transport;

// Re-export primary types
pub use engine::{EngineDeps, RuntimeEngine, run_scoped};
pub use protocol::McpHandler;
pub use router::{Operation, SEMANTIC_ROUTER, ToolReply, ToolRouter};
pub use transport::{FrontendTransport, HttpError, ServeConfig, serve};
