#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

mod channel;
mod connector;
mod http;
mod protocol;
mod registry;
mod stdio;

pub use channel::RpcChannel;
pub use connector::McpConnector;
pub use http::HttpSession;
pub use protocol::PROTOCOL_VERSION;
pub use registry::SessionRegistry;
pub use stdio::StdioSession;
