#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

mod client;
mod config;
mod error;
mod http;
mod port;
mod url;

// ============================================================================
// Public API
// ============================================================================

pub use client::{DefaultDiscoveryClient, DiscoveryClient};
pub use config::DiscoveryClientConfig;
pub use error::ClientError;
