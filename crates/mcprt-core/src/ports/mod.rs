//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the engine expects from infrastructure. They
//! use only domain types; adapters live in their own crates.

pub mod captioner;
pub mod discovery;
pub mod session;

pub use captioner::{CaptionError, ImageCaptioner, NoopCaptioner};
pub use discovery::{DiscoveryPort, DiscoveryResult};
pub use session::{SessionConnector, ToolSession};
