#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod error;
pub mod paths;
pub mod ports;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types for convenience
pub use domain::{
    ContentBlock, ContentEntry, ContentKind, DEFAULT_PRIORITY, DiscoveryStatistics,
    ExecuteOutcome, ExecuteRequest, JsonObject, LifecycleReport, Page, RawStartupConfig,
    RetrievedContent, ServerInfo, ServerSearchQuery, SessionSnapshot, SessionStatus,
    StartupConfig, TaskId, TaskPoll, TaskRecord, TaskStatus, ToolCall, ToolInfo, ToolOutput,
    ToolSearchQuery, TransportKind, strip_tool_schemas,
};
pub use error::{ConfigError, DiscoveryError, RuntimeError, RuntimeResult, SessionError};
pub use paths::{PathError, data_root, default_offload_dir, ensure_directory};
pub use ports::{
    CaptionError, DiscoveryPort, DiscoveryResult, ImageCaptioner, NoopCaptioner,
    SessionConnector, ToolSession,
};
pub use settings::{RuntimeSettings, SettingsError};

#[cfg(test)]
use tempfile as _;
