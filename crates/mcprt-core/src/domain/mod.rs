//! Domain types for the runtime.
//!
//! Pure data with validation; no I/O.

pub mod content;
pub mod discovery;
pub mod session;
pub mod startup;
pub mod task;

pub use content::{ContentBlock, ContentEntry, ContentKind, RetrievedContent, ToolOutput};
pub use discovery::{
    DiscoveryStatistics, JsonObject, Page, SCHEMA_KEYS, ServerInfo, ServerSearchQuery, ToolInfo,
    ToolSearchQuery, strip_tool_schemas,
};
pub use session::{LifecycleReport, SessionSnapshot, SessionStatus};
pub use startup::{DEFAULT_CONNECT_TIMEOUT_SECS, RawStartupConfig, StartupConfig, TransportKind};
pub use task::{
    DEFAULT_PRIORITY, ExecuteOutcome, ExecuteRequest, TaskId, TaskPoll, TaskRecord, TaskStatus,
    ToolCall,
};
