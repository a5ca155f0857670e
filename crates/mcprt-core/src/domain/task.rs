//! Background task records.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::content::ContentBlock;

/// Unique identifier of a background task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Allocate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Status of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued | Self::Running, Self::Failed)
                | (Self::Running, Self::Completed)
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tool invocation against a running server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub server_name: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Deadline for the call itself, excluding queue wait.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

/// Request accepted by the task executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    #[serde(flatten)]
    pub call: ToolCall,
    #[serde(default)]
    pub in_background: bool,
    /// Lower runs sooner.
    #[serde(default = "default_priority")]
    pub priority: i64,
}

/// Priority used when a caller does not pick one.
pub const DEFAULT_PRIORITY: i64 = 1;

const fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

impl ExecuteRequest {
    pub fn new(
        server_name: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
        timeout: Duration,
    ) -> Self {
        Self {
            call: ToolCall {
                server_name: server_name.into(),
                tool_name: tool_name.into(),
                arguments,
                timeout,
            },
            in_background: false,
            priority: DEFAULT_PRIORITY,
        }
    }

    #[must_use]
    pub const fn in_background(mut self, priority: i64) -> Self {
        self.in_background = true;
        self.priority = priority;
        self
    }
}

/// Result of `execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecuteOutcome {
    /// The call ran inline; these are the processed content blocks.
    Completed { content: Vec<ContentBlock> },
    /// The call was queued; poll with this id.
    Queued { task_id: TaskId },
}

/// Full ledger entry for one background task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    #[serde(flatten)]
    pub call: ToolCall,
    pub priority: i64,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<Vec<ContentBlock>>,
    pub error: Option<String>,
}

impl TaskRecord {
    pub fn queued(task_id: TaskId, call: ToolCall, priority: i64) -> Self {
        Self {
            task_id,
            call,
            priority,
            status: TaskStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        }
    }

    /// Poll view of this record.
    pub fn poll(&self) -> TaskPoll {
        match self.status {
            TaskStatus::Completed => TaskPoll::Completed {
                result: self.result.clone().unwrap_or_default(),
            },
            TaskStatus::Failed => TaskPoll::Failed {
                error: self
                    .error
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            },
            state => TaskPoll::Pending { state },
        }
    }
}

/// Answer to `poll(task_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskPoll {
    /// Not done yet.
    #[serde(rename = "running")]
    Pending { state: TaskStatus },
    Completed { result: Vec<ContentBlock> },
    #[serde(rename = "error")]
    Failed { error: String },
}

impl TaskPoll {
    pub const fn is_done(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> ToolCall {
        ToolCall {
            server_name: "fs".to_string(),
            tool_name: "read_file".to_string(),
            arguments: Map::new(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn transitions_follow_state_machine() {
        use TaskStatus::{Completed, Failed, Queued, Running};

        assert!(Queued.can_transition_to(Running));
        assert!(Queued.can_transition_to(Failed));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));

        assert!(!Queued.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Running.can_transition_to(Queued));
    }

    #[test]
    fn poll_reflects_record_state() {
        let mut record = TaskRecord::queued(TaskId::new(), call(), 1);
        assert_eq!(
            record.poll(),
            TaskPoll::Pending {
                state: TaskStatus::Queued
            }
        );
        assert!(!record.poll().is_done());

        record.status = TaskStatus::Failed;
        record.error = Some("boom".to_string());
        assert_eq!(
            record.poll(),
            TaskPoll::Failed {
                error: "boom".to_string()
            }
        );
    }

    #[test]
    fn poll_serializes_like_status_reply() {
        let poll = TaskPoll::Completed {
            result: vec![ContentBlock::text("done")],
        };
        let json = serde_json::to_value(&poll).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result"][0]["text"], "done");

        let pending = serde_json::to_value(TaskPoll::Pending {
            state: TaskStatus::Queued,
        })
        .unwrap();
        assert_eq!(pending["status"], "running");
        assert_eq!(pending["state"], "queued");
    }

    #[test]
    fn background_request_builder_sets_priority() {
        let request =
            ExecuteRequest::new("fs", "read_file", Map::new(), Duration::from_secs(1)).in_background(0);
        assert!(request.in_background);
        assert_eq!(request.priority, 0);
    }
}
