//! Task records and their state machine.
//!
//! `Queued → Running → Completed | Failed`, plus `Queued → Failed` for tasks
//! abandoned at shutdown. Terminal records are never rewritten.

use std::collections::HashMap;

use chrono::Utc;
use mcprt_core::{ContentBlock, TaskId, TaskPoll, TaskRecord, TaskStatus};
use thiserror::Error;

/// Rejected ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Task '{0}' not found")]
    NotFound(TaskId),

    #[error("Task '{task_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// All task records of one executor, keyed by id.
#[derive(Debug, Default)]
pub struct TaskLedger {
    records: HashMap<TaskId, TaskRecord>,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add a freshly queued record.
    pub fn insert(&mut self, record: TaskRecord) {
        self.records.insert(record.task_id.clone(), record);
    }

    pub fn get(&self, task_id: &TaskId) -> Option<&TaskRecord> {
        self.records.get(task_id)
    }

    pub fn poll(&self, task_id: &TaskId) -> Result<TaskPoll, LedgerError> {
        self.records
            .get(task_id)
            .map(TaskRecord::poll)
            .ok_or_else(|| LedgerError::NotFound(task_id.clone()))
    }

    /// Count of records in `status`.
    pub fn count(&self, status: TaskStatus) -> usize {
        self.records.values().filter(|r| r.status == status).count()
    }

    fn transition(
        &mut self,
        task_id: &TaskId,
        next: TaskStatus,
    ) -> Result<&mut TaskRecord, LedgerError> {
        let record = self
            .records
            .get_mut(task_id)
            .ok_or_else(|| LedgerError::NotFound(task_id.clone()))?;

        if !record.status.can_transition_to(next) {
            return Err(LedgerError::InvalidTransition {
                task_id: task_id.clone(),
                from: record.status,
                to: next,
            });
        }
        record.status = next;
        Ok(record)
    }

    /// `Queued → Running`.
    pub fn mark_running(&mut self, task_id: &TaskId) -> Result<&TaskRecord, LedgerError> {
        let record = self.transition(task_id, TaskStatus::Running)?;
        record.started_at = Some(Utc::now());
        Ok(record)
    }

    /// `Running → Completed` with the processed result.
    pub fn complete(
        &mut self,
        task_id: &TaskId,
        result: Vec<ContentBlock>,
    ) -> Result<(), LedgerError> {
        let record = self.transition(task_id, TaskStatus::Completed)?;
        record.finished_at = Some(Utc::now());
        record.result = Some(result);
        Ok(())
    }

    /// `Queued | Running → Failed` with an error message.
    pub fn fail(&mut self, task_id: &TaskId, error: impl Into<String>) -> Result<(), LedgerError> {
        let record = self.transition(task_id, TaskStatus::Failed)?;
        record.finished_at = Some(Utc::now());
        record.error = Some(error.into());
        Ok(())
    }
}
