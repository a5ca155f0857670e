//! Priority queue of background tasks.
//!
//! Pure synchronous state machine (no async, no IO, no tracing); the
//! executor provides locking.
//!
//! # Ordering
//!
//! - Lower `priority` runs sooner
//! - Equal priorities run in enqueue order (each push gets the next sequence number)

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use mcprt_core::TaskId;

/// One waiting task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTask {
    pub task_id: TaskId,
    pub priority: i64,
    /// Enqueue order, unique per queue.
    pub seq: u64,
}

impl Ord for QueuedTask {
    // BinaryHeap is a max-heap: the "greatest" item is the one to run next.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Waiting tasks ordered by `(priority, seq)`.
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<QueuedTask>,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task; returns its sequence number.
    pub fn push(&mut self, task_id: TaskId, priority: i64) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedTask {
            task_id,
            priority,
            seq,
        });
        seq
    }

    /// Remove and return the task that should run next.
    pub fn pop(&mut self) -> Option<QueuedTask> {
        self.heap.pop()
    }

    pub fn peek(&self) -> Option<&QueuedTask> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Remove every task, in run order.
    pub fn drain(&mut self) -> Vec<QueuedTask> {
        let mut drained = Vec::with_capacity(self.heap.len());
        while let Some(task) = self.heap.pop() {
            drained.push(task);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(tasks: &[QueuedTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.task_id.as_str()).collect()
    }

    #[test]
    fn test_lower_priority_value_runs_first() {
        let mut queue = TaskQueue::new();
        queue.push("slow".into(), 10);
        queue.push("urgent".into(), 0);
        queue.push("normal".into(), 1);

        assert_eq!(ids(&queue.drain()), vec!["urgent", "normal", "slow"]);
    }

    #[test]
    fn test_equal_priorities_are_fifo() {
        let mut queue = TaskQueue::new();
        for name in ["a", "b", "c", "d"] {
            queue.push(name.into(), 1);
        }
        queue.push("first".into(), 0);

        assert_eq!(ids(&queue.drain()), vec!["first", "a", "b", "c", "d"]);
    }

    #[test]
    fn test_negative_priorities() {
        let mut queue = TaskQueue::new();
        queue.push("zero".into(), 0);
        queue.push("minus".into(), -5);
        assert_eq!(queue.pop().unwrap().task_id.as_str(), "minus");
    }

    #[test]
    fn test_interleaved_push_pop() {
        let mut queue = TaskQueue::new();
        queue.push("a".into(), 5);
        queue.push("b".into(), 5);
        assert_eq!(queue.pop().unwrap().task_id.as_str(), "a");

        queue.push("c".into(), 1);
        queue.push("d".into(), 5);
        assert_eq!(ids(&queue.drain()), vec!["c", "b", "d"]);
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let mut queue = TaskQueue::new();
        assert_eq!(queue.push("a".into(), 1), 0);
        assert_eq!(queue.push("b".into(), 1), 1);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek().unwrap().seq, 0);

        queue.drain();
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }
}
