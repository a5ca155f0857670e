#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

mod executor;
pub mod ledger;
pub mod queue;

pub use executor::{SHUTDOWN_MESSAGE, TaskExecutor};
pub use ledger::{LedgerError, TaskLedger};
pub use queue::{QueuedTask, TaskQueue};

#[cfg(test)]
use tempfile as _;
