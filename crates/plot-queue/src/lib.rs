//! Plot Queue
//!
//! Turns bulk edits into chunk tasks and applies them a slice at a time, so
//! the host tick keeps running while large regions are rewritten.
//!
//! - [`ChunkTask`]: one transform bound to one chunk (two for transfers)
//! - [`GlobalQueue`]: per-chunk FIFO admission, priorities, retries, budgets
//! - [`OperationSummary`]: the once-only completion report

mod config;
mod error;
mod operation;
mod queue;
mod task;

pub use config::QueueConfig;
pub use error::TaskError;
pub use operation::{
    ChunkFailure, FinishedOperation, Finisher, OperationSummary, Priority, Progress, QueueHandle,
    TaskId, TaskState,
};
pub use queue::{GlobalQueue, PumpReport, panic_message};
pub use task::{ChunkTask, TaskOperation, TaskStats, TransferMode};
