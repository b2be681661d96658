//! Plot Manager
//!
//! The façade over the bulk-edit pipeline: validates requests against the
//! world bounds, plans them into chunk tasks, queues them, and pumps the
//! queue from the host tick, reporting each finished operation to the
//! registered listeners.

mod config;
mod error;
mod host;
mod manager;
mod planner;

pub use config::ManagerConfig;
pub use error::{ManagerError, ManagerResult, PlanningError, PlanningResult};
pub use host::{CompletionListener, LogListener, TickHook, TickHost, TickLoop};
pub use manager::{ChunkManager, TickReport};
pub use planner::{BulkOperation, Planner};
pub use plot_queue::{OperationSummary, Priority, Progress, QueueConfig, QueueHandle};
