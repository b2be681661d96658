use plot_region::{AccessError, ChunkPos};
use thiserror::Error;

/// Why a chunk task ended up Failed. Recorded in the operation summary,
/// never returned from the pump.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The chunk stayed unavailable through every retry.
    #[error("{chunk} still unavailable after {attempts} attempts")]
    ChunkUnavailable { chunk: ChunkPos, attempts: u32 },

    /// The host reported a permanent fault.
    #[error("accessor fault: {0}")]
    AccessorFault(AccessError),

    /// The task panicked while running. Its staged writes were discarded.
    #[error("task panicked: {0}")]
    Panicked(String),
}
