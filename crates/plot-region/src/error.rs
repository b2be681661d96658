//! Region and accessor error types.

use thiserror::Error;

use crate::{BlockPos, ChunkPos};

/// Invalid region geometry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// A minimum corner lies above its maximum corner.
    #[error("inverted region: min {min} is above max {max}")]
    Inverted { min: BlockPos, max: BlockPos },

    /// A region with a zero-sized axis.
    #[error("region has no blocks")]
    Empty,

    /// Coordinates left the `i32` range.
    #[error("region coordinates overflow")]
    Overflow,
}

/// Result type for region geometry.
pub type RegionResult<T> = Result<T, RegionError>;

/// Failure reported by the host while accessing a chunk.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The chunk is not loaded yet. Transient: retry on a later tick.
    #[error("{0} is not available")]
    ChunkUnavailable(ChunkPos),

    /// The host refused or failed the access. Permanent.
    #[error("{chunk} access fault: {reason}")]
    Fault { chunk: ChunkPos, reason: String },
}

impl AccessError {
    /// Create a permanent fault.
    #[must_use]
    pub fn fault(chunk: ChunkPos, reason: impl Into<String>) -> Self {
        Self::Fault {
            chunk,
            reason: reason.into(),
        }
    }

    /// Whether retrying later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ChunkUnavailable(_))
    }

    /// The chunk the error refers to.
    #[must_use]
    pub const fn chunk(&self) -> ChunkPos {
        match self {
            Self::ChunkUnavailable(chunk) | Self::Fault { chunk, .. } => *chunk,
        }
    }
}

/// Result type for accessor calls.
pub type AccessResult<T> = Result<T, AccessError>;
