//! Plot Region
//!
//! Block-space geometry and the chunk accessor contract that bulk plot
//! edits are written against. Regions are split into per-chunk slices so
//! every unit of work touches a bounded, known set of chunk columns.

mod accessor;
mod block;
mod error;
pub mod memory;
mod pos;
mod region;

pub use accessor::{AccessorFactory, RegionAccessor};
pub use block::{Biome, BlockState, EntityId, EntityRecord};
pub use error::{AccessError, AccessResult, RegionError, RegionResult};
pub use memory::{MemoryAccessor, MemoryWorld};
pub use pos::{BlockPos, CHUNK_SIZE, ChunkPos, LocalPos};
pub use region::{ChunkSlice, LocalArea, Region, TransferPiece, WorldBounds};
