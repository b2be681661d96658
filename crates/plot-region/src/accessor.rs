//! The narrow contract between bulk edits and host world storage.
//!
//! The host hands out one [`RegionAccessor`] per chunk through an
//! [`AccessorFactory`]. Writes made through an accessor are visible to reads
//! on that same accessor immediately, and reach the world only when the
//! accessor is committed. Dropping an accessor without committing discards
//! everything it staged.

use bytes::Bytes;

use crate::{AccessResult, Biome, BlockState, ChunkPos, EntityId, EntityRecord, LocalArea, LocalPos};

/// Read/write view of one chunk column.
pub trait RegionAccessor {
    /// The chunk this accessor is bound to.
    fn chunk(&self) -> ChunkPos;

    fn read_block(&self, pos: LocalPos) -> AccessResult<BlockState>;

    fn write_block(&mut self, pos: LocalPos, block: BlockState) -> AccessResult<()>;

    fn read_biome(&self, pos: LocalPos) -> AccessResult<Biome>;

    fn write_biome(&mut self, pos: LocalPos, biome: Biome) -> AccessResult<()>;

    /// Entities whose block position falls inside `area`.
    fn list_entities(&self, area: &LocalArea) -> AccessResult<Vec<EntityRecord>>;

    /// Spawn an entity at a chunk-local position.
    fn spawn_entity(&mut self, pos: [f64; 3], payload: Bytes) -> AccessResult<EntityId>;

    /// Remove an entity. Returns `false` if it was not in this chunk.
    fn remove_entity(&mut self, id: EntityId) -> AccessResult<bool>;

    /// Restore `area` to what the world generator produces for it.
    fn regenerate(&mut self, area: &LocalArea) -> AccessResult<()>;

    /// Publish staged writes to the world.
    fn commit(self) -> AccessResult<()>
    where
        Self: Sized;

    /// Set every block in `area`. Returns the number of blocks written.
    fn fill(&mut self, area: &LocalArea, block: &BlockState) -> AccessResult<u64> {
        for pos in area.positions() {
            self.write_block(pos, block.clone())?;
        }
        Ok(area.volume())
    }

    /// Remove every entity inside `area`. Returns how many were removed.
    fn remove_entities_in(&mut self, area: &LocalArea) -> AccessResult<u64> {
        let mut removed = 0;
        for entity in self.list_entities(area)? {
            if self.remove_entity(entity.id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Source of chunk accessors, provided by the host world.
///
/// `open` is called from the queue pump, possibly from several rayon workers
/// at once for different chunks, but never twice for the same chunk while an
/// accessor for it is alive.
pub trait AccessorFactory: Sync {
    type Accessor<'a>: RegionAccessor + Send
    where
        Self: 'a;

    /// Open an accessor for `chunk`.
    ///
    /// Returns [`AccessError::ChunkUnavailable`](crate::AccessError::ChunkUnavailable)
    /// when the chunk cannot be accessed yet; the caller retries later instead
    /// of blocking.
    fn open(&self, chunk: ChunkPos) -> AccessResult<Self::Accessor<'_>>;
}

impl<F: AccessorFactory + Send> AccessorFactory for std::sync::Arc<F> {
    type Accessor<'a>
        = F::Accessor<'a>
    where
        Self: 'a;

    fn open(&self, chunk: ChunkPos) -> AccessResult<Self::Accessor<'_>> {
        (**self).open(chunk)
    }
}
