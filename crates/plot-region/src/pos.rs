//! Block, chunk, and chunk-local coordinates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Horizontal size of a chunk column in blocks.
pub const CHUNK_SIZE: i32 = 16;

/// A block position in world coordinates.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Offset by a delta, returning `None` on overflow.
    #[must_use]
    pub fn checked_offset(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
            z: self.z.checked_add(dz)?,
        })
    }

    /// Component-wise difference `self - other`.
    #[must_use]
    pub const fn delta(self, other: Self) -> (i32, i32, i32) {
        (self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// The chunk column containing this block.
    #[must_use]
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos {
            x: self.x.div_euclid(CHUNK_SIZE),
            z: self.z.div_euclid(CHUNK_SIZE),
        }
    }

    /// Position of this block inside its chunk column.
    #[must_use]
    pub const fn local(self) -> LocalPos {
        LocalPos {
            x: self.x.rem_euclid(CHUNK_SIZE) as u8,
            y: self.y,
            z: self.z.rem_euclid(CHUNK_SIZE) as u8,
        }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Chunk column coordinates.
///
/// Ordering is Z-major, then X, which is the order bulk edits visit chunks in.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The chunk column containing `pos`.
    #[must_use]
    pub const fn containing(pos: BlockPos) -> Self {
        pos.chunk()
    }

    /// World X of the chunk's first block column.
    #[must_use]
    pub const fn min_block_x(self) -> i32 {
        self.x * CHUNK_SIZE
    }

    /// World Z of the chunk's first block column.
    #[must_use]
    pub const fn min_block_z(self) -> i32 {
        self.z * CHUNK_SIZE
    }

    /// Convert a chunk-local position back to world coordinates.
    #[must_use]
    pub const fn to_world(self, local: LocalPos) -> BlockPos {
        BlockPos {
            x: self.min_block_x() + local.x as i32,
            y: local.y,
            z: self.min_block_z() + local.z as i32,
        }
    }
}

impl PartialOrd for ChunkPos {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChunkPos {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.z.cmp(&other.z).then(self.x.cmp(&other.x))
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk({}, {})", self.x, self.z)
    }
}

/// A block position inside one chunk column.
///
/// `x` and `z` are in `0..CHUNK_SIZE`; `y` is the world height, since a
/// column spans the full build height.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug, Default)]
pub struct LocalPos {
    pub x: u8,
    pub y: i32,
    pub z: u8,
}

impl LocalPos {
    #[must_use]
    pub const fn new(x: u8, y: i32, z: u8) -> Self {
        debug_assert!((x as i32) < CHUNK_SIZE && (z as i32) < CHUNK_SIZE);
        Self { x, y, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_to_chunk() {
        assert_eq!(BlockPos::new(0, 0, 0).chunk(), ChunkPos::new(0, 0));
        assert_eq!(BlockPos::new(15, 90, 15).chunk(), ChunkPos::new(0, 0));
        assert_eq!(BlockPos::new(16, 0, 0).chunk(), ChunkPos::new(1, 0));
        assert_eq!(BlockPos::new(-1, 0, -1).chunk(), ChunkPos::new(-1, -1));
        assert_eq!(BlockPos::new(-16, 0, -17).chunk(), ChunkPos::new(-1, -2));
    }

    #[test]
    fn local_roundtrip_with_negative_coordinates() {
        for pos in [
            BlockPos::new(-1, -64, -1),
            BlockPos::new(17, 5, -33),
            BlockPos::new(0, 0, 0),
        ] {
            let local = pos.local();
            assert!(i32::from(local.x) < CHUNK_SIZE);
            assert!(i32::from(local.z) < CHUNK_SIZE);
            assert_eq!(pos.chunk().to_world(local), pos);
        }
    }

    #[test]
    fn chunk_order_is_z_major() {
        let mut chunks = vec![
            ChunkPos::new(1, 1),
            ChunkPos::new(0, 1),
            ChunkPos::new(1, 0),
            ChunkPos::new(0, 0),
        ];
        chunks.sort();
        assert_eq!(
            chunks,
            vec![
                ChunkPos::new(0, 0),
                ChunkPos::new(1, 0),
                ChunkPos::new(0, 1),
                ChunkPos::new(1, 1),
            ]
        );
    }

    #[test]
    fn checked_offset_detects_overflow() {
        assert_eq!(BlockPos::new(i32::MAX, 0, 0).checked_offset(1, 0, 0), None);
        assert_eq!(
            BlockPos::new(1, 2, 3).checked_offset(1, -2, 3),
            Some(BlockPos::new(2, 0, 6))
        );
    }
}
