//! Regions and their decomposition into chunk slices.
//!
//! A [`Region`] is an inclusive, axis-aligned block box. Bulk edits never
//! touch a region directly; they are split into [`ChunkSlice`]s (one per
//! overlapped chunk column) or, for edits that read one region and write
//! another, into [`TransferPiece`]s that each stay inside a single source
//! chunk and a single destination chunk.
//!
//! ```text
//!   dest chunk grid   |    |    |
//!   source grid (shifted)  :    :    :
//!   pieces            |  : |  : |  :
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pos::{BlockPos, CHUNK_SIZE, ChunkPos, LocalPos};
use crate::{RegionError, RegionResult};

/// An inclusive, non-empty, axis-aligned block box.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Region {
    min: BlockPos,
    max: BlockPos,
}

impl Region {
    /// Create a region from its inclusive corners.
    ///
    /// Fails if `min` is greater than `max` on any axis.
    pub fn new(min: BlockPos, max: BlockPos) -> RegionResult<Self> {
        if min.x > max.x || min.y > max.y || min.z > max.z {
            return Err(RegionError::Inverted { min, max });
        }
        Ok(Self { min, max })
    }

    /// Create a region spanning two arbitrary corners.
    #[must_use]
    pub fn from_corners(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// A region covering a single block.
    #[must_use]
    pub const fn single(pos: BlockPos) -> Self {
        Self { min: pos, max: pos }
    }

    /// Create a region from a minimum corner and its size in blocks.
    pub fn with_size(min: BlockPos, width: u32, height: u32, length: u32) -> RegionResult<Self> {
        if width == 0 || height == 0 || length == 0 {
            return Err(RegionError::Empty);
        }
        let max = min
            .checked_offset(
                i32::try_from(width - 1).map_err(|_| RegionError::Overflow)?,
                i32::try_from(height - 1).map_err(|_| RegionError::Overflow)?,
                i32::try_from(length - 1).map_err(|_| RegionError::Overflow)?,
            )
            .ok_or(RegionError::Overflow)?;
        Ok(Self { min, max })
    }

    #[must_use]
    pub const fn min(&self) -> BlockPos {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> BlockPos {
        self.max
    }

    /// Size along X.
    #[must_use]
    pub const fn width(&self) -> u64 {
        (self.max.x as i64 - self.min.x as i64 + 1) as u64
    }

    /// Size along Y.
    #[must_use]
    pub const fn height(&self) -> u64 {
        (self.max.y as i64 - self.min.y as i64 + 1) as u64
    }

    /// Size along Z.
    #[must_use]
    pub const fn length(&self) -> u64 {
        (self.max.z as i64 - self.min.z as i64 + 1) as u64
    }

    /// Number of blocks in the region.
    #[must_use]
    pub const fn volume(&self) -> u64 {
        self.width() * self.height() * self.length()
    }

    #[must_use]
    pub const fn contains(&self, pos: BlockPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    /// Whether `other` lies entirely inside this region.
    #[must_use]
    pub const fn contains_region(&self, other: &Self) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    #[must_use]
    pub const fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    /// The same box moved so that its minimum corner is `new_min`.
    pub fn translated_to(&self, new_min: BlockPos) -> RegionResult<Self> {
        let (dx, dy, dz) = (
            i64::from(new_min.x) - i64::from(self.min.x),
            i64::from(new_min.y) - i64::from(self.min.y),
            i64::from(new_min.z) - i64::from(self.min.z),
        );
        let shift = |v: i32, d: i64| i32::try_from(i64::from(v) + d).map_err(|_| RegionError::Overflow);
        Ok(Self {
            min: new_min,
            max: BlockPos::new(
                shift(self.max.x, dx)?,
                shift(self.max.y, dy)?,
                shift(self.max.z, dz)?,
            ),
        })
    }

    /// Every chunk column the region overlaps, Z-major then X.
    pub fn chunks(&self) -> impl Iterator<Item = ChunkPos> + use<> {
        let (lo, hi) = (self.min.chunk(), self.max.chunk());
        (lo.z..=hi.z).flat_map(move |z| (lo.x..=hi.x).map(move |x| ChunkPos::new(x, z)))
    }

    /// Number of chunk columns the region overlaps.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        let (lo, hi) = (self.min.chunk(), self.max.chunk());
        ((hi.x - lo.x + 1) as usize) * ((hi.z - lo.z + 1) as usize)
    }

    /// Split the region into per-chunk slices, Z-major then X.
    pub fn chunk_slices(&self) -> impl Iterator<Item = ChunkSlice> + use<> {
        let region = *self;
        self.chunks().map(move |chunk| {
            let min_x = region.min.x.max(chunk.min_block_x());
            let max_x = region.max.x.min(chunk.min_block_x() + CHUNK_SIZE - 1);
            let min_z = region.min.z.max(chunk.min_block_z());
            let max_z = region.max.z.min(chunk.min_block_z() + CHUNK_SIZE - 1);
            ChunkSlice {
                chunk,
                area: LocalArea::new(
                    BlockPos::new(min_x, region.min.y, min_z).local(),
                    BlockPos::new(max_x, region.max.y, max_z).local(),
                ),
            }
        })
    }

    /// Split a copy of this region to `dest_min` into pieces that each lie
    /// in exactly one source chunk and one destination chunk.
    ///
    /// Pieces are ordered by destination chunk (Z-major, then X) and, inside
    /// one destination chunk, by source chunk.
    pub fn transfer_pieces(&self, dest_min: BlockPos) -> RegionResult<Vec<TransferPiece>> {
        let dest = self.translated_to(dest_min)?;
        let dx = i64::from(dest.min.x) - i64::from(self.min.x);
        let dz = i64::from(dest.min.z) - i64::from(self.min.z);

        let xs = split_axis(dest.min.x, dest.max.x, dx);
        let zs = split_axis(dest.min.z, dest.max.z, dz);

        let mut pieces = Vec::with_capacity(xs.len() * zs.len());
        for &(z0, z1) in &zs {
            for &(x0, x1) in &xs {
                let dest_lo = BlockPos::new(x0, dest.min.y, z0);
                let dest_hi = BlockPos::new(x1, dest.max.y, z1);
                // The offset is already known to be representable for the
                // whole region, so these subtractions cannot overflow.
                let src_lo = BlockPos::new(
                    (i64::from(x0) - dx) as i32,
                    self.min.y,
                    (i64::from(z0) - dz) as i32,
                );
                let src_hi = BlockPos::new(
                    (i64::from(x1) - dx) as i32,
                    self.max.y,
                    (i64::from(z1) - dz) as i32,
                );
                pieces.push(TransferPiece {
                    source: ChunkSlice {
                        chunk: src_lo.chunk(),
                        area: LocalArea::new(src_lo.local(), src_hi.local()),
                    },
                    dest: ChunkSlice {
                        chunk: dest_lo.chunk(),
                        area: LocalArea::new(dest_lo.local(), dest_hi.local()),
                    },
                });
            }
        }
        pieces.sort_by_key(|p| (p.dest.chunk, p.source.chunk));
        Ok(pieces)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Split `[min, max]` at destination chunk boundaries and at chunk
/// boundaries of the source grid shifted by `shift`.
fn split_axis(min: i32, max: i32, shift: i64) -> Vec<(i32, i32)> {
    let size = i64::from(CHUNK_SIZE);
    let max = i64::from(max);
    let mut start = i64::from(min);
    let mut out = Vec::new();
    while start <= max {
        let next_dest = (start.div_euclid(size) + 1) * size;
        let next_source = ((start - shift).div_euclid(size) + 1) * size + shift;
        let end = (next_dest.min(next_source) - 1).min(max);
        out.push((start as i32, end as i32));
        start = end + 1;
    }
    out
}

/// An inclusive box of chunk-local positions.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct LocalArea {
    pub min: LocalPos,
    pub max: LocalPos,
}

impl LocalArea {
    #[must_use]
    pub const fn new(min: LocalPos, max: LocalPos) -> Self {
        Self { min, max }
    }

    /// The whole column between two heights.
    #[must_use]
    pub const fn column(min_y: i32, max_y: i32) -> Self {
        Self {
            min: LocalPos::new(0, min_y, 0),
            max: LocalPos::new((CHUNK_SIZE - 1) as u8, max_y, (CHUNK_SIZE - 1) as u8),
        }
    }

    #[must_use]
    pub const fn contains(&self, pos: LocalPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    /// Whether an entity at a chunk-local position stands inside the area.
    #[must_use]
    pub fn contains_point(&self, pos: [f64; 3]) -> bool {
        let (x, y, z) = (pos[0].floor(), pos[1].floor(), pos[2].floor());
        x >= f64::from(self.min.x)
            && x <= f64::from(self.max.x)
            && y >= f64::from(self.min.y)
            && y <= f64::from(self.max.y)
            && z >= f64::from(self.min.z)
            && z <= f64::from(self.max.z)
    }

    /// Number of blocks in the area.
    #[must_use]
    pub const fn volume(&self) -> u64 {
        let w = (self.max.x - self.min.x) as u64 + 1;
        let h = (self.max.y as i64 - self.min.y as i64) as u64 + 1;
        let l = (self.max.z - self.min.z) as u64 + 1;
        w * h * l
    }

    /// Positions in the area, Y outermost, then Z, then X.
    pub fn positions(&self) -> impl Iterator<Item = LocalPos> + use<> {
        let (min, max) = (self.min, self.max);
        (min.y..=max.y).flat_map(move |y| {
            (min.z..=max.z).flat_map(move |z| (min.x..=max.x).map(move |x| LocalPos { x, y, z }))
        })
    }

    /// Map a position in this area onto the same relative spot in `other`.
    ///
    /// Both areas must have the same dimensions.
    #[must_use]
    pub const fn map_to(&self, pos: LocalPos, other: &Self) -> LocalPos {
        LocalPos {
            x: other.min.x + (pos.x - self.min.x),
            y: other.min.y + (pos.y - self.min.y),
            z: other.min.z + (pos.z - self.min.z),
        }
    }

    /// Map an entity position in this area onto the same spot in `other`.
    #[must_use]
    pub fn map_point_to(&self, pos: [f64; 3], other: &Self) -> [f64; 3] {
        [
            pos[0] - f64::from(self.min.x) + f64::from(other.min.x),
            pos[1] - f64::from(self.min.y) + f64::from(other.min.y),
            pos[2] - f64::from(self.min.z) + f64::from(other.min.z),
        ]
    }
}

/// The part of a region that falls inside one chunk column.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ChunkSlice {
    pub chunk: ChunkPos,
    pub area: LocalArea,
}

impl ChunkSlice {
    /// World-space bounds of the slice.
    #[must_use]
    pub const fn world_region(&self) -> Region {
        Region {
            min: self.chunk.to_world(self.area.min),
            max: self.chunk.to_world(self.area.max),
        }
    }
}

/// One source/destination pair produced by [`Region::transfer_pieces`].
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct TransferPiece {
    pub source: ChunkSlice,
    pub dest: ChunkSlice,
}

/// The part of the world bulk edits are allowed to touch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldBounds {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min: BlockPos::new(-30_000_000, -64, -30_000_000),
            max: BlockPos::new(30_000_000, 319, 30_000_000),
        }
    }
}

impl WorldBounds {
    #[must_use]
    pub const fn new(min: BlockPos, max: BlockPos) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub const fn contains(&self, region: &Region) -> bool {
        let bounds = Region {
            min: self.min,
            max: self.max,
        };
        bounds.contains_region(region)
    }

    #[must_use]
    pub const fn contains_pos(&self, pos: BlockPos) -> bool {
        let bounds = Region {
            min: self.min,
            max: self.max,
        };
        bounds.contains(pos)
    }
}

impl fmt::Display for WorldBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}
