//! The in-memory schematic and its invariants.

use std::fmt;
use std::hash::Hash;

use bytes::Bytes;
use hashbrown::{HashMap, HashSet};
use plot_region::{Biome, BlockPos, BlockState, Region, RegionResult};

use crate::{CodecError, CodecResult};

/// Largest palette an index of `u16` can address.
pub const MAX_PALETTE_LEN: usize = u16::MAX as usize + 1;

/// Longest palette entry name, in bytes, the format can store.
pub const MAX_ENTRY_LEN: usize = u16::MAX as usize;

/// Longest entity payload, in bytes, the format can store.
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

fn check_entry(entry: &impl fmt::Display) -> CodecResult<()> {
    let len = entry.to_string().len();
    if len > MAX_ENTRY_LEN {
        return Err(CodecError::EntryTooLong {
            len,
            max: MAX_ENTRY_LEN,
        });
    }
    Ok(())
}

/// Size of a schematic in blocks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u16,
    pub height: u16,
    pub length: u16,
}

impl Dimensions {
    /// Create dimensions, rejecting any zero-sized axis.
    pub const fn new(width: u16, height: u16, length: u16) -> CodecResult<Self> {
        if width == 0 || height == 0 || length == 0 {
            return Err(CodecError::InvalidDimensions {
                width,
                height,
                length,
            });
        }
        Ok(Self {
            width,
            height,
            length,
        })
    }

    /// Number of cells.
    #[must_use]
    pub const fn volume(&self) -> usize {
        self.width as usize * self.height as usize * self.length as usize
    }

    /// Flat index of a cell: `(y * length + z) * width + x`.
    #[must_use]
    pub const fn index(&self, x: u16, y: u16, z: u16) -> usize {
        (y as usize * self.length as usize + z as usize) * self.width as usize + x as usize
    }

    #[must_use]
    pub const fn contains(&self, x: u16, y: u16, z: u16) -> bool {
        x < self.width && y < self.height && z < self.length
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.length)
    }
}

/// Values stored as indices into an ordered, duplicate-free palette.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Paletted<T> {
    palette: Vec<T>,
    indices: Vec<u16>,
}

impl<T: Eq + Hash + fmt::Display> Paletted<T> {
    /// Validate and wrap a palette with its indices.
    pub fn new(palette: Vec<T>, indices: Vec<u16>) -> CodecResult<Self> {
        if palette.len() > MAX_PALETTE_LEN {
            return Err(CodecError::PaletteTooLarge {
                len: palette.len(),
                max: MAX_PALETTE_LEN,
            });
        }
        let mut seen = HashSet::with_capacity(palette.len());
        for entry in &palette {
            check_entry(entry)?;
            if !seen.insert(entry) {
                return Err(CodecError::DuplicatePaletteEntry(entry.to_string()));
            }
        }
        if let Some(&index) = indices.iter().find(|&&i| usize::from(i) >= palette.len()) {
            return Err(CodecError::InvalidIndex {
                index: u32::from(index),
                palette_len: palette.len(),
            });
        }
        drop(seen);
        Ok(Self { palette, indices })
    }
}

impl<T> Paletted<T> {
    #[must_use]
    pub fn palette(&self) -> &[T] {
        &self.palette
    }

    #[must_use]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Value of the cell at a flat index.
    #[must_use]
    pub fn get(&self, index: usize) -> &T {
        &self.palette[usize::from(self.indices[index])]
    }

    /// Whether indices need two bytes on disk.
    #[must_use]
    pub fn wide(&self) -> bool {
        self.palette.len() > 256
    }
}

/// Builds a [`Paletted`] with entries in first-occurrence order.
pub struct PaletteBuilder<T> {
    palette: Vec<T>,
    lookup: HashMap<T, u16>,
    indices: Vec<u16>,
}

impl<T: Clone + Eq + Hash + fmt::Display> PaletteBuilder<T> {
    #[must_use]
    pub fn with_capacity(cells: usize) -> Self {
        Self {
            palette: Vec::new(),
            lookup: HashMap::new(),
            indices: Vec::with_capacity(cells),
        }
    }

    pub fn push(&mut self, value: T) -> CodecResult<()> {
        let index = match self.lookup.get(&value) {
            Some(&index) => index,
            None => {
                if self.palette.len() == MAX_PALETTE_LEN {
                    return Err(CodecError::PaletteTooLarge {
                        len: MAX_PALETTE_LEN + 1,
                        max: MAX_PALETTE_LEN,
                    });
                }
                check_entry(&value)?;
                let index = self.palette.len() as u16;
                self.palette.push(value.clone());
                self.lookup.insert(value, index);
                index
            }
        };
        self.indices.push(index);
        Ok(())
    }

    #[must_use]
    pub fn finish(self) -> Paletted<T> {
        Paletted {
            palette: self.palette,
            indices: self.indices,
        }
    }
}

/// An entity stored in a schematic.
#[derive(Clone, Debug, PartialEq)]
pub struct SchematicEntity {
    /// Position relative to the schematic origin.
    pub offset: [f64; 3],
    pub payload: Bytes,
}

/// An immutable snapshot of a region: blocks, optional biomes, and entities.
///
/// Shared between paste tasks as `Arc<Schematic>`.
#[derive(Clone, Debug, PartialEq)]
pub struct Schematic {
    dimensions: Dimensions,
    blocks: Paletted<BlockState>,
    biomes: Option<Paletted<Biome>>,
    entities: Vec<SchematicEntity>,
}

impl Schematic {
    /// Assemble a schematic, checking that every layer covers exactly the
    /// cells of `dimensions`.
    pub fn new(
        dimensions: Dimensions,
        blocks: Paletted<BlockState>,
        biomes: Option<Paletted<Biome>>,
        entities: Vec<SchematicEntity>,
    ) -> CodecResult<Self> {
        let expected = dimensions.volume();
        let layers = std::iter::once(blocks.indices.len()).chain(biomes.as_ref().map(|b| b.indices.len()));
        for found in layers {
            if found != expected {
                return Err(CodecError::LengthMismatch { expected, found });
            }
        }
        if let Some(entity) = entities.iter().find(|e| e.payload.len() > MAX_PAYLOAD_LEN) {
            return Err(CodecError::EntryTooLong {
                len: entity.payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self {
            dimensions,
            blocks,
            biomes,
            entities,
        })
    }

    /// A schematic of a single block type.
    pub fn uniform(dimensions: Dimensions, block: BlockState) -> CodecResult<Self> {
        check_entry(&block)?;
        Ok(Self {
            dimensions,
            blocks: Paletted {
                palette: vec![block],
                indices: vec![0; dimensions.volume()],
            },
            biomes: None,
            entities: Vec::new(),
        })
    }

    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    #[must_use]
    pub const fn blocks(&self) -> &Paletted<BlockState> {
        &self.blocks
    }

    #[must_use]
    pub const fn biomes(&self) -> Option<&Paletted<Biome>> {
        self.biomes.as_ref()
    }

    #[must_use]
    pub fn entities(&self) -> &[SchematicEntity] {
        &self.entities
    }

    /// Block at a schematic-relative position.
    ///
    /// # Panics
    /// Panics if the position is outside [`Self::dimensions`].
    #[must_use]
    pub fn block_at(&self, x: u16, y: u16, z: u16) -> &BlockState {
        assert!(self.dimensions.contains(x, y, z), "({x}, {y}, {z}) outside {}", self.dimensions);
        self.blocks.get(self.dimensions.index(x, y, z))
    }

    /// Biome at a schematic-relative position, if biomes were captured.
    ///
    /// # Panics
    /// Panics if the position is outside [`Self::dimensions`].
    #[must_use]
    pub fn biome_at(&self, x: u16, y: u16, z: u16) -> Option<&Biome> {
        assert!(self.dimensions.contains(x, y, z), "({x}, {y}, {z}) outside {}", self.dimensions);
        let index = self.dimensions.index(x, y, z);
        self.biomes.as_ref().map(|b| b.get(index))
    }

    /// Palette index of air, if the schematic contains any.
    #[must_use]
    pub fn air_index(&self) -> Option<u16> {
        self.blocks
            .palette
            .iter()
            .position(BlockState::is_air)
            .map(|i| i as u16)
    }

    /// The world region the schematic covers when pasted at `anchor`.
    pub fn region_at(&self, anchor: BlockPos) -> RegionResult<Region> {
        Region::with_size(
            anchor,
            u32::from(self.dimensions.width),
            u32::from(self.dimensions.height),
            u32::from(self.dimensions.length),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(w: u16, h: u16, l: u16) -> Dimensions {
        Dimensions::new(w, h, l).unwrap()
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(matches!(
            Dimensions::new(4, 0, 4),
            Err(CodecError::InvalidDimensions { height: 0, .. })
        ));
    }

    #[test]
    fn index_order_is_y_then_z_then_x() {
        let d = dims(3, 2, 4);
        assert_eq!(d.index(0, 0, 0), 0);
        assert_eq!(d.index(1, 0, 0), 1);
        assert_eq!(d.index(0, 0, 1), 3);
        assert_eq!(d.index(0, 1, 0), 12);
        assert_eq!(d.index(2, 1, 3), d.volume() - 1);
    }

    #[test]
    fn builder_keeps_first_occurrence_order() {
        let mut builder = PaletteBuilder::with_capacity(4);
        for name in ["b", "a", "b", "c"] {
            builder.push(BlockState::new(name)).unwrap();
        }
        let paletted = builder.finish();
        let names: Vec<_> = paletted.palette().iter().map(BlockState::name).collect();
        assert_eq!(names, ["b", "a", "c"]);
        assert_eq!(paletted.indices(), &[0, 1, 0, 2]);
    }

    #[test]
    fn paletted_rejects_bad_input() {
        let out_of_range = Paletted::new(vec![BlockState::air()], vec![0, 1]);
        assert!(matches!(
            out_of_range,
            Err(CodecError::InvalidIndex {
                index: 1,
                palette_len: 1
            })
        ));

        let duplicate = Paletted::new(vec![BlockState::air(), BlockState::air()], vec![0]);
        assert!(matches!(duplicate, Err(CodecError::DuplicatePaletteEntry(_))));
    }

    #[test]
    fn overlong_palette_names_are_rejected() {
        let long = BlockState::new("x".repeat(MAX_ENTRY_LEN + 1));
        let limit = BlockState::new("x".repeat(MAX_ENTRY_LEN));

        assert!(matches!(
            Paletted::new(vec![long.clone()], vec![0]),
            Err(CodecError::EntryTooLong { len, max: MAX_ENTRY_LEN }) if len == MAX_ENTRY_LEN + 1
        ));
        assert!(Paletted::new(vec![limit.clone()], vec![0]).is_ok());

        let mut builder = PaletteBuilder::with_capacity(2);
        builder.push(limit).unwrap();
        assert!(matches!(builder.push(long.clone()), Err(CodecError::EntryTooLong { .. })));

        assert!(matches!(
            Schematic::uniform(dims(1, 1, 1), long),
            Err(CodecError::EntryTooLong { .. })
        ));
    }

    #[test]
    fn new_checks_layer_lengths() {
        let blocks = Paletted::new(vec![BlockState::air()], vec![0; 7]).unwrap();
        let err = Schematic::new(dims(2, 2, 2), blocks, None, Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LengthMismatch {
                expected: 8,
                found: 7
            }
        ));
    }

    #[test]
    fn lookups() {
        let blocks = Paletted::new(
            vec![BlockState::new("minecraft:stone"), BlockState::air()],
            vec![0, 1, 1, 0],
        )
        .unwrap();
        let schematic = Schematic::new(dims(2, 1, 2), blocks, None, Vec::new()).unwrap();
        assert_eq!(schematic.block_at(1, 0, 0), &BlockState::air());
        assert_eq!(schematic.block_at(1, 0, 1).name(), "minecraft:stone");
        assert_eq!(schematic.air_index(), Some(1));
        assert_eq!(schematic.biome_at(0, 0, 0), None);

        let region = schematic.region_at(BlockPos::new(10, 64, -3)).unwrap();
        assert_eq!(region.max(), BlockPos::new(11, 64, -2));
    }
}
