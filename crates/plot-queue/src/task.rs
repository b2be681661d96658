//! Chunk tasks: the smallest schedulable unit of a bulk edit.
//!
//! A task opens the accessors it needs, stages every write, and commits
//! only once the whole transform succeeded. Any error or panic before that
//! drops the accessors, discarding the staged writes, so a task either fully
//! applies or leaves its chunks untouched.

use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;

use plot_region::{
    AccessResult, AccessorFactory, Biome, BlockPos, BlockState, ChunkPos, EntityRecord, LocalArea,
    RegionAccessor,
};
use plot_schematic::Schematic;
use smallvec::{SmallVec, smallvec};

/// How a transfer treats its source.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransferMode {
    /// Duplicate the source into the destination.
    Copy { entities: bool },
    /// Copy into the destination, then clear the source.
    Move,
    /// Exchange source and destination.
    Swap,
}

/// The transform a task applies to its area.
#[derive(Clone)]
pub enum TaskOperation {
    /// Set every block to air and remove entities. Biomes are kept.
    Clear,
    /// Restore the area from the world generator.
    Regenerate,
    Fill { block: BlockState },
    SetBiome { biome: Biome },
    /// Read `source_area` of `source` into the task's area.
    Transfer {
        source: ChunkPos,
        source_area: LocalArea,
        mode: TransferMode,
    },
    /// Paste the part of a schematic anchored at `anchor` that falls in the
    /// task's area.
    Paste {
        schematic: Arc<Schematic>,
        anchor: BlockPos,
        paste_air: bool,
    },
}

impl TaskOperation {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Regenerate => "regenerate",
            Self::Fill { .. } => "fill",
            Self::SetBiome { .. } => "set_biome",
            Self::Transfer {
                mode: TransferMode::Copy { .. },
                ..
            } => "copy",
            Self::Transfer {
                mode: TransferMode::Move,
                ..
            } => "move",
            Self::Transfer {
                mode: TransferMode::Swap,
                ..
            } => "swap",
            Self::Paste { .. } => "paste",
        }
    }
}

impl fmt::Debug for TaskOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fill { block } => write!(f, "Fill({block})"),
            Self::SetBiome { biome } => write!(f, "SetBiome({biome})"),
            Self::Transfer {
                source,
                source_area,
                mode,
            } => f
                .debug_struct("Transfer")
                .field("source", source)
                .field("source_area", source_area)
                .field("mode", mode)
                .finish(),
            Self::Paste {
                schematic,
                anchor,
                paste_air,
            } => f
                .debug_struct("Paste")
                .field("dimensions", &schematic.dimensions())
                .field("anchor", anchor)
                .field("paste_air", paste_air)
                .finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// A unit of work bound to one chunk.
///
/// `chunk` and `area` are the destination. Transfers also read from a
/// source chunk, which may be the same chunk.
#[derive(Clone, Debug)]
pub struct ChunkTask {
    pub chunk: ChunkPos,
    pub area: LocalArea,
    pub operation: TaskOperation,
}

/// What a task changed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub blocks: u64,
    pub biomes: u64,
    pub entities: u64,
}

impl AddAssign for TaskStats {
    fn add_assign(&mut self, rhs: Self) {
        self.blocks += rhs.blocks;
        self.biomes += rhs.biomes;
        self.entities += rhs.entities;
    }
}

impl ChunkTask {
    #[must_use]
    pub const fn new(chunk: ChunkPos, area: LocalArea, operation: TaskOperation) -> Self {
        Self {
            chunk,
            area,
            operation,
        }
    }

    /// Every chunk this task touches, destination first.
    #[must_use]
    pub fn chunks(&self) -> SmallVec<[ChunkPos; 2]> {
        match &self.operation {
            TaskOperation::Transfer { source, .. } if *source != self.chunk => {
                smallvec![self.chunk, *source]
            }
            _ => smallvec![self.chunk],
        }
    }

    /// Run the task against the host world.
    ///
    /// Accessors are committed only if every step succeeds.
    pub fn apply<F: AccessorFactory>(&self, factory: &F) -> AccessResult<TaskStats> {
        match self.step() {
            Step::Local(edit) => {
                let mut accessor = factory.open(self.chunk)?;
                let stats = self.apply_local(&mut accessor, edit)?;
                accessor.commit()?;
                Ok(stats)
            }
            Step::Transfer {
                source,
                source_area,
                mode,
            } if source == self.chunk => {
                let mut accessor = factory.open(self.chunk)?;
                let stats = transfer(&mut accessor, None, source_area, &self.area, mode)?;
                accessor.commit()?;
                Ok(stats)
            }
            Step::Transfer {
                source,
                source_area,
                mode,
            } => {
                let mut dest = factory.open(self.chunk)?;
                let mut src = factory.open(source)?;
                let stats = transfer(&mut dest, Some(&mut src), source_area, &self.area, mode)?;
                dest.commit()?;
                src.commit()?;
                Ok(stats)
            }
        }
    }

    fn step(&self) -> Step<'_> {
        match &self.operation {
            TaskOperation::Clear => Step::Local(Edit::Clear),
            TaskOperation::Regenerate => Step::Local(Edit::Regenerate),
            TaskOperation::Fill { block } => Step::Local(Edit::Fill(block)),
            TaskOperation::SetBiome { biome } => Step::Local(Edit::SetBiome(biome)),
            TaskOperation::Paste {
                schematic,
                anchor,
                paste_air,
            } => Step::Local(Edit::Paste {
                schematic,
                anchor: *anchor,
                paste_air: *paste_air,
            }),
            TaskOperation::Transfer {
                source,
                source_area,
                mode,
            } => Step::Transfer {
                source: *source,
                source_area,
                mode: *mode,
            },
        }
    }

    fn apply_local<A: RegionAccessor>(&self, accessor: &mut A, edit: Edit<'_>) -> AccessResult<TaskStats> {
        let area = &self.area;
        let mut stats = TaskStats::default();
        match edit {
            Edit::Clear => {
                stats.blocks = accessor.fill(area, &BlockState::air())?;
                stats.entities = accessor.remove_entities_in(area)?;
            }
            Edit::Regenerate => {
                accessor.regenerate(area)?;
                stats.blocks = area.volume();
                stats.biomes = area.volume();
            }
            Edit::Fill(block) => {
                stats.blocks = accessor.fill(area, block)?;
            }
            Edit::SetBiome(biome) => {
                for pos in area.positions() {
                    accessor.write_biome(pos, biome.clone())?;
                }
                stats.biomes = area.volume();
            }
            Edit::Paste {
                schematic,
                anchor,
                paste_air,
            } => stats = paste(accessor, self.chunk, area, schematic, anchor, paste_air)?,
        }
        Ok(stats)
    }
}

/// How a task touches the world: one accessor or a source and destination.
#[derive(Clone, Copy)]
enum Step<'a> {
    Local(Edit<'a>),
    Transfer {
        source: ChunkPos,
        source_area: &'a LocalArea,
        mode: TransferMode,
    },
}

/// A transform confined to the task's own chunk.
#[derive(Clone, Copy)]
enum Edit<'a> {
    Clear,
    Regenerate,
    Fill(&'a BlockState),
    SetBiome(&'a Biome),
    Paste {
        schematic: &'a Schematic,
        anchor: BlockPos,
        paste_air: bool,
    },
}

fn paste<A: RegionAccessor>(
    accessor: &mut A,
    chunk: ChunkPos,
    area: &LocalArea,
    schematic: &Schematic,
    anchor: BlockPos,
    paste_air: bool,
) -> AccessResult<TaskStats> {
    let mut stats = TaskStats::default();
    let biomes = schematic.biomes();
    let dims = schematic.dimensions();

    for pos in area.positions() {
        let (dx, dy, dz) = chunk.to_world(pos).delta(anchor);
        let index = dims.index(dx as u16, dy as u16, dz as u16);
        let block = schematic.blocks().get(index);
        if paste_air || !block.is_air() {
            accessor.write_block(pos, block.clone())?;
            stats.blocks += 1;
        }
        if let Some(biomes) = biomes {
            accessor.write_biome(pos, biomes.get(index).clone())?;
            stats.biomes += 1;
        }
    }

    let (min_x, min_z) = (f64::from(chunk.min_block_x()), f64::from(chunk.min_block_z()));
    for entity in schematic.entities() {
        let local = [
            f64::from(anchor.x) + entity.offset[0] - min_x,
            f64::from(anchor.y) + entity.offset[1],
            f64::from(anchor.z) + entity.offset[2] - min_z,
        ];
        if area.contains_point(local) {
            accessor.spawn_entity(local, entity.payload.clone())?;
            stats.entities += 1;
        }
    }
    Ok(stats)
}

/// Contents of one area, in [`LocalArea::positions`] order.
struct Piece {
    blocks: Vec<BlockState>,
    biomes: Vec<Biome>,
    entities: Vec<EntityRecord>,
}

fn read_piece<A: RegionAccessor>(accessor: &A, area: &LocalArea, entities: bool) -> AccessResult<Piece> {
    let cells = area.volume() as usize;
    let mut blocks = Vec::with_capacity(cells);
    let mut biomes = Vec::with_capacity(cells);
    for pos in area.positions() {
        blocks.push(accessor.read_block(pos)?);
        biomes.push(accessor.read_biome(pos)?);
    }
    let entities = if entities {
        accessor.list_entities(area)?
    } else {
        Vec::new()
    };
    Ok(Piece {
        blocks,
        biomes,
        entities,
    })
}

/// Overwrite `area` with `piece`, which was read from `from`.
///
/// With `entities`, the entities currently in `area` are replaced by the
/// piece's entities, translated into `area`.
fn write_piece<A: RegionAccessor>(
    accessor: &mut A,
    area: &LocalArea,
    piece: &Piece,
    from: &LocalArea,
    entities: bool,
) -> AccessResult<TaskStats> {
    let mut stats = TaskStats::default();
    for ((pos, block), biome) in area.positions().zip(&piece.blocks).zip(&piece.biomes) {
        accessor.write_block(pos, block.clone())?;
        accessor.write_biome(pos, biome.clone())?;
    }
    stats.blocks = area.volume();
    stats.biomes = area.volume();

    if entities {
        accessor.remove_entities_in(area)?;
        for entity in &piece.entities {
            accessor.spawn_entity(from.map_point_to(entity.pos, area), entity.payload.clone())?;
            stats.entities += 1;
        }
    }
    Ok(stats)
}

/// Run a transfer. `src` is `None` when source and destination share a
/// chunk, in which case `dest` serves both.
fn transfer<A: RegionAccessor>(
    dest: &mut A,
    src: Option<&mut A>,
    source_area: &LocalArea,
    dest_area: &LocalArea,
    mode: TransferMode,
) -> AccessResult<TaskStats> {
    let with_entities = !matches!(mode, TransferMode::Copy { entities: false });

    // All reads happen before any write, so a shared accessor sees the
    // original contents of both areas.
    let (incoming, outgoing) = {
        let reader: &A = match &src {
            Some(src) => src,
            None => dest,
        };
        let incoming = read_piece(reader, source_area, with_entities)?;
        let outgoing = match mode {
            TransferMode::Swap => Some(read_piece(dest, dest_area, true)?),
            _ => None,
        };
        (incoming, outgoing)
    };

    let mut stats = TaskStats::default();
    {
        let source: &mut A = match src {
            Some(src) => src,
            None => &mut *dest,
        };
        match (mode, &outgoing) {
            (TransferMode::Move, _) => {
                source.fill(source_area, &BlockState::air())?;
                for entity in &incoming.entities {
                    source.remove_entity(entity.id)?;
                }
            }
            (TransferMode::Swap, Some(outgoing)) => {
                stats += write_piece(source, source_area, outgoing, dest_area, true)?;
            }
            _ => {}
        }
    }
    stats += write_piece(dest, dest_area, &incoming, source_area, with_entities)?;
    Ok(stats)
}
