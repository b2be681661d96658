//! Decomposing bulk operations into chunk tasks.
//!
//! Planning is pure: it only computes coordinates and slices and never
//! touches the world, so every plan can be checked without one. Tasks come
//! out ordered by destination chunk, Z-major then X, and for transfers by
//! source chunk inside one destination chunk.

use std::fmt;
use std::sync::Arc;

use plot_queue::{ChunkTask, TaskOperation, TransferMode};
use plot_region::{Biome, BlockPos, BlockState, Region, WorldBounds};
use plot_schematic::Schematic;
use tracing::trace;

use crate::{PlanningError, PlanningResult};

/// A high-level edit request.
#[derive(Clone)]
pub enum BulkOperation {
    /// Clear to air and remove entities. Biomes are kept.
    Delete { region: Region },
    /// Restore from the world generator.
    Regenerate { region: Region },
    Fill { region: Region, block: BlockState },
    SetBiome { region: Region, biome: Biome },
    /// Duplicate `source` so its minimum corner lands on `dest`.
    Copy {
        source: Region,
        dest: BlockPos,
        copy_entities: bool,
    },
    /// Move `source` so its minimum corner lands on `dest`, clearing the
    /// source. Entities travel with their blocks.
    Move { source: Region, dest: BlockPos },
    /// Exchange `first` with the same-sized box whose minimum corner is
    /// `second`.
    Swap { first: Region, second: BlockPos },
    PasteSchematic {
        schematic: Arc<Schematic>,
        anchor: BlockPos,
        paste_air: bool,
    },
}

impl BulkOperation {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "delete",
            Self::Regenerate { .. } => "regenerate",
            Self::Fill { .. } => "fill",
            Self::SetBiome { .. } => "set_biome",
            Self::Copy { .. } => "copy",
            Self::Move { .. } => "move",
            Self::Swap { .. } => "swap",
            Self::PasteSchematic { .. } => "paste",
        }
    }
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete { region } | Self::Regenerate { region } => {
                write!(f, "{} {region}", self.name())
            }
            Self::Fill { region, block } => write!(f, "fill {region} with {block}"),
            Self::SetBiome { region, biome } => write!(f, "set_biome {region} to {biome}"),
            Self::Copy { source, dest, .. } | Self::Move { source, dest } => {
                write!(f, "{} {source} to {dest}", self.name())
            }
            Self::Swap { first, second } => write!(f, "swap {first} with {second}"),
            Self::PasteSchematic { schematic, anchor, .. } => {
                write!(f, "paste {} at {anchor}", schematic.dimensions())
            }
        }
    }
}

impl fmt::Debug for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BulkOperation({self})")
    }
}

/// Turns [`BulkOperation`]s into ordered chunk tasks.
#[derive(Clone, Debug, Default)]
pub struct Planner {
    bounds: WorldBounds,
}

impl Planner {
    #[must_use]
    pub const fn new(bounds: WorldBounds) -> Self {
        Self { bounds }
    }

    #[must_use]
    pub const fn bounds(&self) -> &WorldBounds {
        &self.bounds
    }

    /// Check that `region` lies inside the world bounds.
    pub fn validate(&self, region: &Region) -> PlanningResult<()> {
        if self.bounds.contains(region) {
            Ok(())
        } else {
            Err(PlanningError::InvalidRegion {
                region: *region,
                bounds: self.bounds,
            })
        }
    }

    /// Decompose `operation` into chunk tasks.
    pub fn plan(&self, operation: &BulkOperation) -> PlanningResult<Vec<ChunkTask>> {
        let tasks = match operation {
            BulkOperation::Delete { region } => self.per_chunk(region, &TaskOperation::Clear)?,
            BulkOperation::Regenerate { region } => {
                self.per_chunk(region, &TaskOperation::Regenerate)?
            }
            BulkOperation::Fill { region, block } => self.per_chunk(region, &TaskOperation::Fill {
                block: block.clone(),
            })?,
            BulkOperation::SetBiome { region, biome } => {
                self.per_chunk(region, &TaskOperation::SetBiome {
                    biome: biome.clone(),
                })?
            }
            BulkOperation::Copy {
                source,
                dest,
                copy_entities,
            } => self.transfer(source, *dest, TransferMode::Copy {
                entities: *copy_entities,
            })?,
            BulkOperation::Move { source, dest } => {
                self.transfer(source, *dest, TransferMode::Move)?
            }
            BulkOperation::Swap { first, second } => {
                self.transfer(first, *second, TransferMode::Swap)?
            }
            BulkOperation::PasteSchematic {
                schematic,
                anchor,
                paste_air,
            } => self.paste(schematic, *anchor, *paste_air)?,
        };
        trace!(%operation, tasks = tasks.len(), "planned operation");
        Ok(tasks)
    }

    /// One task per chunk overlapped by `region`.
    fn per_chunk(&self, region: &Region, operation: &TaskOperation) -> PlanningResult<Vec<ChunkTask>> {
        self.validate(region)?;
        Ok(region
            .chunk_slices()
            .map(|slice| ChunkTask::new(slice.chunk, slice.area, operation.clone()))
            .collect())
    }

    fn transfer(
        &self,
        source: &Region,
        dest_min: BlockPos,
        mode: TransferMode,
    ) -> PlanningResult<Vec<ChunkTask>> {
        self.validate(source)?;
        let dest = source.translated_to(dest_min)?;
        self.validate(&dest)?;
        if source.intersects(&dest) {
            return Err(PlanningError::OverlappingRegions {
                from: *source,
                to: dest,
            });
        }

        Ok(source
            .transfer_pieces(dest_min)?
            .into_iter()
            .map(|piece| {
                ChunkTask::new(piece.dest.chunk, piece.dest.area, TaskOperation::Transfer {
                    source: piece.source.chunk,
                    source_area: piece.source.area,
                    mode,
                })
            })
            .collect())
    }

    fn paste(
        &self,
        schematic: &Arc<Schematic>,
        anchor: BlockPos,
        paste_air: bool,
    ) -> PlanningResult<Vec<ChunkTask>> {
        if !self.bounds.contains_pos(anchor) {
            return Err(PlanningError::AnchorOutOfBounds {
                anchor,
                bounds: self.bounds,
            });
        }
        let region = schematic.region_at(anchor)?;
        self.per_chunk(&region, &TaskOperation::Paste {
            schematic: Arc::clone(schematic),
            anchor,
            paste_air,
        })
    }
}
