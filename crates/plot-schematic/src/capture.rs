//! Capturing a world region into a [`Schematic`].

use plot_region::{AccessorFactory, Biome, BlockState, Region, RegionAccessor};
use tracing::debug;

use crate::schematic::{Dimensions, PaletteBuilder, Schematic, SchematicEntity};
use crate::{CaptureError, CaptureResult, codec};

/// What to include besides blocks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CaptureOptions {
    pub biomes: bool,
    pub entities: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            biomes: true,
            entities: true,
        }
    }
}

/// Read every chunk overlapped by `region` and build a schematic of it.
///
/// Palettes are in first-occurrence order over the schematic index order,
/// so capturing identical contents yields identical schematics. Accessors
/// are released without committing.
pub fn capture<F: AccessorFactory>(
    region: &Region,
    factory: &F,
    options: CaptureOptions,
) -> CaptureResult<Schematic> {
    let too_large = || CaptureError::TooLarge {
        width: region.width(),
        height: region.height(),
        length: region.length(),
    };
    let axis = |v: u64| u16::try_from(v).map_err(|_| too_large());
    let dims = Dimensions::new(
        axis(region.width())?,
        axis(region.height())?,
        axis(region.length())?,
    )?;

    let origin = region.min();
    let cells = dims.volume();
    let mut blocks = vec![BlockState::air(); cells];
    let mut biomes = options.biomes.then(|| vec![Biome::default(); cells]);
    let mut entities = Vec::new();

    for slice in region.chunk_slices() {
        let accessor = factory.open(slice.chunk)?;
        for local in slice.area.positions() {
            let world = slice.chunk.to_world(local);
            let (dx, dy, dz) = world.delta(origin);
            let index = dims.index(dx as u16, dy as u16, dz as u16);
            blocks[index] = accessor.read_block(local)?;
            if let Some(biomes) = &mut biomes {
                biomes[index] = accessor.read_biome(local)?;
            }
        }
        if options.entities {
            for entity in accessor.list_entities(&slice.area)? {
                let offset = [
                    entity.pos[0] + f64::from(slice.chunk.min_block_x() - origin.x),
                    entity.pos[1] - f64::from(origin.y),
                    entity.pos[2] + f64::from(slice.chunk.min_block_z() - origin.z),
                ];
                entities.push(SchematicEntity {
                    offset,
                    payload: entity.payload,
                });
            }
        }
    }

    let mut block_layer = PaletteBuilder::with_capacity(cells);
    for block in blocks {
        block_layer.push(block)?;
    }
    let biome_layer = match biomes {
        Some(biomes) => {
            let mut builder = PaletteBuilder::with_capacity(cells);
            for biome in biomes {
                builder.push(biome)?;
            }
            Some(builder.finish())
        }
        None => None,
    };

    let schematic = Schematic::new(dims, block_layer.finish(), biome_layer, entities)?;
    debug!(
        %region,
        palette = schematic.blocks().palette().len(),
        entities = schematic.entities().len(),
        "captured schematic"
    );
    Ok(schematic)
}

/// Capture `region` and serialize it in one step.
pub fn encode<F: AccessorFactory>(region: &Region, factory: &F) -> CaptureResult<Vec<u8>> {
    let schematic = capture(region, factory, CaptureOptions::default())?;
    Ok(codec::serialize(&schematic))
}
