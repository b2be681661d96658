//! A scripted build that touches every bulk operation once.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use eyre::WrapErr;
use plot_manager::{ChunkManager, QueueHandle};
use plot_region::{Biome, BlockPos, BlockState, MemoryWorld, Region};
use plot_schematic::file::EXTENSION;
use plot_schematic::{CaptureOptions, load, save};
use tracing::info;

pub const HOUSE_ORIGIN: BlockPos = BlockPos::new(0, 40, 0);
const HOUSE_SIZE: (i32, i32, i32) = (9, 6, 9);

/// Where each copy of the house ends up.
pub const PASTE_ANCHORS: [BlockPos; 3] = [
    BlockPos::new(24, 40, 0),
    BlockPos::new(48, 40, 0),
    BlockPos::new(72, 40, 0),
];
pub const COPY_ANCHOR: BlockPos = BlockPos::new(0, 40, 40);
pub const MOVE_ANCHOR: BlockPos = BlockPos::new(40, 40, 40);
pub const SWAP_ANCHOR: BlockPos = BlockPos::new(0, 40, -40);

/// Place a small house directly into the world and return its bounds.
pub fn build_house(world: &MemoryWorld, origin: BlockPos) -> eyre::Result<Region> {
    let (w, h, l) = HOUSE_SIZE;
    let region = Region::with_size(origin, w as u32, h as u32, l as u32)?;
    let (min, max) = (region.min(), region.max());
    let planks = BlockState::new("minecraft:oak_planks");
    let glass = BlockState::new("minecraft:glass_pane");

    for y in min.y..=max.y {
        for z in min.z..=max.z {
            for x in min.x..=max.x {
                let wall = x == min.x || x == max.x || z == min.z || z == max.z;
                let floor_or_roof = y == min.y || y == max.y;
                let block = if floor_or_roof {
                    planks.clone()
                } else if wall && y == min.y + 2 && (x + z) % 2 == 0 {
                    glass.clone()
                } else if wall {
                    planks.clone()
                } else {
                    continue;
                };
                world.set_block(BlockPos::new(x, y, z), block);
            }
        }
    }
    world.set_block(BlockPos::new(min.x + 4, min.y, min.z), BlockState::air());
    world.set_block(BlockPos::new(min.x + 4, min.y + 1, min.z), BlockState::air());
    world.set_block(BlockPos::new(min.x + 2, min.y + 1, min.z + 2), BlockState::new("minecraft:chest"));
    for y in min.y..=max.y {
        for z in min.z..=max.z {
            for x in min.x..=max.x {
                world.set_biome(BlockPos::new(x, y, z), Biome::new("minecraft:meadow"));
            }
        }
    }
    world.spawn_entity(
        [f64::from(min.x) + 4.5, f64::from(min.y) + 1.0, f64::from(min.z) + 4.5],
        Bytes::from_static(b"minecraft:villager"),
    );
    Ok(region)
}

/// Build the house, round-trip it through a schematic file, and submit the
/// edits. Returns each submitted operation with a short label.
pub fn submit(
    manager: &ChunkManager<MemoryWorld>,
    schematic_dir: &Path,
) -> eyre::Result<Vec<(&'static str, QueueHandle)>> {
    let house = build_house(manager.factory(), HOUSE_ORIGIN)?;
    let schematic = manager.capture_schematic(house, CaptureOptions::default())?;

    std::fs::create_dir_all(schematic_dir)
        .wrap_err_with(|| format!("failed to create {}", schematic_dir.display()))?;
    let path = schematic_dir.join(format!("house.{EXTENSION}"));
    save(&path, &schematic)?;
    let schematic = Arc::new(load(&path)?);
    info!(path = %path.display(), dimensions = %schematic.dimensions(), "saved house schematic");

    let platform = Region::new(BlockPos::new(-16, 39, -64), BlockPos::new(100, 39, 64))?;
    let scratch = Region::new(BlockPos::new(-16, 0, 80), BlockPos::new(16, 60, 112))?;
    let copy = house.translated_to(COPY_ANCHOR)?;
    let last_paste = house.translated_to(PASTE_ANCHORS[2])?;

    let mut handles = Vec::new();
    handles.push(("platform", manager.fill_region(platform, BlockState::new("minecraft:stone_bricks"))?));
    handles.push(("biome", manager.set_biome(platform, Biome::new("minecraft:cherry_grove"))?));
    for anchor in PASTE_ANCHORS {
        handles.push(("paste", manager.paste_schematic(Arc::clone(&schematic), anchor, false)?));
    }
    handles.push(("copy", manager.copy_region(house, COPY_ANCHOR, true)?));
    handles.push(("move", manager.move_region(copy, MOVE_ANCHOR)?));
    handles.push(("swap", manager.swap_regions(house, SWAP_ANCHOR)?));
    handles.push(("scratch", manager.fill_region(scratch, BlockState::new("minecraft:sponge"))?));
    handles.push(("regenerate", manager.regenerate_region(scratch)?));
    handles.push(("delete", manager.delete_region(last_paste)?));

    info!(operations = handles.len(), "scenario submitted");
    Ok(handles)
}

#[cfg(test)]
mod tests {
    use plot_manager::{ManagerConfig, QueueConfig};
    use plot_region::WorldBounds;

    use super::*;

    fn manager() -> ChunkManager<MemoryWorld> {
        let bounds = WorldBounds::new(BlockPos::new(-256, 0, -256), BlockPos::new(256, 63, 256));
        ChunkManager::new(
            MemoryWorld::new(7, bounds.min.y, bounds.max.y),
            ManagerConfig {
                queue: QueueConfig {
                    max_tick_millis: 0,
                    ..QueueConfig::default()
                },
                bounds,
                ..ManagerConfig::default()
            },
        )
    }

    #[test]
    fn scenario_runs_to_completion() {
        let manager = manager();
        let dir = tempfile::tempdir().unwrap();
        let handles = submit(&manager, dir.path()).unwrap();
        assert!(dir.path().join("house.psch").exists());

        manager.run_until_idle(1_000);
        for (label, handle) in &handles {
            let progress = manager.query_progress(*handle).unwrap();
            assert_eq!(progress.completed, progress.total, "{label} did not finish cleanly");
        }

        let world = manager.factory();
        let (w, h, l) = HOUSE_SIZE;
        let at = |min: BlockPos| Region::with_size(min, w as u32, h as u32, l as u32).unwrap();

        let house = world.snapshot(&at(SWAP_ANCHOR));
        assert_eq!(house.iter().filter(|b| b.name() == "minecraft:chest").count(), 1);
        assert_eq!(world.snapshot(&at(PASTE_ANCHORS[0])), house);
        assert_eq!(world.snapshot(&at(MOVE_ANCHOR)), house);
        assert!(world.snapshot(&at(HOUSE_ORIGIN)).iter().all(BlockState::is_air));
        assert!(world.snapshot(&at(COPY_ANCHOR)).iter().all(BlockState::is_air));
        assert!(world.snapshot(&at(PASTE_ANCHORS[2])).iter().all(BlockState::is_air));

        assert_eq!(manager.count_entities(at(MOVE_ANCHOR)).unwrap(), 1);
        assert_eq!(manager.count_entities(at(PASTE_ANCHORS[1])).unwrap(), 1);
        assert_eq!(manager.count_entities(at(PASTE_ANCHORS[2])).unwrap(), 0);
        assert_eq!(
            world.biome(BlockPos::new(100, 39, 64)).name(),
            "minecraft:cherry_grove"
        );
        assert_eq!(world.block(BlockPos::new(0, 39, 0)).name(), "minecraft:stone_bricks");
    }
}
