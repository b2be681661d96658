//! Shared fixtures for the manager integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use plot_manager::{ChunkManager, CompletionListener, ManagerConfig, OperationSummary, QueueConfig};
use plot_region::{Biome, BlockPos, BlockState, MemoryWorld, Region, WorldBounds};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn region(a: (i32, i32, i32), b: (i32, i32, i32)) -> Region {
    Region::new(BlockPos::new(a.0, a.1, a.2), BlockPos::new(b.0, b.1, b.2)).unwrap()
}

pub fn config(queue: QueueConfig) -> ManagerConfig {
    ManagerConfig {
        queue,
        bounds: WorldBounds::new(BlockPos::new(-512, 0, -512), BlockPos::new(512, 63, 512)),
        ..ManagerConfig::default()
    }
}

pub fn manager(queue: QueueConfig) -> ChunkManager<MemoryWorld> {
    init_tracing();
    ChunkManager::new(MemoryWorld::new(2024, 0, 63), config(queue))
}

/// Everything observable about a region: blocks, biomes, and entities.
#[derive(Debug, PartialEq)]
pub struct Contents {
    pub blocks: Vec<BlockState>,
    pub biomes: Vec<Biome>,
    pub entities: Vec<([f64; 3], bytes::Bytes)>,
}

/// Contents with entity positions made relative to the region's minimum
/// corner, so regions at different places can be compared.
pub fn contents(world: &MemoryWorld, r: &Region) -> Contents {
    let min = r.min();
    let mut biomes = Vec::new();
    for y in min.y..=r.max().y {
        for z in min.z..=r.max().z {
            for x in min.x..=r.max().x {
                biomes.push(world.biome(BlockPos::new(x, y, z)));
            }
        }
    }
    let entities = world
        .entities_in(r)
        .into_iter()
        .map(|(pos, payload)| {
            (
                [
                    pos[0] - f64::from(min.x),
                    pos[1] - f64::from(min.y),
                    pos[2] - f64::from(min.z),
                ],
                payload,
            )
        })
        .collect();
    Contents {
        blocks: world.snapshot(r),
        biomes,
        entities,
    }
}

/// Records every summary it is handed.
#[derive(Default)]
pub struct Recorder {
    pub summaries: Mutex<Vec<OperationSummary>>,
}

impl CompletionListener for Recorder {
    fn operation_finished(&self, summary: &OperationSummary) {
        self.summaries.lock().push(summary.clone());
    }
}
