//! Plot runner
//!
//! This binary:
//! 1. Builds an in-memory world and a chunk manager over it
//! 2. Submits a scripted set of bulk edits
//! 3. Ticks at a fixed rate until the queue drains
//!
//! Environment:
//! - `PLOT_CONFIG` - path to a TOML config file
//! - `SCHEMATIC_DIR` - where captured schematics are written
//! - `TARGET_TPS` - ticks per second

mod config;
mod scenario;

use std::sync::Arc;
use std::time::{Duration, Instant};

use plot_manager::{ChunkManager, LogListener, TickLoop};
use plot_region::MemoryWorld;
use tracing::{info, warn};

use crate::config::RunnerConfig;

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("plot_runner=info".parse()?)
                .add_directive("plot_manager=info".parse()?)
                .add_directive("plot_queue=info".parse()?),
        )
        .init();

    let config = RunnerConfig::from_env()?;
    info!(
        tps = config.target_tps,
        schematic_dir = %config.schematic_dir.display(),
        "starting plot runner"
    );

    let bounds = config.manager.bounds;
    let world = MemoryWorld::new(config.seed, bounds.min.y, bounds.max.y);
    let manager = Arc::new(ChunkManager::new(world, config.manager.clone()));
    manager.add_listener(Arc::new(LogListener));

    let mut host = TickLoop::new();
    manager.register_pump(&mut host);

    let handles = scenario::submit(&manager, &config.schematic_dir)?;

    let target_delta = Duration::from_secs_f32(1.0 / config.target_tps);
    while !manager.is_idle() && host.tick() < config.max_ticks {
        let start = Instant::now();
        host.run_tick();

        let elapsed = start.elapsed();
        if elapsed < target_delta {
            std::thread::sleep(target_delta - elapsed);
        }
    }

    if !manager.is_idle() {
        warn!(ticks = host.tick(), "gave up with work still queued");
    }
    for (label, handle) in handles {
        if let Some(progress) = manager.query_progress(handle) {
            info!(
                %handle,
                label,
                completed = progress.completed,
                total = progress.total,
                failed = progress.failed,
                "final progress"
            );
        }
    }
    info!(
        ticks = host.tick(),
        opened = manager.factory().open_count(),
        commits = manager.factory().commit_count(),
        "done"
    );

    Ok(())
}
