use std::path::{Path, PathBuf};

use eyre::WrapErr;
use plot_manager::ManagerConfig;
use serde::{Deserialize, Serialize};

/// Settings for the runner binary, read from a TOML file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Ticks per second.
    pub target_tps: f32,
    /// Give up after this many ticks even if work is left.
    pub max_ticks: u64,
    /// Terrain seed of the in-memory world.
    pub seed: u64,
    /// Where captured schematics are written.
    pub schematic_dir: PathBuf,
    pub manager: ManagerConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            target_tps: 20.0,
            max_ticks: 2_000,
            seed: 0x5EED,
            schematic_dir: PathBuf::from("schematics"),
            manager: ManagerConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Read a config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text).wrap_err_with(|| format!("failed to parse {}", path.display()))
    }

    /// Load from `PLOT_CONFIG` if set, then apply `SCHEMATIC_DIR` and
    /// `TARGET_TPS` overrides.
    pub fn from_env() -> eyre::Result<Self> {
        let mut config = match std::env::var_os("PLOT_CONFIG") {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(dir) = std::env::var_os("SCHEMATIC_DIR") {
            config.schematic_dir = PathBuf::from(dir);
        }
        if let Some(tps) = std::env::var("TARGET_TPS").ok().and_then(|v| v.parse().ok()) {
            config.target_tps = tps;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        eyre::ensure!(
            self.target_tps.is_finite() && self.target_tps > 0.0,
            "target_tps must be positive, got {}",
            self.target_tps
        );
        let bounds = self.manager.bounds;
        eyre::ensure!(
            bounds.min.x <= bounds.max.x && bounds.min.y <= bounds.max.y && bounds.min.z <= bounds.max.z,
            "bounds are inverted: {bounds}"
        );
        Ok(())
    }
}
