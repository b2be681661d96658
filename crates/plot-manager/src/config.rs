use plot_queue::{Priority, QueueConfig};
use plot_region::WorldBounds;
use serde::{Deserialize, Serialize};

/// Settings for a [`ChunkManager`](crate::ChunkManager).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub queue: QueueConfig,
    pub bounds: WorldBounds,
    /// Priority of operations submitted through the named helpers.
    pub default_priority: Priority,
}
