use serde::{Deserialize, Serialize};

/// Throttling and retry settings for [`GlobalQueue`](crate::GlobalQueue).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Most tasks run in one pump.
    pub max_tasks_per_tick: usize,
    /// Time slice for one pump in milliseconds. `0` disables the limit.
    ///
    /// Checked between batches, so a pump may overrun by one batch.
    pub max_tick_millis: u64,
    /// Most tasks run side by side in one batch.
    pub max_parallel: usize,
    /// Retries granted to a task whose chunk is unavailable.
    pub max_retries: u32,
    /// Ticks to wait before retrying an unavailable chunk.
    pub retry_delay_ticks: u64,
    /// Finished operations kept around for progress queries.
    pub retain_completed: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_tick: 64,
            max_tick_millis: 25,
            max_parallel: 4,
            max_retries: 5,
            retry_delay_ticks: 2,
            retain_completed: 256,
        }
    }
}

impl QueueConfig {
    /// Run tasks one at a time with no time limit.
    #[must_use]
    pub fn sequential(max_tasks_per_tick: usize) -> Self {
        Self {
            max_tasks_per_tick,
            max_tick_millis: 0,
            max_parallel: 1,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: QueueConfig = toml::from_str("max_parallel = 8\nmax_retries = 1").unwrap();
        assert_eq!(config.max_parallel, 8);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.max_tasks_per_tick, QueueConfig::default().max_tasks_per_tick);
    }
}
