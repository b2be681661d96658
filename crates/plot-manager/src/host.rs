//! Seams to the host simulation.

use plot_queue::OperationSummary;
use tracing::{info, warn};

/// Per-tick callback. Receives the host tick number.
pub type TickHook = Box<dyn FnMut(u64) + Send>;

/// A host that calls registered hooks once per tick.
pub trait TickHost {
    fn register_tick(&mut self, name: &str, hook: TickHook);
}

/// Receives a summary whenever an operation reaches a terminal state.
///
/// Called after the queue lock is released, on the thread that pumped the
/// queue or cancelled the operation.
pub trait CompletionListener: Send + Sync {
    fn operation_finished(&self, summary: &OperationSummary);
}

/// Logs every finished operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl CompletionListener for LogListener {
    fn operation_finished(&self, summary: &OperationSummary) {
        if summary.is_success() {
            info!(
                handle = %summary.handle,
                label = %summary.label,
                chunks = summary.completed_chunks.len(),
                blocks = summary.stats.blocks,
                ticks = summary.ticks,
                "operation complete"
            );
        } else {
            warn!(
                handle = %summary.handle,
                label = %summary.label,
                completed = summary.completed_chunks.len(),
                failed = summary.failed_chunks.len(),
                cancelled = summary.cancelled,
                "operation ended early"
            );
            for failure in &summary.failed_chunks {
                warn!(handle = %summary.handle, chunk = %failure.chunk, error = %failure.error, "chunk failed");
            }
        }
    }
}

/// A minimal host: runs its hooks in registration order on every tick.
#[derive(Default)]
pub struct TickLoop {
    hooks: Vec<(String, TickHook)>,
    tick: u64,
}

impl TickLoop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one tick.
    pub fn run_tick(&mut self) {
        self.tick += 1;
        for (_, hook) in &mut self.hooks {
            hook(self.tick);
        }
    }

    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Names of registered hooks.
    pub fn hooks(&self) -> impl Iterator<Item = &str> + '_ {
        self.hooks.iter().map(|(name, _)| name.as_str())
    }
}

impl TickHost for TickLoop {
    fn register_tick(&mut self, name: &str, hook: TickHook) {
        self.hooks.push((name.to_owned(), hook));
    }
}

impl std::fmt::Debug for TickLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickLoop")
            .field("tick", &self.tick)
            .field("hooks", &self.hooks().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[test]
    fn hooks_run_in_order_each_tick() {
        let mut host = TickLoop::new();
        let seen = Arc::new(AtomicU64::new(0));
        let first = Arc::clone(&seen);
        host.register_tick("first", Box::new(move |tick| {
            first.store(tick * 10, Ordering::SeqCst);
        }));
        let second = Arc::clone(&seen);
        host.register_tick("second", Box::new(move |_| {
            second.fetch_add(1, Ordering::SeqCst);
        }));

        host.run_tick();
        host.run_tick();
        assert_eq!(seen.load(Ordering::SeqCst), 21);
        assert_eq!(host.hooks().collect::<Vec<_>>(), ["first", "second"]);
    }
}
