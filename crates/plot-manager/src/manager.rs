//! The public entry point for bulk edits.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use plot_queue::{
    FinishedOperation, GlobalQueue, OperationSummary, Priority, Progress, PumpReport, QueueHandle,
    panic_message,
};
use plot_region::{AccessorFactory, Biome, BlockPos, BlockState, Region, RegionAccessor};
use plot_schematic::{CaptureOptions, Schematic, capture};
use tracing::{debug, info, warn};

use crate::{
    BulkOperation, CompletionListener, ManagerConfig, ManagerResult, Planner, TickHost,
};

/// What one [`ChunkManager::tick`] did.
#[derive(Debug, Default)]
pub struct TickReport {
    pub tick: u64,
    pub executed: usize,
    pub applied: usize,
    pub retried: usize,
    pub failed: usize,
    /// Summaries of operations that finished, after their finishers ran.
    pub finished: Vec<OperationSummary>,
}

/// Validates and plans bulk edits, queues them, and applies them a slice at
/// a time when ticked.
///
/// All methods take `&self`; the queue sits behind a lock so handles can be
/// queried or cancelled from any thread. Finishers and listeners always run
/// after that lock is released.
pub struct ChunkManager<F> {
    factory: F,
    planner: Planner,
    config: ManagerConfig,
    queue: Mutex<GlobalQueue>,
    listeners: RwLock<Vec<Arc<dyn CompletionListener>>>,
}

impl<F: AccessorFactory> ChunkManager<F> {
    pub fn new(factory: F, config: ManagerConfig) -> Self {
        info!(bounds = %config.bounds, queue = ?config.queue, "creating chunk manager");
        Self {
            factory,
            planner: Planner::new(config.bounds),
            queue: Mutex::new(GlobalQueue::new(config.queue.clone())),
            config,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub const fn factory(&self) -> &F {
        &self.factory
    }

    pub const fn planner(&self) -> &Planner {
        &self.planner
    }

    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Register a listener for every finished operation.
    pub fn add_listener(&self, listener: Arc<dyn CompletionListener>) {
        self.listeners.write().push(listener);
    }

    /// Plan and enqueue an operation.
    pub fn submit(&self, operation: BulkOperation, priority: Priority) -> ManagerResult<QueueHandle> {
        let tasks = self.planner.plan(&operation)?;
        let count = tasks.len();
        let (handle, finished) = {
            let mut queue = self.queue.lock();
            let handle = queue.enqueue(tasks, priority, operation.to_string());
            (handle, queue.take_finished())
        };
        debug!(%handle, %operation, tasks = count, "submitted");
        self.dispatch(finished);
        Ok(handle)
    }

    fn submit_default(&self, operation: BulkOperation) -> ManagerResult<QueueHandle> {
        self.submit(operation, self.config.default_priority)
    }

    /// Clear `region` to air and remove its entities.
    pub fn delete_region(&self, region: Region) -> ManagerResult<QueueHandle> {
        self.submit_default(BulkOperation::Delete { region })
    }

    pub fn copy_region(
        &self,
        source: Region,
        dest: BlockPos,
        copy_entities: bool,
    ) -> ManagerResult<QueueHandle> {
        self.submit_default(BulkOperation::Copy {
            source,
            dest,
            copy_entities,
        })
    }

    pub fn move_region(&self, source: Region, dest: BlockPos) -> ManagerResult<QueueHandle> {
        self.submit_default(BulkOperation::Move { source, dest })
    }

    pub fn swap_regions(&self, first: Region, second: BlockPos) -> ManagerResult<QueueHandle> {
        self.submit_default(BulkOperation::Swap { first, second })
    }

    pub fn regenerate_region(&self, region: Region) -> ManagerResult<QueueHandle> {
        self.submit_default(BulkOperation::Regenerate { region })
    }

    pub fn fill_region(&self, region: Region, block: BlockState) -> ManagerResult<QueueHandle> {
        self.submit_default(BulkOperation::Fill { region, block })
    }

    pub fn set_biome(&self, region: Region, biome: Biome) -> ManagerResult<QueueHandle> {
        self.submit_default(BulkOperation::SetBiome { region, biome })
    }

    pub fn paste_schematic(
        &self,
        schematic: Arc<Schematic>,
        anchor: BlockPos,
        paste_air: bool,
    ) -> ManagerResult<QueueHandle> {
        self.submit_default(BulkOperation::PasteSchematic {
            schematic,
            anchor,
            paste_air,
        })
    }

    pub fn query_progress(&self, handle: QueueHandle) -> Option<Progress> {
        self.queue.lock().progress(handle)
    }

    /// Cancel the tasks of `handle` that have not started. Returns how many
    /// were cancelled; finished and unknown handles yield `0`.
    pub fn cancel(&self, handle: QueueHandle) -> usize {
        let (cancelled, finished) = {
            let mut queue = self.queue.lock();
            let cancelled = queue.cancel(handle);
            (cancelled, queue.take_finished())
        };
        self.dispatch(finished);
        cancelled
    }

    /// A receiver that yields the summary once `handle` finishes.
    pub fn completion(&self, handle: QueueHandle) -> Option<Receiver<OperationSummary>> {
        self.queue.lock().completion(handle)
    }

    /// Run `finisher` once `handle` finishes, or right away if it already
    /// has. Returns `false` for unknown handles.
    pub fn on_complete(
        &self,
        handle: QueueHandle,
        finisher: impl FnOnce(&OperationSummary) + Send + 'static,
    ) -> bool {
        let mut queue = self.queue.lock();
        // Listeners already heard about finished operations; only the new
        // finisher is owed.
        if let Some(summary) = queue.summary(handle).cloned() {
            drop(queue);
            contain(&summary, "operation finisher", || finisher(&summary));
            return true;
        }
        let known = queue.on_complete(handle, Box::new(finisher));
        let finished = queue.take_finished();
        drop(queue);
        self.dispatch(finished);
        known
    }

    /// Snapshot `region` into a schematic.
    ///
    /// Holds the queue lock while reading, so no task touches the region's
    /// chunks mid-capture.
    pub fn capture_schematic(&self, region: Region, options: CaptureOptions) -> ManagerResult<Schematic> {
        self.planner.validate(&region)?;
        let _queue = self.queue.lock();
        Ok(capture(&region, &self.factory, options)?)
    }

    /// Number of entities standing in `region`.
    pub fn count_entities(&self, region: Region) -> ManagerResult<usize> {
        self.planner.validate(&region)?;
        let _queue = self.queue.lock();
        let mut count = 0;
        for slice in region.chunk_slices() {
            let accessor = self.factory.open(slice.chunk)?;
            count += accessor.list_entities(&slice.area)?.len();
        }
        Ok(count)
    }

    /// Whether no task is waiting to run.
    pub fn is_idle(&self) -> bool {
        self.queue.lock().is_idle()
    }

    /// Pump the queue once and deliver completions.
    pub fn tick(&self) -> TickReport {
        let PumpReport {
            tick,
            executed,
            applied,
            retried,
            failed,
            finished,
            ..
        } = self.queue.lock().pump(&self.factory);
        TickReport {
            tick,
            executed,
            applied,
            retried,
            failed,
            finished: self.dispatch(finished),
        }
    }

    /// Tick until the queue is idle or `max_ticks` ticks ran. Returns the
    /// number of ticks used.
    pub fn run_until_idle(&self, max_ticks: u64) -> u64 {
        let mut ticks = 0;
        while ticks < max_ticks && !self.is_idle() {
            self.tick();
            ticks += 1;
        }
        ticks
    }

    /// Run finishers, then notify listeners.
    fn dispatch(&self, finished: Vec<FinishedOperation>) -> Vec<OperationSummary> {
        if finished.is_empty() {
            return Vec::new();
        }
        let listeners = self.listeners.read().clone();
        finished
            .into_iter()
            .map(|operation| {
                let summary = operation.run_finishers();
                for listener in &listeners {
                    contain(&summary, "completion listener", || listener.operation_finished(&summary));
                }
                summary
            })
            .collect()
    }
}

/// Run a completion callback, logging a panic instead of unwinding into the
/// tick.
fn contain(summary: &OperationSummary, what: &str, callback: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
        warn!(
            handle = %summary.handle,
            message = %panic_message(payload.as_ref()),
            "{what} panicked"
        );
    }
}

impl<F: AccessorFactory + Send + 'static> ChunkManager<F> {
    /// Pump this manager from the host's tick.
    pub fn register_pump(self: &Arc<Self>, host: &mut impl TickHost) {
        let manager = Arc::clone(self);
        host.register_tick("plot-queue", Box::new(move |_| {
            manager.tick();
        }));
    }
}

impl<F> std::fmt::Debug for ChunkManager<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkManager")
            .field("planner", &self.planner)
            .field("queue", &*self.queue.lock())
            .field("listeners", &self.listeners.read().len())
            .finish_non_exhaustive()
    }
}
