//! The global mutation queue.
//!
//! Every chunk owns a FIFO lane of task ids in submission order. A task is
//! ready only when it heads the lane of every chunk it touches, so two tasks
//! for one chunk never run at once and always run in the order they were
//! enqueued. Among ready tasks, higher priority runs first, then earlier
//! sequence numbers.
//!
//! ```text
//!   lane (0,0): [t1] t4        t1 ready, t4 waits for t1
//!   lane (1,0): [t2]           t2 ready
//!   lane (2,0): [t3] t5        t3 ready (transfer t5 also needs lane (1,0))
//! ```
//!
//! Ready tasks head disjoint lanes, so a batch of them can run in parallel.
//! [`GlobalQueue::pump`] runs batches until the per-tick task or time budget
//! is spent and always returns; task failures and panics become task states.

use std::any::Any;
use std::cmp::Reverse;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use plot_region::{AccessError, AccessorFactory, ChunkPos};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, info, trace, warn};

use crate::operation::OperationRecord;
use crate::{
    ChunkTask, Finisher, FinishedOperation, OperationSummary, Priority, Progress,
    QueueConfig, QueueHandle, TaskError, TaskId, TaskState, TaskStats,
};

struct QueuedTask {
    handle: QueueHandle,
    task: ChunkTask,
    chunks: SmallVec<[ChunkPos; 2]>,
    priority: Priority,
    sequence: u64,
    state: TaskState,
    /// Retries used so far.
    retries: u32,
    /// Earliest tick the task may run.
    not_before: u64,
}

/// Outcome of running one task.
enum Outcome {
    Applied(TaskStats),
    Unavailable,
    Failed(TaskError),
}

/// Where a task went after running.
enum Settled {
    Applied,
    Retrying,
    Failed,
}

/// What one pump did.
#[derive(Debug, Default)]
pub struct PumpReport {
    pub tick: u64,
    /// Tasks that ran, whatever their outcome.
    pub executed: usize,
    pub applied: usize,
    /// Tasks put back to wait for an unavailable chunk.
    pub retried: usize,
    pub failed: usize,
    pub batches: usize,
    /// Widest batch run this tick.
    pub widest_batch: usize,
    pub elapsed: Duration,
    /// Operations that became terminal since the last pump.
    pub finished: Vec<FinishedOperation>,
}

/// Schedules chunk tasks from many operations under a per-tick budget.
pub struct GlobalQueue {
    config: QueueConfig,
    tick: u64,
    next_sequence: u64,
    next_task: u64,
    next_handle: u64,
    tasks: FxHashMap<TaskId, QueuedTask>,
    lanes: FxHashMap<ChunkPos, VecDeque<TaskId>>,
    operations: FxHashMap<QueueHandle, OperationRecord>,
    /// Terminal operations in completion order, for eviction.
    retained: VecDeque<QueueHandle>,
    /// Terminal operations whose finishers have not been handed out yet.
    ready: Vec<FinishedOperation>,
}

impl GlobalQueue {
    #[must_use]
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            tick: 0,
            next_sequence: 0,
            next_task: 0,
            next_handle: 0,
            tasks: FxHashMap::default(),
            lanes: FxHashMap::default(),
            operations: FxHashMap::default(),
            retained: VecDeque::new(),
            ready: Vec::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Number of pumps so far.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Tasks not yet terminal.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is waiting to run.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Operations that still have tasks to run.
    #[must_use]
    pub fn active_operations(&self) -> usize {
        self.operations.values().filter(|op| op.summary.is_none()).count()
    }

    /// Tasks queued on `chunk`, running or waiting.
    #[must_use]
    pub fn lane_len(&self, chunk: ChunkPos) -> usize {
        self.lanes.get(&chunk).map_or(0, VecDeque::len)
    }

    /// Enqueue an operation's tasks, which keep their order in every chunk
    /// lane they touch.
    pub fn enqueue(
        &mut self,
        tasks: Vec<ChunkTask>,
        priority: Priority,
        label: impl Into<String>,
    ) -> QueueHandle {
        let handle = QueueHandle(self.next_handle);
        self.next_handle += 1;
        let label = label.into();

        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = TaskId(self.next_task);
            self.next_task += 1;
            let sequence = self.bump_sequence();
            let chunks = task.chunks();
            let destination = task.chunk;
            for &chunk in &chunks {
                self.lanes.entry(chunk).or_default().push_back(id);
            }
            self.tasks.insert(
                id,
                QueuedTask {
                    handle,
                    task,
                    chunks,
                    priority,
                    sequence,
                    state: TaskState::Pending,
                    retries: 0,
                    not_before: self.tick,
                },
            );
            ids.push((id, destination));
        }

        debug!(%handle, %label, tasks = ids.len(), ?priority, "enqueued operation");
        let empty = ids.is_empty();
        self.operations
            .insert(handle, OperationRecord::new(label, &ids, self.tick));
        if empty {
            self.finish_operation(handle);
        }
        handle
    }

    /// Cancel every task of `handle` that has not started.
    ///
    /// Returns the number of tasks cancelled. Unknown and finished handles
    /// are left alone.
    pub fn cancel(&mut self, handle: QueueHandle) -> usize {
        let Some(op) = self.operations.get_mut(&handle) else {
            return 0;
        };
        if op.summary.is_some() {
            return 0;
        }

        let mut cancelled = 0;
        for id in std::mem::take(&mut op.live) {
            let Some(task) = self.tasks.remove(&id) else {
                continue;
            };
            debug_assert_eq!(task.state, TaskState::Pending);
            for chunk in &task.chunks {
                remove_from_lane(&mut self.lanes, *chunk, id);
            }
            cancelled += 1;
        }
        op.progress.cancelled += cancelled;

        info!(%handle, cancelled, "cancelled operation");
        if op.progress.is_finished() {
            self.finish_operation(handle);
        }
        cancelled
    }

    /// Snapshot of an operation's progress.
    #[must_use]
    pub fn progress(&self, handle: QueueHandle) -> Option<Progress> {
        self.operations.get(&handle).map(|op| op.progress)
    }

    /// Summary of a finished operation that is still retained.
    #[must_use]
    pub fn summary(&self, handle: QueueHandle) -> Option<&OperationSummary> {
        self.operations.get(&handle)?.summary.as_ref()
    }

    /// A receiver that yields the operation's summary once it finishes.
    ///
    /// Finished operations deliver immediately. Returns `None` for unknown
    /// or evicted handles.
    #[must_use]
    pub fn completion(&mut self, handle: QueueHandle) -> Option<Receiver<OperationSummary>> {
        let op = self.operations.get_mut(&handle)?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        match &op.summary {
            Some(summary) => {
                let _ = tx.try_send(summary.clone());
            }
            None => op.subscribers.push(tx),
        }
        Some(rx)
    }

    /// Run `finisher` once the operation finishes.
    ///
    /// The finisher is handed out with the next batch of finished operations,
    /// so for an operation that already finished it runs after the next
    /// [`Self::take_finished`] or pump. Returns `false`, dropping the
    /// finisher, for unknown or evicted handles.
    pub fn on_complete(&mut self, handle: QueueHandle, finisher: Finisher) -> bool {
        let Some(op) = self.operations.get_mut(&handle) else {
            return false;
        };
        match &op.summary {
            Some(summary) => self.ready.push(FinishedOperation {
                summary: summary.clone(),
                finishers: vec![finisher],
            }),
            None => op.finishers.push(finisher),
        }
        true
    }

    /// Operations that finished outside a pump, for example by cancellation.
    pub fn take_finished(&mut self) -> Vec<FinishedOperation> {
        std::mem::take(&mut self.ready)
    }

    /// Run ready tasks until this tick's budget is spent.
    pub fn pump<F: AccessorFactory>(&mut self, factory: &F) -> PumpReport {
        self.tick += 1;
        let start = Instant::now();
        let budget = (self.config.max_tick_millis > 0)
            .then(|| Duration::from_millis(self.config.max_tick_millis));
        let max_tasks = self.config.max_tasks_per_tick.max(1);
        let width = self.config.max_parallel.max(1);

        let mut report = PumpReport {
            tick: self.tick,
            ..PumpReport::default()
        };

        while report.executed < max_tasks {
            if report.batches > 0 && budget.is_some_and(|budget| start.elapsed() >= budget) {
                trace!(tick = self.tick, "tick budget spent");
                break;
            }
            let batch = self.select_batch(width.min(max_tasks - report.executed));
            if batch.is_empty() {
                break;
            }
            let outcomes = self.run_batch(&batch, factory);

            report.batches += 1;
            report.widest_batch = report.widest_batch.max(batch.len());
            report.executed += batch.len();
            for (id, outcome) in batch.into_iter().zip(outcomes) {
                match self.settle(id, outcome) {
                    Settled::Applied => report.applied += 1,
                    Settled::Retrying => report.retried += 1,
                    Settled::Failed => report.failed += 1,
                }
            }
        }

        report.elapsed = start.elapsed();
        report.finished = std::mem::take(&mut self.ready);
        if report.executed > 0 {
            debug!(
                tick = report.tick,
                executed = report.executed,
                applied = report.applied,
                retried = report.retried,
                failed = report.failed,
                batches = report.batches,
                elapsed = ?report.elapsed,
                "pumped queue"
            );
        }
        report
    }

    fn bump_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Pick up to `limit` ready tasks and mark them Running.
    fn select_batch(&mut self, limit: usize) -> Vec<TaskId> {
        let mut seen = FxHashSet::default();
        let mut ready: Vec<(Reverse<Priority>, u64, TaskId)> = Vec::new();

        for lane in self.lanes.values() {
            let Some(&id) = lane.front() else { continue };
            if !seen.insert(id) {
                continue;
            }
            let Some(task) = self.tasks.get(&id) else {
                continue;
            };
            if task.state != TaskState::Pending || task.not_before > self.tick {
                continue;
            }
            let heads_all = task
                .chunks
                .iter()
                .all(|chunk| self.lanes.get(chunk).and_then(VecDeque::front) == Some(&id));
            if heads_all {
                ready.push((Reverse(task.priority), task.sequence, id));
            }
        }

        ready.sort_unstable();
        ready.truncate(limit);

        let batch: Vec<TaskId> = ready.into_iter().map(|(_, _, id)| id).collect();
        for id in &batch {
            if let Some(task) = self.tasks.get_mut(id) {
                task.state = TaskState::Running;
            }
        }
        batch
    }

    fn run_batch<F: AccessorFactory>(&self, batch: &[TaskId], factory: &F) -> Vec<Outcome> {
        let jobs: Vec<&QueuedTask> = batch.iter().filter_map(|id| self.tasks.get(id)).collect();
        if jobs.len() > 1 {
            jobs.into_par_iter().map(|job| run_task(job, factory)).collect()
        } else {
            jobs.into_iter().map(|job| run_task(job, factory)).collect()
        }
    }

    /// Move a task that just ran to its next state.
    fn settle(&mut self, id: TaskId, outcome: Outcome) -> Settled {
        let Some(task) = self.tasks.get_mut(&id) else {
            return Settled::Failed;
        };
        let chunk = task.task.chunk;

        let terminal = match outcome {
            Outcome::Applied(stats) => Ok(stats),
            Outcome::Unavailable if task.retries < self.config.max_retries => {
                task.retries += 1;
                task.state = TaskState::Pending;
                task.not_before = self.tick + self.config.retry_delay_ticks.max(1);
                task.sequence = self.next_sequence;
                self.next_sequence += 1;
                debug!(%chunk, retries = task.retries, "chunk unavailable, retrying later");
                return Settled::Retrying;
            }
            Outcome::Unavailable => Err(TaskError::ChunkUnavailable {
                chunk,
                attempts: task.retries + 1,
            }),
            Outcome::Failed(error) => Err(error),
        };

        let settled = if terminal.is_ok() {
            Settled::Applied
        } else {
            Settled::Failed
        };
        let Some(task) = self.tasks.remove(&id) else {
            return settled;
        };
        for chunk in &task.chunks {
            remove_from_lane(&mut self.lanes, *chunk, id);
        }

        let handle = task.handle;
        let Some(op) = self.operations.get_mut(&handle) else {
            return settled;
        };
        op.forget(id);
        match terminal {
            Ok(stats) => {
                trace!(%handle, %chunk, op = task.task.operation.name(), "task applied");
                op.applied(chunk, stats);
            }
            Err(error) => {
                warn!(%handle, %chunk, %error, "task failed");
                op.failed(chunk, error);
            }
        }
        if op.progress.is_finished() {
            self.finish_operation(handle);
        }
        settled
    }

    fn finish_operation(&mut self, handle: QueueHandle) {
        let tick = self.tick;
        let Some(op) = self.operations.get_mut(&handle) else {
            return;
        };
        let finished = op.finish(handle, tick);
        let summary = &finished.summary;
        info!(
            %handle,
            label = %summary.label,
            completed = summary.progress.completed,
            failed = summary.progress.failed,
            cancelled = summary.progress.cancelled,
            ticks = summary.ticks,
            "operation finished"
        );
        self.ready.push(finished);

        self.retained.push_back(handle);
        while self.retained.len() > self.config.retain_completed {
            if let Some(evicted) = self.retained.pop_front() {
                self.operations.remove(&evicted);
            }
        }
    }
}

impl Default for GlobalQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl std::fmt::Debug for GlobalQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalQueue")
            .field("tick", &self.tick)
            .field("tasks", &self.tasks.len())
            .field("lanes", &self.lanes.len())
            .field("operations", &self.operations.len())
            .finish()
    }
}

fn remove_from_lane(lanes: &mut FxHashMap<ChunkPos, VecDeque<TaskId>>, chunk: ChunkPos, id: TaskId) {
    if let Some(lane) = lanes.get_mut(&chunk) {
        lane.retain(|&t| t != id);
        if lane.is_empty() {
            lanes.remove(&chunk);
        }
    }
}

fn run_task<F: AccessorFactory>(job: &QueuedTask, factory: &F) -> Outcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| job.task.apply(factory)));
    match result {
        Ok(Ok(stats)) => Outcome::Applied(stats),
        Ok(Err(AccessError::ChunkUnavailable(_))) => Outcome::Unavailable,
        Ok(Err(fault)) => Outcome::Failed(TaskError::AccessorFault(fault)),
        Err(payload) => Outcome::Failed(TaskError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Text of a caught panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use plot_region::{BlockPos, BlockState, LocalArea, MemoryWorld};

    use super::*;
    use crate::{ChunkFailure, TaskOperation, TransferMode};

    fn world() -> MemoryWorld {
        MemoryWorld::new(11, 0, 15)
    }

    fn column() -> LocalArea {
        LocalArea::column(0, 15)
    }

    fn clear(x: i32, z: i32) -> ChunkTask {
        ChunkTask::new(ChunkPos::new(x, z), column(), TaskOperation::Clear)
    }

    fn fill(x: i32, block: &str) -> ChunkTask {
        ChunkTask::new(ChunkPos::new(x, 0), column(), TaskOperation::Fill {
            block: BlockState::new(block),
        })
    }

    fn config(max_tasks_per_tick: usize) -> QueueConfig {
        QueueConfig {
            retry_delay_ticks: 1,
            ..QueueConfig::sequential(max_tasks_per_tick)
        }
    }

    fn drain(queue: &mut GlobalQueue, world: &MemoryWorld) -> Vec<FinishedOperation> {
        let mut finished = Vec::new();
        for _ in 0..100 {
            finished.extend(queue.pump(world).finished);
            if queue.is_idle() {
                break;
            }
        }
        finished
    }

    #[test]
    fn two_chunk_delete_reports_progress() {
        let world = world();
        let mut queue = GlobalQueue::new(config(8));
        let handle = queue.enqueue(vec![clear(0, 0), clear(1, 0)], Priority::NORMAL, "delete");
        assert_eq!(
            queue.progress(handle),
            Some(Progress {
                completed: 0,
                total: 2,
                failed: 0,
                cancelled: 0
            })
        );

        let report = queue.pump(&world);
        assert_eq!(report.applied, 2);
        assert_eq!(
            queue.progress(handle),
            Some(Progress {
                completed: 2,
                total: 2,
                failed: 0,
                cancelled: 0
            })
        );
        let summary = &report.finished[0].summary;
        assert_eq!(summary.completed_chunks, vec![ChunkPos::new(0, 0), ChunkPos::new(1, 0)]);
        assert!(summary.is_success());
        assert!(world.block(BlockPos::new(20, 0, 3)).is_air());
    }

    #[test]
    fn same_chunk_runs_in_submission_order_despite_priority() {
        let world = world();
        let mut queue = GlobalQueue::new(config(1));
        let first = queue.enqueue(vec![fill(0, "minecraft:stone")], Priority::LOW, "first");
        let second = queue.enqueue(vec![fill(0, "minecraft:glass")], Priority::HIGH, "second");

        queue.pump(&world);
        assert_eq!(queue.progress(first).unwrap().completed, 1);
        assert_eq!(queue.progress(second).unwrap().completed, 0);

        queue.pump(&world);
        assert_eq!(world.block(BlockPos::new(3, 3, 3)).name(), "minecraft:glass");
    }

    #[test]
    fn priority_orders_independent_chunks() {
        let world = world();
        let mut queue = GlobalQueue::new(config(1));
        let low = queue.enqueue(vec![clear(0, 0)], Priority::LOW, "low");
        let high = queue.enqueue(vec![clear(5, 5)], Priority::HIGH, "high");

        queue.pump(&world);
        assert_eq!(queue.progress(high).unwrap().completed, 1);
        assert_eq!(queue.progress(low).unwrap().completed, 0);
    }

    #[test]
    fn task_budget_limits_each_tick() {
        let world = world();
        let mut queue = GlobalQueue::new(QueueConfig {
            max_tasks_per_tick: 3,
            max_tick_millis: 0,
            max_parallel: 2,
            ..QueueConfig::default()
        });
        let handle = queue.enqueue((0..10).map(|x| clear(x, 0)).collect(), Priority::NORMAL, "big");

        let executed: Vec<_> = (0..4).map(|_| queue.pump(&world).executed).collect();
        assert_eq!(executed, [3, 3, 3, 1]);
        assert!(queue.progress(handle).unwrap().is_finished());
    }

    #[test]
    fn parallel_batches_touch_distinct_chunks() {
        let world = world();
        let mut queue = GlobalQueue::new(QueueConfig {
            max_tasks_per_tick: 64,
            max_tick_millis: 0,
            max_parallel: 4,
            ..QueueConfig::default()
        });
        queue.enqueue((0..8).map(|x| clear(x, 0)).collect(), Priority::NORMAL, "a");
        queue.enqueue((4..12).map(|x| fill(x, "minecraft:sand")).collect(), Priority::NORMAL, "b");

        let report = queue.pump(&world);
        assert_eq!(report.executed, 16);
        assert_eq!(report.widest_batch, 4);
        assert!(!world.concurrent_access_detected());
        assert_eq!(world.block(BlockPos::new(16 * 5, 1, 0)).name(), "minecraft:sand");
    }

    #[test]
    fn transfer_waits_for_both_lanes() {
        let world = world();
        let mut queue = GlobalQueue::new(QueueConfig {
            max_tick_millis: 0,
            max_parallel: 4,
            ..QueueConfig::default()
        });
        queue.enqueue(vec![clear(1, 0)], Priority::NORMAL, "clear source");
        queue.enqueue(
            vec![ChunkTask::new(ChunkPos::new(2, 0), column(), TaskOperation::Transfer {
                source: ChunkPos::new(1, 0),
                source_area: column(),
                mode: TransferMode::Copy { entities: true },
            })],
            Priority::HIGH,
            "copy",
        );
        queue.enqueue(vec![fill(2, "minecraft:dirt")], Priority::NORMAL, "fill dest");
        assert_eq!(queue.lane_len(ChunkPos::new(2, 0)), 2);

        let report = queue.pump(&world);
        assert_eq!(report.executed, 3);
        assert_eq!(report.batches, 3);
        assert_eq!(report.widest_batch, 1);
        assert_eq!(world.block(BlockPos::new(32, 0, 0)).name(), "minecraft:dirt");
    }

    #[test]
    fn unavailable_chunk_is_retried() {
        let world = world();
        world.make_unavailable(ChunkPos::new(0, 0), 2);
        let mut queue = GlobalQueue::new(config(8));
        let handle = queue.enqueue(vec![clear(0, 0)], Priority::NORMAL, "retry");

        assert_eq!(queue.pump(&world).retried, 1);
        assert_eq!(queue.pump(&world).retried, 1);
        let report = queue.pump(&world);
        assert_eq!(report.applied, 1);
        assert_eq!(queue.progress(handle).unwrap().completed, 1);
    }

    #[test]
    fn exhausted_retries_fail_only_that_chunk() {
        let world = world();
        world.make_unavailable(ChunkPos::new(1, 0), 100);
        let mut queue = GlobalQueue::new(QueueConfig {
            max_retries: 2,
            ..config(8)
        });
        let handle = queue.enqueue(vec![clear(0, 0), clear(1, 0), clear(2, 0)], Priority::NORMAL, "best effort");

        let finished = drain(&mut queue, &world);
        let summary = &finished[0].summary;
        assert_eq!(summary.handle, handle);
        assert_eq!(summary.progress.completed, 2);
        assert_eq!(
            summary.failed_chunks,
            vec![ChunkFailure {
                chunk: ChunkPos::new(1, 0),
                error: TaskError::ChunkUnavailable {
                    chunk: ChunkPos::new(1, 0),
                    attempts: 3
                },
            }]
        );
        assert!(!summary.is_success());
    }

    #[test]
    fn faults_and_panics_fail_without_stopping_the_pump() {
        let world = world();
        world.inject_fault(ChunkPos::new(0, 0), "disk on fire");
        world.inject_panic(ChunkPos::new(1, 0));
        let mut queue = GlobalQueue::new(config(8));
        queue.enqueue(vec![clear(0, 0), clear(1, 0), clear(2, 0)], Priority::NORMAL, "mixed");

        let report = queue.pump(&world);
        assert_eq!(report.failed, 2);
        assert_eq!(report.applied, 1);
        let failures = &report.finished[0].summary.failed_chunks;
        assert!(matches!(failures[0].error, TaskError::AccessorFault(_)));
        assert!(matches!(&failures[1].error, TaskError::Panicked(msg) if msg.contains("injected panic")));
    }

    #[test]
    fn cancel_stops_pending_tasks() {
        let world = world();
        let mut queue = GlobalQueue::new(config(1));
        let handle = queue.enqueue((0..4).map(|x| clear(x, 0)).collect(), Priority::NORMAL, "cancel me");
        let done = queue.completion(handle).unwrap();

        queue.pump(&world);
        assert_eq!(queue.cancel(handle), 3);
        assert_eq!(queue.cancel(handle), 0);
        assert!(queue.is_idle());

        let summary = done.try_recv().unwrap();
        assert!(summary.cancelled);
        assert_eq!(
            summary.progress,
            Progress {
                completed: 1,
                total: 4,
                failed: 0,
                cancelled: 3
            }
        );
        assert_eq!(queue.take_finished().len(), 1);
        // Only the first chunk was touched.
        assert!(world.block(BlockPos::new(0, 0, 0)).is_air());
        assert!(!world.block(BlockPos::new(16, 0, 0)).is_air());
    }

    #[test]
    fn finishers_run_once() {
        let world = world();
        let mut queue = GlobalQueue::new(config(8));
        let handle = queue.enqueue(vec![clear(0, 0)], Priority::NORMAL, "notify");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        assert!(queue.on_complete(handle, Box::new(move |summary| {
            assert!(summary.is_success());
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        for finished in drain(&mut queue, &world) {
            finished.run_finishers();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Late subscribers still get the summary.
        let late = queue.completion(handle).unwrap();
        assert_eq!(late.try_recv().unwrap().handle, handle);
    }

    #[test]
    fn unknown_and_evicted_handles() {
        let world = world();
        let mut queue = GlobalQueue::new(QueueConfig {
            retain_completed: 1,
            ..config(8)
        });
        let first = queue.enqueue(vec![clear(0, 0)], Priority::NORMAL, "first");
        queue.pump(&world);
        let second = queue.enqueue(vec![clear(1, 0)], Priority::NORMAL, "second");
        queue.pump(&world);

        assert_eq!(queue.progress(first), None);
        assert!(queue.completion(first).is_none());
        assert!(!queue.on_complete(first, Box::new(|_| {})));
        assert_eq!(queue.cancel(first), 0);
        assert!(queue.progress(second).unwrap().is_finished());
    }

    #[test]
    fn empty_operation_finishes_immediately() {
        let mut queue = GlobalQueue::default();
        let handle = queue.enqueue(Vec::new(), Priority::NORMAL, "nothing");
        assert!(queue.summary(handle).unwrap().is_success());
        assert_eq!(queue.take_finished().len(), 1);
        assert_eq!(queue.active_operations(), 0);
    }
}
