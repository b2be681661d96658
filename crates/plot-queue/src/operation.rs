//! Bookkeeping for one enqueued bulk operation.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::Sender;
use plot_region::ChunkPos;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::queue::panic_message;
use crate::{TaskError, TaskStats};

/// Opaque token for an enqueued operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueHandle(pub(crate) u64);

impl fmt::Display for QueueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Identifier of a queued chunk task.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

/// Scheduling priority. Higher runs first among tasks that are ready.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i16);

impl Priority {
    pub const LOW: Self = Self(-10);
    pub const NORMAL: Self = Self(0);
    pub const HIGH: Self = Self(10);
}

/// Where a queued task is. Tasks leave the queue once they apply, fail, or
/// are cancelled; their outcome is kept in the operation's [`Progress`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskState {
    Pending,
    Running,
}

/// Snapshot of an operation's task counts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl Progress {
    /// Whether every task reached a terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.completed + self.failed + self.cancelled == self.total
    }

    /// Fraction of tasks in a terminal state, in `0.0..=1.0`.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.completed + self.failed + self.cancelled) as f64 / self.total as f64
    }
}

/// A chunk whose task failed, and why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkFailure {
    pub chunk: ChunkPos,
    pub error: TaskError,
}

/// Final report for an operation, delivered exactly once per subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationSummary {
    pub handle: QueueHandle,
    pub label: String,
    /// Destination chunks all of whose tasks applied, in completion order.
    /// Each chunk appears once.
    pub completed_chunks: Vec<ChunkPos>,
    /// The first failure of each chunk with a failed task.
    pub failed_chunks: Vec<ChunkFailure>,
    /// Whether cancellation stopped at least one task.
    pub cancelled: bool,
    pub progress: Progress,
    pub stats: TaskStats,
    /// Ticks between enqueue and completion.
    pub ticks: u64,
}

impl OperationSummary {
    /// Whether every task applied.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.failed_chunks.is_empty()
    }
}

/// Callback run once an operation finishes, outside the queue lock.
pub type Finisher = Box<dyn FnOnce(&OperationSummary) + Send>;

/// A finished operation together with the callbacks still owed to it.
pub struct FinishedOperation {
    pub summary: OperationSummary,
    pub finishers: Vec<Finisher>,
}

impl FinishedOperation {
    /// Run and consume the finishers. A panicking finisher is logged and
    /// does not stop the ones after it.
    pub fn run_finishers(self) -> OperationSummary {
        for finisher in self.finishers {
            let summary = &self.summary;
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| finisher(summary))) {
                warn!(
                    handle = %summary.handle,
                    message = %panic_message(payload.as_ref()),
                    "operation finisher panicked"
                );
            }
        }
        self.summary
    }
}

impl fmt::Debug for FinishedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinishedOperation")
            .field("summary", &self.summary)
            .field("finishers", &self.finishers.len())
            .finish()
    }
}

/// Queue-side state of an operation.
pub(crate) struct OperationRecord {
    pub label: String,
    /// Tasks not yet terminal.
    pub live: Vec<TaskId>,
    pub progress: Progress,
    /// Unfinished tasks per destination chunk.
    outstanding: FxHashMap<ChunkPos, usize>,
    pub completed_chunks: Vec<ChunkPos>,
    pub failed_chunks: Vec<ChunkFailure>,
    pub stats: TaskStats,
    pub enqueued_tick: u64,
    pub subscribers: Vec<Sender<OperationSummary>>,
    pub finishers: Vec<Finisher>,
    /// Set once the operation is terminal.
    pub summary: Option<OperationSummary>,
}

impl OperationRecord {
    /// `tasks` pairs every task with its destination chunk.
    pub fn new(label: String, tasks: &[(TaskId, ChunkPos)], tick: u64) -> Self {
        let mut outstanding = FxHashMap::default();
        for (_, chunk) in tasks {
            *outstanding.entry(*chunk).or_insert(0) += 1;
        }
        Self {
            label,
            progress: Progress {
                total: tasks.len(),
                ..Progress::default()
            },
            live: tasks.iter().map(|(id, _)| *id).collect(),
            outstanding,
            completed_chunks: Vec::new(),
            failed_chunks: Vec::new(),
            stats: TaskStats::default(),
            enqueued_tick: tick,
            subscribers: Vec::new(),
            finishers: Vec::new(),
            summary: None,
        }
    }

    pub fn forget(&mut self, task: TaskId) {
        self.live.retain(|&t| t != task);
    }

    /// Record a task of `chunk` that applied.
    pub fn applied(&mut self, chunk: ChunkPos, stats: TaskStats) {
        self.progress.completed += 1;
        self.stats += stats;
        self.settle_chunk(chunk);
    }

    /// Record a task of `chunk` that failed. Only the chunk's first error is
    /// kept.
    pub fn failed(&mut self, chunk: ChunkPos, error: TaskError) {
        self.progress.failed += 1;
        if !self.has_failed(chunk) {
            self.failed_chunks.push(ChunkFailure { chunk, error });
        }
        self.settle_chunk(chunk);
    }

    fn has_failed(&self, chunk: ChunkPos) -> bool {
        self.failed_chunks.iter().any(|f| f.chunk == chunk)
    }

    /// A chunk completes once its last task applied and none failed.
    /// Cancelled tasks never settle, so a partly cancelled chunk is never
    /// reported complete.
    fn settle_chunk(&mut self, chunk: ChunkPos) {
        let Some(left) = self.outstanding.get_mut(&chunk) else {
            return;
        };
        *left -= 1;
        if *left == 0 {
            self.outstanding.remove(&chunk);
            if !self.has_failed(chunk) {
                self.completed_chunks.push(chunk);
            }
        }
    }

    /// Build the summary, notify subscribers, and hand back the finishers.
    pub fn finish(&mut self, handle: QueueHandle, tick: u64) -> FinishedOperation {
        let summary = OperationSummary {
            handle,
            label: self.label.clone(),
            completed_chunks: std::mem::take(&mut self.completed_chunks),
            failed_chunks: std::mem::take(&mut self.failed_chunks),
            cancelled: self.progress.cancelled > 0,
            progress: self.progress,
            stats: self.stats,
            ticks: tick - self.enqueued_tick,
        };
        for subscriber in self.subscribers.drain(..) {
            // A dropped receiver only means nobody is waiting any more.
            let _ = subscriber.try_send(summary.clone());
        }
        self.summary = Some(summary.clone());
        FinishedOperation {
            summary,
            finishers: std::mem::take(&mut self.finishers),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn progress_fraction() {
        let progress = Progress {
            completed: 1,
            total: 4,
            failed: 1,
            cancelled: 0,
        };
        assert!(!progress.is_finished());
        assert!((progress.fraction() - 0.5).abs() < f64::EPSILON);
        assert!(Progress::default().is_finished());
    }

    #[test]
    fn finish_notifies_every_subscriber_once() {
        let mut record = OperationRecord::new("test".into(), &[(TaskId(1), ChunkPos::new(0, 0))], 3);
        let (tx_a, rx_a) = crossbeam_channel::bounded(1);
        let (tx_b, rx_b) = crossbeam_channel::bounded(1);
        record.subscribers.push(tx_a);
        record.subscribers.push(tx_b);
        record.applied(ChunkPos::new(0, 0), TaskStats::default());

        let finished = record.finish(QueueHandle(7), 5);
        assert_eq!(finished.summary.ticks, 2);
        assert!(finished.summary.is_success());
        assert_eq!(rx_a.try_recv().unwrap(), finished.summary);
        assert_eq!(rx_b.try_recv().unwrap(), finished.summary);
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn a_panicking_finisher_does_not_skip_the_rest() {
        fn explode(_: &OperationSummary) {
            panic!("finisher exploded");
        }

        let mut record = OperationRecord::new("noisy".into(), &[], 0);
        let ran = Arc::new(AtomicUsize::new(0));
        record.finishers.push(Box::new(explode));
        let counter = Arc::clone(&ran);
        record.finishers.push(Box::new(move |summary: &OperationSummary| {
            assert_eq!(summary.label, "noisy");
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let summary = record.finish(QueueHandle(1), 0).run_finishers();
        assert!(summary.is_success());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn chunks_are_reported_once() {
        let (a, b) = (ChunkPos::new(2, 0), ChunkPos::new(3, 0));
        let mut record = OperationRecord::new(
            "pieces".into(),
            &[(TaskId(1), a), (TaskId(2), a), (TaskId(3), b), (TaskId(4), b), (TaskId(5), b)],
            0,
        );
        record.applied(a, TaskStats::default());
        assert!(record.completed_chunks.is_empty());
        record.applied(a, TaskStats::default());
        assert_eq!(record.completed_chunks, vec![a]);

        record.applied(b, TaskStats::default());
        let error = TaskError::Panicked("boom".into());
        record.failed(b, error.clone());
        record.failed(b, TaskError::Panicked("again".into()));
        assert_eq!(record.completed_chunks, vec![a]);
        assert_eq!(record.failed_chunks, vec![ChunkFailure { chunk: b, error }]);
        assert_eq!(record.progress.completed, 3);
        assert_eq!(record.progress.failed, 2);
    }
}
