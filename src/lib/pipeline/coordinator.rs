//! Admission control for pipeline workers.
//!
//! Each worker owns one batch index at a time and walks it through
//! [`Stage::Ingest`], [`Stage::Transform`] and [`Stage::Emit`]. A worker may
//! start its current stage only when no other live worker is at the same or
//! an earlier stage with a smaller batch index. That single rule gives:
//!
//! - emits happen in strictly increasing batch index order;
//! - at most one worker runs any given stage at a time, so transform scratch
//!   memory is never shared;
//! - with one worker the pipeline degenerates to a sequential loop.
//!
//! State lives behind one [`parking_lot::Mutex`] with a single broadcast
//! [`parking_lot::Condvar`]. Every state change wakes all waiters, who re-check
//! their own admission. Worker counts are small, so the O(P) re-scan is fine.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::errors::SeqmapError;

/// Number of active stages a batch passes through.
pub const STAGE_COUNT: usize = 3;

/// The stage a worker is currently waiting on or executing.
///
/// Ordering follows the pipeline order; `Terminated` sorts after every active stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Pull the next batch from the reader.
    Ingest,
    /// Compute results for every record in the batch.
    Transform,
    /// Write results and release the batch.
    Emit,
    /// The worker saw end-of-input and will not run again.
    Terminated,
}

impl Stage {
    /// The active stages in pipeline order.
    pub const ACTIVE: [Stage; STAGE_COUNT] = [Stage::Ingest, Stage::Transform, Stage::Emit];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Stage::Ingest => 0,
            Stage::Transform => 1,
            Stage::Emit => 2,
            Stage::Terminated => STAGE_COUNT,
        }
    }

    /// Maps `0..STAGE_COUNT` to the active stages and anything else to `Terminated`.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        match index {
            0 => Stage::Ingest,
            1 => Stage::Transform,
            2 => Stage::Emit,
            _ => Stage::Terminated,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Stage::Ingest => "Ingest",
            Stage::Transform => "Transform",
            Stage::Emit => "Emit",
            Stage::Terminated => "Terminated",
        }
    }

    #[must_use]
    pub const fn is_last(self) -> bool {
        matches!(self, Stage::Emit)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where one worker is: its stage and the batch index it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSlot {
    pub stage: Stage,
    pub index: u64,
}

/// The bookkeeping shared by all workers.
///
/// Indices `0..P` are handed out at construction, one per worker, so
/// `next_index` always equals the number of indices issued so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    slots: Vec<WorkerSlot>,
    next_index: u64,
}

impl PipelineState {
    /// Creates the state for `worker_count` workers, each at ingest with its own index.
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        let slots: Vec<WorkerSlot> = (0..worker_count as u64)
            .map(|index| WorkerSlot { stage: Stage::Ingest, index })
            .collect();
        Self { next_index: slots.len() as u64, slots }
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn slot(&self, worker: usize) -> WorkerSlot {
        self.slots[worker]
    }

    #[must_use]
    pub fn slots(&self) -> &[WorkerSlot] {
        &self.slots
    }

    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// True once every worker has terminated.
    #[must_use]
    pub fn all_terminated(&self) -> bool {
        self.slots.iter().all(|slot| slot.stage == Stage::Terminated)
    }

    /// Whether `worker` may run its current stage now.
    ///
    /// Admission is refused while any other live worker sits at the same or an
    /// earlier stage holding a smaller batch index. A terminated worker is never admitted.
    #[must_use]
    pub fn is_admitted(&self, worker: usize) -> bool {
        let me = self.slots[worker];
        if me.stage == Stage::Terminated {
            return false;
        }
        !self.slots.iter().enumerate().any(|(other, slot)| {
            other != worker
                && slot.stage != Stage::Terminated
                && slot.stage <= me.stage
                && slot.index < me.index
        })
    }

    /// Moves `worker` past the stage it just ran.
    ///
    /// After emit, or after any stage that produced output, the worker moves to
    /// the next stage, wrapping from emit back to ingest with a fresh index.
    /// An earlier stage with no output terminates the worker.
    pub fn advance(&mut self, worker: usize, produced_output: bool) -> WorkerSlot {
        let current = self.slots[worker].stage;
        let next = if current.is_last() || produced_output {
            Stage::from_index((current.index() + 1) % STAGE_COUNT)
        } else {
            Stage::Terminated
        };

        let slot = &mut self.slots[worker];
        slot.stage = next;
        if next == Stage::Ingest {
            slot.index = self.next_index;
            self.next_index += 1;
        }
        *slot
    }
}

/// Outcome of waiting for admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Run this stage of this batch.
    Run(WorkerSlot),
    /// The worker has terminated.
    Finished,
    /// Another worker failed; stop without running anything.
    Aborted,
}

#[derive(Debug)]
struct Shared {
    state: PipelineState,
    failure: Option<SeqmapError>,
}

/// The lock-and-broadcast wrapper around [`PipelineState`].
#[derive(Debug)]
pub struct Coordinator {
    shared: Mutex<Shared>,
    progress: Condvar,
}

impl Coordinator {
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        Self {
            shared: Mutex::new(Shared { state: PipelineState::new(worker_count), failure: None }),
            progress: Condvar::new(),
        }
    }

    /// Blocks until `worker` is admitted to its current stage.
    ///
    /// Returns the admission along with the time spent blocked. The lock is
    /// released before returning, so the stage itself runs unlocked.
    pub fn acquire(&self, worker: usize) -> (Admission, Duration) {
        let start = Instant::now();
        let mut shared = self.shared.lock();
        loop {
            if shared.failure.is_some() {
                return (Admission::Aborted, start.elapsed());
            }
            if shared.state.slot(worker).stage == Stage::Terminated {
                return (Admission::Finished, start.elapsed());
            }
            if shared.state.is_admitted(worker) {
                return (Admission::Run(shared.state.slot(worker)), start.elapsed());
            }
            self.progress.wait(&mut shared);
        }
    }

    /// Records that `worker` finished its stage and wakes every waiter.
    pub fn complete(&self, worker: usize, produced_output: bool) -> WorkerSlot {
        let slot = {
            let mut shared = self.shared.lock();
            shared.state.advance(worker, produced_output)
        };
        self.progress.notify_all();
        slot
    }

    /// Stops the pipeline. The first error is kept; later ones are logged and dropped.
    pub fn abort(&self, error: SeqmapError) {
        {
            let mut shared = self.shared.lock();
            if shared.failure.is_none() {
                log::error!("Pipeline stopping: {error}");
                shared.failure = Some(error);
            } else {
                log::debug!("Suppressed secondary pipeline error: {error}");
            }
        }
        self.progress.notify_all();
    }

    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.shared.lock().failure.is_some()
    }

    /// Takes the stored failure, if any.
    pub fn take_failure(&self) -> Option<SeqmapError> {
        self.shared.lock().failure.take()
    }

    /// A copy of the current state, for reporting and tests.
    #[must_use]
    pub fn snapshot(&self) -> PipelineState {
        self.shared.lock().state.clone()
    }
}
