//! Pipeline workers and the entry point that runs them.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;
use std::time::Instant;

use super::batch::Batch;
use super::coordinator::{Admission, Coordinator, Stage, WorkerSlot};
use super::stats::PipelineStats;
use crate::errors::{Result, SeqmapError};

/// The three stage functions a pipeline runs.
///
/// Implementations are shared by reference between all workers. The
/// coordinator guarantees that a given stage never runs on two workers at once
/// and that batches reach [`PipelineStages::emit`] in index order.
pub trait PipelineStages: Sync {
    type Record: Send;

    /// Reads the batch that will carry `index`. A terminal batch ends this worker.
    fn ingest(&self, index: u64) -> Result<Batch<Self::Record>>;

    /// Fills in the result of every record in place.
    fn transform(&self, batch: &mut Batch<Self::Record>) -> Result<()>;

    /// Writes the results and releases the batch.
    fn emit(&self, batch: Batch<Self::Record>) -> Result<()>;
}

/// Configuration for [`run_pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of pipeline workers (the degree of I/O overlap).
    pub num_workers: usize,
}

impl PipelineConfig {
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        Self { num_workers }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(SeqmapError::InvalidParameter {
                parameter: "pipeline-workers".to_string(),
                reason: "must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(2)
    }
}

/// What one worker did over the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,
    pub ingests: u64,
    pub transforms: u64,
    pub emits: u64,
    /// Indices of the batches this worker emitted, in emit order.
    pub emitted: Vec<u64>,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Number of batch indices handed out, including the ones that came back terminal.
    pub indices_issued: u64,
    pub workers: Vec<WorkerReport>,
}

impl PipelineSummary {
    /// Total number of batches that were emitted.
    #[must_use]
    pub fn batches_emitted(&self) -> u64 {
        self.workers.iter().map(|w| w.emits).sum()
    }

    /// Total number of ingest stage executions, terminal ones included.
    #[must_use]
    pub fn ingest_executions(&self) -> u64 {
        self.workers.iter().map(|w| w.ingests).sum()
    }
}

/// Runs `stages` on `config.num_workers` threads until every worker has seen end-of-input.
///
/// Returns the first error raised by any stage (or a panic converted to an
/// error). Once a failure is recorded no worker is admitted to another stage;
/// stages already running finish before the threads are joined.
pub fn run_pipeline<S: PipelineStages>(
    stages: &S,
    config: &PipelineConfig,
    stats: Option<&PipelineStats>,
) -> Result<PipelineSummary> {
    config.validate()?;
    let coordinator = Coordinator::new(config.num_workers);
    log::debug!("Starting pipeline with {} workers", config.num_workers);

    let reports = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(config.num_workers);
        for worker in 0..config.num_workers {
            let coordinator = &coordinator;
            let spawned = thread::Builder::new()
                .name(format!("pipeline-{worker}"))
                .spawn_scoped(scope, move || worker_loop(worker, coordinator, stages, stats));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    coordinator.abort(SeqmapError::PipelineAborted {
                        reason: format!("failed to spawn pipeline worker {worker}: {e}"),
                    });
                    break;
                }
            }
        }

        handles
            .into_iter()
            .enumerate()
            .filter_map(|(worker, handle)| match handle.join() {
                Ok(report) => Some(report),
                Err(panic_info) => {
                    let msg = extract_panic_message(panic_info);
                    coordinator.abort(SeqmapError::PipelineAborted {
                        reason: format!("pipeline worker {worker} panicked: {msg}"),
                    });
                    None
                }
            })
            .collect::<Vec<_>>()
    });

    if let Some(error) = coordinator.take_failure() {
        return Err(error);
    }

    let state = coordinator.snapshot();
    debug_assert!(state.all_terminated());
    log::debug!("Pipeline finished after issuing {} batch indices", state.next_index());
    Ok(PipelineSummary { indices_issued: state.next_index(), workers: reports })
}

fn worker_loop<S: PipelineStages>(
    worker: usize,
    coordinator: &Coordinator,
    stages: &S,
    stats: Option<&PipelineStats>,
) -> WorkerReport {
    let mut report = WorkerReport { worker, ..WorkerReport::default() };
    let mut held: Option<Batch<S::Record>> = None;

    loop {
        let (admission, waited) = coordinator.acquire(worker);
        let slot = match admission {
            Admission::Run(slot) => slot,
            Admission::Finished => break,
            Admission::Aborted => {
                if let Some(batch) = held.take() {
                    log::debug!("Worker {worker} dropping batch {} after abort", batch.index());
                }
                break;
            }
        };
        if let Some(stats) = stats {
            stats.record_wait(slot.stage, waited);
        }

        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| run_stage(stages, slot, &mut held)));
        let (produced, records) = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(error)) => {
                coordinator.abort(error);
                break;
            }
            Err(panic_info) => {
                let msg = extract_panic_message(panic_info);
                coordinator.abort(SeqmapError::PipelineAborted {
                    reason: format!(
                        "worker {worker} panicked during {} of batch {}: {msg}",
                        slot.stage, slot.index
                    ),
                });
                break;
            }
        };
        if let Some(stats) = stats {
            stats.record_stage(slot.stage, started.elapsed(), records);
        }

        match slot.stage {
            Stage::Ingest => report.ingests += 1,
            Stage::Transform => report.transforms += 1,
            Stage::Emit => {
                report.emits += 1;
                report.emitted.push(slot.index);
            }
            Stage::Terminated => {}
        }

        let next = coordinator.complete(worker, produced);
        if next.stage == Stage::Terminated {
            log::debug!("Worker {worker} reached end of input at batch {}", next.index);
            break;
        }
    }
    report
}

/// Runs one stage, returning whether it produced output and how many records it handled.
fn run_stage<S: PipelineStages>(
    stages: &S,
    slot: WorkerSlot,
    held: &mut Option<Batch<S::Record>>,
) -> Result<(bool, usize)> {
    match slot.stage {
        Stage::Ingest => {
            let batch = stages.ingest(slot.index)?;
            if batch.is_terminal() {
                Ok((false, 0))
            } else {
                let records = batch.len();
                *held = Some(batch);
                Ok((true, records))
            }
        }
        Stage::Transform => {
            let batch = held.as_mut().ok_or_else(|| missing_batch(slot))?;
            stages.transform(batch)?;
            Ok((true, batch.len()))
        }
        Stage::Emit => {
            let batch = held.take().ok_or_else(|| missing_batch(slot))?;
            let records = batch.len();
            stages.emit(batch)?;
            Ok((true, records))
        }
        Stage::Terminated => Ok((false, 0)),
    }
}

fn missing_batch(slot: WorkerSlot) -> SeqmapError {
    SeqmapError::PipelineAborted {
        reason: format!("no batch held for {} of batch {}", slot.stage, slot.index),
    }
}

/// Extract a readable message from a panic payload.
#[must_use]
pub fn extract_panic_message(panic_info: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
