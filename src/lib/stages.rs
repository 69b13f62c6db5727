//! The concrete ingest, transform and emit stages of the mapper.
//!
//! [`MappingStages`] connects three collaborators to the pipeline:
//!
//! - a [`RecordSource`] read by ingest,
//! - an [`Aligner`] run by transform against the shared [`Arena`],
//! - a [`RecordSink`] written by emit.
//!
//! Each collaborator sits behind its own lock, but the pipeline admits at most
//! one worker per stage at a time, so those locks are never contended. They
//! are taken with `try_lock`, and finding one held is reported as a broken
//! pipeline invariant rather than waited on.

use std::time::Instant;

use log::debug;
use parking_lot::{Mutex, MutexGuard};

use crate::align::pairing::{merge_by_id, split_by_pairing};
use crate::align::{Aligner, PairingMode};
use crate::arena::Arena;
use crate::errors::{Result, SeqmapError};
use crate::logging::format_duration;
use crate::metrics::MappingMetrics;
use crate::pipeline::{Batch, PipelineStages};
use crate::progress::ProgressTracker;
use crate::record::{MappingResult, ReadRecord};

/// Where reads come from.
pub trait RecordSource: Send {
    /// Reads records until at least `max_bases` bases have been read or the
    /// input ends. An empty result means the input is exhausted.
    fn read_next(&mut self, max_bases: usize) -> Result<Vec<ReadRecord>>;
}

/// Where mapping results go.
pub trait RecordSink: Send {
    fn write(&mut self, result: &MappingResult) -> Result<()>;

    /// Flushes anything buffered. Called once after the last batch.
    fn finish(&mut self) -> Result<()>;
}

/// Settings for the stage functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageConfig {
    /// Bases to read per batch.
    pub chunk_bases: usize,
    pub pairing: PairingMode,
}

impl StageConfig {
    #[must_use]
    pub fn new(chunk_bases: usize, pairing: PairingMode) -> Self {
        Self { chunk_bases, pairing }
    }
}

struct SourceState<S> {
    source: S,
    /// Set once the source has returned no records; it is not read again.
    exhausted: bool,
}

/// Stage functions over a source, an aligner and a sink.
pub struct MappingStages<S, A, W> {
    source: Mutex<SourceState<S>>,
    arena: Mutex<Arena>,
    aligner: A,
    sink: Mutex<W>,
    config: StageConfig,
    metrics: Mutex<MappingMetrics>,
    progress: ProgressTracker,
}

impl<S, A, W> MappingStages<S, A, W>
where
    S: RecordSource,
    A: Aligner,
    W: RecordSink,
{
    pub fn new(source: S, arena: Arena, aligner: A, sink: W, config: StageConfig) -> Self {
        Self {
            source: Mutex::new(SourceState { source, exhausted: false }),
            arena: Mutex::new(arena),
            aligner,
            sink: Mutex::new(sink),
            config,
            metrics: Mutex::new(MappingMetrics::default()),
            progress: ProgressTracker::new("Mapped reads"),
        }
    }

    /// Replaces the default progress tracker.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    /// Reads the arena can currently hold.
    #[must_use]
    pub fn arena_capacity(&self) -> usize {
        self.arena.lock().capacity()
    }

    #[must_use]
    pub fn arena_growth_events(&self) -> u64 {
        self.arena.lock().growth_events()
    }

    #[must_use]
    pub fn arena_scratch_growth_events(&self) -> u64 {
        self.arena.lock().scratch_growth_events()
    }

    /// Flushes the sink, releases the arena and returns the run's metrics.
    pub fn finish(self) -> Result<MappingMetrics> {
        self.progress.log_final();
        self.sink.into_inner().finish()?;

        let arena = self.arena.into_inner();
        let mut metrics = self.metrics.into_inner();
        metrics.arena_growth_events = arena.growth_events();
        metrics.arena_capacity = arena.capacity() as u64;
        metrics.arena_scratch_growth_events = arena.scratch_growth_events();
        drop(arena);

        metrics.finalize();
        Ok(metrics)
    }
}

fn exclusive<'a, T>(lock: &'a Mutex<T>, what: &str, index: u64) -> Result<MutexGuard<'a, T>> {
    lock.try_lock().ok_or_else(|| SeqmapError::PipelineAborted {
        reason: format!("{what} was already in use when batch {index} reached it"),
    })
}

impl<S, A, W> PipelineStages for MappingStages<S, A, W>
where
    S: RecordSource,
    A: Aligner,
    W: RecordSink,
{
    type Record = ReadRecord;

    fn ingest(&self, index: u64) -> Result<Batch<ReadRecord>> {
        let mut state = exclusive(&self.source, "the input", index)?;
        if state.exhausted {
            return Ok(Batch::terminal(index));
        }

        let started = Instant::now();
        let records = state.source.read_next(self.config.chunk_bases)?;
        if records.is_empty() {
            state.exhausted = true;
            debug!("End of input reached at batch {index}");
            return Ok(Batch::terminal(index));
        }

        let bases: usize = records.iter().map(ReadRecord::len).sum();
        debug!(
            "Read {} sequences ({} bp) for batch {index} in {}",
            records.len(),
            bases,
            format_duration(started.elapsed())
        );
        Ok(Batch::new(index, records))
    }

    fn transform(&self, batch: &mut Batch<ReadRecord>) -> Result<()> {
        let index = batch.index();
        let mut arena = exclusive(&self.arena, "the scratch arena", index)?;
        let started = Instant::now();

        let records = batch.records_mut();
        let longest = records.iter().map(ReadRecord::len).max().unwrap_or(0);
        arena.ensure_capacity(records.len(), longest)?;

        match self.config.pairing {
            PairingMode::SingleEnd => self.aligner.align(records, false, &mut arena)?,
            PairingMode::Paired => self.aligner.align(records, true, &mut arena)?,
            PairingMode::Smart => {
                let (mut singles, mut pairs) = split_by_pairing(std::mem::take(records));
                debug!("Batch {index}: {} single reads, {} paired reads", singles.len(), pairs.len());
                if !singles.is_empty() {
                    self.aligner.align(&mut singles, false, &mut arena)?;
                }
                if !pairs.is_empty() {
                    self.aligner.align(&mut pairs, true, &mut arena)?;
                }
                *records = merge_by_id(singles, pairs);
            }
        }

        debug!(
            "Processed {} sequences for batch {index} in {}",
            records.len(),
            format_duration(started.elapsed())
        );
        Ok(())
    }

    fn emit(&self, batch: Batch<ReadRecord>) -> Result<()> {
        let index = batch.index();
        let mut sink = exclusive(&self.sink, "the output", index)?;
        let started = Instant::now();

        let mut metrics = self.metrics.lock();
        let mut written = 0usize;
        for record in batch.records() {
            metrics.total_reads += 1;
            metrics.total_bases += record.len() as u64;
            let Some(result) = &record.result else {
                continue;
            };
            sink.write(result)?;
            written += 1;
            metrics.mapped_reads += u64::from(result.mapped);
            metrics.paired_reads += u64::from(result.paired);
            metrics.properly_paired_reads += u64::from(result.proper_pair);
        }
        metrics.batches += 1;
        drop(metrics);

        self.progress.log_if_needed(batch.len() as u64);
        debug!(
            "Wrote {written} sequences for batch {index} in {}",
            format_duration(started.elapsed())
        );
        Ok(())
    }
}
