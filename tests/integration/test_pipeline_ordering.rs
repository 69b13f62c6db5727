//! Ordering, exclusion and termination tests for the batch pipeline.
//!
//! A recording implementation of [`PipelineStages`] sleeps for a random time
//! in every stage so that workers interleave differently on every run, then
//! checks what the coordinator promises: stages never overlap, batches leave
//! in index order and every batch is emitted exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use seqmap_lib::errors::{Result, SeqmapError};
use seqmap_lib::pipeline::{
    Batch, PipelineConfig, PipelineStages, PipelineStats, STAGE_COUNT, Stage, run_pipeline,
};

/// Stage functions that record what ran where.
struct RecordingStages {
    batches: u64,
    produced: Mutex<u64>,
    max_delay_us: u64,
    seed: u64,
    in_stage: [AtomicUsize; STAGE_COUNT],
    max_in_stage: [AtomicUsize; STAGE_COUNT],
    events: Mutex<Vec<(Stage, u64)>>,
    emitted: Mutex<Vec<u64>>,
    fail_emit_at: Option<u64>,
    panic_transform_at: Option<u64>,
}

impl RecordingStages {
    fn new(batches: u64, max_delay_us: u64, seed: u64) -> Self {
        Self {
            batches,
            produced: Mutex::new(0),
            max_delay_us,
            seed,
            in_stage: Default::default(),
            max_in_stage: Default::default(),
            events: Mutex::new(Vec::new()),
            emitted: Mutex::new(Vec::new()),
            fail_emit_at: None,
            panic_transform_at: None,
        }
    }

    /// Marks `stage` as running for the duration of `f`, with a random delay.
    fn run<T>(&self, stage: Stage, index: u64, f: impl FnOnce() -> T) -> T {
        let slot = stage.index();
        let now = self.in_stage[slot].fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_stage[slot].fetch_max(now, Ordering::SeqCst);
        self.events.lock().push((stage, index));

        if self.max_delay_us > 0 {
            let mut rng = StdRng::seed_from_u64(self.seed ^ (index << 2) ^ slot as u64);
            thread::sleep(Duration::from_micros(rng.random_range(0..self.max_delay_us)));
        }
        let out = f();

        self.in_stage[slot].fetch_sub(1, Ordering::SeqCst);
        out
    }

    fn max_concurrency(&self, stage: Stage) -> usize {
        self.max_in_stage[stage.index()].load(Ordering::SeqCst)
    }
}

impl PipelineStages for RecordingStages {
    type Record = u64;

    fn ingest(&self, index: u64) -> Result<Batch<u64>> {
        self.run(Stage::Ingest, index, || {
            let mut produced = self.produced.lock();
            if *produced >= self.batches {
                return Ok(Batch::terminal(index));
            }
            *produced += 1;
            Ok(Batch::new(index, vec![index]))
        })
    }

    fn transform(&self, batch: &mut Batch<u64>) -> Result<()> {
        let index = batch.index();
        self.run(Stage::Transform, index, || {
            if self.panic_transform_at == Some(index) {
                panic!("transform blew up at batch {index}");
            }
            for value in batch.records_mut() {
                *value = *value * 10 + 1;
            }
            Ok(())
        })
    }

    fn emit(&self, batch: Batch<u64>) -> Result<()> {
        let index = batch.index();
        self.run(Stage::Emit, index, || {
            if self.fail_emit_at == Some(index) {
                return Err(SeqmapError::PipelineAborted { reason: format!("emit failed at {index}") });
            }
            assert_eq!(batch.records(), [index * 10 + 1], "batch {index} carried the wrong data");
            self.emitted.lock().push(index);
            Ok(())
        })
    }
}

#[test]
fn test_single_worker_runs_stages_in_sequence() {
    let stages = RecordingStages::new(3, 0, 0);
    let summary = run_pipeline(&stages, &PipelineConfig::new(1), None).unwrap();

    let expected = vec![
        (Stage::Ingest, 0),
        (Stage::Transform, 0),
        (Stage::Emit, 0),
        (Stage::Ingest, 1),
        (Stage::Transform, 1),
        (Stage::Emit, 1),
        (Stage::Ingest, 2),
        (Stage::Transform, 2),
        (Stage::Emit, 2),
        (Stage::Ingest, 3),
    ];
    assert_eq!(*stages.events.lock(), expected);
    assert_eq!(summary.batches_emitted(), 3);
    assert_eq!(summary.ingest_executions(), 4);
}

#[test]
fn test_each_batch_passes_every_stage_once() {
    let stages = RecordingStages::new(12, 200, 7);
    let stats = PipelineStats::new();
    run_pipeline(&stages, &PipelineConfig::new(4), Some(&stats)).unwrap();

    assert_eq!(stats.stage_count(Stage::Transform), 12);
    assert_eq!(stats.stage_count(Stage::Emit), 12);
    // Every worker ends on a terminal ingest.
    assert_eq!(stats.stage_count(Stage::Ingest), 12 + 4);

    let events = stages.events.lock();
    for index in 0..12 {
        let stages_seen: Vec<Stage> =
            events.iter().filter(|(_, i)| *i == index).map(|(s, _)| *s).collect();
        assert_eq!(stages_seen, [Stage::Ingest, Stage::Transform, Stage::Emit]);
    }
}

#[test]
fn test_more_workers_than_batches() {
    let stages = RecordingStages::new(2, 100, 3);
    let summary = run_pipeline(&stages, &PipelineConfig::new(6), None).unwrap();
    assert_eq!(*stages.emitted.lock(), vec![0, 1]);
    assert_eq!(summary.ingest_executions(), 2 + 6);
    assert_eq!(summary.indices_issued, 8);
}

#[test]
fn test_no_input_terminates_every_worker() {
    let stages = RecordingStages::new(0, 0, 0);
    let summary = run_pipeline(&stages, &PipelineConfig::new(3), None).unwrap();
    assert_eq!(summary.batches_emitted(), 0);
    assert_eq!(summary.ingest_executions(), 3);
    assert!(stages.events.lock().iter().all(|(stage, _)| *stage == Stage::Ingest));
}

#[test]
fn test_emit_error_stops_the_run() {
    let mut stages = RecordingStages::new(20, 50, 11);
    stages.fail_emit_at = Some(5);
    let err = run_pipeline(&stages, &PipelineConfig::new(3), None).unwrap_err();
    assert!(err.to_string().contains("emit failed at 5"));

    // Batches before the failing one went out in order; nothing after it did.
    assert_eq!(*stages.emitted.lock(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_panic_is_reported_as_error() {
    let mut stages = RecordingStages::new(6, 0, 0);
    stages.panic_transform_at = Some(2);
    let err = run_pipeline(&stages, &PipelineConfig::new(2), None).unwrap_err();
    assert!(err.to_string().contains("transform blew up at batch 2"));
    assert!(stages.emitted.lock().iter().all(|&i| i < 2));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_batches_emitted_in_order(
        workers in 1usize..6,
        batches in 0u64..25,
        seed in any::<u64>(),
    ) {
        let stages = RecordingStages::new(batches, 300, seed);
        let summary = run_pipeline(&stages, &PipelineConfig::new(workers), None).unwrap();

        let emitted = stages.emitted.lock().clone();
        prop_assert_eq!(emitted, (0..batches).collect::<Vec<_>>());
        prop_assert_eq!(summary.batches_emitted(), batches);
        prop_assert_eq!(summary.ingest_executions(), batches + workers as u64);

        for stage in [Stage::Ingest, Stage::Transform, Stage::Emit] {
            prop_assert!(stages.max_concurrency(stage) <= 1, "{:?} ran on two workers at once", stage);
        }
    }

    #[test]
    fn prop_worker_reports_cover_all_batches(
        workers in 1usize..5,
        batches in 1u64..15,
        seed in any::<u64>(),
    ) {
        let stages = RecordingStages::new(batches, 100, seed);
        let summary = run_pipeline(&stages, &PipelineConfig::new(workers), None).unwrap();

        prop_assert_eq!(summary.workers.len(), workers);
        let mut all: Vec<u64> = summary.workers.iter().flat_map(|w| w.emitted.clone()).collect();
        all.sort_unstable();
        prop_assert_eq!(all, (0..batches).collect::<Vec<_>>());
        for report in &summary.workers {
            prop_assert!(report.emitted.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(report.transforms, report.emits);
        }
    }
}
