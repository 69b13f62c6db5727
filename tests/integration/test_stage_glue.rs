//! Tests for the mapping stages wired to the pipeline.
//!
//! Scripted collaborators stand in for the FASTQ reader, the aligner and the
//! SAM writer so that batch boundaries, reader calls and arena growth can be
//! checked exactly. The last tests use the real aligner on a small reference.

use std::sync::atomic::Ordering;

use rstest::rstest;

use seqmap_lib::align::{PairingMode, SamOptions, ScoringParams, SeedExtendAligner};
use seqmap_lib::arena::{Arena, ArenaConfig};
use seqmap_lib::pipeline::{PipelineConfig, run_pipeline};
use seqmap_lib::record::ReadRecord;
use seqmap_lib::reference::ReferenceIndex;
use seqmap_lib::stages::{MappingStages, RecordSource, StageConfig};

use crate::helpers::{NameAligner, ScriptedSource, SharedSink, random_sequence, reverse_complement};

fn arena(capacity: usize) -> Arena {
    Arena::new(ArenaConfig::new(2).with_record_capacity(capacity).with_max_query_len(32)).unwrap()
}

fn expected_names(sizes: &[usize]) -> Vec<String> {
    sizes
        .iter()
        .enumerate()
        .flat_map(|(batch, &len)| (0..len).map(move |i| format!("b{batch}-{i}")))
        .collect()
}

#[test]
fn test_three_batches_two_workers() {
    let source = ScriptedSource::with_sizes(&[2, 2, 2], 10);
    let calls = source.calls.clone();
    let sink = SharedSink::default();
    let stages = MappingStages::new(
        source,
        arena(8),
        NameAligner::default(),
        sink.clone(),
        StageConfig::new(1000, PairingMode::SingleEnd),
    );

    let summary = run_pipeline(&stages, &PipelineConfig::new(2), None).unwrap();
    assert_eq!(summary.batches_emitted(), 3);
    let mut emitted: Vec<u64> = summary.workers.iter().flat_map(|w| w.emitted.clone()).collect();
    emitted.sort_unstable();
    assert_eq!(emitted, vec![0, 1, 2]);

    // Three batches plus the read that found the input empty; the second
    // worker to reach the end does not touch the reader again.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(sink.lines(), expected_names(&[2, 2, 2]));

    let metrics = stages.finish().unwrap();
    assert_eq!(sink.finished.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.batches, 3);
    assert_eq!(metrics.total_reads, 6);
    assert_eq!(metrics.total_bases, 60);
    assert_eq!(metrics.mapped_reads, 6);
    assert!((metrics.fraction_mapped - 1.0).abs() < f64::EPSILON);
}

#[rstest]
#[case::never_exceeded(&[3, 5, 2, 4], 5, 0, 5)]
#[case::grows_once(&[4, 9, 3, 9, 2], 5, 1, 9)]
#[case::grows_twice(&[6, 7, 7, 1], 5, 2, 7)]
#[case::first_batch_largest(&[8, 8, 6, 2], 5, 1, 8)]
fn test_arena_grows_only_when_needed(
    #[case] sizes: &[usize],
    #[case] initial: usize,
    #[case] growth_events: u64,
    #[case] final_capacity: usize,
) {
    let stages = MappingStages::new(
        ScriptedSource::with_sizes(sizes, 12),
        arena(initial),
        NameAligner::default(),
        SharedSink::default(),
        StageConfig::new(1000, PairingMode::SingleEnd),
    );
    run_pipeline(&stages, &PipelineConfig::new(3), None).unwrap();

    assert_eq!(stages.arena_growth_events(), growth_events);
    assert_eq!(stages.arena_capacity(), final_capacity);
    let metrics = stages.finish().unwrap();
    assert_eq!(metrics.arena_growth_events, growth_events);
    assert_eq!(metrics.arena_capacity, final_capacity as u64);
    assert_eq!(metrics.arena_scratch_growth_events, 0);
}

#[test]
fn test_long_reads_grow_scratch_not_tables() {
    let stages = MappingStages::new(
        ScriptedSource::with_sizes(&[2, 3, 2], 50),
        arena(4),
        NameAligner::default(),
        SharedSink::default(),
        StageConfig::new(1000, PairingMode::SingleEnd),
    );
    run_pipeline(&stages, &PipelineConfig::new(2), None).unwrap();

    let metrics = stages.finish().unwrap();
    assert_eq!(metrics.arena_growth_events, 0);
    assert_eq!(metrics.arena_capacity, 4);
    assert_eq!(metrics.arena_scratch_growth_events, 1);
}

#[test]
fn test_aligner_error_fails_the_run() {
    let sink = SharedSink::default();
    let stages = MappingStages::new(
        ScriptedSource::with_sizes(&[2, 2, 2, 2], 10),
        arena(4),
        NameAligner { fail_on: Some("b2-1".to_string()) },
        sink.clone(),
        StageConfig::new(1000, PairingMode::SingleEnd),
    );
    let err = run_pipeline(&stages, &PipelineConfig::new(2), None).unwrap_err();
    assert!(err.to_string().contains("cannot align b2-1"));

    // Only whole batches before the failing one reach the output.
    let lines = sink.lines();
    assert!(lines.len() <= 4);
    assert_eq!(lines, expected_names(&[2, 2])[..lines.len()]);
}

#[test]
fn test_paired_mode_passes_pairs_to_aligner() {
    let sink = SharedSink::default();
    let stages = MappingStages::new(
        ScriptedSource::with_sizes(&[4, 2], 10),
        arena(4),
        NameAligner::default(),
        sink.clone(),
        StageConfig::new(1000, PairingMode::Paired),
    );
    run_pipeline(&stages, &PipelineConfig::new(2), None).unwrap();
    let metrics = stages.finish().unwrap();
    assert_eq!(metrics.paired_reads, 6);
    assert_eq!(sink.lines().len(), 6);
}

/// Reads taken from a random reference, some reverse-complemented.
struct ReferenceReads {
    reads: Vec<ReadRecord>,
    per_batch: usize,
}

impl RecordSource for ReferenceReads {
    fn read_next(&mut self, _max_bases: usize) -> seqmap_lib::errors::Result<Vec<ReadRecord>> {
        let take = self.per_batch.min(self.reads.len());
        Ok(self.reads.drain(..take).collect())
    }
}

fn reference_reads(reference: &str, count: usize, read_len: usize) -> Vec<ReadRecord> {
    (0..count)
        .map(|i| {
            let start = (i * 37) % (reference.len() - read_len);
            let mut seq = reference[start..start + read_len].to_string();
            if i % 3 == 0 {
                seq = reverse_complement(&seq);
            }
            let qual = "I".repeat(read_len);
            ReadRecord::new(i as u64, format!("read{i}").as_bytes(), seq.as_bytes(), qual.as_bytes())
        })
        .collect()
}

fn map_with_workers(reference: &str, workers: usize, threads: usize) -> Vec<String> {
    let index = ReferenceIndex::from_sequences([("chr1", reference)], 15).unwrap();
    let scoring = ScoringParams::default().with_min_score(20);
    let aligner = SeedExtendAligner::new(index, scoring, SamOptions::default(), threads).unwrap();
    let sink = SharedSink::default();
    let stages = MappingStages::new(
        ReferenceReads { reads: reference_reads(reference, 40, 60), per_batch: 7 },
        Arena::new(ArenaConfig::new(threads).with_record_capacity(4).with_max_query_len(60)).unwrap(),
        aligner,
        sink.clone(),
        StageConfig::new(1000, PairingMode::SingleEnd),
    );
    run_pipeline(&stages, &PipelineConfig::new(workers), None).unwrap();
    let metrics = stages.finish().unwrap();
    assert_eq!(metrics.total_reads, 40);
    assert_eq!(metrics.mapped_reads, 40);
    sink.lines()
}

#[test]
fn test_real_aligner_output_is_independent_of_workers() {
    let reference = random_sequence(2000, 42);
    let baseline = map_with_workers(&reference, 1, 1);
    assert_eq!(baseline.len(), 40);
    for (i, line) in baseline.iter().enumerate() {
        assert!(line.starts_with(&format!("read{i}\t")), "line {i} out of order: {line}");
    }
    for (workers, threads) in [(2, 1), (3, 2), (4, 3)] {
        assert_eq!(map_with_workers(&reference, workers, threads), baseline);
    }
}
