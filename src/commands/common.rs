//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;

use seqmap_dna::MAX_KMER_LEN;
use seqmap_lib::align::ScoringParams;
use seqmap_lib::pipeline::PipelineConfig;
use seqmap_lib::validation::{validate_header_line, validate_in_range, validate_positive};

/// Threading options for the mapping pipeline.
///
/// Two kinds of threads are involved:
///
/// - pipeline workers, each carrying one batch through ingest, transform and
///   emit (this bounds how many batches are in flight);
/// - compute threads, used inside the transform stage to align the reads of a
///   batch in parallel.
///
/// ```bash
/// seqmap mem -t 16 --pipeline-workers 2 ref.fa reads.fq
/// ```
#[derive(Debug, Clone, Args)]
pub struct ThreadingOptions {
    /// Number of compute threads used to align each batch.
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    pub threads: usize,

    /// Number of pipeline workers (batches in flight at once).
    #[arg(long = "pipeline-workers", default_value_t = 2)]
    pub pipeline_workers: usize,

    /// Log per-stage timing and admission waits at completion.
    #[arg(long = "pipeline-stats", default_value_t = false)]
    pub pipeline_stats: bool,
}

impl ThreadingOptions {
    #[must_use]
    pub fn new(threads: usize, pipeline_workers: usize) -> Self {
        Self { threads, pipeline_workers, pipeline_stats: false }
    }

    pub fn validate(&self) -> Result<()> {
        validate_positive(self.threads, "threads")?;
        validate_positive(self.pipeline_workers, "pipeline-workers")?;
        Ok(())
    }

    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(self.pipeline_workers)
    }

    /// Human-readable description for logging.
    #[must_use]
    pub fn log_message(&self) -> String {
        format!(
            "Using {} compute thread(s) and {} pipeline worker(s)",
            self.threads, self.pipeline_workers
        )
    }
}

/// Seeding and scoring options.
#[derive(Debug, Clone, Args)]
pub struct ScoringOptions {
    /// Minimum seed length (k-mer size of the reference index).
    #[arg(short = 'k', long = "min-seed-len", default_value_t = 19)]
    pub min_seed_len: usize,

    /// Score for a matching base.
    #[arg(short = 'A', long = "match-score", default_value_t = 1)]
    pub match_score: i32,

    /// Penalty for a mismatching base.
    #[arg(short = 'B', long = "mismatch-penalty", default_value_t = 4)]
    pub mismatch_penalty: i32,

    /// Minimum score for a read to be reported as mapped.
    #[arg(short = 'T', long = "min-score", default_value_t = 30)]
    pub min_score: i32,

    /// Skip seeds with more than this many reference occurrences.
    #[arg(short = 'c', long = "max-occurrences", default_value_t = 500)]
    pub max_occurrences: usize,

    /// Largest template length for a properly paired read pair.
    #[arg(long = "max-insert", default_value_t = 1000)]
    pub max_insert: u64,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            min_seed_len: 19,
            match_score: 1,
            mismatch_penalty: 4,
            min_score: 30,
            max_occurrences: 500,
            max_insert: 1000,
        }
    }
}

impl ScoringOptions {
    pub fn validate(&self) -> Result<()> {
        validate_in_range(self.min_seed_len, 1..=MAX_KMER_LEN, "min-seed-len")?;
        self.params().validate()?;
        Ok(())
    }

    #[must_use]
    pub fn params(&self) -> ScoringParams {
        ScoringParams::default()
            .with_match_score(self.match_score)
            .with_mismatch_penalty(self.mismatch_penalty)
            .with_min_score(self.min_score)
            .with_max_occurrences(self.max_occurrences)
            .with_max_insert(self.max_insert)
    }
}

/// SAM output options.
#[derive(Debug, Clone, Default, Args)]
pub struct SamOutputOptions {
    /// Output SAM file (standard output if not given)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Append the FASTQ comment to each SAM record
    #[arg(short = 'C', long = "copy-comment", default_value_t = false)]
    pub copy_comment: bool,

    /// Read group header line such as '@RG\tID:foo\tSM:bar'
    #[arg(short = 'R', long = "read-group")]
    pub read_group: Option<String>,

    /// Extra header line to insert (may be given more than once)
    #[arg(short = 'H', long = "header")]
    pub header: Vec<String>,
}

impl SamOutputOptions {
    pub fn validate(&self) -> Result<()> {
        for line in &self.header {
            validate_header_line(line, "header")?;
            if line.starts_with("@HD") || line.starts_with("@SQ") {
                bail!("--header may not add @HD or @SQ lines: '{line}'");
            }
        }
        Ok(())
    }
}
