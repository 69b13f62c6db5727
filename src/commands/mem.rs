//! Map short reads against a reference FASTA and write SAM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};

use seqmap_lib::align::{PairingMode, SamOptions, SeedExtendAligner};
use seqmap_lib::arena::{Arena, ArenaConfig, ArenaProfile, DEFAULT_READ_LEN};
use seqmap_lib::fastq::FastqSource;
use seqmap_lib::logging::{OperationTimer, format_count, log_mapping_summary};
use seqmap_lib::metrics::write_metrics;
use seqmap_lib::pipeline::{PipelineStats, run_pipeline};
use seqmap_lib::reference::ReferenceIndex;
use seqmap_lib::sam_writer::{SamWriter, build_header, parse_read_group};
use seqmap_lib::stages::{MappingStages, StageConfig};
use seqmap_lib::validation::{validate_files_exist, validate_positive};

use crate::commands::command::Command;
use crate::commands::common::{SamOutputOptions, ScoringOptions, ThreadingOptions};

/// Bases read per batch for each compute thread when `--chunk-size` is not given.
pub const CHUNK_BASES_PER_THREAD: usize = 10_000_000;

/// Maps reads with a seed, chain and extend aligner.
#[derive(Parser, Debug)]
#[command(
    name = "mem",
    author,
    version,
    about = "\x1b[38;5;30m[MAPPING]\x1b[0m \x1b[36mMap short reads to a reference and write SAM\x1b[0m",
    long_about = r#"
Maps single-end, paired-end or interleaved FASTQ reads to a reference FASTA and writes SAM.

Reads are processed in batches of roughly `--chunk-size` bases. Each batch passes through
three stages: it is read, aligned, and written. Several batches are in flight at once (one
per `--pipeline-workers`), so reading and writing overlap with alignment, but batches are
always written in input order. Output is therefore identical for any number of workers or
threads.

## Inputs

With one FASTQ, reads are mapped as single-end reads. With two FASTQs, read `i` of the first
file is paired with read `i` of the second. With `--smart-pairing`, the first FASTQ is treated
as interleaved: consecutive reads with the same name are mapped as a pair and all other reads
as single-end reads.

## Alignment

K-mers of length `--min-seed-len` are looked up in an index of the reference. Seeds on the
same strand and diagonal are chained, and the best chains are extended without gaps. Reads
whose best alignment scores below `--min-score` are reported unmapped.

The `ert` index profile looks up every k-mer of a read and keeps seeds from the rarest first;
the `standard` profile samples k-mers at half-seed-length spacing.

## Memory

Scratch memory for alignment is allocated once, sized from `--threads`, `--chunk-size` and
`--read-length`. A batch with more reads (or longer reads) than expected grows it; it is
never shrunk.
"#
)]
#[command(verbatim_doc_comment)]
pub(crate) struct Mem {
    /// Reference FASTA (optionally gzipped)
    #[arg(value_name = "REFERENCE")]
    reference: PathBuf,

    /// Reads FASTQ, or the first mates when a second FASTQ is given
    #[arg(value_name = "READS1")]
    reads1: PathBuf,

    /// Second-mate FASTQ
    #[arg(value_name = "READS2")]
    reads2: Option<PathBuf>,

    /// Bases per batch [default: 10,000,000 * threads]
    #[arg(short = 'K', long = "chunk-size")]
    chunk_size: Option<usize>,

    /// Expected read length, used to size scratch memory
    #[arg(short = 'l', long = "read-length", default_value_t = DEFAULT_READ_LEN)]
    read_length: usize,

    /// Seed lookup and scratch memory profile
    #[arg(long = "index-profile", value_enum, default_value_t = ArenaProfile::Standard)]
    index_profile: ArenaProfile,

    /// Treat the first FASTQ as interleaved and pair reads by name
    #[arg(short = 'p', long = "smart-pairing", default_value_t = false)]
    smart_pairing: bool,

    /// Optional output file for mapping metrics
    #[arg(long = "metrics")]
    metrics: Option<PathBuf>,

    #[command(flatten)]
    output: SamOutputOptions,

    #[command(flatten)]
    scoring: ScoringOptions,

    #[command(flatten)]
    threading: ThreadingOptions,
}

impl Mem {
    fn validate(&self) -> Result<()> {
        let mut inputs =
            vec![(self.reference.as_path(), "Reference FASTA"), (self.reads1.as_path(), "Input FASTQ")];
        if let Some(reads2) = &self.reads2 {
            inputs.push((reads2.as_path(), "Second input FASTQ"));
        }
        validate_files_exist(&inputs)?;
        if let Some(chunk_size) = self.chunk_size {
            validate_positive(chunk_size, "chunk-size")?;
        }
        validate_positive(self.read_length, "read-length")?;
        self.threading.validate()?;
        self.scoring.validate()?;
        self.output.validate()?;
        Ok(())
    }

    fn chunk_bases(&self) -> usize {
        self.chunk_size.unwrap_or(CHUNK_BASES_PER_THREAD.saturating_mul(self.threading.threads))
    }

    fn open_reads(&self) -> Result<(FastqSource, PairingMode)> {
        let opened = match (&self.reads2, self.smart_pairing) {
            (Some(reads2), true) => {
                warn!("Smart pairing is enabled; ignoring '{}'", reads2.display());
                (FastqSource::single(&self.reads1, true)?, PairingMode::Smart)
            }
            (None, true) => (FastqSource::single(&self.reads1, true)?, PairingMode::Smart),
            (Some(reads2), false) => (FastqSource::paired(&self.reads1, reads2)?, PairingMode::Paired),
            (None, false) => (FastqSource::single(&self.reads1, false)?, PairingMode::SingleEnd),
        };
        Ok(opened)
    }
}

impl Command for Mem {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.validate()?;
        let timer = OperationTimer::new("Mapping reads");
        let read_group = self.output.read_group.as_deref().map(parse_read_group).transpose()?;

        let index = ReferenceIndex::load(&self.reference, self.scoring.min_seed_len)
            .with_context(|| format!("Failed to load reference: {}", self.reference.display()))?;
        let (source, pairing) = self.open_reads()?;

        let threads = self.threading.threads;
        let chunk_bases = self.chunk_bases();
        info!("{}", self.threading.log_message());
        info!("Reading {} bases per batch ({pairing:?} input)", format_count(chunk_bases as u64));

        let arena = Arena::new(
            ArenaConfig::new(threads)
                .with_record_capacity(ArenaConfig::estimate_records(chunk_bases, self.read_length))
                .with_max_query_len(self.read_length)
                .with_profile(self.index_profile),
        )?;

        let mut sink = SamWriter::create(self.output.output.as_deref())?;
        let header = build_header(
            &index,
            read_group.as_ref(),
            &self.output.header,
            crate::version::VERSION.as_str(),
            command_line,
        );
        sink.write_header(&header)?;

        let options = SamOptions {
            copy_comment: self.output.copy_comment,
            read_group_id: read_group.map(|rg| rg.id),
        };
        let aligner = SeedExtendAligner::new(index, self.scoring.params(), options, threads)?;
        let stages =
            MappingStages::new(source, arena, aligner, sink, StageConfig::new(chunk_bases, pairing));

        let stats = self.threading.pipeline_stats.then(PipelineStats::new);
        let summary = run_pipeline(&stages, &self.threading.pipeline_config(), stats.as_ref())
            .context("Mapping failed")?;
        debug!(
            "Emitted {} batches using {} batch indices",
            summary.batches_emitted(),
            summary.indices_issued
        );
        if let Some(stats) = &stats {
            stats.log_summary();
        }

        let metrics = stages.finish().context("Failed to finish writing output")?;
        log_mapping_summary(&metrics);
        if let Some(path) = &self.metrics {
            write_metrics(path, std::slice::from_ref(&metrics))?;
        }
        timer.log_completion(metrics.total_reads);
        Ok(())
    }
}
