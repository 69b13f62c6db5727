//! Pre-sized scratch memory for the transform stage.
//!
//! The arena is built once before the pipeline starts and dropped after it
//! stops. It holds:
//!
//! - one [`ThreadScratch`] per compute thread, each padded to its own cache
//!   lines, with vector-aligned query, reference and score buffers;
//! - shared per-read tables (seeds, chains, regions) sized for the expected
//!   number of reads per batch.
//!
//! Only one transform runs at a time, so the arena is handed out whole to that
//! transform. When a batch holds more reads (or longer reads) than the arena
//! was sized for, the affected buffers are reallocated before the transform
//! starts. The arena only ever grows.

pub mod aligned;
pub mod scratch;

use clap::ValueEnum;
use log::info;

pub use aligned::{AlignedBuffer, CacheAligned, VECTOR_WIDTH};
pub use scratch::{AlignmentRegion, ChainSummary, KmerLookup, SeedHit, ThreadScratch, WINDOW_PAD};

use crate::errors::{Result, SeqmapError};
use crate::logging::{format_count, format_megabytes};
use aligned::try_table;

/// Seed slots reserved per read in the shared seed table.
pub const DEFAULT_SEEDS_PER_RECORD: usize = 64;

/// Read length assumed when sizing the arena, unless configured otherwise.
pub const DEFAULT_READ_LEN: usize = 151;

/// Slack added to the estimated number of reads per batch.
pub const RECORD_SLACK: usize = 10;

/// Which seed-search strategy the arena is sized for. Fixed for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum ArenaProfile {
    /// Sampled k-mer lookups; chaining and scoring buffers only.
    #[default]
    Standard,
    /// Dense lookups at every read offset, ranked by rarity; adds a per-thread lookup table.
    Ert,
}

impl std::fmt::Display for ArenaProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArenaProfile::Standard => f.write_str("standard"),
            ArenaProfile::Ert => f.write_str("ert"),
        }
    }
}

/// Sizing inputs for an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    pub compute_threads: usize,
    /// Reads per batch the shared tables are sized for.
    pub record_capacity: usize,
    pub seeds_per_record: usize,
    /// Longest read the per-thread buffers are sized for.
    pub max_query_len: usize,
    pub profile: ArenaProfile,
}

impl ArenaConfig {
    #[must_use]
    pub fn new(compute_threads: usize) -> Self {
        Self {
            compute_threads,
            record_capacity: 1024,
            seeds_per_record: DEFAULT_SEEDS_PER_RECORD,
            max_query_len: DEFAULT_READ_LEN,
            profile: ArenaProfile::Standard,
        }
    }

    /// Estimates reads per batch from a base budget and a read length hint.
    ///
    /// ```
    /// use seqmap_lib::arena::ArenaConfig;
    ///
    /// assert_eq!(ArenaConfig::estimate_records(10_000_000, 100), 100_010);
    /// ```
    #[must_use]
    pub fn estimate_records(chunk_bases: usize, read_len_hint: usize) -> usize {
        chunk_bases / read_len_hint.max(1) + RECORD_SLACK
    }

    #[must_use]
    pub fn with_record_capacity(mut self, record_capacity: usize) -> Self {
        self.record_capacity = record_capacity;
        self
    }

    #[must_use]
    pub fn with_seeds_per_record(mut self, seeds_per_record: usize) -> Self {
        self.seeds_per_record = seeds_per_record;
        self
    }

    #[must_use]
    pub fn with_max_query_len(mut self, max_query_len: usize) -> Self {
        self.max_query_len = max_query_len;
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: ArenaProfile) -> Self {
        self.profile = profile;
        self
    }

    fn validate(&self) -> Result<()> {
        let checks = [
            ("threads", self.compute_threads),
            ("seeds-per-record", self.seeds_per_record),
        ];
        for (parameter, value) in checks {
            if value == 0 {
                return Err(SeqmapError::InvalidParameter {
                    parameter: parameter.to_string(),
                    reason: "must be >= 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Mutable views into the arena for one transform call.
///
/// Shared tables are truncated to the number of reads being transformed; the
/// seed table holds `seeds_per_record` consecutive slots per read.
#[derive(Debug)]
pub struct ArenaView<'a> {
    pub threads: &'a mut [CacheAligned<ThreadScratch>],
    pub seeds: &'a mut [SeedHit],
    pub chains: &'a mut [ChainSummary],
    pub regions: &'a mut [AlignmentRegion],
    pub seeds_per_record: usize,
    pub profile: ArenaProfile,
}

/// Reusable scratch memory for the transform stage.
#[derive(Debug)]
pub struct Arena {
    config: ArenaConfig,
    threads: Vec<CacheAligned<ThreadScratch>>,
    seeds: Vec<SeedHit>,
    chains: Vec<ChainSummary>,
    regions: Vec<AlignmentRegion>,
    capacity: usize,
    growth_events: u64,
    scratch_growth_events: u64,
}

impl Arena {
    /// Allocates every buffer up front and logs how much memory that took.
    pub fn new(config: ArenaConfig) -> Result<Self> {
        config.validate()?;
        let threads = (0..config.compute_threads)
            .map(|_| {
                ThreadScratch::new(config.max_query_len, config.seeds_per_record, config.profile)
                    .map(CacheAligned::new)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut arena = Self {
            config,
            threads,
            seeds: Vec::new(),
            chains: Vec::new(),
            regions: Vec::new(),
            capacity: 0,
            growth_events: 0,
            scratch_growth_events: 0,
        };
        arena.allocate_tables(config.record_capacity)?;

        info!(
            "Memory pre-allocation for chaining: {} ({} reads, {} profile)",
            format_megabytes(arena.table_bytes()),
            format_count(arena.capacity as u64),
            config.profile
        );
        let per_thread = arena.threads.first().map_or(0, |t| t.allocated_bytes());
        info!(
            "Memory pre-allocation for scoring: {} = {} * {} threads",
            format_megabytes(per_thread * arena.threads.len()),
            format_megabytes(per_thread),
            arena.threads.len()
        );
        Ok(arena)
    }

    /// Reads the shared tables can currently hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Longest read the per-thread buffers can currently hold.
    #[must_use]
    pub fn max_query_len(&self) -> usize {
        self.threads.first().map_or(self.config.max_query_len, |t| t.max_query_len())
    }

    /// How many times a batch had more reads than the shared tables could hold.
    #[must_use]
    pub fn growth_events(&self) -> u64 {
        self.growth_events
    }

    /// How many times a read was longer than the per-thread scratch could hold.
    #[must_use]
    pub fn scratch_growth_events(&self) -> u64 {
        self.scratch_growth_events
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    #[must_use]
    pub fn profile(&self) -> ArenaProfile {
        self.config.profile
    }

    #[must_use]
    pub fn seeds_per_record(&self) -> usize {
        self.config.seeds_per_record
    }

    /// Bytes held by the shared per-read tables.
    #[must_use]
    pub fn table_bytes(&self) -> usize {
        self.seeds.capacity() * size_of::<SeedHit>()
            + self.chains.capacity() * size_of::<ChainSummary>()
            + self.regions.capacity() * size_of::<AlignmentRegion>()
    }

    /// Bytes held by the arena in total.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.table_bytes() + self.threads.iter().map(|t| t.allocated_bytes()).sum::<usize>()
    }

    /// Makes sure a batch of `records` reads, none longer than `longest_read`, fits.
    ///
    /// Returns `true` if anything had to be reallocated.
    pub fn ensure_capacity(&mut self, records: usize, longest_read: usize) -> Result<bool> {
        let mut grew = false;

        if records > self.capacity {
            let old = self.capacity;
            self.allocate_tables(records)?;
            info!(
                "Memory re-allocation for chaining: {} => {} reads ({})",
                format_count(old as u64),
                format_count(records as u64),
                format_megabytes(self.table_bytes())
            );
            self.growth_events += 1;
            grew = true;
        }

        let old_len = self.max_query_len();
        if longest_read > old_len {
            for scratch in &mut self.threads {
                scratch.grow_query(longest_read)?;
            }
            info!(
                "Memory re-allocation for scoring: {old_len} => {longest_read} bases per read ({} per thread)",
                format_megabytes(self.threads.first().map_or(0, |t| t.allocated_bytes()))
            );
            self.scratch_growth_events += 1;
            grew = true;
        }

        Ok(grew)
    }

    /// Splits the arena into views sized for `records` reads, growing first if needed.
    pub fn view(&mut self, records: usize, longest_read: usize) -> Result<ArenaView<'_>> {
        self.ensure_capacity(records, longest_read)?;
        let spr = self.config.seeds_per_record;
        Ok(ArenaView {
            threads: &mut self.threads,
            seeds: &mut self.seeds[..records * spr],
            chains: &mut self.chains[..records],
            regions: &mut self.regions[..records],
            seeds_per_record: spr,
            profile: self.config.profile,
        })
    }

    /// Replaces the shared tables with fresh ones for `records` reads.
    fn allocate_tables(&mut self, records: usize) -> Result<()> {
        let seed_slots = records.checked_mul(self.config.seeds_per_record).ok_or_else(|| {
            SeqmapError::allocation(usize::MAX, format!("seed table for {records} reads"))
        })?;
        // Release the old tables before reserving the new ones.
        self.seeds = Vec::new();
        self.chains = Vec::new();
        self.regions = Vec::new();
        self.seeds = try_table(seed_slots, SeedHit::default(), "seed table")?;
        self.chains = try_table(records, ChainSummary::default(), "chain table")?;
        self.regions = try_table(records, AlignmentRegion::default(), "region table")?;
        self.capacity = records;
        Ok(())
    }
}
