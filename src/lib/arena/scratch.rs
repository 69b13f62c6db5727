//! Per-thread scratch regions and the record types stored in arena tables.

use super::aligned::{AlignedBuffer, try_table};
use super::ArenaProfile;
use crate::errors::{Result, SeqmapError};

/// Extra reference bases kept around a scoring window.
pub const WINDOW_PAD: usize = 256;

/// One exact k-mer match between a read and the reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedHit {
    /// Offset of the k-mer in the read (on the strand being matched).
    pub query_pos: u32,
    /// Offset of the k-mer in the concatenated reference.
    pub ref_pos: u32,
    pub reverse: bool,
}

impl SeedHit {
    /// Reference offset at which the read would start if this seed is right.
    #[must_use]
    pub fn diagonal(&self) -> i64 {
        i64::from(self.ref_pos) - i64::from(self.query_pos)
    }
}

/// A run of seeds sharing a strand and (nearly) a diagonal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainSummary {
    pub diagonal: i64,
    /// Reference offset of the chain's first seed, used to pick the contig.
    pub anchor: u32,
    pub reverse: bool,
    pub seeds: u32,
    /// Read bases covered by the chain's seeds.
    pub covered: u32,
}

/// The best alignment found for a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignmentRegion {
    pub mapped: bool,
    pub reverse: bool,
    /// Start of the aligned block in the concatenated reference.
    pub ref_start: u64,
    /// Aligned read interval `[query_start, query_end)` on the mapped strand.
    pub query_start: u32,
    pub query_end: u32,
    pub score: i32,
    /// Score of the best alignment at a different locus, zero if none.
    pub second_score: i32,
    /// Mismatched or ambiguous bases inside the aligned interval.
    pub mismatches: u32,
}

impl AlignmentRegion {
    #[must_use]
    pub fn aligned_len(&self) -> u32 {
        self.query_end - self.query_start
    }
}

/// One k-mer lookup made by the dense seed search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KmerLookup {
    pub query_pos: u32,
    pub reverse: bool,
    pub kmer: u64,
    pub occurrences: u32,
}

/// Working memory owned by one compute thread for the duration of a transform.
#[derive(Debug)]
pub struct ThreadScratch {
    /// 2-bit codes of the read, forward strand then reverse complement.
    pub query_codes: AlignedBuffer,
    /// Reverse complement of the current read.
    pub rc_bases: Vec<u8>,
    /// 2-bit codes of the reference window being scored.
    pub window: AlignedBuffer,
    /// Per-base scores along the current diagonal, as `i32`.
    pub lane_scores: AlignedBuffer,
    /// Chains built from the current read's seeds.
    pub candidates: Vec<ChainSummary>,
    /// Dense lookup table, present only for [`ArenaProfile::Ert`].
    pub lookups: Option<Vec<KmerLookup>>,
    max_query_len: usize,
}

impl ThreadScratch {
    /// Allocates scratch for reads up to `max_query_len` bases.
    pub fn new(max_query_len: usize, seeds_per_record: usize, profile: ArenaProfile) -> Result<Self> {
        let mut rc_bases = Vec::new();
        rc_bases
            .try_reserve_exact(max_query_len)
            .map_err(|_| SeqmapError::allocation(max_query_len, "reverse-complement scratch"))?;
        let mut candidates = try_table(seeds_per_record, ChainSummary::default(), "chain scratch")?;
        candidates.clear();
        let lookups = match profile {
            ArenaProfile::Standard => None,
            ArenaProfile::Ert => {
                let mut table =
                    try_table(2 * max_query_len, KmerLookup::default(), "k-mer lookup scratch")?;
                table.clear();
                Some(table)
            }
        };

        Ok(Self {
            query_codes: AlignedBuffer::with_len(2 * max_query_len, "query scratch")?,
            rc_bases,
            window: AlignedBuffer::with_len(max_query_len + WINDOW_PAD, "reference window scratch")?,
            lane_scores: AlignedBuffer::with_len(
                max_query_len * size_of::<i32>(),
                "score lane scratch",
            )?,
            candidates,
            lookups,
            max_query_len,
        })
    }

    /// Longest read this scratch can hold without growing.
    #[must_use]
    pub fn max_query_len(&self) -> usize {
        self.max_query_len
    }

    /// Grows every length-dependent buffer to fit reads of `max_query_len` bases.
    pub fn grow_query(&mut self, max_query_len: usize) -> Result<()> {
        if max_query_len <= self.max_query_len {
            return Ok(());
        }
        self.query_codes.grow_to(2 * max_query_len, "query scratch")?;
        self.window.grow_to(max_query_len + WINDOW_PAD, "reference window scratch")?;
        self.lane_scores.grow_to(max_query_len * size_of::<i32>(), "score lane scratch")?;
        let additional = max_query_len.saturating_sub(self.rc_bases.len());
        self.rc_bases
            .try_reserve_exact(additional)
            .map_err(|_| SeqmapError::allocation(max_query_len, "reverse-complement scratch"))?;
        if let Some(lookups) = self.lookups.as_mut() {
            let additional = (2 * max_query_len).saturating_sub(lookups.len());
            lookups.try_reserve_exact(additional).map_err(|_| {
                SeqmapError::allocation(
                    2 * max_query_len * size_of::<KmerLookup>(),
                    "k-mer lookup scratch",
                )
            })?;
        }
        self.max_query_len = max_query_len;
        Ok(())
    }

    /// Bytes reserved by this scratch region.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.query_codes.allocated_bytes()
            + self.window.allocated_bytes()
            + self.lane_scores.allocated_bytes()
            + self.rc_bases.capacity()
            + self.candidates.capacity() * size_of::<ChainSummary>()
            + self.lookups.as_ref().map_or(0, |l| l.capacity() * size_of::<KmerLookup>())
    }
}
