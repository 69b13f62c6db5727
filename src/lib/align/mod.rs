//! Read alignment against a [`ReferenceIndex`].
//!
//! Alignment runs in two passes over a batch:
//!
//! 1. **Mapping** (parallel over compute threads): each thread takes a
//!    contiguous chunk of reads together with its own [`ThreadScratch`] and
//!    the matching slices of the arena tables. For every read it collects
//!    seeds, chains them by diagonal and extends the best chains without gaps.
//! 2. **Formatting** (parallel over reads, or over mate pairs in paired mode):
//!    turns the chosen regions into SAM records stored on each read.
//!
//! All per-read memory comes from the [`Arena`]; nothing is allocated per
//! read on the mapping path beyond the output record.

pub mod extend;
pub mod pairing;
pub mod sam_format;
pub mod seed;

use rayon::prelude::*;
use seqmap_dna::{base_code, reverse_complement_into};

use crate::arena::{AlignmentRegion, Arena, ArenaProfile, ChainSummary, SeedHit, ThreadScratch};
use crate::errors::{Result, SeqmapError};
use crate::record::ReadRecord;
use crate::reference::ReferenceIndex;

pub use pairing::PairingMode;
pub use sam_format::{Hit, SamOptions};

/// Chains extended per read, best first.
pub const MAX_EXTENDED_CHAINS: usize = 4;

/// Scores and limits used while mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringParams {
    pub match_score: i32,
    pub mismatch_penalty: i32,
    /// Penalty for a position where either base is not A, C, G or T.
    pub ambiguous_penalty: i32,
    /// Alignments scoring below this are reported unmapped.
    pub min_score: i32,
    /// K-mers occurring more often than this in the reference are not used as seeds.
    pub max_occurrences: usize,
    /// Largest template length of a proper pair.
    pub max_insert: u64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            match_score: 1,
            mismatch_penalty: 4,
            ambiguous_penalty: 1,
            min_score: 30,
            max_occurrences: 500,
            max_insert: 1000,
        }
    }
}

impl ScoringParams {
    #[must_use]
    pub fn with_match_score(mut self, match_score: i32) -> Self {
        self.match_score = match_score;
        self
    }

    #[must_use]
    pub fn with_mismatch_penalty(mut self, mismatch_penalty: i32) -> Self {
        self.mismatch_penalty = mismatch_penalty;
        self
    }

    #[must_use]
    pub fn with_min_score(mut self, min_score: i32) -> Self {
        self.min_score = min_score;
        self
    }

    #[must_use]
    pub fn with_max_occurrences(mut self, max_occurrences: usize) -> Self {
        self.max_occurrences = max_occurrences;
        self
    }

    #[must_use]
    pub fn with_max_insert(mut self, max_insert: u64) -> Self {
        self.max_insert = max_insert;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |parameter: &str, reason: &str| SeqmapError::InvalidParameter {
            parameter: parameter.to_string(),
            reason: reason.to_string(),
        };
        if self.match_score < 1 {
            return Err(invalid("match-score", "must be >= 1"));
        }
        if self.mismatch_penalty < 0 {
            return Err(invalid("mismatch-penalty", "must be >= 0"));
        }
        if self.ambiguous_penalty < 0 {
            return Err(invalid("ambiguous-penalty", "must be >= 0"));
        }
        if self.min_score < 1 {
            return Err(invalid("min-score", "must be >= 1"));
        }
        if self.max_occurrences == 0 {
            return Err(invalid("max-occurrences", "must be >= 1"));
        }
        Ok(())
    }
}

/// Maps a batch of reads in place, filling `ReadRecord::result`.
///
/// `paired` means the reads are mates at positions `2i` and `2i + 1`. The
/// arena is borrowed for the whole call and grown first if the batch needs it.
pub trait Aligner: Sync {
    fn align(&self, records: &mut [ReadRecord], paired: bool, arena: &mut Arena) -> Result<()>;
}

/// Seed, chain and ungapped-extend aligner running on its own rayon pool.
pub struct SeedExtendAligner {
    index: ReferenceIndex,
    scoring: ScoringParams,
    options: SamOptions,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for SeedExtendAligner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedExtendAligner")
            .field("contigs", &self.index.contigs().len())
            .field("scoring", &self.scoring)
            .field("options", &self.options)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl SeedExtendAligner {
    /// Creates an aligner with `threads` compute threads.
    pub fn new(
        index: ReferenceIndex,
        scoring: ScoringParams,
        options: SamOptions,
        threads: usize,
    ) -> Result<Self> {
        scoring.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("compute-{i}"))
            .build()
            .map_err(|e| SeqmapError::InvalidParameter {
                parameter: "threads".to_string(),
                reason: format!("failed to build compute thread pool: {e}"),
            })?;
        Ok(Self { index, scoring, options, pool })
    }

    #[must_use]
    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    #[must_use]
    pub fn scoring(&self) -> &ScoringParams {
        &self.scoring
    }

    fn format_all(&self, records: &mut [ReadRecord], regions: &[AlignmentRegion], paired: bool) {
        let index = &self.index;
        let options = &self.options;
        let hit = |region: &AlignmentRegion| Hit::from_region(index, region);
        if paired {
            records.par_chunks_mut(2).zip(regions.par_chunks(2)).for_each(|(reads, regions)| {
                if let [first, second] = reads {
                    let (a, b) = sam_format::format_pair(
                        first,
                        hit(&regions[0]).as_ref(),
                        second,
                        hit(&regions[1]).as_ref(),
                        index,
                        options,
                        self.scoring.max_insert,
                    );
                    first.result = Some(a);
                    second.result = Some(b);
                } else {
                    for (read, region) in reads.iter_mut().zip(regions) {
                        read.result =
                            Some(sam_format::format_single(read, hit(region).as_ref(), index, options));
                    }
                }
            });
        } else {
            records.par_iter_mut().zip(regions.par_iter()).for_each(|(read, region)| {
                read.result = Some(sam_format::format_single(read, hit(region).as_ref(), index, options));
            });
        }
    }
}

impl Aligner for SeedExtendAligner {
    fn align(&self, records: &mut [ReadRecord], paired: bool, arena: &mut Arena) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let longest = records.iter().map(ReadRecord::len).max().unwrap_or(0);
        let view = arena.view(records.len(), longest)?;
        let spr = view.seeds_per_record;
        let profile = view.profile;
        let per_thread = records.len().div_ceil(view.threads.len());
        let index = &self.index;
        let scoring = &self.scoring;

        self.pool.install(|| {
            view.threads
                .par_iter_mut()
                .zip(records.par_chunks(per_thread))
                .zip(view.seeds.par_chunks_mut(per_thread * spr))
                .zip(view.chains.par_chunks_mut(per_thread))
                .zip(view.regions.par_chunks_mut(per_thread))
                .for_each(|((((scratch, reads), seeds), chains), regions)| {
                    let scratch: &mut ThreadScratch = scratch;
                    let per_read = reads.iter().zip(seeds.chunks_mut(spr)).zip(chains).zip(regions);
                    for (((read, seeds), chain), region) in per_read {
                        (*region, *chain) = map_read(index, scoring, profile, scratch, read, seeds);
                    }
                });
            self.format_all(records, view.regions, paired);
        });
        Ok(())
    }
}

/// Finds the best ungapped alignment of one read.
///
/// Returns the chosen region (unmapped and zeroed if nothing was found) and
/// the chain it came from.
fn map_read(
    index: &ReferenceIndex,
    scoring: &ScoringParams,
    profile: ArenaProfile,
    scratch: &mut ThreadScratch,
    read: &ReadRecord,
    seeds: &mut [SeedHit],
) -> (AlignmentRegion, ChainSummary) {
    let n = read.len();
    if n < index.kmer_len() {
        return (AlignmentRegion::default(), ChainSummary::default());
    }

    reverse_complement_into(&read.seq, &mut scratch.rc_bases);
    let codes = scratch.query_codes.as_bytes_mut();
    let (fwd_codes, rev_codes) = codes.split_at_mut(codes.len() / 2);
    for (code, &base) in fwd_codes.iter_mut().zip(&read.seq) {
        *code = base_code(base);
    }
    for (code, &base) in rev_codes.iter_mut().zip(&scratch.rc_bases) {
        *code = base_code(base);
    }

    let found = match (profile, scratch.lookups.as_mut()) {
        (ArenaProfile::Ert, Some(lookups)) => seed::collect_ranked(
            index,
            &read.seq,
            &scratch.rc_bases,
            scoring.max_occurrences,
            lookups,
            seeds,
        ),
        _ => seed::collect_sampled(index, &read.seq, &scratch.rc_bases, scoring.max_occurrences, seeds),
    };
    seed::chain_seeds(&mut seeds[..found], index.kmer_len(), &mut scratch.candidates);

    let window = scratch.window.as_bytes_mut();
    let lanes = scratch.lane_scores.as_slice_mut::<i32>();
    let mut best: Option<(AlignmentRegion, ChainSummary)> = None;
    let mut second_score = 0;
    for chain in scratch.candidates.iter().take(MAX_EXTENDED_CHAINS) {
        let query = if chain.reverse { &rev_codes[..n] } else { &fwd_codes[..n] };
        let Some(region) = extend::extend_chain(index, query, chain, scoring, window, lanes) else {
            continue;
        };
        best = Some(match best {
            None => (region, *chain),
            Some((current, current_chain)) => {
                let (winner, loser) = if region.score > current.score {
                    ((region, *chain), current)
                } else {
                    ((current, current_chain), region)
                };
                if is_distinct_locus(&winner.0, &loser) {
                    second_score = second_score.max(loser.score);
                }
                winner
            }
        });
    }

    match best {
        Some((mut region, chain)) => {
            region.second_score = second_score;
            (region, chain)
        }
        None => (AlignmentRegion::default(), ChainSummary::default()),
    }
}

/// Whether two regions are alternative placements rather than the same one.
fn is_distinct_locus(a: &AlignmentRegion, b: &AlignmentRegion) -> bool {
    a.reverse != b.reverse || a.ref_start.abs_diff(b.ref_start) > seed::DIAGONAL_BAND as u64
}
