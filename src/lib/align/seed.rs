//! Seed lookup and chaining.
//!
//! Seeds are written into the caller's slice of the arena seed table and
//! chains into the thread's candidate list; neither ever grows past the space
//! it was given. Seeds that do not fit are dropped.

use seqmap_dna::KmerScanner;

use crate::arena::{ChainSummary, KmerLookup, SeedHit};
use crate::reference::ReferenceIndex;

/// Seeds whose diagonals differ by at most this much join the same chain.
pub const DIAGONAL_BAND: i64 = 8;

/// Distance between sampled k-mer offsets in the standard profile.
#[must_use]
pub fn sample_stride(kmer_len: usize) -> usize {
    (kmer_len / 2).max(1)
}

/// Samples k-mers from both strands, giving each strand half of the seed slots.
///
/// Returns the number of seeds written to the front of `seeds`.
pub fn collect_sampled(
    index: &ReferenceIndex,
    forward: &[u8],
    reverse: &[u8],
    max_occurrences: usize,
    seeds: &mut [SeedHit],
) -> usize {
    let half = seeds.len().div_ceil(2);
    let (fwd_slots, rev_slots) = seeds.split_at_mut(half);
    let n_fwd = fill_sampled(index, forward, false, max_occurrences, fwd_slots);
    let n_rev = fill_sampled(index, reverse, true, max_occurrences, rev_slots);
    seeds.copy_within(half..half + n_rev, n_fwd);
    n_fwd + n_rev
}

fn fill_sampled(
    index: &ReferenceIndex,
    seq: &[u8],
    reverse: bool,
    max_occurrences: usize,
    slots: &mut [SeedHit],
) -> usize {
    let k = index.kmer_len();
    if seq.len() < k {
        return 0;
    }
    let stride = sample_stride(k);
    let last = seq.len() - k;
    let mut n = 0;
    for (pos, kmer) in KmerScanner::new(seq, k) {
        if pos % stride != 0 && pos != last {
            continue;
        }
        let hits = index.lookup(kmer.bits());
        if hits.len() > max_occurrences {
            continue;
        }
        for &ref_pos in hits {
            if n == slots.len() {
                return n;
            }
            slots[n] = SeedHit { query_pos: pos as u32, ref_pos, reverse };
            n += 1;
        }
    }
    n
}

/// Looks up every k-mer on both strands and keeps seeds from the rarest k-mers first.
///
/// `lookups` is used as scratch and never grows beyond its current capacity.
pub fn collect_ranked(
    index: &ReferenceIndex,
    forward: &[u8],
    reverse: &[u8],
    max_occurrences: usize,
    lookups: &mut Vec<KmerLookup>,
    seeds: &mut [SeedHit],
) -> usize {
    let k = index.kmer_len();
    lookups.clear();
    'strands: for (seq, is_reverse) in [(forward, false), (reverse, true)] {
        if seq.len() < k {
            continue;
        }
        for (pos, kmer) in KmerScanner::new(seq, k) {
            let occurrences = index.lookup(kmer.bits()).len();
            if occurrences == 0 || occurrences > max_occurrences {
                continue;
            }
            if lookups.len() == lookups.capacity() {
                break 'strands;
            }
            lookups.push(KmerLookup {
                query_pos: pos as u32,
                reverse: is_reverse,
                kmer: kmer.bits(),
                occurrences: occurrences as u32,
            });
        }
    }
    lookups.sort_unstable_by_key(|l| (l.occurrences, l.query_pos, l.reverse));

    let mut n = 0;
    for lookup in lookups.iter() {
        for &ref_pos in index.lookup(lookup.kmer) {
            if n == seeds.len() {
                return n;
            }
            seeds[n] = SeedHit { query_pos: lookup.query_pos, ref_pos, reverse: lookup.reverse };
            n += 1;
        }
    }
    n
}

/// Groups seeds into chains, best (most read bases covered) first.
///
/// `seeds` is reordered in place. `chains` must have capacity for one chain per seed.
pub fn chain_seeds(seeds: &mut [SeedHit], kmer_len: usize, chains: &mut Vec<ChainSummary>) {
    chains.clear();
    seeds.sort_unstable_by_key(|s| (s.reverse, s.diagonal(), s.query_pos));

    let k = kmer_len as u32;
    let mut covered_to = 0u32;
    for seed in seeds.iter() {
        let query_end = seed.query_pos + k;
        match chains.last_mut() {
            Some(chain)
                if chain.reverse == seed.reverse
                    && seed.diagonal() - chain.diagonal <= DIAGONAL_BAND =>
            {
                chain.seeds += 1;
                chain.covered += query_end.saturating_sub(seed.query_pos.max(covered_to));
                covered_to = covered_to.max(query_end);
            }
            _ => {
                chains.push(ChainSummary {
                    diagonal: seed.diagonal(),
                    anchor: seed.ref_pos,
                    reverse: seed.reverse,
                    seeds: 1,
                    covered: k,
                });
                covered_to = query_end;
            }
        }
    }

    chains.sort_unstable_by(|a, b| {
        b.covered.cmp(&a.covered).then(b.seeds.cmp(&a.seeds)).then(a.diagonal.cmp(&b.diagonal))
    });
}
