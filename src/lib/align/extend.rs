//! Ungapped extension of a chain along its diagonal.

use crate::arena::{AlignmentRegion, ChainSummary};
use crate::reference::ReferenceIndex;

use super::ScoringParams;

/// Scores the read along `chain`'s diagonal and returns its best local segment.
///
/// `query_codes` are the 2-bit codes of the read on the chain's strand.
/// `window` and `lanes` are scratch of at least the read length. The
/// alignment is clipped to the contig holding the chain's anchor.
pub fn extend_chain(
    index: &ReferenceIndex,
    query_codes: &[u8],
    chain: &ChainSummary,
    params: &ScoringParams,
    window: &mut [u8],
    lanes: &mut [i32],
) -> Option<AlignmentRegion> {
    let contig = &index.contigs()[index.locate(u64::from(chain.anchor))?];
    let n = query_codes.len() as i64;
    let q_from = (contig.offset as i64 - chain.diagonal).clamp(0, n);
    let q_to = (contig.end() as i64 - chain.diagonal).clamp(0, n);
    if q_to <= q_from {
        return None;
    }

    let span = (q_to - q_from) as usize;
    let q_from = q_from as usize;
    let r_from = (chain.diagonal + q_from as i64) as usize;
    let window = &mut window[..span];
    window.copy_from_slice(&index.codes()[r_from..r_from + span]);

    let lanes = &mut lanes[..span];
    for ((lane, &q), &r) in lanes.iter_mut().zip(&query_codes[q_from..q_from + span]).zip(&*window) {
        *lane = if q > 3 || r > 3 {
            -params.ambiguous_penalty
        } else if q == r {
            params.match_score
        } else {
            -params.mismatch_penalty
        };
    }

    let (best, start, end) = best_segment(lanes);
    if best <= 0 {
        return None;
    }

    Some(AlignmentRegion {
        mapped: best >= params.min_score,
        reverse: chain.reverse,
        ref_start: (r_from + start) as u64,
        query_start: (q_from + start) as u32,
        query_end: (q_from + end) as u32,
        score: best,
        second_score: 0,
        mismatches: lanes[start..end].iter().filter(|&&s| s < 0).count() as u32,
    })
}

/// Maximum-sum contiguous segment: `(score, start, end)` with `end` exclusive.
#[must_use]
pub fn best_segment(scores: &[i32]) -> (i32, usize, usize) {
    let (mut best, mut best_start, mut best_end) = (0, 0, 0);
    let (mut run, mut run_start) = (0, 0);
    for (i, &s) in scores.iter().enumerate() {
        if run <= 0 {
            run = 0;
            run_start = i;
        }
        run += s;
        if run > best {
            best = run;
            best_start = run_start;
            best_end = i + 1;
        }
    }
    (best, best_start, best_end)
}
