//! Base complementing and 2-bit codes.

use crate::{AMBIGUOUS_CODE, NO_CALL_BASE};

/// Complements a single DNA base, normalizing to uppercase.
///
/// A<->T, C<->G. Anything else (including IUPAC ambiguity codes) becomes `N`,
/// since the mapper treats every non-ACGT base as a no-call.
#[inline]
#[must_use]
pub const fn complement_base(base: u8) -> u8 {
    match base {
        b'A' | b'a' => b'T',
        b'T' | b't' => b'A',
        b'C' | b'c' => b'G',
        b'G' | b'g' => b'C',
        _ => NO_CALL_BASE,
    }
}

/// Returns the 2-bit code of a base: A=0, C=1, G=2, T=3, anything else 4.
#[inline]
#[must_use]
pub const fn base_code(base: u8) -> u8 {
    match base {
        b'A' | b'a' => 0,
        b'C' | b'c' => 1,
        b'G' | b'g' => 2,
        b'T' | b't' => 3,
        _ => AMBIGUOUS_CODE,
    }
}

/// Reverse complements a DNA sequence.
///
/// # Examples
///
/// ```
/// use seqmap_dna::reverse_complement;
///
/// assert_eq!(reverse_complement(b"ACGT"), b"ACGT".to_vec());
/// assert_eq!(reverse_complement(b"AAAC"), b"GTTT".to_vec());
/// assert_eq!(reverse_complement(b"acgtn"), b"NACGT".to_vec());
/// ```
#[must_use]
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    reverse_complement_into(seq, &mut out);
    out
}

/// Reverse complements `seq` into `out`, replacing its contents.
///
/// Reuses the allocation held by `out`, which lets hot loops keep one buffer per thread.
pub fn reverse_complement_into(seq: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.extend(seq.iter().rev().map(|&base| complement_base(base)));
}
