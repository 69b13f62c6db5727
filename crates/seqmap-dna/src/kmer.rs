//! Packed k-mers for seed lookup.
//!
//! A k-mer of up to 32 bases is stored 2 bits per base in a `u64`, first base
//! in the most significant occupied bits, so that appending a base is a shift
//! and an or. [`KmerScanner`] walks a sequence and yields every window that
//! consists only of `ACGT`, rolling the packed value instead of re-encoding.
//!
//! # Example
//!
//! ```
//! use seqmap_dna::kmer::{Kmer, KmerScanner};
//!
//! let kmers: Vec<_> = KmerScanner::new(b"ACGTNACG", 3).collect();
//! assert_eq!(kmers.len(), 3);
//! assert_eq!(kmers[0], (0, Kmer::from_bytes(b"ACG").unwrap()));
//! assert_eq!(kmers[2].0, 5);
//! ```

use crate::AMBIGUOUS_CODE;
use crate::dna::base_code;

/// Longest k-mer that fits in a `u64` at 2 bits per base.
pub const MAX_KMER_LEN: usize = 32;

/// A 2-bit packed k-mer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Kmer {
    bits: u64,
    len: u8,
}

impl Kmer {
    /// Packs `seq` into a k-mer.
    ///
    /// Returns `None` if `seq` contains a non-ACGT base or is longer than [`MAX_KMER_LEN`].
    #[must_use]
    pub fn from_bytes(seq: &[u8]) -> Option<Self> {
        if seq.len() > MAX_KMER_LEN {
            return None;
        }
        let mut bits = 0u64;
        for &base in seq {
            let code = base_code(base);
            if code == AMBIGUOUS_CODE {
                return None;
            }
            bits = (bits << 2) | u64::from(code);
        }
        let len = u8::try_from(seq.len()).ok()?;
        Some(Self { bits, len })
    }

    /// The packed representation, usable directly as a hash key.
    #[inline]
    #[must_use]
    pub const fn bits(&self) -> u64 {
        self.bits
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unpacks the k-mer back to uppercase bases.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        const BASES: [u8; 4] = *b"ACGT";
        (0..self.len())
            .rev()
            .map(|shift| BASES[((self.bits >> (shift * 2)) & 0b11) as usize])
            .collect()
    }
}

/// Rolling scanner over every fully-ACGT window of length `k` in a sequence.
///
/// Yields `(offset, kmer)` pairs in increasing offset order. Windows that
/// overlap an ambiguous base are skipped.
#[derive(Debug)]
pub struct KmerScanner<'a> {
    seq: &'a [u8],
    k: usize,
    mask: u64,
    pos: usize,
    bits: u64,
    valid: usize,
}

impl<'a> KmerScanner<'a> {
    /// Creates a scanner for windows of length `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero or larger than [`MAX_KMER_LEN`].
    #[must_use]
    pub fn new(seq: &'a [u8], k: usize) -> Self {
        assert!((1..=MAX_KMER_LEN).contains(&k), "k-mer length must be in 1..=32, got {k}");
        let mask = if k == MAX_KMER_LEN { u64::MAX } else { (1u64 << (2 * k)) - 1 };
        Self { seq, k, mask, pos: 0, bits: 0, valid: 0 }
    }
}

impl Iterator for KmerScanner<'_> {
    type Item = (usize, Kmer);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.seq.len() {
            let code = base_code(self.seq[self.pos]);
            self.pos += 1;
            if code == AMBIGUOUS_CODE {
                self.valid = 0;
                self.bits = 0;
                continue;
            }
            self.bits = ((self.bits << 2) | u64::from(code)) & self.mask;
            self.valid += 1;
            if self.valid >= self.k {
                #[allow(clippy::cast_possible_truncation)]
                let kmer = Kmer { bits: self.bits, len: self.k as u8 };
                return Some((self.pos - self.k, kmer));
            }
        }
        None
    }
}
