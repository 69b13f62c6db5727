#![deny(unsafe_code)]

//! DNA sequence utilities and constants.
//!
//! This crate provides the base-level operations the mapper needs:
//! - Complement and reverse-complement of DNA sequences
//! - 2-bit base codes for reference and query encoding
//! - A packed k-mer type and a rolling k-mer scanner for seed lookup

pub mod dna;
pub mod kmer;

pub use dna::{base_code, complement_base, reverse_complement, reverse_complement_into};
pub use kmer::{Kmer, KmerScanner, MAX_KMER_LEN};

/// No-call base character.
pub const NO_CALL_BASE: u8 = b'N';

/// Code used for any base outside `ACGT` once a sequence has been 2-bit encoded.
pub const AMBIGUOUS_CODE: u8 = 4;
