//! Reference loading and the k-mer seed index.
//!
//! The whole reference is read into memory at startup. Contigs are concatenated
//! into one array of 2-bit base codes (ambiguous bases keep code 4) and every
//! fully-ACGT k-mer is indexed by its packed value. K-mers never span two
//! contigs because each contig is scanned on its own.

use std::path::Path;

use ahash::AHashMap;
use fgoxide::io::Io;
use log::{debug, warn};
use noodles::fasta;
use seqmap_dna::{KmerScanner, MAX_KMER_LEN, base_code};

use crate::errors::{Result, SeqmapError};
use crate::logging::format_count;

/// Buffer size used when opening input files.
pub const IO_BUFFER_SIZE: usize = 1024 * 1024;

/// One reference sequence within the concatenated reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    pub name: String,
    /// Offset of the first base in the concatenated reference.
    pub offset: u64,
    pub len: u64,
}

impl Contig {
    /// One past the last base, in concatenated coordinates.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// In-memory reference with a k-mer to position index.
#[derive(Debug)]
pub struct ReferenceIndex {
    contigs: Vec<Contig>,
    codes: Vec<u8>,
    kmer_len: usize,
    positions: AHashMap<u64, Vec<u32>>,
}

impl ReferenceIndex {
    /// Loads a (optionally gzipped) FASTA file and indexes it.
    pub fn load<P: AsRef<Path>>(path: P, kmer_len: usize) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| SeqmapError::InvalidFileFormat {
            file_type: "FASTA".to_string(),
            path: path.display().to_string(),
            reason,
        };

        let fgio = Io::new(5, IO_BUFFER_SIZE);
        let reader = fgio.new_reader(path).map_err(|e| invalid(e.to_string()))?;
        let mut reader = fasta::io::Reader::new(reader);

        let mut sequences = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| invalid(e.to_string()))?;
            let name = String::from_utf8_lossy(record.name().as_ref()).into_owned();
            let sequence: &[u8] = record.sequence().as_ref();
            sequences.push((name, sequence.to_vec()));
        }

        match Self::from_sequences(sequences, kmer_len) {
            Err(SeqmapError::EmptyReference { .. }) => {
                Err(SeqmapError::EmptyReference { path: path.display().to_string() })
            }
            other => other,
        }
    }

    /// Builds the index from named sequences held in memory.
    pub fn from_sequences<I, N, S>(sequences: I, kmer_len: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<[u8]>,
    {
        if !(1..=MAX_KMER_LEN).contains(&kmer_len) {
            return Err(SeqmapError::InvalidParameter {
                parameter: "min-seed-len".to_string(),
                reason: format!("must be between 1 and {MAX_KMER_LEN}, got {kmer_len}"),
            });
        }

        let mut contigs = Vec::new();
        let mut codes = Vec::new();
        let mut positions: AHashMap<u64, Vec<u32>> = AHashMap::new();

        for (name, seq) in sequences {
            let name = name.into();
            let seq = seq.as_ref();
            if seq.is_empty() {
                warn!("Skipping empty reference sequence '{name}'");
                continue;
            }
            let offset = codes.len() as u64;
            if offset + seq.len() as u64 > u64::from(u32::MAX) {
                return Err(SeqmapError::InvalidParameter {
                    parameter: "reference".to_string(),
                    reason: format!("references longer than {} bases are not supported", u32::MAX),
                });
            }
            codes.extend(seq.iter().map(|&b| base_code(b)));
            for (pos, kmer) in KmerScanner::new(seq, kmer_len) {
                positions.entry(kmer.bits()).or_default().push((offset as usize + pos) as u32);
            }
            debug!("Indexed reference sequence '{name}' ({} bp)", format_count(seq.len() as u64));
            contigs.push(Contig { name, offset, len: seq.len() as u64 });
        }

        if contigs.is_empty() {
            return Err(SeqmapError::EmptyReference { path: "<memory>".to_string() });
        }

        log::info!(
            "Indexed {} reference sequences ({} bp, {} distinct {}-mers)",
            contigs.len(),
            format_count(codes.len() as u64),
            format_count(positions.len() as u64),
            kmer_len
        );
        Ok(Self { contigs, codes, kmer_len, positions })
    }

    #[must_use]
    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    #[must_use]
    pub fn kmer_len(&self) -> usize {
        self.kmer_len
    }

    /// Total number of reference bases.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.codes.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// 2-bit codes of the concatenated reference.
    #[must_use]
    pub fn codes(&self) -> &[u8] {
        &self.codes
    }

    /// Reference offsets at which the packed k-mer occurs, in increasing order.
    #[must_use]
    pub fn lookup(&self, kmer: u64) -> &[u32] {
        self.positions.get(&kmer).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn distinct_kmers(&self) -> usize {
        self.positions.len()
    }

    /// Index of the contig containing concatenated offset `pos`.
    #[must_use]
    pub fn locate(&self, pos: u64) -> Option<usize> {
        let idx = self.contigs.partition_point(|c| c.end() <= pos);
        (idx < self.contigs.len() && self.contigs[idx].offset <= pos).then_some(idx)
    }
}
