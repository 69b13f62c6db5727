//! FASTQ input for the ingest stage.
//!
//! [`FastqSource`] reads single-end, paired (two files) or interleaved input
//! and hands out batches bounded by a base budget. Every read receives a
//! global id in input order, so the position of a read in the output never
//! depends on which worker ingested it.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use fgoxide::io::Io;
use log::{debug, warn};
use seq_io::fastq::Reader as FastqReader;
use seq_io::fastq::Record;

use crate::errors::{Result, SeqmapError};
use crate::record::ReadRecord;
use crate::reference::IO_BUFFER_SIZE;
use crate::stages::RecordSource;

/// How reads are laid out across the input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastqLayout {
    /// One file, every read independent.
    SingleEnd,
    /// Two files, read `i` of the first pairs with read `i` of the second.
    Paired,
    /// One file in which mates may follow each other (smart pairing).
    Interleaved,
}

struct FastqInput {
    path: PathBuf,
    reader: FastqReader<Box<dyn BufRead + Send>>,
}

impl FastqInput {
    fn open(path: &Path) -> Result<Self> {
        let fgio = Io::new(5, IO_BUFFER_SIZE);
        let inner = fgio.new_reader(path).map_err(|e| SeqmapError::InvalidFileFormat {
            file_type: "FASTQ".to_string(),
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { path: path.to_path_buf(), reader: FastqReader::with_capacity(inner, IO_BUFFER_SIZE) })
    }

    /// Reads the next record, assigning it `id`.
    fn next_record(&mut self, id: u64) -> Result<Option<ReadRecord>> {
        let Some(result) = self.reader.next() else {
            return Ok(None);
        };
        let record = result.map_err(|e| SeqmapError::InvalidFileFormat {
            file_type: "FASTQ".to_string(),
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        let (name, comment) = split_header(record.head());
        let mut read = ReadRecord::new(id, name, record.seq(), record.qual());
        read.comment = comment.map(<[u8]>::to_vec);
        Ok(Some(read))
    }
}

/// Splits a FASTQ header into the read name (mate suffix removed) and comment.
///
/// ```
/// use seqmap_lib::fastq::split_header;
///
/// assert_eq!(split_header(b"read1/2 BC:Z:ACGT"), (&b"read1"[..], Some(&b"BC:Z:ACGT"[..])));
/// assert_eq!(split_header(b"read1"), (&b"read1"[..], None));
/// ```
#[must_use]
pub fn split_header(head: &[u8]) -> (&[u8], Option<&[u8]>) {
    let (name, comment) = match head.iter().position(u8::is_ascii_whitespace) {
        Some(i) => {
            let rest = head[i + 1..].trim_ascii_start();
            (&head[..i], (!rest.is_empty()).then_some(rest))
        }
        None => (head, None),
    };
    let name = match name {
        [stem @ .., b'/', b'1' | b'2'] if !stem.is_empty() => stem,
        _ => name,
    };
    (name, comment)
}

/// Batched FASTQ reader.
///
/// In interleaved mode a batch never ends between two reads that smart
/// pairing would join, so a pair is always mapped together whatever the
/// batch budget.
pub struct FastqSource {
    first: FastqInput,
    second: Option<FastqInput>,
    layout: FastqLayout,
    next_id: u64,
    /// Record read past the end of the previous batch.
    pending: Option<ReadRecord>,
}

impl FastqSource {
    /// Opens a single-end or interleaved source.
    pub fn single(path: &Path, interleaved: bool) -> Result<Self> {
        let layout = if interleaved { FastqLayout::Interleaved } else { FastqLayout::SingleEnd };
        Ok(Self { first: FastqInput::open(path)?, second: None, layout, next_id: 0, pending: None })
    }

    /// Opens a paired source over two files.
    pub fn paired(first: &Path, second: &Path) -> Result<Self> {
        Ok(Self {
            first: FastqInput::open(first)?,
            second: Some(FastqInput::open(second)?),
            layout: FastqLayout::Paired,
            next_id: 0,
            pending: None,
        })
    }

    #[must_use]
    pub fn layout(&self) -> FastqLayout {
        self.layout
    }

    /// Number of reads handed out so far.
    #[must_use]
    pub fn reads_read(&self) -> u64 {
        self.next_id
    }

    fn next_first(&mut self, id: u64) -> Result<Option<ReadRecord>> {
        match self.pending.take() {
            Some(read) => Ok(Some(read)),
            None => self.first.next_record(id),
        }
    }

    /// Single-end and interleaved reads, one file.
    fn read_unpaired(&mut self, max_bases: usize) -> Result<(Vec<ReadRecord>, usize)> {
        let interleaved = self.layout == FastqLayout::Interleaved;
        let mut records: Vec<ReadRecord> = Vec::new();
        let mut bases = 0usize;
        // Whether the last read taken could still be joined by the next one.
        let mut open = false;

        loop {
            let may_close = interleaved && open;
            if bases >= max_bases && !may_close {
                break;
            }
            let Some(read) = self.next_first(self.next_id)? else {
                break;
            };
            let closes = may_close && records.last().is_some_and(|last| last.name == read.name);
            if bases >= max_bases && !closes {
                self.pending = Some(read);
                break;
            }
            open = !closes;
            self.next_id += 1;
            bases += read.len();
            records.push(read);
        }
        Ok((records, bases))
    }

    /// Mates from two files, interleaved into one batch.
    fn read_paired(&mut self, max_bases: usize) -> Result<(Vec<ReadRecord>, usize)> {
        let mut records = Vec::new();
        let mut bases = 0usize;

        while bases < max_bases {
            let id = self.next_id;
            let Some(read) = self.next_first(id)? else {
                if let Some(second) = self.second.as_mut() {
                    if second.next_record(id)?.is_some() {
                        warn!(
                            "'{}' has more reads than '{}'; ignoring the extra reads",
                            second.path.display(),
                            self.first.path.display()
                        );
                    }
                }
                break;
            };
            let Some(second) = self.second.as_mut() else {
                break;
            };
            let Some(mate) = second.next_record(id + 1)? else {
                warn!(
                    "'{}' has fewer reads than '{}'; ignoring the unpaired remainder",
                    second.path.display(),
                    self.first.path.display()
                );
                break;
            };
            self.next_id += 2;
            bases += read.len() + mate.len();
            records.push(read);
            records.push(mate);
        }
        Ok((records, bases))
    }
}

impl RecordSource for FastqSource {
    fn read_next(&mut self, max_bases: usize) -> Result<Vec<ReadRecord>> {
        let (records, bases) = match self.layout {
            FastqLayout::Paired => self.read_paired(max_bases)?,
            FastqLayout::SingleEnd | FastqLayout::Interleaved => self.read_unpaired(max_bases)?,
        };
        debug!("Read {} sequences ({} bp)", records.len(), bases);
        Ok(records)
    }
}
