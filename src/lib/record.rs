//! Reads as they travel through the pipeline.

/// One input read plus the slot its mapping result is written into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRecord {
    /// Global, zero-based position of the read in the input, assigned at ingest.
    pub id: u64,
    /// Read name with any `/1` or `/2` suffix removed.
    pub name: Vec<u8>,
    /// Text after the first whitespace of the FASTQ header, if any.
    pub comment: Option<Vec<u8>>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
    /// Filled in by transform; `None` means nothing will be written for this read.
    pub result: Option<MappingResult>,
}

impl ReadRecord {
    /// Builds a record without a result.
    #[must_use]
    pub fn new(id: u64, name: &[u8], seq: &[u8], qual: &[u8]) -> Self {
        Self {
            id,
            name: name.to_vec(),
            comment: None,
            seq: seq.to_vec(),
            qual: qual.to_vec(),
            result: None,
        }
    }

    #[must_use]
    pub fn with_comment(mut self, comment: &[u8]) -> Self {
        self.comment = Some(comment.to_vec());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// The formatted output for one read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingResult {
    /// One SAM line without the trailing newline.
    pub line: Vec<u8>,
    pub mapped: bool,
    pub paired: bool,
    pub proper_pair: bool,
}
