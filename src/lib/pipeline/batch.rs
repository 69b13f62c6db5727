//! The unit of work that flows through the pipeline.

/// An indexed, ordered group of records.
///
/// Created by the ingest stage with the index of the worker that read it,
/// mutated in place by transform and consumed by emit. A batch with no
/// records is terminal: it tells the worker that produced it that the input
/// is exhausted.
#[derive(Debug)]
pub struct Batch<R> {
    index: u64,
    records: Vec<R>,
    terminal: bool,
}

impl<R> Batch<R> {
    /// Creates a batch holding `records`.
    #[must_use]
    pub fn new(index: u64, records: Vec<R>) -> Self {
        Self { index, records, terminal: false }
    }

    /// Creates the record-less batch that signals end-of-input.
    #[must_use]
    pub fn terminal(index: u64) -> Self {
        Self { index, records: Vec::new(), terminal: true }
    }

    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// True for an explicit terminal batch and for a batch that came back empty.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.terminal || self.records.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Mutable access to the records, for filling in results in place.
    pub fn records_mut(&mut self) -> &mut Vec<R> {
        &mut self.records
    }

    /// Releases the batch, handing its records to the caller.
    #[must_use]
    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}
