//! In-memory collaborators for driving [`MappingStages`] without files.
//!
//! [`MappingStages`]: seqmap_lib::stages::MappingStages

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use seqmap_lib::align::Aligner;
use seqmap_lib::arena::Arena;
use seqmap_lib::errors::{Result, SeqmapError};
use seqmap_lib::record::{MappingResult, ReadRecord};
use seqmap_lib::stages::{RecordSink, RecordSource};

/// Builds a batch of `len` reads named `b{batch}-{i}`, each `read_len` bases long.
pub fn batch_of_reads(batch: usize, len: usize, read_len: usize, first_id: u64) -> Vec<ReadRecord> {
    (0..len)
        .map(|i| {
            let name = format!("b{batch}-{i}");
            let seq = "A".repeat(read_len);
            ReadRecord::new(first_id + i as u64, name.as_bytes(), seq.as_bytes(), seq.as_bytes())
        })
        .collect()
}

/// A source that hands out prepared batches and counts how often it is read.
pub struct ScriptedSource {
    batches: VecDeque<Vec<ReadRecord>>,
    pub calls: Arc<AtomicU64>,
}

impl ScriptedSource {
    /// One batch per entry of `sizes`, with reads of `read_len` bases.
    pub fn with_sizes(sizes: &[usize], read_len: usize) -> Self {
        let mut next_id = 0;
        let batches = sizes
            .iter()
            .enumerate()
            .map(|(batch, &len)| {
                let reads = batch_of_reads(batch, len, read_len, next_id);
                next_id += len as u64;
                reads
            })
            .collect();
        Self { batches, calls: Arc::new(AtomicU64::new(0)) }
    }
}

impl RecordSource for ScriptedSource {
    fn read_next(&mut self, _max_bases: usize) -> Result<Vec<ReadRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

/// Writes each read name as its result and checks the arena was sized first.
#[derive(Default)]
pub struct NameAligner {
    /// Fail when a read with this name is aligned.
    pub fail_on: Option<String>,
}

impl Aligner for NameAligner {
    fn align(&self, records: &mut [ReadRecord], paired: bool, arena: &mut Arena) -> Result<()> {
        if arena.capacity() < records.len() {
            return Err(SeqmapError::PipelineAborted {
                reason: format!("arena holds {} reads, batch has {}", arena.capacity(), records.len()),
            });
        }
        for record in records {
            let name = String::from_utf8_lossy(&record.name).into_owned();
            if self.fail_on.as_deref() == Some(name.as_str()) {
                return Err(SeqmapError::PipelineAborted { reason: format!("cannot align {name}") });
            }
            record.result = Some(MappingResult {
                line: name.into_bytes(),
                mapped: true,
                paired,
                proper_pair: false,
            });
        }
        Ok(())
    }
}

/// A sink that keeps every written line, shared with the test.
#[derive(Clone, Default)]
pub struct SharedSink {
    pub lines: Arc<Mutex<Vec<String>>>,
    pub finished: Arc<AtomicU64>,
}

impl SharedSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl RecordSink for SharedSink {
    fn write(&mut self, result: &MappingResult) -> Result<()> {
        self.lines.lock().push(String::from_utf8_lossy(&result.line).into_owned());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
