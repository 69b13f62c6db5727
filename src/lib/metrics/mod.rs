//! Mapping metrics and the TSV writer for them.
//!
//! - [`MappingMetrics`] - per-run counts gathered by the emit stage
//! - [`writer`] - metrics file I/O

pub mod writer;

use serde::{Deserialize, Serialize};

pub use writer::write_metrics;

/// Number of decimal places used for float metrics.
pub const FLOAT_PRECISION: usize = 6;

/// Formats a float value with the standard precision for metrics.
///
/// ```
/// use seqmap_lib::metrics::format_float;
/// assert_eq!(format_float(0.25), "0.250000");
/// ```
#[must_use]
pub fn format_float(value: f64) -> String {
    format!("{value:.FLOAT_PRECISION$}")
}

/// A metric type that can be serialized to TSV files.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name used in error messages.
    fn metric_name() -> &'static str;
}

/// Summary of one mapping run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingMetrics {
    /// Reads ingested
    pub total_reads: u64,

    /// Bases across all ingested reads
    pub total_bases: u64,

    /// Reads written with a mapped alignment
    pub mapped_reads: u64,

    /// `mapped_reads / total_reads`
    pub fraction_mapped: f64,

    /// Reads written as one mate of a pair
    pub paired_reads: u64,

    /// Paired reads flagged as properly paired
    pub properly_paired_reads: u64,

    /// Batches emitted
    pub batches: u64,

    /// Times a batch held more reads than the arena's shared tables
    pub arena_growth_events: u64,

    /// Reads the arena could hold at the end of the run
    pub arena_capacity: u64,

    /// Times a read was longer than the per-thread scratch buffers
    pub arena_scratch_growth_events: u64,
}

impl MappingMetrics {
    /// Recomputes the derived fraction from the counts.
    pub fn finalize(&mut self) {
        self.fraction_mapped = if self.total_reads == 0 {
            0.0
        } else {
            self.mapped_reads as f64 / self.total_reads as f64
        };
    }
}

impl Metric for MappingMetrics {
    fn metric_name() -> &'static str {
        "mapping"
    }
}
