//! Utilities for writing metrics files.

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use std::path::Path;

use super::Metric;

/// Writes metrics rows to a TSV file with a header line.
///
/// # Example
/// ```no_run
/// use seqmap_lib::metrics::{MappingMetrics, write_metrics};
/// use std::path::Path;
///
/// write_metrics(Path::new("mapping_metrics.txt"), &[MappingMetrics::default()]).unwrap();
/// ```
pub fn write_metrics<P: AsRef<Path>, T: Metric>(path: P, metrics: &[T]) -> Result<()> {
    let path_ref = path.as_ref();
    DelimFile::default()
        .write_tsv(&path_ref, metrics)
        .with_context(|| format!("Failed to write {} metrics: {}", T::metric_name(), path_ref.display()))
}
