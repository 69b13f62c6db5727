//! Per-stage timing collected while the pipeline runs.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::coordinator::{STAGE_COUNT, Stage};

/// Statistics collected during pipeline execution.
///
/// Constructed once per run and shared by reference with every worker.
/// All counters are atomic so workers update them without extra locking.
#[derive(Debug, Default)]
pub struct PipelineStats {
    stage_ns: [AtomicU64; STAGE_COUNT],
    stage_count: [AtomicU64; STAGE_COUNT],
    wait_ns: [AtomicU64; STAGE_COUNT],
    wait_count: [AtomicU64; STAGE_COUNT],
    records: [AtomicU64; STAGE_COUNT],
}

impl PipelineStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one execution of `stage` that handled `records` records.
    pub fn record_stage(&self, stage: Stage, elapsed: Duration, records: usize) {
        if let Some(i) = Self::slot(stage) {
            self.stage_ns[i].fetch_add(duration_ns(elapsed), Ordering::Relaxed);
            self.stage_count[i].fetch_add(1, Ordering::Relaxed);
            self.records[i].fetch_add(records as u64, Ordering::Relaxed);
        }
    }

    /// Records time a worker spent blocked waiting for admission to `stage`.
    pub fn record_wait(&self, stage: Stage, waited: Duration) {
        if let Some(i) = Self::slot(stage) {
            self.wait_ns[i].fetch_add(duration_ns(waited), Ordering::Relaxed);
            self.wait_count[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of recorded executions of `stage`.
    #[must_use]
    pub fn stage_count(&self, stage: Stage) -> u64 {
        Self::slot(stage).map_or(0, |i| self.stage_count[i].load(Ordering::Relaxed))
    }

    /// Number of records handled by `stage` across all executions.
    #[must_use]
    pub fn stage_records(&self, stage: Stage) -> u64 {
        Self::slot(stage).map_or(0, |i| self.records[i].load(Ordering::Relaxed))
    }

    fn slot(stage: Stage) -> Option<usize> {
        (stage != Stage::Terminated).then(|| stage.index())
    }

    /// Renders the timing table.
    #[must_use]
    pub fn format_summary(&self) -> String {
        let format_row = |name: &str, ns: u64, count: u64| -> String {
            if count == 0 {
                format!("  {:<12} {:>10} ops, {:>12}", name, 0, "-")
            } else {
                let total_ms = ns as f64 / 1_000_000.0;
                let avg_us = (ns as f64 / count as f64) / 1_000.0;
                format!("  {name:<12} {count:>10} ops, {total_ms:>10.1}ms total, {avg_us:>8.1}µs avg")
            }
        };

        let mut s = String::new();
        let _ = writeln!(s, "Pipeline Statistics:");
        let _ = writeln!(s, "Stage Timing:");
        for stage in Stage::ACTIVE {
            let i = stage.index();
            let _ = writeln!(
                s,
                "{}",
                format_row(
                    stage.name(),
                    self.stage_ns[i].load(Ordering::Relaxed),
                    self.stage_count[i].load(Ordering::Relaxed)
                )
            );
        }
        let _ = writeln!(s, "Admission Wait:");
        for stage in Stage::ACTIVE {
            let i = stage.index();
            let _ = writeln!(
                s,
                "{}",
                format_row(
                    stage.name(),
                    self.wait_ns[i].load(Ordering::Relaxed),
                    self.wait_count[i].load(Ordering::Relaxed)
                )
            );
        }
        s
    }

    /// Logs the timing table line by line at info level.
    pub fn log_summary(&self) {
        for line in self.format_summary().lines() {
            log::info!("{line}");
        }
    }
}

fn duration_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
