//! Formatting helpers for log output.
//!
//! Consistent rendering of counts, percentages, durations, rates and memory
//! sizes, plus the end-of-run mapping summary and an operation timer.

use std::time::{Duration, Instant};

use crate::metrics::MappingMetrics;

/// Formats a count with thousands separators.
///
/// # Examples
///
/// ```
/// use seqmap_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i).is_multiple_of(3) {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a percentage with specified decimal places.
///
/// # Examples
///
/// ```
/// use seqmap_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration for log lines.
///
/// Sub-second stage timings keep millisecond resolution; longer runs are
/// shown as minutes and hours.
///
/// ```
/// use seqmap_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_millis(350)), "350ms");
/// assert_eq!(format_duration(Duration::from_millis(12_500)), "12.5s");
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0 => format!("{}ms", duration.as_millis()),
        1..60 => format!("{:.1}s", duration.as_secs_f64()),
        60..3600 => match secs % 60 {
            0 => format!("{}m", secs / 60),
            rem => format!("{}m {rem}s", secs / 60),
        },
        _ => match (secs % 3600) / 60 {
            0 => format!("{}h", secs / 3600),
            mins => format!("{}h {mins}m", secs / 3600),
        },
    }
}

/// Formats a rate (reads per second) with appropriate units.
///
/// # Examples
///
/// ```
/// use seqmap_lib::logging::format_rate;
/// use std::time::Duration;
///
/// assert_eq!(format_rate(1000, Duration::from_secs(1)), "1,000 reads/s");
/// assert_eq!(format_rate(30, Duration::from_secs(60)), "30.0 reads/min");
/// ```
#[must_use]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} reads/s", format_count(count));
    }

    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} reads/s", format_count(rate as u64))
    } else {
        let per_min = count as f64 / (secs / 60.0);
        format!("{per_min:.1} reads/min")
    }
}

/// Formats a byte count as megabytes with two decimals.
///
/// ```
/// use seqmap_lib::logging::format_megabytes;
///
/// assert_eq!(format_megabytes(3 * 1024 * 1024 / 2), "1.50 MB");
/// ```
#[must_use]
pub fn format_megabytes(bytes: usize) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Logs a formatted summary of mapping metrics.
pub fn log_mapping_summary(metrics: &MappingMetrics) {
    log::info!("Mapping Summary:");
    log::info!("  Total reads: {}", format_count(metrics.total_reads));
    log::info!("  Total bases: {}", format_count(metrics.total_bases));
    log::info!("  Mapped reads: {}", format_count(metrics.mapped_reads));

    if metrics.total_reads > 0 {
        log::info!("  Mapped fraction: {}", format_percent(metrics.fraction_mapped, 2));
    }

    if metrics.paired_reads > 0 {
        log::info!("  Paired reads: {}", format_count(metrics.paired_reads));
        log::info!("  Properly paired reads: {}", format_count(metrics.properly_paired_reads));
    }

    log::info!("  Batches: {}", format_count(metrics.batches));
    if metrics.arena_growth_events > 0 {
        log::info!(
            "  Scratch memory grew {} time(s), final capacity {} reads",
            metrics.arena_growth_events,
            format_count(metrics.arena_capacity)
        );
    }
    if metrics.arena_scratch_growth_events > 0 {
        log::info!(
            "  Per-thread scratch grew {} time(s) for longer reads",
            metrics.arena_scratch_growth_events
        );
    }
}

/// Operation timing and summary helper.
///
/// # Examples
///
/// ```no_run
/// use seqmap_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Mapping reads");
///
/// // ... do work ...
///
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Time since the timer was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Logs the completion with item count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.start_time.elapsed();
        log::info!(
            "{} completed: {} in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
