//! Progress logging for the emit stage.
//!
//! Emits arrive in batch order from whichever worker holds the emit stage, so
//! the tracker is shared by reference and counts atomically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::info;

use crate::logging::{format_count, format_duration, format_rate};

/// Logs a line each time the running count passes a multiple of the interval.
///
/// # Example
/// ```
/// use seqmap_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Mapped reads").with_interval(100);
/// tracker.log_if_needed(60);
/// assert_eq!(tracker.log_if_needed(150), 2); // crossed 100 and 200
/// tracker.log_final();
/// assert_eq!(tracker.count(), 210);
/// ```
#[derive(Debug)]
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: AtomicU64,
    started: Instant,
}

impl ProgressTracker {
    /// Tracker logging every 1,000,000 items.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            interval: 1_000_000,
            message: message.into(),
            count: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `additional` items and logs once per interval boundary crossed.
    ///
    /// Returns the number of boundaries crossed.
    pub fn log_if_needed(&self, additional: u64) -> u64 {
        if additional == 0 {
            return 0;
        }
        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let now = prev + additional;
        let crossed = now / self.interval - prev / self.interval;
        if crossed > 0 {
            let elapsed = self.started.elapsed();
            info!(
                "{} {} ({}, {})",
                self.message,
                format_count(now / self.interval * self.interval),
                format_duration(elapsed),
                format_rate(now, elapsed)
            );
        }
        crossed
    }

    /// Logs the total with the overall rate.
    pub fn log_final(&self) {
        let count = self.count();
        let elapsed = self.started.elapsed();
        info!(
            "{} {} (complete in {}, {})",
            self.message,
            format_count(count),
            format_duration(elapsed),
            format_rate(count, elapsed)
        );
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
