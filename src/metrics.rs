// Performance metrics module
//
// Lightweight counters for monitoring pipeline activity without locks.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Pipeline activity counters.
///
/// Uses atomic operations for lock-free tracking; owned by the session and
/// logged on demand for performance analysis.
#[derive(Debug)]
pub struct Metrics {
    /// Validation passes started
    pub validations_run: AtomicUsize,

    /// Cleanup executions
    pub cleanups_run: AtomicUsize,

    /// Export packages built
    pub exports_run: AtomicUsize,

    /// Total time spent inside validation passes, in milliseconds
    pub total_validation_time_ms: AtomicU64,

    /// Session start time
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            validations_run: AtomicUsize::new(0),
            cleanups_run: AtomicUsize::new(0),
            exports_run: AtomicUsize::new(0),
            total_validation_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a validation pass and its duration
    pub fn record_validation(&self, duration: Duration) {
        self.validations_run.fetch_add(1, Ordering::Relaxed);
        self.total_validation_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a cleanup execution
    pub fn record_cleanup(&self) {
        self.cleanups_run.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a built export package
    pub fn record_export(&self) {
        self.exports_run.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the session started
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// One-line summary for logging
    pub fn summary(&self) -> String {
        format!(
            "validations={} cleanups={} exports={} validation_time={}ms uptime={:.1}s",
            self.validations_run.load(Ordering::Relaxed),
            self.cleanups_run.load(Ordering::Relaxed),
            self.exports_run.load(Ordering::Relaxed),
            self.total_validation_time_ms.load(Ordering::Relaxed),
            self.uptime().as_secs_f32(),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_validation(Duration::from_millis(12));
        metrics.record_validation(Duration::from_millis(8));
        metrics.record_cleanup();
        metrics.record_export();

        assert_eq!(metrics.validations_run.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.cleanups_run.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.exports_run.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_validation_time_ms.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn summary_mentions_all_counters() {
        let metrics = Metrics::new();
        metrics.record_cleanup();
        let summary = metrics.summary();
        assert!(summary.contains("cleanups=1"));
        assert!(summary.contains("validations=0"));
    }
}
