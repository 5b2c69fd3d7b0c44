use crate::decode::DecodeSummary;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Counters shared by the workers of one pipeline run
pub struct IngestStats {
    total_sources: u64,
    started: Instant,
    pub sources_completed: AtomicU64,
    pub sources_failed: AtomicU64,
    pub records_decoded: AtomicU64,
    pub lines_skipped: AtomicU64,
    pub bytes_declared: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub total_sources: u64,
    pub sources_completed: u64,
    pub sources_failed: u64,
    pub records_decoded: u64,
    pub lines_skipped: u64,
    pub bytes_declared: u64,
}

impl IngestStats {
    pub fn new(total_sources: u64) -> Self {
        Self {
            total_sources,
            started: Instant::now(),
            sources_completed: AtomicU64::new(0),
            sources_failed: AtomicU64::new(0),
            records_decoded: AtomicU64::new(0),
            lines_skipped: AtomicU64::new(0),
            bytes_declared: AtomicU64::new(0),
        }
    }

    pub fn total(&self) -> u64 {
        self.total_sources
    }

    /// Marks one source attempted (successfully or not) and returns the new count.
    pub fn inc_completed(&self) -> u64 {
        self.sources_completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn inc_failed(&self) {
        self.sources_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_declared_bytes(&self, bytes: u64) {
        self.bytes_declared.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_decoded(&self, summary: &DecodeSummary) {
        self.records_decoded
            .fetch_add(summary.records, Ordering::Relaxed);
        self.lines_skipped.fetch_add(summary.skipped, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.sources_completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.sources_failed.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> u64 {
        self.records_decoded.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.lines_skipped.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Remaining time at the current completion rate
    pub fn eta(&self, completed: u64) -> Duration {
        estimate_eta(self.elapsed(), completed, self.total_sources)
    }

    pub fn snapshot(&self) -> IngestSummary {
        IngestSummary {
            total_sources: self.total_sources,
            sources_completed: self.completed(),
            sources_failed: self.failed(),
            records_decoded: self.records(),
            lines_skipped: self.skipped(),
            bytes_declared: self.bytes_declared.load(Ordering::Relaxed),
        }
    }
}

/// Periodic `label: done/total | ETA` lines for long sequential passes.
///
/// `total` of 0 means unknown; the line then carries only the count.
pub(crate) struct ProgressLog {
    label: &'static str,
    total: u64,
    interval: u64,
    next: u64,
    started: Instant,
}

impl ProgressLog {
    pub(crate) fn new(label: &'static str, total: u64, interval: u64) -> Self {
        let interval = interval.max(1);
        Self {
            label,
            total,
            interval,
            next: interval,
            started: Instant::now(),
        }
    }

    pub(crate) fn update(&mut self, done: u64) {
        if done < self.next {
            return;
        }
        self.next = (done / self.interval + 1) * self.interval;
        if self.total == 0 {
            info!(label = self.label, processed = done, "{}: {}", self.label, done);
            return;
        }
        let eta = estimate_eta(self.started.elapsed(), done, self.total);
        info!(
            label = self.label,
            processed = done,
            total = self.total,
            eta_secs = eta.as_secs(),
            "{}: {}/{} | ETA: {}s",
            self.label,
            done,
            self.total,
            eta.as_secs()
        );
    }
}

/// elapsed / done * remaining, truncated to whole seconds.
pub fn estimate_eta(elapsed: Duration, done: u64, total: u64) -> Duration {
    if done == 0 || done >= total {
        return Duration::ZERO;
    }
    let remaining = (total - done) as f64;
    let per_item = elapsed.as_secs_f64() / done as f64;
    Duration::from_secs((per_item * remaining) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_zero() {
        let stats = IngestStats::new(5);
        assert_eq!(stats.total(), 5);
        assert_eq!(stats.completed(), 0);
        assert_eq!(stats.failed(), 0);
        assert_eq!(stats.records(), 0);
        assert_eq!(stats.skipped(), 0);
    }

    #[test]
    fn inc_completed_returns_running_count() {
        let stats = IngestStats::new(3);
        assert_eq!(stats.inc_completed(), 1);
        assert_eq!(stats.inc_completed(), 2);
        assert_eq!(stats.completed(), 2);
    }

    #[test]
    fn add_decoded_accumulates() {
        let stats = IngestStats::new(2);
        stats.add_decoded(&DecodeSummary {
            lines: 10,
            records: 8,
            skipped: 2,
        });
        stats.add_decoded(&DecodeSummary {
            lines: 5,
            records: 5,
            skipped: 0,
        });
        assert_eq!(stats.records(), 13);
        assert_eq!(stats.skipped(), 2);
    }

    #[test]
    fn snapshot_captures_state() {
        let stats = IngestStats::new(4);
        stats.inc_completed();
        stats.inc_completed();
        stats.inc_failed();
        stats.add_declared_bytes(1024);
        stats.add_decoded(&DecodeSummary {
            lines: 3,
            records: 3,
            skipped: 0,
        });

        let summary = stats.snapshot();
        assert_eq!(summary.total_sources, 4);
        assert_eq!(summary.sources_completed, 2);
        assert_eq!(summary.sources_failed, 1);
        assert_eq!(summary.records_decoded, 3);
        assert_eq!(summary.bytes_declared, 1024);
    }

    #[test]
    fn eta_scales_with_remaining() {
        let eta = estimate_eta(Duration::from_secs(10), 2, 10);
        assert_eq!(eta, Duration::from_secs(40));
    }

    #[test]
    fn progress_log_advances_to_next_interval() {
        let mut log = ProgressLog::new("test", 100, 10);
        log.update(3);
        assert_eq!(log.next, 10);
        log.update(25);
        assert_eq!(log.next, 30);
        log.update(30);
        assert_eq!(log.next, 40);
    }

    #[test]
    fn eta_is_zero_before_first_and_after_last() {
        assert_eq!(estimate_eta(Duration::from_secs(10), 0, 10), Duration::ZERO);
        assert_eq!(estimate_eta(Duration::from_secs(10), 10, 10), Duration::ZERO);
    }
}
