//! Run statistics shared between batch workers.
//!
//! Counters only: no student identifiers or report content are kept here.
//! Nothing is written to disk; each run starts from zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lock-free counters for one analysis run.
#[derive(Debug)]
pub struct RunStats {
    /// Sessions picked up by a worker
    sessions_started: AtomicU64,
    /// Sessions that produced a report
    sessions_completed: AtomicU64,
    /// Sessions aborted with an error
    sessions_failed: AtomicU64,
    /// Frames run through a movement tracker
    frames_processed: AtomicU64,
    /// Report files written to disk
    reports_written: AtomicU64,
    /// Run start time
    run_start: DateTime<Utc>,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            sessions_started: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
            frames_processed: AtomicU64::new(0),
            reports_written: AtomicU64::new(0),
            run_start: Utc::now(),
        }
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_completed(&self) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frames(&self, count: u64) {
        self.frames_processed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_report_written(&self) {
        self.reports_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> RunStatsSnapshot {
        RunStatsSnapshot {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_completed: self.sessions_completed.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            reports_written: self.reports_written.load(Ordering::Relaxed),
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Run Statistics:\n\
             - Sessions started: {}\n\
             - Sessions completed: {}\n\
             - Sessions failed: {}\n\
             - Frames processed: {}\n\
             - Reports written: {}\n\
             - Run duration: {} seconds",
            stats.sessions_started,
            stats.sessions_completed,
            stats.sessions_failed,
            stats.frames_processed,
            stats.reports_written,
            stats.run_duration_secs
        )
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the run counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatsSnapshot {
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub sessions_failed: u64,
    pub frames_processed: u64,
    pub reports_written: u64,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: u64,
}

/// Thread-safe shared run stats.
pub type SharedRunStats = Arc<RunStats>;

pub fn create_shared_stats() -> SharedRunStats {
    Arc::new(RunStats::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_counting() {
        let stats = RunStats::new();

        stats.record_session_started();
        stats.record_session_started();
        stats.record_session_completed();
        stats.record_session_failed();
        stats.record_frames(120);
        stats.record_report_written();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.sessions_started, 2);
        assert_eq!(snapshot.sessions_completed, 1);
        assert_eq!(snapshot.sessions_failed, 1);
        assert_eq!(snapshot.frames_processed, 120);
        assert_eq!(snapshot.reports_written, 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let stats = create_shared_stats();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        stats.record_frames(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot().frames_processed, 1_000);
    }

    #[test]
    fn test_each_run_starts_from_zero() {
        let first = create_shared_stats();
        first.record_session_started();
        first.record_session_completed();
        first.record_report_written();

        let second = create_shared_stats();
        let snapshot = second.snapshot();
        assert_eq!(snapshot.sessions_started, 0);
        assert_eq!(snapshot.sessions_completed, 0);
        assert_eq!(snapshot.reports_written, 0);
        assert_eq!(first.snapshot().sessions_completed, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = RunStats::new().summary();
        assert!(summary.contains("Sessions completed"));
        assert!(summary.contains("Frames processed"));
        assert!(summary.contains("Reports written"));
    }
}
