//! Device metrics for observability

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use contracts::DeviceOutcome;

/// Metrics for a single registered device
#[derive(Debug, Default)]
pub struct DeviceMetrics {
    /// Successful pushes
    done_count: AtomicU64,
    /// Updates superseded before writing
    aborted_count: AtomicU64,
    /// Failed or timed-out pushes
    failure_count: AtomicU64,
    /// Updates skipped by the retry policy
    skipped_count: AtomicU64,
    /// Failures since the last success
    consecutive_failures: AtomicU32,
}

impl DeviceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn done_count(&self) -> u64 {
        self.done_count.load(Ordering::Relaxed)
    }

    pub fn aborted_count(&self) -> u64 {
        self.aborted_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped_count.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Count one terminal outcome
    pub fn record(&self, outcome: &DeviceOutcome) {
        match outcome {
            DeviceOutcome::Done => {
                self.done_count.fetch_add(1, Ordering::Relaxed);
                self.consecutive_failures.store(0, Ordering::Relaxed);
            }
            DeviceOutcome::Aborted => {
                self.aborted_count.fetch_add(1, Ordering::Relaxed);
            }
            DeviceOutcome::Failed { .. } => {
                self.failure_count.fetch_add(1, Ordering::Relaxed);
                self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
            }
            DeviceOutcome::Skipped => {
                self.skipped_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            done_count: self.done_count(),
            aborted_count: self.aborted_count(),
            failure_count: self.failure_count(),
            skipped_count: self.skipped_count(),
            consecutive_failures: self.consecutive_failures(),
        }
    }
}

/// Snapshot of device metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub done_count: u64,
    pub aborted_count: u64,
    pub failure_count: u64,
    pub skipped_count: u64,
    pub consecutive_failures: u32,
}
