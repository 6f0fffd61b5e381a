//! Counters for a download session
//!
//! Atomic so a downloader shared behind an `Arc` can be observed from
//! another task while a session is running.

use std::sync::atomic::{AtomicU64, Ordering};

use super::error::{DownloadError, ErrorKind};

#[derive(Debug, Default)]
pub struct SessionMetrics {
    pub listed: AtomicU64,
    pub succeeded: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub write_failures: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl SessionMetrics {
    /// Record how many instances the listing returned
    pub fn record_listed(&self, count: usize) {
        self.listed.store(count as u64, Ordering::Relaxed);
    }

    /// Record that an instance was written to disk
    pub fn record_success(&self, size: u64) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(size, Ordering::Relaxed);
    }

    /// Record a per-instance failure under the counter matching its kind
    pub fn record_failure(&self, error: &DownloadError) {
        match error.kind() {
            ErrorKind::Write => self.write_failures.fetch_add(1, Ordering::Relaxed),
            _ => self.fetch_failures.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn reset(&self) {
        self.listed.store(0, Ordering::Relaxed);
        self.succeeded.store(0, Ordering::Relaxed);
        self.fetch_failures.store(0, Ordering::Relaxed);
        self.write_failures.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        SessionMetricsSnapshot {
            listed: self.listed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of session metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMetricsSnapshot {
    pub listed: u64,
    pub succeeded: u64,
    pub fetch_failures: u64,
    pub write_failures: u64,
    pub bytes_written: u64,
}

impl SessionMetricsSnapshot {
    pub fn failed(&self) -> u64 {
        self.fetch_failures + self.write_failures
    }

    /// True when instances were listed and every one of them failed to write
    pub fn all_writes_failed(&self) -> bool {
        self.listed > 0 && self.write_failures == self.listed
    }
}
