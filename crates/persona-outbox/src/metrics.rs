//! Metrics and reporting for queue activity.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Outbox counters (thread-safe, cheap to clone).
#[derive(Debug, Clone, Default)]
pub struct OutboxMetrics {
    /// Mutations queued because the remote store was unavailable
    pub enqueued: Arc<AtomicU64>,
    /// Queue entries applied (or found already applied) and removed
    pub replayed: Arc<AtomicU64>,
    /// Queue entries discarded as corrupt or obsolete
    pub dropped: Arc<AtomicU64>,
    /// Replay attempts that left the entry queued
    pub retained: Arc<AtomicU64>,
    /// Reconciliation runs that reached the queue
    pub runs: Arc<AtomicU64>,
    /// Reconciliation runs skipped (store unavailable or run already active)
    pub skipped_runs: Arc<AtomicU64>,
}

impl OutboxMetrics {
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replayed(&self) {
        self.replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retained(&self) {
        self.retained.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_run(&self) {
        self.skipped_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            retained: self.retained.load(Ordering::Relaxed),
            runs: self.runs.load(Ordering::Relaxed),
            skipped_runs: self.skipped_runs.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics (for reporting).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub replayed: u64,
    pub dropped: u64,
    pub retained: u64,
    pub runs: u64,
    pub skipped_runs: u64,
}

impl MetricsSnapshot {
    /// Share of replay attempts that cleared their entry successfully.
    pub fn replay_success_rate(&self) -> f64 {
        let total = self.replayed + self.dropped + self.retained;
        if total == 0 {
            return 0.0;
        }
        self.replayed as f64 / total as f64
    }

    /// Format a human-readable report.
    pub fn format_report(&self) -> String {
        let mut lines = Vec::new();
        lines.push("Outbox Report".to_string());
        lines.push("=".repeat(40));
        lines.push(format!("  Enqueued:        {}", self.enqueued));
        lines.push(format!("  Replayed:        {}", self.replayed));
        lines.push(format!("  Dropped:         {}", self.dropped));
        lines.push(format!("  Retained:        {}", self.retained));
        lines.push(format!(
            "  Success Rate:    {:.1}%",
            self.replay_success_rate() * 100.0
        ));
        lines.push(format!(
            "  Runs:            {} ({} skipped)",
            self.runs, self.skipped_runs
        ));
        lines.join("\n")
    }
}
