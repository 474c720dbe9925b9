//! Periodic driver for the reconciliation worker.
//!
//! Each tick runs one pass on the blocking pool and waits for it before the next
//! tick, so passes never overlap. A pass that outlasts the period delays the next
//! tick instead of bunching up missed ones.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::reconcile::{ReconcileReport, Reconciler};

pub struct ReconcileScheduler {
    reconciler: Arc<Reconciler>,
    period: Duration,
}

impl ReconcileScheduler {
    pub fn new(reconciler: Arc<Reconciler>, period: Duration) -> Self {
        Self { reconciler, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run passes until `shutdown` resolves. The first pass starts immediately.
    ///
    /// Returns the number of passes started. A pass in progress when shutdown fires
    /// is allowed to finish.
    pub async fn run_until<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(period_secs = self.period.as_secs(), "reconciliation scheduler started");
        let mut passes = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            passes += 1;
            if let Some(report) = self.run_pass().await {
                debug!(%report, "scheduled reconciliation pass done");
            }
        }
        info!(passes, "reconciliation scheduler stopped");
        passes
    }

    async fn run_pass(&self) -> Option<ReconcileReport> {
        let reconciler = self.reconciler.clone();
        match tokio::task::spawn_blocking(move || reconciler.run()).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                error!(error = %e, "reconciliation pass failed");
                None
            }
            Err(e) => {
                error!(error = %e, "reconciliation task aborted");
                None
            }
        }
    }
}
