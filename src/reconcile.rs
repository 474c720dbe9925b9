//! Reconciliation worker: replays queued mutations against the remote store.
//!
//! A run drains the whole queue oldest first. Each entry ends the run in one of
//! three ways:
//!
//! - **synced**: applied, or found already in the target state; removed
//! - **discarded**: corrupt or obsolete, can never succeed; removed, counted failed
//! - **retained**: left queued for the next run, counted failed
//!
//! Entries are independent: one failure never aborts the run. The exceptions are an
//! unreachable store, which stops the run and leaves the rest queued, and
//! per-identifier ordering: once an entry is retained, later entries for the same
//! identifier wait for the next run so they cannot overtake it.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use persona_outbox::{OperationKind, OutboxMetrics, PendingOperation, PendingStore};
use persona_transport::{DocumentStore, TransportError, TransportResult};
use persona_types::{is_valid_identifier, Person};

use crate::error::ServiceError;
use crate::probe::{Availability, RemoteHandle};

/// How a reconciliation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The whole queue was visited.
    Completed,
    /// The store was unavailable at the start; nothing was attempted.
    StoreUnavailable,
    /// Another run was in progress; nothing was attempted.
    AlreadyRunning,
    /// The store became unreachable mid-run; the remainder stays queued.
    Interrupted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::StoreUnavailable => "store unavailable",
            RunStatus::AlreadyRunning => "already running",
            RunStatus::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// Tally of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub status: RunStatus,
    pub succeeded: usize,
    pub failed: usize,
    /// Entries still queued after the run because of this run's outcome.
    pub retained: usize,
}

impl ReconcileReport {
    fn new(status: RunStatus) -> Self {
        Self {
            status,
            succeeded: 0,
            failed: 0,
            retained: 0,
        }
    }
}

impl std::fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} succeeded, {} failed, {} retained",
            self.status, self.succeeded, self.failed, self.retained
        )
    }
}

/// Per-entry replay result.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Replay {
    Synced,
    Discard(String),
    Retain(String),
}

pub struct Reconciler {
    remote: Arc<RemoteHandle>,
    queue: Arc<dyn PendingStore>,
    metrics: OutboxMetrics,
}

impl Reconciler {
    pub fn new(remote: Arc<RemoteHandle>, queue: Arc<dyn PendingStore>, metrics: OutboxMetrics) -> Self {
        Self {
            remote,
            queue,
            metrics,
        }
    }

    pub fn metrics(&self) -> &OutboxMetrics {
        &self.metrics
    }

    /// Run one reconciliation pass.
    ///
    /// Passes over the same queue directory never overlap, even across processes.
    pub fn run(&self) -> Result<ReconcileReport, ServiceError> {
        let Some(_lease) = self.queue.try_claim_replay().map_err(ServiceError::queue)? else {
            info!("reconciliation already in progress; skipping");
            self.metrics.record_skipped_run();
            return Ok(ReconcileReport::new(RunStatus::AlreadyRunning));
        };

        let report = self.run_pass()?;
        info!(
            status = %report.status,
            succeeded = report.succeeded,
            failed = report.failed,
            retained = report.retained,
            "reconciliation finished"
        );
        Ok(report)
    }

    fn run_pass(&self) -> Result<ReconcileReport, ServiceError> {
        let store = match self.remote.probe()? {
            Availability::Available(store) => store,
            Availability::Unavailable(reason) => {
                info!(%reason, "remote store unavailable; reconciliation deferred to next tick");
                self.metrics.record_skipped_run();
                return Ok(ReconcileReport::new(RunStatus::StoreUnavailable));
            }
        };

        let ops = self.queue.list_all().map_err(ServiceError::queue)?;
        self.metrics.record_run();
        let mut report = ReconcileReport::new(RunStatus::Completed);
        if ops.is_empty() {
            debug!("no pending operations");
            return Ok(report);
        }
        info!(count = ops.len(), "replaying pending operations");

        let mut blocked: HashSet<&str> = HashSet::new();
        for (index, op) in ops.iter().enumerate() {
            if blocked.contains(op.identifier.as_str()) {
                debug!(seq = op.id, id = %op.identifier, kind = %op.kind, "waiting behind a retained entry");
                report.retained += 1;
                continue;
            }

            match self.replay(store.as_ref(), op) {
                Ok(Replay::Synced) => {
                    self.remove(op);
                    self.metrics.record_replayed();
                    report.succeeded += 1;
                    info!(seq = op.id, id = %op.identifier, kind = %op.kind, "pending operation synchronized");
                }
                Ok(Replay::Discard(reason)) => {
                    self.remove(op);
                    self.metrics.record_dropped();
                    report.failed += 1;
                    warn!(seq = op.id, id = %op.identifier, kind = %op.kind, %reason, "pending operation discarded");
                }
                Ok(Replay::Retain(reason)) => {
                    blocked.insert(op.identifier.as_str());
                    self.metrics.record_retained();
                    report.failed += 1;
                    report.retained += 1;
                    error!(seq = op.id, id = %op.identifier, kind = %op.kind, %reason, "integrity violation; pending operation kept");
                }
                Err(TransportError::Unreachable(reason)) => {
                    warn!(%reason, "remote store became unreachable; stopping reconciliation");
                    report.status = RunStatus::Interrupted;
                    report.retained += ops.len() - index;
                    break;
                }
                Err(failed) => {
                    blocked.insert(op.identifier.as_str());
                    self.metrics.record_retained();
                    report.failed += 1;
                    report.retained += 1;
                    warn!(seq = op.id, id = %op.identifier, kind = %op.kind, error = %failed, "replay failed; will retry next run");
                }
            }
        }

        Ok(report)
    }

    fn remove(&self, op: &PendingOperation) {
        if let Err(e) = self.queue.delete_by_id(op.id) {
            // Replay is idempotent, so a leftover entry is harmless.
            warn!(seq = op.id, error = %e, "failed to remove pending operation; it will be replayed");
        }
    }

    fn replay(&self, store: &dyn DocumentStore, op: &PendingOperation) -> TransportResult<Replay> {
        let kind = match op.operation_kind() {
            Ok(kind) => kind,
            Err(e) => return Ok(Replay::Discard(e.to_string())),
        };
        if kind != OperationKind::Delete && op.payload_is_blank() {
            return Ok(Replay::Discard("empty payload".to_string()));
        }

        match kind {
            OperationKind::Create => replay_create(store, op),
            OperationKind::Update => replay_update(store, op),
            OperationKind::Delete => replay_delete(store, op),
        }
    }
}

/// Decode a queued record snapshot; `Err` carries the reason it is corrupt.
fn decode(op: &PendingOperation) -> Result<Person, String> {
    let person: Person = serde_json::from_str(&op.payload)
        .map_err(|e| format!("undecodable payload: {}", e))?;
    if person.id.trim().is_empty() {
        return Err("record has no identifier".to_string());
    }
    if !is_valid_identifier(&person.id) {
        return Err(format!("record identifier '{}' is invalid", person.id));
    }
    Ok(person)
}

fn replay_create(store: &dyn DocumentStore, op: &PendingOperation) -> TransportResult<Replay> {
    let person = match decode(op) {
        Ok(person) => person,
        Err(reason) => return Ok(Replay::Discard(reason)),
    };
    if person.id != op.identifier {
        return Ok(Replay::Discard(format!(
            "record identifier {} does not match entry target {}",
            person.id, op.identifier
        )));
    }

    if store.exists(&person.id)? {
        debug!(id = %person.id, "already present remotely; nothing to write");
        return Ok(Replay::Synced);
    }
    store.put(&person.id, &person)?;
    Ok(Replay::Synced)
}

fn replay_update(store: &dyn DocumentStore, op: &PendingOperation) -> TransportResult<Replay> {
    let person = match decode(op) {
        Ok(person) => person,
        Err(reason) => return Ok(Replay::Discard(reason)),
    };
    if person.id != op.identifier {
        return Ok(Replay::Retain(format!(
            "record identifier {} differs from entry target {}",
            person.id, op.identifier
        )));
    }

    if !store.exists(&op.identifier)? {
        return Ok(Replay::Discard("target no longer exists".to_string()));
    }
    store.put(&op.identifier, &person)?;
    Ok(Replay::Synced)
}

fn replay_delete(store: &dyn DocumentStore, op: &PendingOperation) -> TransportResult<Replay> {
    if !is_valid_identifier(&op.identifier) {
        return Ok(Replay::Discard(format!(
            "identifier '{}' is invalid",
            op.identifier
        )));
    }

    if !store.exists(&op.identifier)? {
        debug!(id = %op.identifier, "already absent remotely");
        return Ok(Replay::Synced);
    }
    store.delete(&op.identifier)?;
    Ok(Replay::Synced)
}
