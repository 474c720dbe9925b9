//! Durable write-behind queue for person mutations.
//!
//! This crate provides:
//! - `FsPendingStore`: crash-safe, insertion-ordered store of queued mutations
//! - `PendingOperation` / `OperationKind`: the persisted entry shape
//! - `ReplayLease`: cross-process exclusion for reconciliation passes
//! - `OutboxMetrics`: counters for enqueue and replay outcomes

pub mod lock;
pub mod metrics;
pub mod paths;
pub mod pending;

pub use metrics::{MetricsSnapshot, OutboxMetrics};
pub use pending::{
    FsPendingStore, OperationKind, PendingOperation, PendingStore, ReplayLease, DELETE_PAYLOAD,
};
