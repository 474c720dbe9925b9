//! Persona Sync
//!
//! Person-record service with write-behind to a remote document store:
//!
//! - **Availability probe**: lazily built client plus a canary round trip per call ([`probe`])
//! - **Mutation routing**: apply remotely or queue durably when the store is unreachable ([`router`])
//! - **Reconciliation**: replay queued mutations idempotently, oldest first ([`reconcile`])
//! - **Scheduling**: periodic, non-overlapping reconciliation passes ([`scheduler`])
//!
//! Record types live in `persona-types`, the remote store contract in
//! `persona-transport`, and the durable queue in `persona-outbox`.

pub mod config;
pub mod error;
pub mod logging;
pub mod probe;
pub mod reconcile;
pub mod router;
pub mod scheduler;

pub use config::SyncConfig;
pub use error::ServiceError;
pub use probe::{Availability, Connector, ProbeError, RemoteHandle, RestConnector};
pub use reconcile::{ReconcileReport, Reconciler, RunStatus};
pub use router::{MutationOutcome, PersonService, ServiceResult};
pub use scheduler::ReconcileScheduler;
