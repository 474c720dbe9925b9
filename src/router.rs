//! Mutation router: the entry point for person CRUD.
//!
//! Each mutation is validated locally, then either applied to the remote store or,
//! when the store cannot be reached, appended to the pending-operation queue and
//! reported as [`MutationOutcome::Deferred`]. Reads are never served from the queue.
//!
//! The client handle is re-resolved and probed at the start of every call, since
//! reachability can change between calls.

use std::sync::Arc;
use tracing::{debug, info, warn};

use persona_outbox::{OperationKind, OutboxMetrics, PendingOperation, PendingStore, DELETE_PAYLOAD};
use persona_transport::DocumentStore;
use persona_types::{is_valid_identifier, normalize_identifier, Person};

use crate::error::ServiceError;
use crate::probe::{Availability, RemoteHandle};

/// Result of a mutation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome<T> {
    /// Applied to the remote store.
    Applied(T),
    /// Accepted locally; will be replayed by reconciliation.
    Deferred,
}

impl<T> MutationOutcome<T> {
    pub fn is_deferred(&self) -> bool {
        matches!(self, MutationOutcome::Deferred)
    }

    pub fn applied(self) -> Option<T> {
        match self {
            MutationOutcome::Applied(value) => Some(value),
            MutationOutcome::Deferred => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub struct PersonService {
    remote: Arc<RemoteHandle>,
    queue: Arc<dyn PendingStore>,
    metrics: OutboxMetrics,
}

impl PersonService {
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

    /// Create a person. Fails with `DuplicateIdentifier` if the identifier is taken.
    pub fn create(&self, mut person: Person) -> ServiceResult<MutationOutcome<Person>> {
        person.id = normalize_identifier(&person.id);
        info!(id = %person.id, "create requested");
        person.validate()?;

        let payload = encode(&person)?;
        let id = person.id.clone();
        self.route(&id, OperationKind::Create, &payload, |store| {
            if store.exists(&person.id)? {
                info!(id = %person.id, "identifier already registered");
                return Err(ServiceError::DuplicateIdentifier(person.id.clone()));
            }
            store.put(&person.id, &person)?;
            info!(id = %person.id, "person created");
            Ok(person.clone())
        })
    }

    /// Replace every field of an existing person except its identifier.
    ///
    /// `id` must equal `person.id`; this is checked before anything else, including
    /// the availability probe.
    pub fn update(&self, id: &str, mut person: Person) -> ServiceResult<MutationOutcome<Person>> {
        let target = normalize_identifier(id);
        person.id = normalize_identifier(&person.id);
        info!(id = %target, "update requested");

        if target != person.id {
            warn!(target = %target, payload = %person.id, "attempt to change identifier blocked");
            return Err(ServiceError::ImmutableIdentifier {
                target,
                payload: person.id,
            });
        }
        person.validate()?;

        let payload = encode(&person)?;
        self.route(&target, OperationKind::Update, &payload, |store| {
            if !store.exists(&target)? {
                info!(id = %target, "person to update not found");
                return Err(ServiceError::NotFound(target.clone()));
            }
            store.put(&target, &person)?;
            info!(id = %target, "person updated");
            Ok(person.clone())
        })
    }

    /// Delete a person.
    pub fn delete(&self, id: &str) -> ServiceResult<MutationOutcome<()>> {
        let target = normalize_identifier(id);
        info!(id = %target, "delete requested");
        require_valid(&target)?;

        self.route(&target, OperationKind::Delete, DELETE_PAYLOAD, |store| {
            if !store.exists(&target)? {
                info!(id = %target, "person to delete not found");
                return Err(ServiceError::NotFound(target.clone()));
            }
            store.delete(&target)?;
            info!(id = %target, "person deleted");
            Ok(())
        })
    }

    /// Fetch one person. Fails with `Unavailable` rather than guessing from local state.
    pub fn get(&self, id: &str) -> ServiceResult<Person> {
        let target = normalize_identifier(id);
        debug!(id = %target, "get requested");
        require_valid(&target)?;

        let store = self.read_store()?;
        store
            .get(&target)?
            .ok_or(ServiceError::NotFound(target))
    }

    /// List every person in the remote store.
    pub fn list(&self) -> ServiceResult<Vec<Person>> {
        debug!("list requested");
        let store = self.read_store()?;
        let people = store.list()?;
        debug!(count = people.len(), "list completed");
        Ok(people)
    }

    /// Queued mutations, oldest first.
    pub fn pending(&self) -> ServiceResult<Vec<PendingOperation>> {
        self.queue.list_all().map_err(ServiceError::queue)
    }

    fn read_store(&self) -> ServiceResult<Arc<dyn DocumentStore>> {
        match self.remote.probe()? {
            Availability::Available(store) => Ok(store),
            Availability::Unavailable(reason) => {
                info!(%reason, "remote store unavailable; read refused");
                Err(ServiceError::Unavailable(reason))
            }
        }
    }

    /// Apply a mutation remotely, or queue it if the store cannot be reached.
    ///
    /// `apply` reports an unreachable store as `ServiceError::Unavailable`; that is
    /// also turned into a deferral, since replay is idempotent even if the write
    /// actually landed.
    fn route<T>(
        &self,
        target: &str,
        kind: OperationKind,
        payload: &str,
        apply: impl FnOnce(&dyn DocumentStore) -> ServiceResult<T>,
    ) -> ServiceResult<MutationOutcome<T>> {
        let store = match self.remote.probe()? {
            Availability::Available(store) => store,
            Availability::Unavailable(reason) => {
                return self.enqueue(target, kind, payload, &reason);
            }
        };

        match apply(store.as_ref()) {
            Ok(value) => Ok(MutationOutcome::Applied(value)),
            Err(ServiceError::Unavailable(reason)) => self.enqueue(target, kind, payload, &reason),
            Err(e) => Err(e),
        }
    }

    fn enqueue<T>(
        &self,
        target: &str,
        kind: OperationKind,
        payload: &str,
        reason: &str,
    ) -> ServiceResult<MutationOutcome<T>> {
        let seq = self
            .queue
            .append(target, kind, payload)
            .map_err(ServiceError::queue)?;
        self.metrics.record_enqueued();
        info!(id = %target, %kind, seq, %reason, "remote store unavailable; operation queued");
        Ok(MutationOutcome::Deferred)
    }
}

fn require_valid(id: &str) -> ServiceResult<()> {
    if is_valid_identifier(id) {
        Ok(())
    } else {
        info!(id = %id, "invalid identifier");
        Err(ServiceError::Validation(format!("'{}' is not a valid identifier", id)))
    }
}

fn encode(person: &Person) -> ServiceResult<String> {
    serde_json::to_string(person)
        .map_err(|e| ServiceError::Queue(format!("cannot serialize person {}: {}", person.id, e)))
}
