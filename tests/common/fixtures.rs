//! Shared service wiring for integration tests.
//!
//! A [`Harness`] owns a temp directory holding a real filesystem queue and an
//! in-memory remote store whose reachability the test controls.

use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;

use persona_outbox::{FsPendingStore, OutboxMetrics, PendingStore};
use persona_sync::{PersonService, Reconciler, RemoteHandle};
use persona_transport::{DocumentStore, MemoryDocumentStore};
use persona_types::{Address, Person};

/// Identifiers with correct check digits.
pub const ANA: &str = "11111111-1";
pub const BRUNO: &str = "22222222-2";
pub const CARLA: &str = "12345678-5";

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<MemoryDocumentStore>,
    pub queue: Arc<FsPendingStore>,
    pub metrics: OutboxMetrics,
    pub service: PersonService,
    pub reconciler: Reconciler,
}

impl Harness {
    /// Remote store reachable.
    pub fn online() -> Self {
        Self::with_store(Arc::new(MemoryDocumentStore::new()))
    }

    /// Remote store unreachable.
    pub fn offline() -> Self {
        Self::with_store(Arc::new(MemoryDocumentStore::offline()))
    }

    fn with_store(store: Arc<MemoryDocumentStore>) -> Self {
        let remote: Arc<dyn DocumentStore> = store.clone();
        Self::wired(store, remote)
    }

    /// Service and reconciler talk to `remote`; `store` is kept for inspection.
    pub fn wired(store: Arc<MemoryDocumentStore>, remote: Arc<dyn DocumentStore>) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let queue = Arc::new(FsPendingStore::open(dir.path()).expect("open queue"));
        let handle = Arc::new(RemoteHandle::with_store(remote));
        let metrics = OutboxMetrics::default();

        Self {
            service: PersonService::new(handle.clone(), queue.clone(), metrics.clone()),
            reconciler: Reconciler::new(handle, queue.clone(), metrics.clone()),
            dir,
            store,
            queue,
            metrics,
        }
    }

    pub fn go_online(&self) {
        self.store.set_reachable(true);
    }

    pub fn go_offline(&self) {
        self.store.set_reachable(false);
    }

    /// Append a raw entry, bypassing the router.
    pub fn enqueue_raw(&self, identifier: &str, kind: persona_outbox::OperationKind, payload: &str) -> u64 {
        self.queue
            .append(identifier, kind, payload)
            .expect("append to queue")
    }

    /// A second store instance over the same directory, as after a restart.
    pub fn reopen_queue(&self) -> FsPendingStore {
        FsPendingStore::open(self.dir.path()).expect("reopen queue")
    }
}

pub fn person(id: &str, given_name: &str) -> Person {
    Person {
        id: id.to_string(),
        given_name: given_name.to_string(),
        family_name: "Rojas".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).expect("valid date"),
        address: None,
    }
}

pub fn person_with_address(id: &str, given_name: &str) -> Person {
    Person {
        address: Some(Address {
            street: "Av. Libertador 1234".to_string(),
            district: "Santiago".to_string(),
            region: "Metropolitana".to_string(),
        }),
        ..person(id, given_name)
    }
}

pub fn payload(person: &Person) -> String {
    serde_json::to_string(person).expect("serialize person")
}
