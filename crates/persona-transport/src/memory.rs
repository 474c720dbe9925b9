//! In-memory document store.
//!
//! Behaves like the remote store, including going offline: while unreachable every
//! call fails with [`TransportError::Unreachable`]. The data calls can also be cut
//! off on their own while `ping` keeps answering, like a connection that drops right
//! after the availability check. Call counters let tests assert that a code path did
//! (or did not) talk to the store.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::document::{DocumentStore, TransportError, TransportResult};
use persona_types::Person;

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<BTreeMap<String, Person>>,
    offline: AtomicBool,
    data_offline: AtomicBool,
    failing_writes: AtomicBool,
    calls: AtomicU64,
    writes: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that starts offline.
    pub fn offline() -> Self {
        let store = Self::default();
        store.set_reachable(false);
        store
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.offline.store(!reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    /// Cut off `get`/`put`/`delete`/`list`/`exists` while `ping` still succeeds.
    pub fn set_data_reachable(&self, reachable: bool) {
        self.data_offline.store(!reachable, Ordering::SeqCst);
    }

    /// Make `put`/`delete` fail with [`TransportError::Failed`] while reads succeed.
    pub fn set_failing_writes(&self, failing: bool) {
        self.failing_writes.store(failing, Ordering::SeqCst);
    }

    /// Seed a document without counting it as a call.
    pub fn insert(&self, person: Person) {
        self.docs.write().insert(person.id.clone(), person);
    }

    /// Read a document without counting it as a call.
    pub fn snapshot(&self, id: &str) -> Option<Person> {
        self.docs.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total calls made through [`DocumentStore`], including pings.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Successful `put`/`delete` calls.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn enter(&self) -> TransportResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.is_reachable() {
            Ok(())
        } else {
            Err(TransportError::Unreachable(
                "in-memory store is offline".to_string(),
            ))
        }
    }

    fn enter_data(&self) -> TransportResult<()> {
        self.enter()?;
        if self.data_offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(
                "in-memory store dropped the connection".to_string(),
            ));
        }
        Ok(())
    }

    fn enter_write(&self) -> TransportResult<()> {
        self.enter_data()?;
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Failed("write rejected".to_string()));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn ping(&self) -> TransportResult<()> {
        self.enter()
    }

    fn get(&self, id: &str) -> TransportResult<Option<Person>> {
        self.enter_data()?;
        Ok(self.docs.read().get(id).cloned())
    }

    fn put(&self, id: &str, person: &Person) -> TransportResult<()> {
        self.enter_write()?;
        self.docs.write().insert(id.to_string(), person.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, id: &str) -> TransportResult<()> {
        self.enter_write()?;
        self.docs.write().remove(id);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list(&self) -> TransportResult<Vec<Person>> {
        self.enter_data()?;
        Ok(self.docs.read().values().cloned().collect())
    }

    fn exists(&self, id: &str) -> TransportResult<bool> {
        self.enter_data()?;
        Ok(self.docs.read().contains_key(id))
    }
}
