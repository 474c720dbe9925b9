//! Remote document store contract.

use persona_types::Person;

/// Failure talking to the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The store could not be reached (connection refused, DNS, timeout).
    Unreachable(String),
    /// The store answered but the operation failed (bad status, undecodable body).
    Failed(String),
}

impl TransportError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, TransportError::Unreachable(_))
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Unreachable(msg) => write!(f, "remote store unreachable: {}", msg),
            TransportError::Failed(msg) => write!(f, "remote store operation failed: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Operations the remote store offers, keyed by person identifier.
///
/// Writes are full replacements; there is no partial update.
pub trait DocumentStore: Send + Sync {
    /// Minimal round trip proving the backend is reachable, not just configured.
    fn ping(&self) -> TransportResult<()>;

    /// Fetch a document, `None` if absent.
    fn get(&self, id: &str) -> TransportResult<Option<Person>>;

    /// Write (create or fully replace) a document.
    fn put(&self, id: &str, person: &Person) -> TransportResult<()>;

    /// Delete a document. Deleting an absent document is not an error.
    fn delete(&self, id: &str) -> TransportResult<()>;

    /// Scan the whole collection.
    fn list(&self) -> TransportResult<Vec<Person>>;

    /// Check whether a document exists (without decoding it where possible).
    fn exists(&self, id: &str) -> TransportResult<bool> {
        self.get(id).map(|doc| doc.is_some())
    }
}
