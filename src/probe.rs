//! Availability probe and process-wide remote client handle.
//!
//! The client is built lazily on first use and cached for the life of the process.
//! Building it can legitimately yield nothing (no credential file yet), in which case
//! the service runs queue-only and the next call tries again. Having a client is not
//! the same as being able to reach the store, so [`RemoteHandle::probe`] always does
//! a canary round trip and never caches the answer.

use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use persona_transport::{
    CredentialsError, DocumentStore, RemoteCredentials, RestDocumentStore, RestOptions,
};

/// Exceptional local failure while preparing the remote client.
///
/// Ordinary unavailability is never reported this way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    Credentials(CredentialsError),
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::Credentials(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProbeError {}

pub type ConnectResult = Result<Option<Arc<dyn DocumentStore>>, ProbeError>;

/// Builds the remote client. `Ok(None)` means "not configured yet".
pub trait Connector: Send + Sync {
    fn connect(&self) -> ConnectResult;
}

impl<F> Connector for F
where
    F: Fn() -> ConnectResult + Send + Sync,
{
    fn connect(&self) -> ConnectResult {
        self()
    }
}

/// Connector for [`RestDocumentStore`] driven by a credential file.
#[derive(Debug, Clone)]
pub struct RestConnector {
    pub credentials_path: PathBuf,
    pub endpoint: Option<String>,
    pub options: RestOptions,
}

impl Connector for RestConnector {
    fn connect(&self) -> ConnectResult {
        let Some(creds) =
            RemoteCredentials::load(&self.credentials_path).map_err(ProbeError::Credentials)?
        else {
            debug!(
                path = %self.credentials_path.display(),
                "credential file not found; operating offline"
            );
            return Ok(None);
        };
        let creds = creds.with_endpoint(self.endpoint.as_deref());
        let store = RestDocumentStore::new(&creds, self.options.clone());
        Ok(Some(Arc::new(store)))
    }
}

/// Result of a probe.
pub enum Availability {
    /// The store answered the canary read; use this client for the operation.
    Available(Arc<dyn DocumentStore>),
    /// Not configured or not reachable right now.
    Unavailable(String),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available(_))
    }
}

impl std::fmt::Debug for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::Available(_) => f.write_str("Available"),
            Availability::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

/// Lazily-initialized, shared remote client plus the availability probe.
pub struct RemoteHandle {
    connector: Box<dyn Connector>,
    client: RwLock<Option<Arc<dyn DocumentStore>>>,
    init_lock: Mutex<()>,
}

impl RemoteHandle {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            client: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }

    /// Handle whose client is built by a closure.
    pub fn from_fn<F>(connect: F) -> Self
    where
        F: Fn() -> ConnectResult + Send + Sync + 'static,
    {
        Self::new(connect)
    }

    /// Handle around an already-built store.
    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        Self::from_fn(move || Ok(Some(store.clone())))
    }

    /// The cached client, building it if needed.
    ///
    /// Concurrent first callers build it once; later callers reuse it.
    pub fn resolve(&self) -> Result<Option<Arc<dyn DocumentStore>>, ProbeError> {
        if let Some(client) = self.client.read().as_ref() {
            return Ok(Some(client.clone()));
        }

        let _guard = self.init_lock.lock();
        if let Some(client) = self.client.read().as_ref() {
            return Ok(Some(client.clone()));
        }

        match self.connector.connect()? {
            Some(client) => {
                *self.client.write() = Some(client.clone());
                info!("remote store client initialized");
                Ok(Some(client))
            }
            None => Ok(None),
        }
    }

    /// Resolve the client and prove the store is reachable right now.
    pub fn probe(&self) -> Result<Availability, ProbeError> {
        let Some(client) = self.resolve()? else {
            return Ok(Availability::Unavailable(
                "remote store is not configured".to_string(),
            ));
        };

        match client.ping() {
            Ok(()) => Ok(Availability::Available(client)),
            Err(e) => {
                warn!(error = %e, "remote store probe failed");
                Ok(Availability::Unavailable(e.to_string()))
            }
        }
    }

    pub fn is_available(&self) -> Result<bool, ProbeError> {
        self.probe().map(|a| a.is_available())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_transport::MemoryDocumentStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_probe_tracks_reachability() {
        let store = Arc::new(MemoryDocumentStore::new());
        let handle = RemoteHandle::with_store(store.clone());

        assert!(handle.is_available().unwrap());
        store.set_reachable(false);
        assert!(!handle.is_available().unwrap());
        store.set_reachable(true);
        assert!(handle.is_available().unwrap());
    }

    #[test]
    fn test_missing_credentials_is_unavailable_and_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let configured = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());

        let handle = {
            let attempts = attempts.clone();
            let configured = configured.clone();
            RemoteHandle::from_fn(move || {
                attempts.fetch_add(1, Ordering::SeqCst);
                if configured.load(Ordering::SeqCst) {
                    Ok(Some(store.clone()))
                } else {
                    Ok(None)
                }
            })
        };

        assert!(!handle.is_available().unwrap());
        assert!(!handle.is_available().unwrap());
        configured.store(true, Ordering::SeqCst);
        assert!(handle.is_available().unwrap());
        assert!(handle.is_available().unwrap());

        // Two offline attempts, one successful build, then cached.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let handle = {
            let builds = builds.clone();
            Arc::new(RemoteHandle::from_fn(move || {
                builds.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                Ok(Some(
                    Arc::new(MemoryDocumentStore::new()) as Arc<dyn DocumentStore>
                ))
            }))
        };

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || handle.resolve().unwrap().is_some())
            })
            .collect();
        for t in threads {
            assert!(t.join().unwrap());
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rest_connector_offline_and_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let connector = RestConnector {
            credentials_path: temp_dir.path().join("creds.json"),
            endpoint: None,
            options: RestOptions::default(),
        };
        let handle = RemoteHandle::new(connector.clone());
        assert!(!handle.is_available().unwrap());

        std::fs::write(&connector.credentials_path, "{").unwrap();
        assert!(matches!(
            handle.probe(),
            Err(ProbeError::Credentials(_))
        ));
    }
}
