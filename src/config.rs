//! Runtime configuration.
//!
//! Values come from the environment (see the constants below) and can be overridden
//! by CLI flags. Unset, blank or unparsable variables fall back to defaults.

use std::path::PathBuf;
use std::time::Duration;

use persona_transport::RestOptions;
use persona_types::env_utils::{env_nonempty, env_path, env_string_or, env_var_or};

use crate::probe::RestConnector;

pub const ENV_DATA_DIR: &str = "PERSONA_DATA_DIR";
pub const ENV_CREDENTIALS: &str = "PERSONA_CREDENTIALS";
pub const ENV_ENDPOINT: &str = "PERSONA_REMOTE_ENDPOINT";
pub const ENV_COLLECTION: &str = "PERSONA_COLLECTION";
pub const ENV_CANARY_PATH: &str = "PERSONA_CANARY_PATH";
pub const ENV_TIMEOUT_SECS: &str = "PERSONA_REMOTE_TIMEOUT_SECS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "PERSONA_REMOTE_CONNECT_TIMEOUT_SECS";
pub const ENV_SYNC_INTERVAL_SECS: &str = "PERSONA_SYNC_INTERVAL_SECS";

/// Default reconciliation period.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

const CREDENTIALS_FILE: &str = "service-account.json";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Root of local state (the pending-operation queue lives here).
    pub data_dir: PathBuf,
    /// Credential file enabling the remote store; absent means offline.
    pub credentials_path: PathBuf,
    /// Overrides the endpoint from the credential file.
    pub endpoint: Option<String>,
    pub remote: RestOptions,
    pub sync_interval: Duration,
}

impl SyncConfig {
    /// Resolve configuration from the environment.
    pub fn from_env() -> Self {
        let data_dir = env_path(ENV_DATA_DIR).unwrap_or_else(default_data_dir);
        let credentials_path =
            env_path(ENV_CREDENTIALS).unwrap_or_else(|| data_dir.join(CREDENTIALS_FILE));
        let defaults = RestOptions::default();

        Self {
            credentials_path,
            endpoint: env_nonempty(ENV_ENDPOINT),
            remote: RestOptions {
                collection: env_string_or(ENV_COLLECTION, &defaults.collection),
                canary_path: env_string_or(ENV_CANARY_PATH, &defaults.canary_path),
                timeout: Duration::from_secs(env_var_or(
                    ENV_TIMEOUT_SECS,
                    RestOptions::DEFAULT_TIMEOUT_SECS,
                )),
                connect_timeout: Duration::from_secs(env_var_or(
                    ENV_CONNECT_TIMEOUT_SECS,
                    RestOptions::DEFAULT_CONNECT_TIMEOUT_SECS,
                )),
            },
            sync_interval: Duration::from_secs(
                env_var_or(ENV_SYNC_INTERVAL_SECS, DEFAULT_SYNC_INTERVAL_SECS).max(1),
            ),
            data_dir,
        }
    }

    /// Move local state to `dir`. A credential path that was derived from the old
    /// data dir follows it; an explicitly configured one is kept.
    pub fn set_data_dir(&mut self, dir: PathBuf) {
        if self.credentials_path == self.data_dir.join(CREDENTIALS_FILE) {
            self.credentials_path = dir.join(CREDENTIALS_FILE);
        }
        self.data_dir = dir;
    }

    /// Directory handed to the pending-operation store.
    pub fn queue_dir(&self) -> PathBuf {
        self.data_dir.join("outbox")
    }

    pub fn connector(&self) -> RestConnector {
        RestConnector {
            credentials_path: self.credentials_path.clone(),
            endpoint: self.endpoint.clone(),
            options: self.remote.clone(),
        }
    }
}

/// `<platform data dir>/persona-sync`, or `./.persona-sync` when the platform has none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("persona-sync"))
        .unwrap_or_else(|| PathBuf::from(".persona-sync"))
}
