//! Credential file for the REST document store.
//!
//! The file is JSON:
//!
//! ```json
//! { "endpoint": "https://docs.example.com/v1/projects/demo", "token": "..." }
//! ```
//!
//! A missing file is an ordinary condition (the service boots offline and queues
//! writes). A file that exists but cannot be used is a [`CredentialsError`].

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Connection material for the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteCredentials {
    /// Base URL of the document API.
    pub endpoint: String,
    /// Bearer token sent on every request.
    pub token: String,
}

/// The credential file exists but is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialsError {
    pub path: PathBuf,
    pub reason: String,
}

impl std::fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "malformed credentials in {}: {}",
            self.path.display(),
            self.reason
        )
    }
}

impl std::error::Error for CredentialsError {}

impl RemoteCredentials {
    /// Load credentials from `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>, CredentialsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let malformed = |reason: String| CredentialsError {
            path: path.to_path_buf(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
        let creds: RemoteCredentials =
            serde_json::from_str(&raw).map_err(|e| malformed(e.to_string()))?;

        if creds.token.trim().is_empty() {
            return Err(malformed("token is blank".to_string()));
        }
        if creds.endpoint.trim().is_empty() {
            return Err(malformed("endpoint is blank".to_string()));
        }
        Ok(Some(creds))
    }

    /// Replace the endpoint from the file (e.g. from configuration).
    pub fn with_endpoint(mut self, endpoint: Option<&str>) -> Self {
        if let Some(endpoint) = endpoint {
            self.endpoint = endpoint.to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_offline() {
        let temp_dir = TempDir::new().unwrap();
        let creds = RemoteCredentials::load(temp_dir.path().join("absent.json")).unwrap();
        assert!(creds.is_none());
    }

    #[test]
    fn test_load_valid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("creds.json");
        std::fs::write(
            &path,
            r#"{"endpoint":"http://127.0.0.1:8080/v1","token":"secret","extra":1}"#,
        )
        .unwrap();

        let creds = RemoteCredentials::load(&path).unwrap().unwrap();
        assert_eq!(creds.endpoint, "http://127.0.0.1:8080/v1");
        assert_eq!(creds.token, "secret");

        let overridden = creds.with_endpoint(Some("http://other"));
        assert_eq!(overridden.endpoint, "http://other");
    }

    #[test]
    fn test_malformed_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("creds.json");

        std::fs::write(&path, "not json").unwrap();
        assert!(RemoteCredentials::load(&path).is_err());

        std::fs::write(&path, r#"{"endpoint":"http://x","token":"  "}"#).unwrap();
        let err = RemoteCredentials::load(&path).unwrap_err();
        assert!(err.to_string().contains("token is blank"));
    }
}
