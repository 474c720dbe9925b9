//! Blocking REST client for the remote document store.
//!
//! ## Layout
//! - Document: `{endpoint}/{collection}/{id}` (`GET`, `PUT`, `DELETE`)
//! - Collection scan: `GET {endpoint}/{collection}` returning a JSON array, or an
//!   object with a `documents` array
//! - Canary: `GET {endpoint}/{canary_path}`; `200` and `404` both prove reachability
//!
//! Every request carries `Authorization: Bearer <token>`.
//!
//! ## Usage
//!
//! ```ignore
//! let store = RestDocumentStore::new(&creds, RestOptions::default());
//! store.ping()?;
//! let person = store.get("11111111-1")?;
//! ```

use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::credentials::RemoteCredentials;
use crate::document::{DocumentStore, TransportError, TransportResult};
use persona_types::Person;

/// Tunables for [`RestDocumentStore`].
#[derive(Debug, Clone)]
pub struct RestOptions {
    pub collection: String,
    pub canary_path: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl RestOptions {
    /// Default request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    /// Default connect timeout in seconds.
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
}

impl Default for RestOptions {
    fn default() -> Self {
        Self {
            collection: "persons".to_string(),
            canary_path: "healthcheck/canary".to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(Self::DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Document store client over HTTP.
#[derive(Clone)]
pub struct RestDocumentStore {
    endpoint: String,
    token: String,
    options: RestOptions,
    agent: ureq::Agent,
}

impl RestDocumentStore {
    pub fn new(credentials: &RemoteCredentials, options: RestOptions) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(options.timeout)
            .timeout_connect(options.connect_timeout)
            .build();
        Self {
            endpoint: credentials.endpoint.trim_end_matches('/').to_string(),
            token: credentials.token.clone(),
            options,
            agent,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.options.collection)
    }

    fn document_url(&self, id: &str) -> TransportResult<String> {
        if id.is_empty() || id.contains('/') || id.chars().any(char::is_whitespace) {
            return Err(TransportError::Failed(format!(
                "'{}' cannot be used as a document key",
                id
            )));
        }
        Ok(format!("{}/{}", self.collection_url(), id))
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Map a `ureq` error onto the unreachable/failed split.
fn classify(context: &str, err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(code @ (502..=504), _) => {
            TransportError::Unreachable(format!("{}: HTTP {}", context, code))
        }
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            TransportError::Failed(format!("{}: HTTP {} {}", context, code, body.trim()))
        }
        ureq::Error::Transport(transport) => match transport.kind() {
            ureq::ErrorKind::Dns
            | ureq::ErrorKind::ConnectionFailed
            | ureq::ErrorKind::Io
            | ureq::ErrorKind::ProxyConnect => {
                TransportError::Unreachable(format!("{}: {}", context, transport))
            }
            _ => TransportError::Failed(format!("{}: {}", context, transport)),
        },
    }
}

fn decode_list(body: Value) -> TransportResult<Vec<Person>> {
    let docs = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("documents") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(TransportError::Failed(format!(
                    "collection scan: 'documents' is not an array: {}",
                    other
                )))
            }
        },
        other => {
            return Err(TransportError::Failed(format!(
                "collection scan: unexpected body {}",
                other
            )))
        }
    };

    docs.into_iter()
        .map(|doc| {
            serde_json::from_value(doc)
                .map_err(|e| TransportError::Failed(format!("collection scan: {}", e)))
        })
        .collect()
}

impl DocumentStore for RestDocumentStore {
    fn ping(&self) -> TransportResult<()> {
        let url = format!("{}/{}", self.endpoint, self.options.canary_path);
        match self
            .agent
            .get(&url)
            .set("Authorization", &self.bearer())
            .call()
        {
            Ok(_) | Err(ureq::Error::Status(404, _)) => Ok(()),
            Err(e) => Err(classify("canary read", e)),
        }
    }

    fn get(&self, id: &str) -> TransportResult<Option<Person>> {
        let url = self.document_url(id)?;
        debug!(%url, "fetching document");
        match self
            .agent
            .get(&url)
            .set("Authorization", &self.bearer())
            .call()
        {
            Ok(response) => response
                .into_json::<Person>()
                .map(Some)
                .map_err(|e| TransportError::Failed(format!("decode {}: {}", id, e))),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(classify("get", e)),
        }
    }

    fn put(&self, id: &str, person: &Person) -> TransportResult<()> {
        let url = self.document_url(id)?;
        debug!(%url, "writing document");
        self.agent
            .put(&url)
            .set("Authorization", &self.bearer())
            .set("Content-Type", "application/json")
            .send_json(person)
            .map_err(|e| classify("put", e))?;
        Ok(())
    }

    fn delete(&self, id: &str) -> TransportResult<()> {
        let url = self.document_url(id)?;
        debug!(%url, "deleting document");
        match self
            .agent
            .delete(&url)
            .set("Authorization", &self.bearer())
            .call()
        {
            Ok(_) | Err(ureq::Error::Status(404, _)) => Ok(()),
            Err(e) => Err(classify("delete", e)),
        }
    }

    fn list(&self) -> TransportResult<Vec<Person>> {
        let body: Value = self
            .agent
            .get(&self.collection_url())
            .set("Authorization", &self.bearer())
            .call()
            .map_err(|e| classify("list", e))?
            .into_json()
            .map_err(|e| TransportError::Failed(format!("collection scan: {}", e)))?;
        decode_list(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(endpoint: &str) -> RestDocumentStore {
        let creds = RemoteCredentials {
            endpoint: endpoint.to_string(),
            token: "t".to_string(),
        };
        RestDocumentStore::new(&creds, RestOptions::default())
    }

    #[test]
    fn test_document_urls() {
        let s = store("http://localhost:9000/v1/");
        assert_eq!(s.endpoint(), "http://localhost:9000/v1");
        assert_eq!(
            s.document_url("11111111-1").unwrap(),
            "http://localhost:9000/v1/persons/11111111-1"
        );
        assert!(s.document_url("a/b").is_err());
        assert!(s.document_url("").is_err());
    }

    #[test]
    fn test_decode_list_shapes() {
        let doc = serde_json::json!({
            "id": "11111111-1",
            "givenName": "Ana",
            "familyName": "Rojas",
            "birthDate": "01-02-1990"
        });

        let from_array = decode_list(Value::Array(vec![doc.clone()])).unwrap();
        assert_eq!(from_array.len(), 1);

        let from_object = decode_list(serde_json::json!({ "documents": [doc] })).unwrap();
        assert_eq!(from_object[0].given_name, "Ana");

        let empty = decode_list(serde_json::json!({})).unwrap();
        assert!(empty.is_empty());

        assert!(decode_list(serde_json::json!("nope")).is_err());
    }

    #[test]
    fn test_unreachable_endpoint_is_classified() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let s = store("http://127.0.0.1:9");
        let err = s.ping().unwrap_err();
        assert!(err.is_unreachable(), "got {}", err);
    }
}
