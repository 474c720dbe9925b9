//! Persona Transport Layer
//!
//! Access to the remote document store that holds person records.
//!
//! This crate provides:
//! - [`document`]: the [`DocumentStore`] contract and [`TransportError`]
//! - [`rest`]: a blocking REST client built on `ureq`
//! - [`credentials`]: loading of the credential file that enables the REST client
//! - [`memory`]: an in-memory store with a reachability switch, used by tests
//!
//! # Example
//!
//! ```ignore
//! use persona_transport::{RemoteCredentials, RestDocumentStore, RestOptions};
//!
//! if let Some(creds) = RemoteCredentials::load("service-account.json")? {
//!     let store = RestDocumentStore::new(&creds, RestOptions::default());
//!     store.ping()?;
//! }
//! ```

pub mod credentials;
pub mod document;
pub mod memory;
pub mod rest;

// Re-export main types for convenience
pub use credentials::{CredentialsError, RemoteCredentials};
pub use document::{DocumentStore, TransportError, TransportResult};
pub use memory::MemoryDocumentStore;
pub use rest::{RestDocumentStore, RestOptions};
