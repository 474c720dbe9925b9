//! Caller-visible failure conditions.
//!
//! Every core operation returns one of these tags; the boundary (the CLI here)
//! translates each tag to its own representation via [`ServiceError::exit_code`].
//! A deferred write is not an error and is reported through
//! [`crate::router::MutationOutcome::Deferred`] instead.

use persona_transport::{CredentialsError, TransportError};
use persona_types::ValidationError;

use crate::probe::ProbeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Malformed identifier or missing required field; nothing was touched.
    Validation(String),
    /// A record with this identifier already exists remotely.
    DuplicateIdentifier(String),
    /// The request tried to change a record's identifier.
    ImmutableIdentifier {
        /// Identifier the request addressed
        target: String,
        /// Identifier carried in the record
        payload: String,
    },
    /// No record with this identifier.
    NotFound(String),
    /// The remote store is unreachable and the operation cannot be deferred.
    Unavailable(String),
    /// The remote store was reached but the operation failed.
    Remote(String),
    /// Credential material exists but cannot be used.
    Credentials(String),
    /// The local pending-operation store failed.
    Queue(String),
}

impl ServiceError {
    pub(crate) fn queue(err: anyhow::Error) -> Self {
        ServiceError::Queue(format!("{:#}", err))
    }

    /// Process exit code used by the CLI for this condition.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceError::Validation(_) => 2,
            ServiceError::DuplicateIdentifier(_) | ServiceError::ImmutableIdentifier { .. } => 4,
            ServiceError::NotFound(_) => 5,
            ServiceError::Unavailable(_) => 6,
            ServiceError::Remote(_) | ServiceError::Credentials(_) | ServiceError::Queue(_) => 1,
        }
    }

    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_FAILED",
            ServiceError::DuplicateIdentifier(_) => "DUPLICATE_IDENTIFIER",
            ServiceError::ImmutableIdentifier { .. } => "IMMUTABLE_IDENTIFIER",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            ServiceError::Remote(_) => "REMOTE_FAILED",
            ServiceError::Credentials(_) => "CREDENTIALS",
            ServiceError::Queue(_) => "QUEUE_FAILED",
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Validation(msg) => write!(f, "validation failed: {}", msg),
            ServiceError::DuplicateIdentifier(id) => {
                write!(f, "identifier {} is already registered", id)
            }
            ServiceError::ImmutableIdentifier { target, payload } => write!(
                f,
                "identifier cannot be changed (request addresses {}, record carries {})",
                target, payload
            ),
            ServiceError::NotFound(id) => write!(f, "person {} not found", id),
            ServiceError::Unavailable(msg) => write!(f, "remote store unavailable: {}", msg),
            ServiceError::Remote(msg) => write!(f, "{}", msg),
            ServiceError::Credentials(msg) => write!(f, "{}", msg),
            ServiceError::Queue(msg) => write!(f, "pending-operation store failed: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation(err.problems.join("; "))
    }
}

impl From<ProbeError> for ServiceError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Credentials(e) => ServiceError::Credentials(e.to_string()),
        }
    }
}

impl From<CredentialsError> for ServiceError {
    fn from(err: CredentialsError) -> Self {
        ServiceError::Credentials(err.to_string())
    }
}

impl From<TransportError> for ServiceError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unreachable(msg) => ServiceError::Unavailable(msg),
            failed @ TransportError::Failed(_) => ServiceError::Remote(failed.to_string()),
        }
    }
}
