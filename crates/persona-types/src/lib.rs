//! Shared types for persona-sync.
//!
//! This crate provides:
//! - [`person`]: the `Person` record and its field validation
//! - [`rut`]: structural and check-digit validation of person identifiers
//! - [`env_utils`]: typed environment variable parsing used by configuration

pub mod env_utils;
pub mod person;
pub mod rut;

pub use person::{Address, Person, ValidationError, BIRTH_DATE_FORMAT};
pub use rut::{check_digit, is_valid_identifier, normalize_identifier};
