#![allow(unused_imports)]
#![allow(dead_code)]
//! Shared test utilities for integration tests.
//!
//! # Modules
//!
//! - `fixtures`: service wiring over a temp-dir queue and an in-memory remote store
//! - `assertions`: outcome and queue assertions with descriptive failures

pub mod assertions;
pub mod fixtures;

pub use assertions::{assert_applied, assert_deferred, assert_error_kind, assert_ok, assert_queue};
pub use fixtures::{payload, person, person_with_address, Harness, ANA, BRUNO, CARLA};
