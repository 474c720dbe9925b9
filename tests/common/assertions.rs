//! Custom assertion utilities for tests.
//!
//! Give better failure messages than bare `unwrap()` for the outcomes the
//! service returns.

use persona_outbox::{PendingOperation, PendingStore};
use persona_sync::{MutationOutcome, ServiceError};

/// Assert that a result is Ok and return the inner value.
///
/// # Panics
///
/// Panics with `context` and the error if the result is `Err`.
#[allow(dead_code)]
pub fn assert_ok<T, E: std::fmt::Debug>(result: Result<T, E>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("{} failed: {:?}", context, e),
    }
}

/// Assert that a mutation was applied remotely and return its value.
#[allow(dead_code)]
pub fn assert_applied<T: std::fmt::Debug>(
    result: Result<MutationOutcome<T>, ServiceError>,
    context: &str,
) -> T {
    match assert_ok(result, context) {
        MutationOutcome::Applied(value) => value,
        MutationOutcome::Deferred => panic!("{}: expected the change to be applied, got Deferred", context),
    }
}

/// Assert that a mutation was accepted locally and queued.
#[allow(dead_code)]
pub fn assert_deferred<T: std::fmt::Debug>(
    result: Result<MutationOutcome<T>, ServiceError>,
    context: &str,
) {
    match assert_ok(result, context) {
        MutationOutcome::Deferred => {}
        MutationOutcome::Applied(value) => {
            panic!("{}: expected Deferred, got Applied({:?})", context, value)
        }
    }
}

/// Assert that a call failed with the given [`ServiceError::kind`] tag.
#[allow(dead_code)]
pub fn assert_error_kind<T: std::fmt::Debug>(
    result: Result<T, ServiceError>,
    expected_kind: &str,
    context: &str,
) -> ServiceError {
    match result {
        Ok(v) => panic!("{} should have failed with {} but got: {:?}", context, expected_kind, v),
        Err(e) => {
            assert_eq!(e.kind(), expected_kind, "{}: unexpected error {}", context, e);
            e
        }
    }
}

/// Assert the queue holds exactly these `(kind, identifier)` pairs, oldest first.
#[allow(dead_code)]
pub fn assert_queue(queue: &dyn PendingStore, expected: &[(&str, &str)], context: &str) -> Vec<PendingOperation> {
    let ops = assert_ok(queue.list_all(), context);
    let actual: Vec<(&str, &str)> = ops
        .iter()
        .map(|op| (op.kind.as_str(), op.identifier.as_str()))
        .collect();
    assert_eq!(actual, expected, "{}: queue contents", context);
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_ok() {
        let result: Result<i32, &str> = Ok(42);
        assert_eq!(assert_ok(result, "test operation"), 42);
    }

    #[test]
    #[should_panic(expected = "expected Deferred")]
    fn test_assert_deferred_fails_on_applied() {
        assert_deferred(Ok(MutationOutcome::Applied(1)), "create");
    }

    #[test]
    fn test_assert_error_kind() {
        let result: Result<(), ServiceError> = Err(ServiceError::NotFound("11111111-1".into()));
        assert_error_kind(result, "NOT_FOUND", "get");
    }
}
