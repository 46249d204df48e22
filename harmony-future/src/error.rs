//! Errors raised by the future primitives themselves.

use harmony_core::HarmonyError;
use thiserror::Error;

/// A [`Future`](crate::Future) was resolved a second time.
///
/// The first result is kept. This is a programming error in the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Future already resolved: a future can only be set once")]
pub struct AlreadyResolved;

impl From<AlreadyResolved> for HarmonyError {
    fn from(e: AlreadyResolved) -> Self {
        HarmonyError::failed(e.to_string())
    }
}
