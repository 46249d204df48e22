//! Harmony Domain - Interactors
//!
//! An interactor is a single use case: one repository call, run on an
//! executor. Each binds an [`Executor`] and a repository, and the `*ByQuery`
//! flavours take the query per call while the others carry a fixed one.
//!
//! `execute` submits the repository call to the bound executor and returns a
//! [`Future`] for its result; `execute_in` does the same on another executor.

mod delete;
mod get;
mod put;

pub use delete::{Delete, DeleteAll, DeleteAllByQuery, DeleteByQuery};
pub use get::{Get, GetAll, GetAllByQuery, GetByQuery};
pub use put::{Put, PutAll, PutAllByQuery, PutByQuery};

use std::sync::Arc;

use harmony_core::Operation;
use harmony_future::{Executor, ExecutorExt, Future};

/// Run `call` on `executor` and adopt the future it returns.
fn run<K, F>(executor: &Arc<dyn Executor>, interactor: &'static str, operation: Operation, call: F) -> Future<K>
where
    K: Clone + Send + 'static,
    F: FnOnce() -> Future<K> + Send + 'static,
{
    tracing::debug!(interactor, executor = executor.name(), %operation, "submitting");
    executor.submit_future(move |resolver| resolver.set_future(&call()))
}
