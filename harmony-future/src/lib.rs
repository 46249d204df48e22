//! Harmony Future - Asynchronous Values and Executors
//!
//! The portable primitive every Harmony data source and repository returns.
//!
//! - [`Future<T>`]: resolved at most once, through a [`Resolver<T>`].
//! - [`Observable<T>`]: resolved any number of times; observers see every
//!   emission in production order.
//! - [`Executor`]: where work and callback delivery run.
//!
//! ```text
//!   Resolver::set ──▶ Future ──▶ map ──▶ flat_map ──▶ resolve(ok, err)
//!                        │
//!                        └──▶ .await (tokio oneshot bridge)
//! ```
//!
//! Callbacks registered before resolution run on the resolving thread;
//! callbacks registered afterwards run immediately on the registering
//! thread. Use [`Future::on`] to move delivery onto an executor.
//!
//! There is no cancellation. Dropping a handle does not stop the producer,
//! and derived values stay alive as long as their source can still resolve.

mod batch;
mod bridge;
mod error;
mod executor;
mod future;
mod observable;
mod timer;

pub use bridge::{FutureAwait, ObservableStream};
pub use error::AlreadyResolved;
pub use executor::{
    next_executor_name, next_executor_name_with_prefix, DirectExecutor, Executor, ExecutorExt,
    Job, MainThreadExecutor, SerialExecutor, TokioExecutor,
};
pub use future::{Future, Resolver};
pub use observable::{Observable, ObservableResolver, Subscription};

// Re-export core types for convenience
pub use harmony_core::{HarmonyError, HarmonyResult};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a panicking thread poisoned it.
///
/// User callbacks never run while one of these locks is held, so a poisoned
/// lock still guards consistent state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
