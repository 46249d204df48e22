//! Data source contracts and implementations.
//!
//! A data source is the lowest layer: it talks to exactly one store (memory,
//! disk, network) and knows nothing about caching policy. Capabilities are
//! split so that a read-only source never has to stub out writes.

mod async_source;
mod in_memory;
mod mapper;
mod retry;
mod timed_cache;
mod validator;
mod void;

pub use async_source::{
    AsyncDataSource, AsyncDataSourceAdapter, AsyncDeleteDataSource, AsyncGetDataSource,
    AsyncPutDataSource, FutureDataSourceAdapter,
};
pub use in_memory::InMemoryDataSource;
pub use mapper::DataSourceMapper;
pub use retry::{RetryDataSource, RetryPredicate};
pub use timed_cache::TimedCacheDataSource;
pub use validator::DataSourceValidator;
pub use void::VoidDataSource;

use std::sync::Arc;

use harmony_core::Query;
use harmony_future::Future;

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Read capability.
pub trait GetDataSource<T>: Send + Sync {
    /// Fetch the single object selected by `query`.
    fn get(&self, query: &Query) -> Future<T>;

    /// Fetch every object selected by `query`.
    fn get_all(&self, query: &Query) -> Future<Vec<T>>;
}

/// Write capability.
///
/// `put` takes an `Option` so that a source can treat "store nothing" as an
/// illegal argument instead of the caller having to invent a value.
pub trait PutDataSource<T>: Send + Sync {
    /// Store `value` under `query` and resolve with what was stored.
    fn put(&self, value: Option<T>, query: &Query) -> Future<T>;

    /// Store `values` under `query` and resolve with what was stored.
    fn put_all(&self, values: Vec<T>, query: &Query) -> Future<Vec<T>>;
}

/// Delete capability. Deleting something that is not there is not an error.
pub trait DeleteDataSource: Send + Sync {
    fn delete(&self, query: &Query) -> Future<()>;

    fn delete_all(&self, query: &Query) -> Future<()>;
}

/// A source with every capability.
pub trait DataSource<T>: GetDataSource<T> + PutDataSource<T> + DeleteDataSource {}

impl<T, D> DataSource<T> for D where D: GetDataSource<T> + PutDataSource<T> + DeleteDataSource {}

// ============================================================================
// SHARED HANDLES
// ============================================================================

impl<T, D> GetDataSource<T> for Arc<D>
where
    D: GetDataSource<T> + ?Sized,
{
    fn get(&self, query: &Query) -> Future<T> {
        (**self).get(query)
    }

    fn get_all(&self, query: &Query) -> Future<Vec<T>> {
        (**self).get_all(query)
    }
}

impl<T, D> PutDataSource<T> for Arc<D>
where
    D: PutDataSource<T> + ?Sized,
{
    fn put(&self, value: Option<T>, query: &Query) -> Future<T> {
        (**self).put(value, query)
    }

    fn put_all(&self, values: Vec<T>, query: &Query) -> Future<Vec<T>> {
        (**self).put_all(values, query)
    }
}

impl<D> DeleteDataSource for Arc<D>
where
    D: DeleteDataSource + ?Sized,
{
    fn delete(&self, query: &Query) -> Future<()> {
        (**self).delete(query)
    }

    fn delete_all(&self, query: &Query) -> Future<()> {
        (**self).delete_all(query)
    }
}
