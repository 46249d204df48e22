//! Repository contracts and implementations.
//!
//! Repositories sit above data sources and take an [`Operation`] on every
//! call, which selects the policy used to combine their sources.

mod cache;
mod mapper;
mod single;

pub use cache::CacheRepository;
pub use mapper::RepositoryMapper;
pub use single::SingleDataSourceRepository;

use std::sync::Arc;

use harmony_core::{Operation, Query};
use harmony_future::Future;

pub trait GetRepository<T>: Send + Sync {
    fn get(&self, query: &Query, operation: Operation) -> Future<T>;

    fn get_all(&self, query: &Query, operation: Operation) -> Future<Vec<T>>;
}

pub trait PutRepository<T>: Send + Sync {
    fn put(&self, value: Option<T>, query: &Query, operation: Operation) -> Future<T>;

    fn put_all(&self, values: Vec<T>, query: &Query, operation: Operation) -> Future<Vec<T>>;
}

pub trait DeleteRepository: Send + Sync {
    fn delete(&self, query: &Query, operation: Operation) -> Future<()>;

    fn delete_all(&self, query: &Query, operation: Operation) -> Future<()>;
}

/// A repository with every capability.
pub trait Repository<T>: GetRepository<T> + PutRepository<T> + DeleteRepository {}

impl<T, R> Repository<T> for R where R: GetRepository<T> + PutRepository<T> + DeleteRepository {}

impl<T, R> GetRepository<T> for Arc<R>
where
    R: GetRepository<T> + ?Sized,
{
    fn get(&self, query: &Query, operation: Operation) -> Future<T> {
        (**self).get(query, operation)
    }

    fn get_all(&self, query: &Query, operation: Operation) -> Future<Vec<T>> {
        (**self).get_all(query, operation)
    }
}

impl<T, R> PutRepository<T> for Arc<R>
where
    R: PutRepository<T> + ?Sized,
{
    fn put(&self, value: Option<T>, query: &Query, operation: Operation) -> Future<T> {
        (**self).put(value, query, operation)
    }

    fn put_all(&self, values: Vec<T>, query: &Query, operation: Operation) -> Future<Vec<T>> {
        (**self).put_all(values, query, operation)
    }
}

impl<R> DeleteRepository for Arc<R>
where
    R: DeleteRepository + ?Sized,
{
    fn delete(&self, query: &Query, operation: Operation) -> Future<()> {
        (**self).delete(query, operation)
    }

    fn delete_all(&self, query: &Query, operation: Operation) -> Future<()> {
        (**self).delete_all(query, operation)
    }
}
