use std::sync::Arc;

use harmony_core::{Operation, Query};
use harmony_data::GetRepository;
use harmony_future::{Executor, Future};

use crate::run;

/// Fetch one value for a query given per call.
pub struct GetByQuery<T> {
    executor: Arc<dyn Executor>,
    repository: Arc<dyn GetRepository<T>>,
}

impl<T> Clone for GetByQuery<T> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<T> GetByQuery<T>
where
    T: Clone + Send + 'static,
{
    pub fn new<R>(executor: Arc<dyn Executor>, repository: Arc<R>) -> Self
    where
        R: GetRepository<T> + 'static,
    {
        Self {
            executor,
            repository,
        }
    }

    pub fn execute(&self, query: &Query, operation: Operation) -> Future<T> {
        self.execute_in(&self.executor, query, operation)
    }

    pub fn execute_in(&self, executor: &Arc<dyn Executor>, query: &Query, operation: Operation) -> Future<T> {
        let (repository, query) = (Arc::clone(&self.repository), query.clone());
        run(executor, "GetByQuery", operation, move || repository.get(&query, operation))
    }

    /// Bind `query`, producing a [`Get`].
    pub fn with_query(&self, query: Query) -> Get<T> {
        Get {
            inner: self.clone(),
            query,
        }
    }
}

/// Fetch one value for a fixed query.
pub struct Get<T> {
    inner: GetByQuery<T>,
    query: Query,
}

impl<T> Get<T>
where
    T: Clone + Send + 'static,
{
    pub fn new<R>(executor: Arc<dyn Executor>, repository: Arc<R>, query: Query) -> Self
    where
        R: GetRepository<T> + 'static,
    {
        GetByQuery::new(executor, repository).with_query(query)
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn execute(&self, operation: Operation) -> Future<T> {
        self.inner.execute(&self.query, operation)
    }

    pub fn execute_in(&self, executor: &Arc<dyn Executor>, operation: Operation) -> Future<T> {
        self.inner.execute_in(executor, &self.query, operation)
    }
}

/// Fetch every value for a query given per call.
pub struct GetAllByQuery<T> {
    executor: Arc<dyn Executor>,
    repository: Arc<dyn GetRepository<T>>,
}

impl<T> Clone for GetAllByQuery<T> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<T> GetAllByQuery<T>
where
    T: Clone + Send + 'static,
{
    pub fn new<R>(executor: Arc<dyn Executor>, repository: Arc<R>) -> Self
    where
        R: GetRepository<T> + 'static,
    {
        Self {
            executor,
            repository,
        }
    }

    pub fn execute(&self, query: &Query, operation: Operation) -> Future<Vec<T>> {
        self.execute_in(&self.executor, query, operation)
    }

    pub fn execute_in(
        &self,
        executor: &Arc<dyn Executor>,
        query: &Query,
        operation: Operation,
    ) -> Future<Vec<T>> {
        let (repository, query) = (Arc::clone(&self.repository), query.clone());
        run(executor, "GetAllByQuery", operation, move || repository.get_all(&query, operation))
    }

    pub fn with_query(&self, query: Query) -> GetAll<T> {
        GetAll {
            inner: self.clone(),
            query,
        }
    }
}

/// Fetch every value for a fixed query.
pub struct GetAll<T> {
    inner: GetAllByQuery<T>,
    query: Query,
}

impl<T> GetAll<T>
where
    T: Clone + Send + 'static,
{
    pub fn new<R>(executor: Arc<dyn Executor>, repository: Arc<R>, query: Query) -> Self
    where
        R: GetRepository<T> + 'static,
    {
        GetAllByQuery::new(executor, repository).with_query(query)
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn execute(&self, operation: Operation) -> Future<Vec<T>> {
        self.inner.execute(&self.query, operation)
    }

    pub fn execute_in(&self, executor: &Arc<dyn Executor>, operation: Operation) -> Future<Vec<T>> {
        self.inner.execute_in(executor, &self.query, operation)
    }
}
