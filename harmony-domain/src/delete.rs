use std::sync::Arc;

use harmony_core::{Operation, Query};
use harmony_data::DeleteRepository;
use harmony_future::{Executor, Future};

use crate::run;

/// Delete the value selected by a query given per call.
#[derive(Clone)]
pub struct DeleteByQuery {
    executor: Arc<dyn Executor>,
    repository: Arc<dyn DeleteRepository>,
}

impl DeleteByQuery {
    pub fn new<R>(executor: Arc<dyn Executor>, repository: Arc<R>) -> Self
    where
        R: DeleteRepository + 'static,
    {
        Self {
            executor,
            repository,
        }
    }

    pub fn execute(&self, query: &Query, operation: Operation) -> Future<()> {
        self.execute_in(&self.executor, query, operation)
    }

    pub fn execute_in(&self, executor: &Arc<dyn Executor>, query: &Query, operation: Operation) -> Future<()> {
        let (repository, query) = (Arc::clone(&self.repository), query.clone());
        run(executor, "DeleteByQuery", operation, move || repository.delete(&query, operation))
    }

    pub fn with_query(&self, query: Query) -> Delete {
        Delete {
            inner: self.clone(),
            query,
        }
    }
}

/// Delete the value selected by a fixed query.
#[derive(Clone)]
pub struct Delete {
    inner: DeleteByQuery,
    query: Query,
}

impl Delete {
    pub fn new<R>(executor: Arc<dyn Executor>, repository: Arc<R>, query: Query) -> Self
    where
        R: DeleteRepository + 'static,
    {
        DeleteByQuery::new(executor, repository).with_query(query)
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn execute(&self, operation: Operation) -> Future<()> {
        self.inner.execute(&self.query, operation)
    }

    pub fn execute_in(&self, executor: &Arc<dyn Executor>, operation: Operation) -> Future<()> {
        self.inner.execute_in(executor, &self.query, operation)
    }
}

/// Delete every value selected by a query given per call.
#[derive(Clone)]
pub struct DeleteAllByQuery {
    executor: Arc<dyn Executor>,
    repository: Arc<dyn DeleteRepository>,
}

impl DeleteAllByQuery {
    pub fn new<R>(executor: Arc<dyn Executor>, repository: Arc<R>) -> Self
    where
        R: DeleteRepository + 'static,
    {
        Self {
            executor,
            repository,
        }
    }

    pub fn execute(&self, query: &Query, operation: Operation) -> Future<()> {
        self.execute_in(&self.executor, query, operation)
    }

    pub fn execute_in(&self, executor: &Arc<dyn Executor>, query: &Query, operation: Operation) -> Future<()> {
        let (repository, query) = (Arc::clone(&self.repository), query.clone());
        run(executor, "DeleteAllByQuery", operation, move || {
            repository.delete_all(&query, operation)
        })
    }

    pub fn with_query(&self, query: Query) -> DeleteAll {
        DeleteAll {
            inner: self.clone(),
            query,
        }
    }
}

/// Delete every value selected by a fixed query.
#[derive(Clone)]
pub struct DeleteAll {
    inner: DeleteAllByQuery,
    query: Query,
}

impl DeleteAll {
    pub fn new<R>(executor: Arc<dyn Executor>, repository: Arc<R>, query: Query) -> Self
    where
        R: DeleteRepository + 'static,
    {
        DeleteAllByQuery::new(executor, repository).with_query(query)
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn execute(&self, operation: Operation) -> Future<()> {
        self.inner.execute(&self.query, operation)
    }

    pub fn execute_in(&self, executor: &Arc<dyn Executor>, operation: Operation) -> Future<()> {
        self.inner.execute_in(executor, &self.query, operation)
    }
}
