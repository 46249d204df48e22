use std::sync::Arc;

use harmony_core::{Operation, Query};
use harmony_data::PutRepository;
use harmony_future::{Executor, Future};

use crate::run;

/// Store one value under a query given per call.
pub struct PutByQuery<T> {
    executor: Arc<dyn Executor>,
    repository: Arc<dyn PutRepository<T>>,
}

impl<T> Clone for PutByQuery<T> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<T> PutByQuery<T>
where
    T: Clone + Send + 'static,
{
    pub fn new<R>(executor: Arc<dyn Executor>, repository: Arc<R>) -> Self
    where
        R: PutRepository<T> + 'static,
    {
        Self {
            executor,
            repository,
        }
    }

    pub fn execute(&self, value: Option<T>, query: &Query, operation: Operation) -> Future<T> {
        self.execute_in(&self.executor, value, query, operation)
    }

    pub fn execute_in(
        &self,
        executor: &Arc<dyn Executor>,
        value: Option<T>,
        query: &Query,
        operation: Operation,
    ) -> Future<T> {
        let (repository, query) = (Arc::clone(&self.repository), query.clone());
        run(executor, "PutByQuery", operation, move || {
            repository.put(value, &query, operation)
        })
    }

    pub fn with_query(&self, query: Query) -> Put<T> {
        Put {
            inner: self.clone(),
            query,
        }
    }
}

/// Store one value under a fixed query.
pub struct Put<T> {
    inner: PutByQuery<T>,
    query: Query,
}

impl<T> Put<T>
where
    T: Clone + Send + 'static,
{
    pub fn new<R>(executor: Arc<dyn Executor>, repository: Arc<R>, query: Query) -> Self
    where
        R: PutRepository<T> + 'static,
    {
        PutByQuery::new(executor, repository).with_query(query)
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn execute(&self, value: Option<T>, operation: Operation) -> Future<T> {
        self.inner.execute(value, &self.query, operation)
    }

    pub fn execute_in(&self, executor: &Arc<dyn Executor>, value: Option<T>, operation: Operation) -> Future<T> {
        self.inner.execute_in(executor, value, &self.query, operation)
    }
}

/// Store several values under a query given per call.
pub struct PutAllByQuery<T> {
    executor: Arc<dyn Executor>,
    repository: Arc<dyn PutRepository<T>>,
}

impl<T> Clone for PutAllByQuery<T> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<T> PutAllByQuery<T>
where
    T: Clone + Send + 'static,
{
    pub fn new<R>(executor: Arc<dyn Executor>, repository: Arc<R>) -> Self
    where
        R: PutRepository<T> + 'static,
    {
        Self {
            executor,
            repository,
        }
    }

    pub fn execute(&self, values: Vec<T>, query: &Query, operation: Operation) -> Future<Vec<T>> {
        self.execute_in(&self.executor, values, query, operation)
    }

    pub fn execute_in(
        &self,
        executor: &Arc<dyn Executor>,
        values: Vec<T>,
        query: &Query,
        operation: Operation,
    ) -> Future<Vec<T>> {
        let (repository, query) = (Arc::clone(&self.repository), query.clone());
        run(executor, "PutAllByQuery", operation, move || {
            repository.put_all(values, &query, operation)
        })
    }

    pub fn with_query(&self, query: Query) -> PutAll<T> {
        PutAll {
            inner: self.clone(),
            query,
        }
    }
}

/// Store several values under a fixed query.
pub struct PutAll<T> {
    inner: PutAllByQuery<T>,
    query: Query,
}

impl<T> PutAll<T>
where
    T: Clone + Send + 'static,
{
    pub fn new<R>(executor: Arc<dyn Executor>, repository: Arc<R>, query: Query) -> Self
    where
        R: PutRepository<T> + 'static,
    {
        PutAllByQuery::new(executor, repository).with_query(query)
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn execute(&self, values: Vec<T>, operation: Operation) -> Future<Vec<T>> {
        self.inner.execute(values, &self.query, operation)
    }

    pub fn execute_in(
        &self,
        executor: &Arc<dyn Executor>,
        values: Vec<T>,
        operation: Operation,
    ) -> Future<Vec<T>> {
        self.inner.execute_in(executor, values, &self.query, operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harmony_data::{GetDataSource, InMemoryDataSource, SingleDataSourceRepository};
    use harmony_future::SerialExecutor;
    use std::time::Duration;

    #[test]
    fn test_put_on_serial_executor() {
        let repository = Arc::new(SingleDataSourceRepository::new(InMemoryDataSource::<u32>::new()));
        let executor: Arc<dyn Executor> = Arc::new(SerialExecutor::named("put-test").unwrap());
        let put = Put::new(executor, Arc::clone(&repository), Query::key("n"));

        let stored = put.execute(Some(5), Operation::Default);
        assert_eq!(stored.wait_timeout(Duration::from_secs(5)), Some(Ok(5)));
        assert_eq!(repository.source().get(&Query::key("n")).wait().unwrap(), 5);
    }

    #[test]
    fn test_put_all_by_query_length_mismatch() {
        let repository = Arc::new(SingleDataSourceRepository::new(InMemoryDataSource::<u32>::new()));
        let put_all = PutAllByQuery::new(Arc::new(harmony_future::DirectExecutor::new()), repository);
        let result = put_all
            .execute(vec![1, 2, 3], &Query::ids(["a", "b"]), Operation::Default)
            .wait();
        assert!(result.is_err());
        let ok = put_all.with_query(Query::ids(["a"])).execute(vec![1], Operation::MainOnly);
        assert_eq!(ok.wait().unwrap(), vec![1]);
    }
}
