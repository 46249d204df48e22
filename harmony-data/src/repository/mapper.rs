use std::sync::Arc;

use harmony_core::{Mapper, Operation, Query};
use harmony_future::Future;

use super::{DeleteRepository, GetRepository, PutRepository};

/// Exposes a repository of `In` values as a repository of `Out` values.
///
/// Same mapping rules as [`DataSourceMapper`](crate::DataSourceMapper); the
/// operation is forwarded untouched.
pub struct RepositoryMapper<In, Out, R> {
    repository: R,
    to_out: Arc<dyn Mapper<In, Out>>,
    to_in: Arc<dyn Mapper<Out, In>>,
}

impl<In, Out, R> RepositoryMapper<In, Out, R> {
    pub fn new<M1, M2>(repository: R, to_out: M1, to_in: M2) -> Self
    where
        M1: Mapper<In, Out> + 'static,
        M2: Mapper<Out, In> + 'static,
    {
        Self {
            repository,
            to_out: Arc::new(to_out),
            to_in: Arc::new(to_in),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }
}

impl<In, Out, R> GetRepository<Out> for RepositoryMapper<In, Out, R>
where
    In: Clone + Send + 'static,
    Out: Clone + Send + 'static,
    R: GetRepository<In>,
{
    fn get(&self, query: &Query, operation: Operation) -> Future<Out> {
        let to_out = Arc::clone(&self.to_out);
        self.repository
            .get(query, operation)
            .map(move |value| to_out.map(value))
    }

    fn get_all(&self, query: &Query, operation: Operation) -> Future<Vec<Out>> {
        let to_out = Arc::clone(&self.to_out);
        self.repository
            .get_all(query, operation)
            .map(move |values| to_out.map_all(values))
    }
}

impl<In, Out, R> PutRepository<Out> for RepositoryMapper<In, Out, R>
where
    In: Clone + Send + 'static,
    Out: Clone + Send + 'static,
    R: PutRepository<In>,
{
    fn put(&self, value: Option<Out>, query: &Query, operation: Operation) -> Future<Out> {
        let mapped = match value.map(|value| self.to_in.map(value)).transpose() {
            Ok(mapped) => mapped,
            Err(error) => return Future::error(error),
        };
        let to_out = Arc::clone(&self.to_out);
        self.repository
            .put(mapped, query, operation)
            .map(move |stored| to_out.map(stored))
    }

    fn put_all(&self, values: Vec<Out>, query: &Query, operation: Operation) -> Future<Vec<Out>> {
        let mapped = match self.to_in.map_all(values) {
            Ok(mapped) => mapped,
            Err(error) => return Future::error(error),
        };
        let to_out = Arc::clone(&self.to_out);
        self.repository
            .put_all(mapped, query, operation)
            .map(move |stored| to_out.map_all(stored))
    }
}

impl<In, Out, R> DeleteRepository for RepositoryMapper<In, Out, R>
where
    R: DeleteRepository,
{
    fn delete(&self, query: &Query, operation: Operation) -> Future<()> {
        self.repository.delete(query, operation)
    }

    fn delete_all(&self, query: &Query, operation: Operation) -> Future<()> {
        self.repository.delete_all(query, operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryDataSource, SingleDataSourceRepository};
    use harmony_core::{HarmonyError, HarmonyResult};

    fn celsius_repo() -> RepositoryMapper<
        i32,
        String,
        SingleDataSourceRepository<InMemoryDataSource<i32>>,
    > {
        RepositoryMapper::new(
            SingleDataSourceRepository::new(InMemoryDataSource::new()),
            |c: i32| -> HarmonyResult<String> { Ok(format!("{c}C")) },
            |s: String| -> HarmonyResult<i32> {
                s.trim_end_matches('C')
                    .parse()
                    .map_err(|_| HarmonyError::illegal_argument(format!("not a temperature: {s}")))
            },
        )
    }

    #[test]
    fn test_maps_both_directions() {
        let repo = celsius_repo();
        let stored = repo
            .put(Some("21C".into()), &Query::key("t"), Operation::Default)
            .wait()
            .unwrap();
        assert_eq!(stored, "21C");
        assert_eq!(repo.repository().source().object_count(), 1);
        assert_eq!(repo.get(&Query::key("t"), Operation::MainOnly).wait().unwrap(), "21C");
    }

    #[test]
    fn test_put_all_stops_at_first_mapping_failure() {
        let repo = celsius_repo();
        let result = repo
            .put_all(vec!["1C".into(), "warm".into()], &Query::key("ts"), Operation::Default)
            .wait();
        assert!(result.is_err());
        assert_eq!(repo.repository().source().array_count(), 0);
    }

    #[test]
    fn test_operation_is_forwarded() {
        let repo = celsius_repo();
        assert!(repo
            .delete(&Query::key("t"), Operation::MainSync)
            .wait()
            .is_err());
    }
}
