use harmony_core::{HarmonyError, Operation, OperationError, Query, RepositoryMethod};
use harmony_future::Future;

use super::{DeleteRepository, GetRepository, PutRepository};
use crate::{DeleteDataSource, GetDataSource, PutDataSource};

/// Repository over a single data source.
///
/// Only `Default` and `MainOnly` make sense with one source; every other
/// operation fails with [`OperationError::NotSupported`].
#[derive(Debug, Clone)]
pub struct SingleDataSourceRepository<D> {
    source: D,
}

impl<D> SingleDataSourceRepository<D> {
    pub fn new(source: D) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &D {
        &self.source
    }
}

fn check(operation: Operation, method: RepositoryMethod) -> Result<(), HarmonyError> {
    match operation {
        Operation::Default | Operation::MainOnly => Ok(()),
        other => Err(OperationError::NotSupported {
            operation: other.name().to_string(),
            method,
            repository: "SingleDataSourceRepository".to_string(),
        }
        .into()),
    }
}

impl<T, D> GetRepository<T> for SingleDataSourceRepository<D>
where
    T: Clone + Send + 'static,
    D: GetDataSource<T>,
{
    fn get(&self, query: &Query, operation: Operation) -> Future<T> {
        match check(operation, RepositoryMethod::Get) {
            Ok(()) => self.source.get(query),
            Err(error) => Future::error(error),
        }
    }

    fn get_all(&self, query: &Query, operation: Operation) -> Future<Vec<T>> {
        match check(operation, RepositoryMethod::GetAll) {
            Ok(()) => self.source.get_all(query),
            Err(error) => Future::error(error),
        }
    }
}

impl<T, D> PutRepository<T> for SingleDataSourceRepository<D>
where
    T: Clone + Send + 'static,
    D: PutDataSource<T>,
{
    fn put(&self, value: Option<T>, query: &Query, operation: Operation) -> Future<T> {
        match check(operation, RepositoryMethod::Put) {
            Ok(()) => self.source.put(value, query),
            Err(error) => Future::error(error),
        }
    }

    fn put_all(&self, values: Vec<T>, query: &Query, operation: Operation) -> Future<Vec<T>> {
        match check(operation, RepositoryMethod::PutAll) {
            Ok(()) => self.source.put_all(values, query),
            Err(error) => Future::error(error),
        }
    }
}

impl<D> DeleteRepository for SingleDataSourceRepository<D>
where
    D: DeleteDataSource,
{
    fn delete(&self, query: &Query, operation: Operation) -> Future<()> {
        match check(operation, RepositoryMethod::Delete) {
            Ok(()) => self.source.delete(query),
            Err(error) => Future::error(error),
        }
    }

    fn delete_all(&self, query: &Query, operation: Operation) -> Future<()> {
        match check(operation, RepositoryMethod::DeleteAll) {
            Ok(()) => self.source.delete_all(query),
            Err(error) => Future::error(error),
        }
    }
}
