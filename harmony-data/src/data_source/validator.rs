//! Validating wrapper for data sources.

use std::sync::Arc;

use harmony_core::{HarmonyError, ObjectValidation, Query};
use harmony_future::Future;

use super::{DeleteDataSource, GetDataSource, PutDataSource};

/// Rejects reads whose result the validator does not accept.
///
/// Writes and deletes pass through untouched.
pub struct DataSourceValidator<D, V: ?Sized> {
    source: D,
    validator: Arc<V>,
}

impl<D, V: ?Sized> DataSourceValidator<D, V> {
    pub fn new(source: D, validator: Arc<V>) -> Self {
        Self { source, validator }
    }
}

impl<T, D, V> GetDataSource<T> for DataSourceValidator<D, V>
where
    T: Clone + Send + 'static,
    D: GetDataSource<T>,
    V: ObjectValidation<T> + ?Sized + 'static,
{
    fn get(&self, query: &Query) -> Future<T> {
        let validator = Arc::clone(&self.validator);
        self.source.get(query).filter(move |value| {
            if validator.is_object_valid(value) {
                Ok(())
            } else {
                Err(HarmonyError::not_valid("object rejected by validator"))
            }
        })
    }

    fn get_all(&self, query: &Query) -> Future<Vec<T>> {
        let validator = Arc::clone(&self.validator);
        self.source.get_all(query).filter(move |values| {
            if validator.is_array_valid(values) {
                Ok(())
            } else {
                Err(HarmonyError::not_valid("array rejected by validator"))
            }
        })
    }
}

impl<T, D, V> PutDataSource<T> for DataSourceValidator<D, V>
where
    D: PutDataSource<T>,
    V: Send + Sync + ?Sized,
{
    fn put(&self, value: Option<T>, query: &Query) -> Future<T> {
        self.source.put(value, query)
    }

    fn put_all(&self, values: Vec<T>, query: &Query) -> Future<Vec<T>> {
        self.source.put_all(values, query)
    }
}

impl<D, V> DeleteDataSource for DataSourceValidator<D, V>
where
    D: DeleteDataSource,
    V: Send + Sync + ?Sized,
{
    fn delete(&self, query: &Query) -> Future<()> {
        self.source.delete(query)
    }

    fn delete_all(&self, query: &Query) -> Future<()> {
        self.source.delete_all(query)
    }
}
