//! In-memory data source.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use harmony_core::{HarmonyError, HarmonyResult, Query};
use harmony_future::Future;

use super::{DeleteDataSource, GetDataSource, PutDataSource};

#[derive(Debug)]
struct Store<T> {
    objects: HashMap<String, T>,
    arrays: HashMap<String, Vec<T>>,
}

/// Thread-safe store keeping single objects and arrays in separate maps.
///
/// Supported queries:
///
/// | operation | queries |
/// |-----------|---------|
/// | `get` | `Key`, `Id` |
/// | `get_all` | `AllObjects`, `Ids`, `Key`, `Id` |
/// | `put` | `Key`, `Id` |
/// | `put_all` | `Ids`, `Key`, `Id` |
/// | `delete` / `delete_all` | `AllObjects`, `Ids`, `Key`, `Id` |
///
/// A key holds either an object or an array, never both: writing one kind
/// drops the other.
#[derive(Debug)]
pub struct InMemoryDataSource<T> {
    store: RwLock<Store<T>>,
}

impl<T> Default for InMemoryDataSource<T> {
    fn default() -> Self {
        Self {
            store: RwLock::new(Store {
                objects: HashMap::new(),
                arrays: HashMap::new(),
            }),
        }
    }
}

impl<T> InMemoryDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored single objects.
    pub fn object_count(&self) -> usize {
        self.read().objects.len()
    }

    /// Number of stored arrays.
    pub fn array_count(&self) -> usize {
        self.read().arrays.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Store<T>> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store<T>> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn get_now(&self, query: &Query) -> HarmonyResult<T> {
        let key = query
            .as_key()
            .ok_or_else(|| HarmonyError::query_not_supported(query))?;
        self.read()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| HarmonyError::not_found(format!("object for key '{key}'")))
    }

    fn get_all_now(&self, query: &Query) -> HarmonyResult<Vec<T>> {
        let store = self.read();
        match query {
            Query::AllObjects => {
                let mut all: Vec<T> = store.objects.values().cloned().collect();
                all.extend(store.arrays.values().flatten().cloned());
                Ok(all)
            }
            Query::Ids(ids) => Ok(ids
                .iter()
                .filter_map(|id| store.objects.get(id).cloned())
                .collect()),
            Query::Key(key) | Query::Id(key) => store
                .arrays
                .get(key)
                .cloned()
                .ok_or_else(|| HarmonyError::not_found(format!("array for key '{key}'"))),
            _ => Err(HarmonyError::query_not_supported(query)),
        }
    }

    fn put_now(&self, value: Option<T>, query: &Query) -> HarmonyResult<T> {
        let key = query
            .as_key()
            .ok_or_else(|| HarmonyError::query_not_supported(query))?;
        let value = value.ok_or_else(|| HarmonyError::illegal_argument("value cannot be empty"))?;

        let mut store = self.write();
        store.arrays.remove(key);
        store.objects.insert(key.to_string(), value.clone());
        Ok(value)
    }

    fn put_all_now(&self, values: Vec<T>, query: &Query) -> HarmonyResult<Vec<T>> {
        match query {
            Query::Ids(ids) => {
                if ids.len() != values.len() {
                    return Err(HarmonyError::illegal_argument(format!(
                        "{} ids for {} values",
                        ids.len(),
                        values.len()
                    )));
                }
                let mut store = self.write();
                for (id, value) in ids.iter().zip(&values) {
                    store.arrays.remove(id);
                    store.objects.insert(id.clone(), value.clone());
                }
                Ok(values)
            }
            Query::Key(key) | Query::Id(key) => {
                let mut store = self.write();
                store.objects.remove(key);
                store.arrays.insert(key.clone(), values.clone());
                Ok(values)
            }
            _ => Err(HarmonyError::query_not_supported(query)),
        }
    }

    fn delete_now(&self, query: &Query) -> HarmonyResult<()> {
        let mut store = self.write();
        match query {
            Query::AllObjects => {
                store.objects.clear();
                store.arrays.clear();
            }
            Query::Ids(ids) => {
                for id in ids {
                    store.objects.remove(id);
                    store.arrays.remove(id);
                }
            }
            Query::Key(key) | Query::Id(key) => {
                store.objects.remove(key);
                store.arrays.remove(key);
            }
            _ => return Err(HarmonyError::query_not_supported(query)),
        }
        Ok(())
    }
}

impl<T> GetDataSource<T> for InMemoryDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self, query: &Query) -> Future<T> {
        Future::from_result(self.get_now(query))
    }

    fn get_all(&self, query: &Query) -> Future<Vec<T>> {
        Future::from_result(self.get_all_now(query))
    }
}

impl<T> PutDataSource<T> for InMemoryDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn put(&self, value: Option<T>, query: &Query) -> Future<T> {
        Future::from_result(self.put_now(value, query))
    }

    fn put_all(&self, values: Vec<T>, query: &Query) -> Future<Vec<T>> {
        Future::from_result(self.put_all_now(values, query))
    }
}

impl<T> DeleteDataSource for InMemoryDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn delete(&self, query: &Query) -> Future<()> {
        Future::from_result(self.delete_now(query))
    }

    fn delete_all(&self, query: &Query) -> Future<()> {
        Future::from_result(self.delete_now(query))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use harmony_core::DataError;
    use proptest::prelude::*;

    fn source() -> InMemoryDataSource<String> {
        InMemoryDataSource::new()
    }

    #[test]
    fn test_put_then_get_by_key_and_id() {
        let ds = source();
        ds.put(Some("ada".into()), &Query::key("user")).wait().unwrap();
        assert_eq!(ds.get(&Query::key("user")).wait().unwrap(), "ada");
        assert_eq!(ds.get(&Query::id("user")).wait().unwrap(), "ada");
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let err = source().get(&Query::key("nobody")).wait().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_put_none_is_illegal_argument() {
        let err = source().put(None, &Query::key("user")).wait().unwrap_err();
        assert!(matches!(
            err,
            HarmonyError::Data(DataError::IllegalArgument { .. })
        ));
    }

    #[test]
    fn test_unsupported_queries() {
        let ds = source();
        let page = Query::Pagination { offset: 0, limit: 10 };
        for err in [
            ds.get(&Query::AllObjects).wait().unwrap_err(),
            ds.get_all(&page).wait().unwrap_err(),
            ds.put(Some("x".into()), &Query::AllObjects).wait().map(|_| ()).unwrap_err(),
            ds.put_all(vec![], &Query::Void).wait().map(|_| ()).unwrap_err(),
            ds.delete(&page).wait().unwrap_err(),
        ] {
            assert!(matches!(
                err,
                HarmonyError::Data(DataError::QueryNotSupported { .. })
            ));
        }
    }

    #[test]
    fn test_objects_and_arrays_share_keys_exclusively() {
        let ds = source();
        ds.put_all(vec!["a".into(), "b".into()], &Query::key("k")).wait().unwrap();
        assert_eq!(ds.array_count(), 1);

        ds.put(Some("single".into()), &Query::key("k")).wait().unwrap();
        assert_eq!(ds.array_count(), 0);
        assert!(ds.get_all(&Query::key("k")).wait().unwrap_err().is_not_found());

        ds.put_all(vec!["c".into()], &Query::key("k")).wait().unwrap();
        assert_eq!(ds.object_count(), 0);
        assert!(ds.get(&Query::key("k")).wait().unwrap_err().is_not_found());
    }

    #[test]
    fn test_put_all_by_ids() {
        let ds = source();
        ds.put_all(vec!["one".into(), "two".into()], &Query::ids(["1", "2"]))
            .wait()
            .unwrap();
        assert_eq!(ds.get(&Query::id("2")).wait().unwrap(), "two");
        assert_eq!(
            ds.get_all(&Query::ids(["2", "missing", "1"])).wait().unwrap(),
            vec!["two".to_string(), "one".to_string()]
        );
    }

    #[test]
    fn test_put_all_by_ids_length_mismatch() {
        let err = source()
            .put_all(vec!["one".into()], &Query::ids(["1", "2"]))
            .wait()
            .unwrap_err();
        assert!(matches!(
            err,
            HarmonyError::Data(DataError::IllegalArgument { .. })
        ));
    }

    #[test]
    fn test_get_all_objects_flattens_arrays() {
        let ds = source();
        ds.put(Some("solo".into()), &Query::key("a")).wait().unwrap();
        ds.put_all(vec!["x".into(), "y".into()], &Query::key("b")).wait().unwrap();
        let mut all = ds.get_all(&Query::AllObjects).wait().unwrap();
        all.sort();
        assert_eq!(all, vec!["solo", "x", "y"]);
    }

    #[test]
    fn test_delete_variants() {
        let ds = source();
        ds.put(Some("a".into()), &Query::key("a")).wait().unwrap();
        ds.put(Some("b".into()), &Query::key("b")).wait().unwrap();
        ds.put_all(vec!["c".into()], &Query::key("c")).wait().unwrap();

        ds.delete(&Query::key("a")).wait().unwrap();
        assert!(ds.get(&Query::key("a")).wait().is_err());

        // Missing keys are fine
        ds.delete(&Query::ids(["b", "zzz"])).wait().unwrap();
        assert_eq!(ds.object_count(), 0);

        ds.delete_all(&Query::AllObjects).wait().unwrap();
        assert_eq!(ds.array_count(), 0);
    }

    proptest! {
        #[test]
        fn prop_last_put_wins(values in proptest::collection::vec(".{0,8}", 1..20)) {
            let ds = source();
            for value in &values {
                ds.put(Some(value.clone()), &Query::key("k")).wait().unwrap();
            }
            prop_assert_eq!(&ds.get(&Query::key("k")).wait().unwrap(), values.last().unwrap());
            prop_assert_eq!(ds.object_count(), 1);
        }
    }
}
