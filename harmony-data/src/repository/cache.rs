//! Repository combining a main data source with a cache.
//!
//! Routing per [`Operation`]:
//!
//! | operation | reads | writes and deletes |
//! |-----------|-------|--------------------|
//! | `Default` | as `CacheSync { fallback: Never }` | as `MainSync` |
//! | `MainOnly` | main | main |
//! | `CacheOnly` | cache, validated unless `ignore_validation` | cache |
//! | `MainSync` | main, write into cache; cache on main failure | main, then cache |
//! | `CacheSync` | valid cache entry, else main and write into cache | main, then cache |
//!
//! A value fetched from main is written into the cache before the caller's
//! future resolves, and the caller receives what the cache stored. A cache
//! write failure fails the call.

use std::fmt;
use std::sync::Arc;

use harmony_core::{Fallback, HarmonyError, ObjectValidation, Operation, Query};
use harmony_future::Future;

use super::{DeleteRepository, GetRepository, PutRepository};
use crate::{DeleteDataSource, GetDataSource, PutDataSource};

/// Read and write hooks for one value shape (single object or array).
struct Shape<K, S: ?Sized> {
    read: fn(&S, &Query) -> Future<K>,
    write: fn(&S, K, &Query) -> Future<K>,
}

impl<K, S: ?Sized> Clone for Shape<K, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, S: ?Sized> Copy for Shape<K, S> {}

fn object_shape<T, S>() -> Shape<T, S>
where
    S: GetDataSource<T> + PutDataSource<T> + ?Sized,
{
    Shape {
        read: |source, query| source.get(query),
        write: |source, value, query| source.put(Some(value), query),
    }
}

fn array_shape<T, S>() -> Shape<Vec<T>, S>
where
    S: GetDataSource<T> + PutDataSource<T> + ?Sized,
{
    Shape {
        read: |source, query| source.get_all(query),
        write: |source, values, query| source.put_all(values, query),
    }
}

/// Repository that keeps a cache data source in step with a main one.
pub struct CacheRepository<M: ?Sized, C: ?Sized, V: ?Sized> {
    main: Arc<M>,
    cache: Arc<C>,
    validator: Arc<V>,
}

impl<M: ?Sized, C: ?Sized, V: ?Sized> CacheRepository<M, C, V> {
    pub fn new(main: Arc<M>, cache: Arc<C>, validator: Arc<V>) -> Self {
        Self {
            main,
            cache,
            validator,
        }
    }

    pub fn main(&self) -> &Arc<M> {
        &self.main
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }
}

impl<M: ?Sized, C: ?Sized, V: ?Sized> Clone for CacheRepository<M, C, V> {
    fn clone(&self) -> Self {
        Self {
            main: Arc::clone(&self.main),
            cache: Arc::clone(&self.cache),
            validator: Arc::clone(&self.validator),
        }
    }
}

impl<M: ?Sized, C: ?Sized, V: ?Sized> fmt::Debug for CacheRepository<M, C, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRepository").finish_non_exhaustive()
    }
}

// ============================================================================
// READ POLICIES
// ============================================================================

fn read_cache_only<K, F>(cached: Future<K>, ignore_validation: bool, is_valid: F) -> Future<K>
where
    K: Clone + Send + 'static,
    F: FnOnce(&K) -> bool + Send + 'static,
{
    cached.filter(move |value| {
        if ignore_validation || is_valid(value) {
            Ok(())
        } else {
            Err(HarmonyError::not_valid("cached value rejected by validator"))
        }
    })
}

fn read_main_sync<K, C>(fetched: Future<K>, cache: Arc<C>, query: Query, shape: Shape<K, C>) -> Future<K>
where
    K: Clone + Send + 'static,
    C: Send + Sync + ?Sized + 'static,
{
    fetched.chain(move |result| match result {
        Ok(value) => (shape.write)(&cache, value, &query),
        Err(main_error) => {
            tracing::debug!(error = %main_error, query = query.kind(), "main read failed, reading cache");
            (shape.read)(&cache, &query).chain(move |cached| match cached {
                Ok(value) => Future::value(value),
                Err(_) => Future::error(main_error),
            })
        }
    })
}

struct CacheSync<K, M: ?Sized, C: ?Sized> {
    main: Arc<M>,
    cache: Arc<C>,
    query: Query,
    fallback: Fallback,
    main_read: fn(&M, &Query) -> Future<K>,
    shape: Shape<K, C>,
}

impl<K, M, C> CacheSync<K, M, C>
where
    K: Clone + Send + 'static,
    M: Send + Sync + ?Sized + 'static,
    C: Send + Sync + ?Sized + 'static,
{
    fn run<F>(self, is_valid: F) -> Future<K>
    where
        F: FnOnce(&K) -> bool + Send + 'static,
    {
        let cached = (self.shape.read)(&self.cache, &self.query);
        cached.chain(move |cached| {
            let stale = match cached {
                Ok(value) => {
                    if is_valid(&value) {
                        tracing::debug!(query = self.query.kind(), "cache hit");
                        return Future::value(value);
                    }
                    tracing::debug!(query = self.query.kind(), "cached value invalid, refreshing from main");
                    Some(value)
                }
                Err(error) if error.is_not_found() || error.is_not_valid() => {
                    tracing::debug!(query = self.query.kind(), "cache miss, refreshing from main");
                    None
                }
                Err(error) => return Future::error(error),
            };
            self.refresh(stale)
        })
    }

    fn refresh(self, stale: Option<K>) -> Future<K> {
        let fetched = (self.main_read)(&self.main, &self.query);
        fetched.chain(move |result| match result {
            Ok(value) => (self.shape.write)(&self.cache, value, &self.query),
            Err(main_error) if self.fallback.accepts(&main_error) => match stale {
                Some(value) => {
                    tracing::debug!(error = %main_error, "main read failed, serving stale cached value");
                    Future::value(value)
                }
                None => Future::error(HarmonyError::not_found(format!(
                    "no cached value to fall back to for {}",
                    self.query
                ))),
            },
            Err(main_error) => Future::error(main_error),
        })
    }
}

impl<T, M, C, V> GetRepository<T> for CacheRepository<M, C, V>
where
    T: Clone + Send + 'static,
    M: GetDataSource<T> + ?Sized + 'static,
    C: GetDataSource<T> + PutDataSource<T> + ?Sized + 'static,
    V: ObjectValidation<T> + ?Sized + 'static,
{
    fn get(&self, query: &Query, operation: Operation) -> Future<T> {
        match operation {
            Operation::Default => self.get(query, Operation::cache_sync()),
            Operation::MainOnly => self.main.get(query),
            Operation::CacheOnly { ignore_validation } => {
                let validator = Arc::clone(&self.validator);
                read_cache_only(self.cache.get(query), ignore_validation, move |value| {
                    validator.is_object_valid(value)
                })
            }
            Operation::MainSync => read_main_sync(
                self.main.get(query),
                Arc::clone(&self.cache),
                query.clone(),
                object_shape::<T, C>(),
            ),
            Operation::CacheSync { fallback } => {
                let validator = Arc::clone(&self.validator);
                CacheSync::<T, M, C> {
                    main: Arc::clone(&self.main),
                    cache: Arc::clone(&self.cache),
                    query: query.clone(),
                    fallback,
                    main_read: |main, query| main.get(query),
                    shape: object_shape::<T, C>(),
                }
                .run(move |value| validator.is_object_valid(value))
            }
        }
    }

    fn get_all(&self, query: &Query, operation: Operation) -> Future<Vec<T>> {
        match operation {
            Operation::Default => self.get_all(query, Operation::cache_sync()),
            Operation::MainOnly => self.main.get_all(query),
            Operation::CacheOnly { ignore_validation } => {
                let validator = Arc::clone(&self.validator);
                read_cache_only(self.cache.get_all(query), ignore_validation, move |values| {
                    validator.is_array_valid(values)
                })
            }
            Operation::MainSync => read_main_sync(
                self.main.get_all(query),
                Arc::clone(&self.cache),
                query.clone(),
                array_shape::<T, C>(),
            ),
            Operation::CacheSync { fallback } => {
                let validator = Arc::clone(&self.validator);
                CacheSync::<Vec<T>, M, C> {
                    main: Arc::clone(&self.main),
                    cache: Arc::clone(&self.cache),
                    query: query.clone(),
                    fallback,
                    main_read: |main, query| main.get_all(query),
                    shape: array_shape::<T, C>(),
                }
                .run(move |values| validator.is_array_valid(values))
            }
        }
    }
}

// ============================================================================
// WRITES
// ============================================================================

impl<T, M, C, V> PutRepository<T> for CacheRepository<M, C, V>
where
    T: Clone + Send + 'static,
    M: PutDataSource<T> + ?Sized + 'static,
    C: PutDataSource<T> + ?Sized + 'static,
    V: Send + Sync + ?Sized,
{
    fn put(&self, value: Option<T>, query: &Query, operation: Operation) -> Future<T> {
        match operation {
            Operation::MainOnly => self.main.put(value, query),
            Operation::CacheOnly { .. } => self.cache.put(value, query),
            Operation::Default | Operation::MainSync | Operation::CacheSync { .. } => {
                let (cache, query) = (Arc::clone(&self.cache), query.clone());
                self.main
                    .put(value, &query)
                    .flat_map(move |stored| cache.put(Some(stored), &query))
            }
        }
    }

    fn put_all(&self, values: Vec<T>, query: &Query, operation: Operation) -> Future<Vec<T>> {
        match operation {
            Operation::MainOnly => self.main.put_all(values, query),
            Operation::CacheOnly { .. } => self.cache.put_all(values, query),
            Operation::Default | Operation::MainSync | Operation::CacheSync { .. } => {
                let (cache, query) = (Arc::clone(&self.cache), query.clone());
                self.main
                    .put_all(values, &query)
                    .flat_map(move |stored| cache.put_all(stored, &query))
            }
        }
    }
}

impl<M, C, V> DeleteRepository for CacheRepository<M, C, V>
where
    M: DeleteDataSource + ?Sized + 'static,
    C: DeleteDataSource + ?Sized + 'static,
    V: Send + Sync + ?Sized,
{
    fn delete(&self, query: &Query, operation: Operation) -> Future<()> {
        match operation {
            Operation::MainOnly => self.main.delete(query),
            Operation::CacheOnly { .. } => self.cache.delete(query),
            Operation::Default | Operation::MainSync | Operation::CacheSync { .. } => {
                let (cache, query) = (Arc::clone(&self.cache), query.clone());
                self.main
                    .delete(&query)
                    .flat_map(move |()| cache.delete(&query))
            }
        }
    }

    fn delete_all(&self, query: &Query, operation: Operation) -> Future<()> {
        match operation {
            Operation::MainOnly => self.main.delete_all(query),
            Operation::CacheOnly { .. } => self.cache.delete_all(query),
            Operation::Default | Operation::MainSync | Operation::CacheSync { .. } => {
                let (cache, query) = (Arc::clone(&self.cache), query.clone());
                self.main
                    .delete_all(&query)
                    .flat_map(move |()| cache.delete_all(&query))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataSource, InMemoryDataSource, VoidDataSource};
    use harmony_core::DefaultObjectValidation;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Accepts values unless switched off.
    struct Toggle(AtomicBool);

    impl Toggle {
        fn new(valid: bool) -> Arc<Self> {
            Arc::new(Self(AtomicBool::new(valid)))
        }
    }

    impl ObjectValidation<String> for Toggle {
        fn is_object_valid(&self, _object: &String) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    type Memory = InMemoryDataSource<String>;

    fn stores() -> (Arc<Memory>, Arc<Memory>) {
        (Arc::new(Memory::new()), Arc::new(Memory::new()))
    }

    fn seed(source: &Memory, key: &str, value: &str) {
        source.put(Some(value.to_string()), &Query::key(key)).wait().unwrap();
    }

    fn offline() -> Arc<dyn DataSource<String>> {
        Arc::new(VoidDataSource::<String>::new())
    }

    #[test]
    fn test_cache_sync_valid_hit_skips_main() {
        let (main, cache) = stores();
        seed(&cache, "k", "cached");
        seed(&main, "k", "fresh");
        let repo = CacheRepository::new(main, cache, Toggle::new(true));
        assert_eq!(repo.get(&Query::key("k"), Operation::Default).wait().unwrap(), "cached");
    }

    #[test]
    fn test_cache_sync_miss_fetches_and_writes_back() {
        let (main, cache) = stores();
        seed(&main, "k", "fresh");
        let repo = CacheRepository::new(main, Arc::clone(&cache), Toggle::new(true));
        assert_eq!(repo.get(&Query::key("k"), Operation::cache_sync()).wait().unwrap(), "fresh");
        assert_eq!(cache.get(&Query::key("k")).wait().unwrap(), "fresh");
    }

    #[test]
    fn test_cache_sync_invalid_refreshes() {
        let (main, cache) = stores();
        seed(&cache, "k", "stale");
        seed(&main, "k", "fresh");
        let repo = CacheRepository::new(main, Arc::clone(&cache), Toggle::new(false));
        assert_eq!(repo.get(&Query::key("k"), Operation::cache_sync()).wait().unwrap(), "fresh");
        assert_eq!(cache.get(&Query::key("k")).wait().unwrap(), "fresh");
    }

    #[test]
    fn test_cache_sync_fallback_serves_stale_value() {
        let cache = Arc::new(Memory::new());
        seed(&cache, "k", "stale");
        let repo = CacheRepository::new(offline(), cache, Toggle::new(false));

        let strict = repo.get(&Query::key("k"), Operation::cache_sync()).wait();
        assert_eq!(strict.unwrap_err(), HarmonyError::not_implemented());

        let lenient = repo
            .get(&Query::key("k"), Operation::cache_sync_with_fallback(Fallback::Always))
            .wait();
        assert_eq!(lenient.unwrap(), "stale");
    }

    #[test]
    fn test_cache_sync_fallback_without_stale_value_is_not_found() {
        let repo = CacheRepository::new(offline(), Arc::new(Memory::new()), Toggle::new(true));
        let err = repo
            .get(&Query::key("k"), Operation::cache_sync_with_fallback(Fallback::Always))
            .wait()
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_cache_sync_propagates_other_cache_errors() {
        let (main, _) = stores();
        seed(&main, "k", "fresh");
        let repo = CacheRepository::new(main, offline(), Toggle::new(true));
        let err = repo.get(&Query::key("k"), Operation::cache_sync()).wait().unwrap_err();
        assert_eq!(err, HarmonyError::not_implemented());
    }

    #[test]
    fn test_main_sync_falls_back_to_cache() {
        let cache = Arc::new(Memory::new());
        seed(&cache, "k", "cached");
        let repo = CacheRepository::new(offline(), Arc::clone(&cache), Toggle::new(false));
        assert_eq!(repo.get(&Query::key("k"), Operation::MainSync).wait().unwrap(), "cached");

        let err = repo.get(&Query::key("other"), Operation::MainSync).wait().unwrap_err();
        assert_eq!(err, HarmonyError::not_implemented());
    }

    #[test]
    fn test_cache_only_honours_validation() {
        let (main, cache) = stores();
        seed(&cache, "k", "cached");
        let repo = CacheRepository::new(main, cache, Toggle::new(false));
        let err = repo.get(&Query::key("k"), Operation::cache_only()).wait().unwrap_err();
        assert!(err.is_not_valid());

        let ignored = Operation::CacheOnly {
            ignore_validation: true,
        };
        assert_eq!(repo.get(&Query::key("k"), ignored).wait().unwrap(), "cached");
    }

    #[test]
    fn test_get_all_empty_cached_array_refreshes() {
        let (main, cache) = stores();
        cache.put_all(Vec::new(), &Query::key("list")).wait().unwrap();
        main.put_all(vec!["a".to_string()], &Query::key("list")).wait().unwrap();
        let repo = CacheRepository::new(main, Arc::clone(&cache), Arc::new(DefaultObjectValidation));
        assert_eq!(
            repo.get_all(&Query::key("list"), Operation::Default).wait().unwrap(),
            vec!["a".to_string()]
        );
        assert_eq!(cache.get_all(&Query::key("list")).wait().unwrap().len(), 1);
    }

    #[test]
    fn test_write_failure_on_main_leaves_cache_untouched() {
        let cache = Arc::new(Memory::new());
        let repo = CacheRepository::new(offline(), Arc::clone(&cache), Toggle::new(true));
        assert!(repo
            .put(Some("v".into()), &Query::key("k"), Operation::Default)
            .wait()
            .is_err());
        assert_eq!(cache.object_count(), 0);
    }

    #[test]
    fn test_writes_and_deletes_reach_both_sources() {
        let (main, cache) = stores();
        let repo = CacheRepository::new(Arc::clone(&main), Arc::clone(&cache), Toggle::new(true));
        repo.put(Some("v".into()), &Query::key("k"), Operation::MainSync).wait().unwrap();
        assert_eq!(main.object_count(), 1);
        assert_eq!(cache.object_count(), 1);

        repo.put(Some("c".into()), &Query::key("c"), Operation::cache_only()).wait().unwrap();
        assert_eq!(main.object_count(), 1);

        repo.delete(&Query::key("k"), Operation::Default).wait().unwrap();
        assert_eq!(main.object_count(), 0);
        assert_eq!(cache.object_count(), 1);

        repo.delete_all(&Query::AllObjects, Operation::MainOnly).wait().unwrap();
        assert_eq!(cache.object_count(), 1);
    }
}
