//! In-process expiry layer over another data source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use harmony_core::{HarmonyConfig, Query};
use harmony_future::Future;

use super::{DeleteDataSource, GetDataSource, PutDataSource};

struct Stamped<V> {
    value: V,
    stored_at: Instant,
}

struct Entries<T> {
    objects: HashMap<String, Stamped<T>>,
    arrays: HashMap<String, Stamped<Vec<T>>>,
    /// Bumped by every put and delete.
    generation: u64,
    /// Generation of the latest write started per key.
    object_writes: HashMap<String, u64>,
    array_writes: HashMap<String, u64>,
}

fn begin_write(writes: &mut HashMap<String, u64>, generation: &mut u64, key: &str) -> u64 {
    *generation += 1;
    writes.insert(key.to_string(), *generation);
    *generation
}

/// A store stamped `since` is stale once a later write to `key` began.
fn is_current(writes: &HashMap<String, u64>, key: &str, since: u64) -> bool {
    writes.get(key).map_or(true, |latest| *latest <= since)
}

type SharedEntries<T> = Arc<Mutex<Entries<T>>>;

fn lock<T>(entries: &Mutex<Entries<T>>) -> MutexGuard<'_, Entries<T>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps the results of key-like queries in memory for `expiry`.
///
/// Only `Key` and `Id` queries are cached. Any other query goes straight to
/// the wrapped source. A failed read evicts the entry for its key.
pub struct TimedCacheDataSource<T, D> {
    source: D,
    expiry: Duration,
    entries: SharedEntries<T>,
}

impl<T, D> TimedCacheDataSource<T, D>
where
    T: Clone + Send + 'static,
{
    pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(300);

    pub fn new(source: D, expiry: Duration) -> Self {
        Self {
            source,
            expiry,
            entries: Arc::new(Mutex::new(Entries {
                objects: HashMap::new(),
                arrays: HashMap::new(),
                generation: 0,
                object_writes: HashMap::new(),
                array_writes: HashMap::new(),
            })),
        }
    }

    /// Use `timed_cache.expiry_secs` from `config`.
    pub fn with_config(source: D, config: &HarmonyConfig) -> Self {
        Self::new(source, config.timed_cache_expiry())
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        let mut entries = lock(&self.entries);
        entries.objects.clear();
        entries.arrays.clear();
    }

    fn read_generation(&self) -> u64 {
        lock(&self.entries).generation
    }

    fn begin_object_write(&self, key: &str) -> u64 {
        let entries = &mut *lock(&self.entries);
        begin_write(&mut entries.object_writes, &mut entries.generation, key)
    }

    fn begin_array_write(&self, key: &str) -> u64 {
        let entries = &mut *lock(&self.entries);
        begin_write(&mut entries.array_writes, &mut entries.generation, key)
    }

    fn fresh_object(&self, key: &str) -> Option<T> {
        lock(&self.entries)
            .objects
            .get(key)
            .filter(|stamped| stamped.stored_at.elapsed() < self.expiry)
            .map(|stamped| stamped.value.clone())
    }

    fn fresh_array(&self, key: &str) -> Option<Vec<T>> {
        lock(&self.entries)
            .arrays
            .get(key)
            .filter(|stamped| stamped.stored_at.elapsed() < self.expiry)
            .map(|stamped| stamped.value.clone())
    }
}

fn store_object<T>(entries: SharedEntries<T>, key: String, since: u64) -> impl FnOnce(&T) + Send + 'static
where
    T: Clone + Send + 'static,
{
    move |value| {
        let mut entries = lock(&entries);
        if !is_current(&entries.object_writes, &key, since) {
            tracing::debug!(key = %key, "timed cache skipped stale store");
            return;
        }
        entries.objects.insert(
            key,
            Stamped {
                value: value.clone(),
                stored_at: Instant::now(),
            },
        );
    }
}

fn store_array<T>(entries: SharedEntries<T>, key: String, since: u64) -> impl FnOnce(&Vec<T>) + Send + 'static
where
    T: Clone + Send + 'static,
{
    move |values| {
        let mut entries = lock(&entries);
        if !is_current(&entries.array_writes, &key, since) {
            tracing::debug!(key = %key, "timed cache skipped stale store");
            return;
        }
        entries.arrays.insert(
            key,
            Stamped {
                value: values.clone(),
                stored_at: Instant::now(),
            },
        );
    }
}

fn evict_object<T: Send + 'static>(entries: SharedEntries<T>, key: String) -> impl FnOnce() + Send + 'static {
    move || {
        lock(&entries).objects.remove(&key);
    }
}

fn evict_array<T: Send + 'static>(entries: SharedEntries<T>, key: String) -> impl FnOnce() + Send + 'static {
    move || {
        lock(&entries).arrays.remove(&key);
    }
}

fn pass_through(query: &Query, method: &str) {
    tracing::warn!(
        query = query.kind(),
        method,
        "timed cache only handles key queries, passing through"
    );
}

impl<T, D> GetDataSource<T> for TimedCacheDataSource<T, D>
where
    T: Clone + Send + Sync + 'static,
    D: GetDataSource<T>,
{
    fn get(&self, query: &Query) -> Future<T> {
        let Some(key) = query.as_key() else {
            pass_through(query, "get");
            return self.source.get(query);
        };
        if let Some(value) = self.fresh_object(key) {
            tracing::debug!(key, "timed cache hit");
            return Future::value(value);
        }

        let store = store_object(Arc::clone(&self.entries), key.to_string(), self.read_generation());
        let evict = evict_object(Arc::clone(&self.entries), key.to_string());
        self.source.get(query).then(store).fail(move |_| evict())
    }

    fn get_all(&self, query: &Query) -> Future<Vec<T>> {
        let Some(key) = query.as_key() else {
            pass_through(query, "get_all");
            return self.source.get_all(query);
        };
        if let Some(values) = self.fresh_array(key) {
            tracing::debug!(key, "timed cache hit");
            return Future::value(values);
        }

        let store = store_array(Arc::clone(&self.entries), key.to_string(), self.read_generation());
        let evict = evict_array(Arc::clone(&self.entries), key.to_string());
        self.source.get_all(query).then(store).fail(move |_| evict())
    }
}

impl<T, D> PutDataSource<T> for TimedCacheDataSource<T, D>
where
    T: Clone + Send + Sync + 'static,
    D: PutDataSource<T>,
{
    fn put(&self, value: Option<T>, query: &Query) -> Future<T> {
        let Some(key) = query.as_key() else {
            pass_through(query, "put");
            return self.source.put(value, query);
        };
        let since = self.begin_object_write(key);
        let store = store_object(Arc::clone(&self.entries), key.to_string(), since);
        let evict = evict_object(Arc::clone(&self.entries), key.to_string());
        self.source.put(value, query).then(store).fail(move |_| evict())
    }

    fn put_all(&self, values: Vec<T>, query: &Query) -> Future<Vec<T>> {
        let Some(key) = query.as_key() else {
            pass_through(query, "put_all");
            return self.source.put_all(values, query);
        };
        let since = self.begin_array_write(key);
        let store = store_array(Arc::clone(&self.entries), key.to_string(), since);
        let evict = evict_array(Arc::clone(&self.entries), key.to_string());
        self.source.put_all(values, query).then(store).fail(move |_| evict())
    }
}

impl<T, D> DeleteDataSource for TimedCacheDataSource<T, D>
where
    T: Clone + Send + Sync + 'static,
    D: DeleteDataSource,
{
    fn delete(&self, query: &Query) -> Future<()> {
        let Some(key) = query.as_key() else {
            pass_through(query, "delete");
            return self.source.delete(query);
        };
        self.begin_object_write(key);
        let evict = evict_object(Arc::clone(&self.entries), key.to_string());
        self.source.delete(query).on_completion(evict)
    }

    fn delete_all(&self, query: &Query) -> Future<()> {
        let Some(key) = query.as_key() else {
            pass_through(query, "delete_all");
            return self.source.delete_all(query);
        };
        self.begin_array_write(key);
        let evict = evict_array(Arc::clone(&self.entries), key.to_string());
        self.source.delete_all(query).on_completion(evict)
    }
}
