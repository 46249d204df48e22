//! Retrying wrapper for data sources.

use std::sync::Arc;

use harmony_core::{HarmonyConfig, HarmonyError, Query};
use harmony_future::Future;

use super::{DeleteDataSource, GetDataSource, PutDataSource};

/// Decides whether a failure is worth another attempt.
pub type RetryPredicate = Arc<dyn Fn(&HarmonyError) -> bool + Send + Sync>;

/// Re-issues a failed call up to `max_retries` more times while the
/// predicate accepts the error. The last error is returned once attempts run
/// out or the predicate refuses.
pub struct RetryDataSource<D> {
    source: Arc<D>,
    max_retries: u32,
    retry_if: RetryPredicate,
}

impl<D> RetryDataSource<D> {
    /// Retry once on any error.
    pub fn new(source: D) -> Self {
        Self::with_retries(source, 1)
    }

    pub fn with_retries(source: D, max_retries: u32) -> Self {
        Self {
            source: Arc::new(source),
            max_retries,
            retry_if: Arc::new(|_| true),
        }
    }

    /// Use `retry.max_retries` from `config`.
    pub fn with_config(source: D, config: &HarmonyConfig) -> Self {
        Self::with_retries(source, config.retry.max_retries)
    }

    /// Only retry errors accepted by `predicate`.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&HarmonyError) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Arc::new(predicate);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

fn attempt<K, C>(call: Arc<C>, retries_left: u32, retry_if: RetryPredicate) -> Future<K>
where
    K: Clone + Send + 'static,
    C: Fn() -> Future<K> + Send + Sync + 'static,
{
    call().recover(move |error| {
        if retries_left > 0 && retry_if(&error) {
            tracing::debug!(%error, retries_left, "retrying failed data source call");
            attempt(call, retries_left - 1, retry_if)
        } else {
            Future::error(error)
        }
    })
}

impl<D> RetryDataSource<D>
where
    D: Send + Sync + 'static,
{
    fn run<K, C>(&self, call: C) -> Future<K>
    where
        K: Clone + Send + 'static,
        C: Fn(&D) -> Future<K> + Send + Sync + 'static,
    {
        let source = Arc::clone(&self.source);
        attempt(
            Arc::new(move || call(&source)),
            self.max_retries,
            Arc::clone(&self.retry_if),
        )
    }
}

impl<T, D> GetDataSource<T> for RetryDataSource<D>
where
    T: Clone + Send + 'static,
    D: GetDataSource<T> + 'static,
{
    fn get(&self, query: &Query) -> Future<T> {
        let query = query.clone();
        self.run(move |source| source.get(&query))
    }

    fn get_all(&self, query: &Query) -> Future<Vec<T>> {
        let query = query.clone();
        self.run(move |source| source.get_all(&query))
    }
}

impl<T, D> PutDataSource<T> for RetryDataSource<D>
where
    T: Clone + Send + Sync + 'static,
    D: PutDataSource<T> + 'static,
{
    fn put(&self, value: Option<T>, query: &Query) -> Future<T> {
        let query = query.clone();
        self.run(move |source| source.put(value.clone(), &query))
    }

    fn put_all(&self, values: Vec<T>, query: &Query) -> Future<Vec<T>> {
        let query = query.clone();
        self.run(move |source| source.put_all(values.clone(), &query))
    }
}

impl<D> DeleteDataSource for RetryDataSource<D>
where
    D: DeleteDataSource + 'static,
{
    fn delete(&self, query: &Query) -> Future<()> {
        let query = query.clone();
        self.run(move |source| source.delete(&query))
    }

    fn delete_all(&self, query: &Query) -> Future<()> {
        let query = query.clone();
        self.run(move |source| source.delete_all(&query))
    }
}
