//! Async data source contract.
//!
//! Backends built on async clients (HTTP, database drivers) implement these
//! traits instead of the future-based ones. The two adapters convert in
//! either direction:
//!
//! - [`AsyncDataSourceAdapter`] lets async code `.await` a future-based source.
//! - [`FutureDataSourceAdapter`] runs an async source on a tokio runtime so it
//!   can sit under repositories and caching layers.

use std::sync::Arc;

use async_trait::async_trait;
use harmony_core::{HarmonyError, HarmonyResult, Query};
use harmony_future::Future;
use tokio::runtime::Handle;

use super::{DeleteDataSource, GetDataSource, PutDataSource};

#[async_trait]
pub trait AsyncGetDataSource<T>: Send + Sync
where
    T: Send + 'static,
{
    async fn get(&self, query: &Query) -> HarmonyResult<T>;

    async fn get_all(&self, query: &Query) -> HarmonyResult<Vec<T>>;
}

#[async_trait]
pub trait AsyncPutDataSource<T>: Send + Sync
where
    T: Send + 'static,
{
    async fn put(&self, value: Option<T>, query: &Query) -> HarmonyResult<T>;

    async fn put_all(&self, values: Vec<T>, query: &Query) -> HarmonyResult<Vec<T>>;
}

#[async_trait]
pub trait AsyncDeleteDataSource: Send + Sync {
    async fn delete(&self, query: &Query) -> HarmonyResult<()>;

    async fn delete_all(&self, query: &Query) -> HarmonyResult<()>;
}

/// An async source with every capability.
pub trait AsyncDataSource<T>:
    AsyncGetDataSource<T> + AsyncPutDataSource<T> + AsyncDeleteDataSource
where
    T: Send + 'static,
{
}

impl<T, D> AsyncDataSource<T> for D
where
    T: Send + 'static,
    D: AsyncGetDataSource<T> + AsyncPutDataSource<T> + AsyncDeleteDataSource,
{
}

// ============================================================================
// FUTURE-BASED -> ASYNC
// ============================================================================

/// Exposes a future-based data source through the async contract.
#[derive(Debug, Clone)]
pub struct AsyncDataSourceAdapter<D> {
    inner: D,
}

impl<D> AsyncDataSourceAdapter<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

#[async_trait]
impl<T, D> AsyncGetDataSource<T> for AsyncDataSourceAdapter<D>
where
    T: Clone + Send + 'static,
    D: GetDataSource<T>,
{
    async fn get(&self, query: &Query) -> HarmonyResult<T> {
        self.inner.get(query).await
    }

    async fn get_all(&self, query: &Query) -> HarmonyResult<Vec<T>> {
        self.inner.get_all(query).await
    }
}

#[async_trait]
impl<T, D> AsyncPutDataSource<T> for AsyncDataSourceAdapter<D>
where
    T: Clone + Send + 'static,
    D: PutDataSource<T>,
{
    async fn put(&self, value: Option<T>, query: &Query) -> HarmonyResult<T> {
        self.inner.put(value, query).await
    }

    async fn put_all(&self, values: Vec<T>, query: &Query) -> HarmonyResult<Vec<T>> {
        self.inner.put_all(values, query).await
    }
}

#[async_trait]
impl<D> AsyncDeleteDataSource for AsyncDataSourceAdapter<D>
where
    D: DeleteDataSource,
{
    async fn delete(&self, query: &Query) -> HarmonyResult<()> {
        self.inner.delete(query).await
    }

    async fn delete_all(&self, query: &Query) -> HarmonyResult<()> {
        self.inner.delete_all(query).await
    }
}

// ============================================================================
// ASYNC -> FUTURE-BASED
// ============================================================================

/// Runs an async data source on a tokio runtime behind the future-based
/// contract. Every call spawns one task on `handle`.
pub struct FutureDataSourceAdapter<D> {
    inner: Arc<D>,
    handle: Handle,
}

impl<D> FutureDataSourceAdapter<D> {
    pub fn new(inner: D, handle: Handle) -> Self {
        Self {
            inner: Arc::new(inner),
            handle,
        }
    }

    /// Bind to the runtime of the calling task.
    pub fn current(inner: D) -> HarmonyResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| HarmonyError::failed(format!("no tokio runtime: {e}")))?;
        Ok(Self::new(inner, handle))
    }
}

impl<T, D> GetDataSource<T> for FutureDataSourceAdapter<D>
where
    T: Clone + Send + 'static,
    D: AsyncGetDataSource<T> + 'static,
{
    fn get(&self, query: &Query) -> Future<T> {
        let (inner, query) = (Arc::clone(&self.inner), query.clone());
        Future::spawn(&self.handle, async move { inner.get(&query).await })
    }

    fn get_all(&self, query: &Query) -> Future<Vec<T>> {
        let (inner, query) = (Arc::clone(&self.inner), query.clone());
        Future::spawn(&self.handle, async move { inner.get_all(&query).await })
    }
}

impl<T, D> PutDataSource<T> for FutureDataSourceAdapter<D>
where
    T: Clone + Send + 'static,
    D: AsyncPutDataSource<T> + 'static,
{
    fn put(&self, value: Option<T>, query: &Query) -> Future<T> {
        let (inner, query) = (Arc::clone(&self.inner), query.clone());
        Future::spawn(&self.handle, async move { inner.put(value, &query).await })
    }

    fn put_all(&self, values: Vec<T>, query: &Query) -> Future<Vec<T>> {
        let (inner, query) = (Arc::clone(&self.inner), query.clone());
        Future::spawn(&self.handle, async move { inner.put_all(values, &query).await })
    }
}

impl<D> DeleteDataSource for FutureDataSourceAdapter<D>
where
    D: AsyncDeleteDataSource + 'static,
{
    fn delete(&self, query: &Query) -> Future<()> {
        let (inner, query) = (Arc::clone(&self.inner), query.clone());
        Future::spawn(&self.handle, async move { inner.delete(&query).await })
    }

    fn delete_all(&self, query: &Query) -> Future<()> {
        let (inner, query) = (Arc::clone(&self.inner), query.clone());
        Future::spawn(&self.handle, async move { inner.delete_all(&query).await })
    }
}
