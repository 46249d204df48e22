//! Harmony Data - Data Sources and Repositories
//!
//! Data sources talk to a single store. Repositories combine data sources
//! and route each call according to an [`Operation`](harmony_core::Operation).
//! Every call returns a [`Future`](harmony_future::Future).

pub mod data_source;
pub mod repository;

pub use data_source::{
    AsyncDataSource, AsyncDataSourceAdapter, AsyncDeleteDataSource, AsyncGetDataSource,
    AsyncPutDataSource, DataSource, DataSourceMapper, DataSourceValidator, DeleteDataSource,
    FutureDataSourceAdapter, GetDataSource, InMemoryDataSource, PutDataSource, RetryDataSource,
    RetryPredicate, TimedCacheDataSource, VoidDataSource,
};
pub use repository::{
    CacheRepository, DeleteRepository, GetRepository, PutRepository, Repository,
    RepositoryMapper, SingleDataSourceRepository,
};
