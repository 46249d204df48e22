//! Data source adapter between two representations.

use std::sync::Arc;

use harmony_core::{Mapper, Query};
use harmony_future::Future;

use super::{DeleteDataSource, GetDataSource, PutDataSource};

/// Exposes a data source of `In` values as a data source of `Out` values.
///
/// Reads are mapped with `to_out`; values being written are mapped with
/// `to_in` first, and what the inner source stored is mapped back. A mapping
/// failure fails the call.
pub struct DataSourceMapper<In, Out, D> {
    source: D,
    to_out: Arc<dyn Mapper<In, Out>>,
    to_in: Arc<dyn Mapper<Out, In>>,
}

impl<In, Out, D> DataSourceMapper<In, Out, D> {
    pub fn new<M1, M2>(source: D, to_out: M1, to_in: M2) -> Self
    where
        M1: Mapper<In, Out> + 'static,
        M2: Mapper<Out, In> + 'static,
    {
        Self {
            source,
            to_out: Arc::new(to_out),
            to_in: Arc::new(to_in),
        }
    }
}

impl<In, Out, D> GetDataSource<Out> for DataSourceMapper<In, Out, D>
where
    In: Clone + Send + 'static,
    Out: Clone + Send + 'static,
    D: GetDataSource<In>,
{
    fn get(&self, query: &Query) -> Future<Out> {
        let to_out = Arc::clone(&self.to_out);
        self.source.get(query).map(move |value| to_out.map(value))
    }

    fn get_all(&self, query: &Query) -> Future<Vec<Out>> {
        let to_out = Arc::clone(&self.to_out);
        self.source.get_all(query).map(move |values| to_out.map_all(values))
    }
}

impl<In, Out, D> PutDataSource<Out> for DataSourceMapper<In, Out, D>
where
    In: Clone + Send + 'static,
    Out: Clone + Send + 'static,
    D: PutDataSource<In>,
{
    fn put(&self, value: Option<Out>, query: &Query) -> Future<Out> {
        let mapped = match value.map(|value| self.to_in.map(value)).transpose() {
            Ok(mapped) => mapped,
            Err(error) => return Future::error(error),
        };
        let to_out = Arc::clone(&self.to_out);
        self.source.put(mapped, query).map(move |stored| to_out.map(stored))
    }

    fn put_all(&self, values: Vec<Out>, query: &Query) -> Future<Vec<Out>> {
        let mapped = match self.to_in.map_all(values) {
            Ok(mapped) => mapped,
            Err(error) => return Future::error(error),
        };
        let to_out = Arc::clone(&self.to_out);
        self.source
            .put_all(mapped, query)
            .map(move |stored| to_out.map_all(stored))
    }
}

impl<In, Out, D> DeleteDataSource for DataSourceMapper<In, Out, D>
where
    D: DeleteDataSource,
{
    fn delete(&self, query: &Query) -> Future<()> {
        self.source.delete(query)
    }

    fn delete_all(&self, query: &Query) -> Future<()> {
        self.source.delete_all(query)
    }
}
