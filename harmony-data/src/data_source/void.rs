use std::fmt;
use std::marker::PhantomData;

use harmony_core::{HarmonyError, Query};
use harmony_future::Future;

use super::{DeleteDataSource, GetDataSource, PutDataSource};

/// Fails every call with `NotImplemented`.
///
/// Fills a slot that must hold a data source but is never meant to be used,
/// such as the cache side of a repository that only reads from the network.
pub struct VoidDataSource<T>(PhantomData<fn() -> T>);

impl<T> VoidDataSource<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for VoidDataSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for VoidDataSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VoidDataSource")
    }
}

impl<T: Clone + Send + 'static> GetDataSource<T> for VoidDataSource<T> {
    fn get(&self, _query: &Query) -> Future<T> {
        Future::error(HarmonyError::not_implemented())
    }

    fn get_all(&self, _query: &Query) -> Future<Vec<T>> {
        Future::error(HarmonyError::not_implemented())
    }
}

impl<T: Clone + Send + 'static> PutDataSource<T> for VoidDataSource<T> {
    fn put(&self, _value: Option<T>, _query: &Query) -> Future<T> {
        Future::error(HarmonyError::not_implemented())
    }

    fn put_all(&self, _values: Vec<T>, _query: &Query) -> Future<Vec<T>> {
        Future::error(HarmonyError::not_implemented())
    }
}

impl<T> DeleteDataSource for VoidDataSource<T> {
    fn delete(&self, _query: &Query) -> Future<()> {
        Future::error(HarmonyError::not_implemented())
    }

    fn delete_all(&self, _query: &Query) -> Future<()> {
        Future::error(HarmonyError::not_implemented())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harmony_core::DataError;

    #[test]
    fn test_every_call_fails() {
        let ds = VoidDataSource::<u8>::new();
        let q = Query::key("k");
        let not_implemented = HarmonyError::Data(DataError::NotImplemented);
        assert_eq!(ds.get(&q).wait().unwrap_err(), not_implemented);
        assert_eq!(ds.get_all(&q).wait().unwrap_err(), not_implemented);
        assert_eq!(ds.put(Some(1), &q).wait().unwrap_err(), not_implemented);
        assert_eq!(ds.put_all(vec![1], &q).wait().unwrap_err(), not_implemented);
        assert_eq!(ds.delete(&q).wait().unwrap_err(), not_implemented);
        assert_eq!(ds.delete_all(&Query::AllObjects).wait().unwrap_err(), not_implemented);
    }
}
