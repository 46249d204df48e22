//! Value mappers between representations.
//!
//! Mappers translate between storage, network and domain shapes. They are
//! pure and may fail; a failure travels as a [`HarmonyError`] like any other.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{HarmonyError, HarmonyResult};

/// Pure, fallible conversion from `From` to `To`.
pub trait Mapper<From, To>: Send + Sync {
    fn map(&self, from: From) -> HarmonyResult<To>;

    /// Map every element, stopping at the first failure.
    fn map_all(&self, from: Vec<From>) -> HarmonyResult<Vec<To>> {
        from.into_iter().map(|value| self.map(value)).collect()
    }
}

impl<From, To, F> Mapper<From, To> for F
where
    F: Fn(From) -> HarmonyResult<To> + Send + Sync,
{
    fn map(&self, from: From) -> HarmonyResult<To> {
        self(from)
    }
}

/// Returns its input.
pub struct IdentityMapper<T>(PhantomData<fn(T) -> T>);

impl<T> IdentityMapper<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for IdentityMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for IdentityMapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentityMapper")
    }
}

impl<T> Mapper<T, T> for IdentityMapper<T> {
    fn map(&self, from: T) -> HarmonyResult<T> {
        Ok(from)
    }
}

/// `first` followed by `second`.
pub struct ComposedMapper<A, B, M1, M2> {
    first: M1,
    second: M2,
    _types: PhantomData<fn(A) -> B>,
}

impl<A, B, M1, M2> ComposedMapper<A, B, M1, M2> {
    pub fn new(first: M1, second: M2) -> Self {
        Self {
            first,
            second,
            _types: PhantomData,
        }
    }
}

impl<A, B, C, M1, M2> Mapper<A, C> for ComposedMapper<A, B, M1, M2>
where
    M1: Mapper<A, B>,
    M2: Mapper<B, C>,
{
    fn map(&self, from: A) -> HarmonyResult<C> {
        self.second.map(self.first.map(from)?)
    }
}

/// Encodes a value to JSON bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingMapper;

impl<T: Serialize> Mapper<T, Vec<u8>> for EncodingMapper {
    fn map(&self, from: T) -> HarmonyResult<Vec<u8>> {
        Ok(serde_json::to_vec(&from)?)
    }
}

/// Decodes JSON bytes into a value.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodingMapper;

impl<T: DeserializeOwned> Mapper<Vec<u8>, T> for DecodingMapper {
    fn map(&self, from: Vec<u8>) -> HarmonyResult<T> {
        Ok(serde_json::from_slice(&from)?)
    }
}

/// Mapper that always fails; placeholder for directions that are never taken.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingMapper;

impl<From, To> Mapper<From, To> for FailingMapper {
    fn map(&self, _from: From) -> HarmonyResult<To> {
        Err(HarmonyError::failed("mapping is not supported"))
    }
}
