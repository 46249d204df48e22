//! Batching and zipping.
//!
//! Results keep input order no matter which input resolves first. The first
//! failure fails the combined value immediately, without waiting for the
//! remaining inputs.

use std::sync::{Arc, Mutex};

use harmony_core::HarmonyResult;

use crate::{lock, Future, Observable};

struct Slots<T> {
    values: Vec<Option<T>>,
    filled: usize,
}

impl<T: Clone> Slots<T> {
    fn new(len: usize) -> Self {
        Self {
            values: vec![None; len],
            filled: 0,
        }
    }

    /// Store `value` at `index`, returning the full snapshot once every slot
    /// holds a value.
    fn fill(&mut self, index: usize, value: T) -> Option<Vec<T>> {
        if self.values[index].replace(value).is_none() {
            self.filled += 1;
        }
        if self.filled == self.values.len() {
            self.values.iter().cloned().collect()
        } else {
            None
        }
    }
}

impl<T> Future<T>
where
    T: Clone + Send + 'static,
{
    /// Resolve with every input's value, in input order.
    ///
    /// An empty input resolves immediately with an empty vector.
    pub fn batch(futures: Vec<Future<T>>) -> Future<Vec<T>> {
        if futures.is_empty() {
            return Future::value(Vec::new());
        }

        let (batched, resolver) = Future::pending();
        let slots = Arc::new(Mutex::new(Slots::new(futures.len())));
        for (index, future) in futures.into_iter().enumerate() {
            let slots = Arc::clone(&slots);
            let resolver = resolver.clone();
            future.subscribe(move |result| match result {
                Ok(value) => {
                    let complete = lock(&slots).fill(index, value);
                    if let Some(values) = complete {
                        resolver.complete(Ok(values));
                    }
                }
                Err(error) => {
                    if !resolver.is_resolved() {
                        resolver.complete(Err(error));
                    }
                }
            });
        }
        batched
    }

    /// Pair this future's value with another's.
    pub fn zip<U>(&self, other: &Future<U>) -> Future<(T, U)>
    where
        U: Clone + Send + 'static,
    {
        let (zipped, resolver) = Future::pending();
        let pair: Arc<Mutex<(Option<T>, Option<U>)>> = Arc::new(Mutex::new((None, None)));

        let (left, left_resolver) = (Arc::clone(&pair), resolver.clone());
        self.subscribe(move |result| match result {
            Ok(value) => {
                let ready = {
                    let mut guard = lock(&left);
                    guard.0 = Some(value);
                    ready_pair(&*guard)
                };
                if let Some(both) = ready {
                    left_resolver.complete(Ok(both));
                }
            }
            Err(error) => {
                if !left_resolver.is_resolved() {
                    left_resolver.complete(Err(error));
                }
            }
        });

        other.subscribe(move |result| match result {
            Ok(value) => {
                let ready = {
                    let mut guard = lock(&pair);
                    guard.1 = Some(value);
                    ready_pair(&*guard)
                };
                if let Some(both) = ready {
                    resolver.complete(Ok(both));
                }
            }
            Err(error) => {
                if !resolver.is_resolved() {
                    resolver.complete(Err(error));
                }
            }
        });

        zipped
    }

    pub fn zip3<U, V>(&self, second: &Future<U>, third: &Future<V>) -> Future<(T, U, V)>
    where
        U: Clone + Send + 'static,
        V: Clone + Send + 'static,
    {
        self.zip(second)
            .zip(third)
            .map(|((a, b), c)| Ok((a, b, c)))
    }

    pub fn zip4<U, V, W>(
        &self,
        second: &Future<U>,
        third: &Future<V>,
        fourth: &Future<W>,
    ) -> Future<(T, U, V, W)>
    where
        U: Clone + Send + 'static,
        V: Clone + Send + 'static,
        W: Clone + Send + 'static,
    {
        self.zip3(second, third)
            .zip(fourth)
            .map(|((a, b, c), d)| Ok((a, b, c, d)))
    }
}

fn ready_pair<A: Clone, B: Clone>(pair: &(Option<A>, Option<B>)) -> Option<(A, B)> {
    match pair {
        (Some(a), Some(b)) => Some((a.clone(), b.clone())),
        _ => None,
    }
}

impl<T> Observable<T>
where
    T: Clone + Send + 'static,
{
    /// Emit the full snapshot, in input order, every time an input emits once
    /// all inputs have a value. Every input failure is forwarded.
    pub fn batch(observables: Vec<Observable<T>>) -> Observable<Vec<T>> {
        if observables.is_empty() {
            return Observable::value(Vec::new());
        }

        let (batched, resolver) = Observable::pending();
        let slots = Arc::new(Mutex::new(Slots::new(observables.len())));
        for (index, observable) in observables.into_iter().enumerate() {
            let slots = Arc::clone(&slots);
            let resolver = resolver.clone();
            observable.subscribe(move |result: HarmonyResult<T>| match result {
                Ok(value) => {
                    let snapshot = lock(&slots).fill(index, value);
                    if let Some(values) = snapshot {
                        resolver.set(values);
                    }
                }
                Err(error) => resolver.set_error(error),
            });
        }
        batched
    }

    /// Emit the latest pair whenever either side emits, once both have a
    /// value.
    pub fn zip<U>(&self, other: &Observable<U>) -> Observable<(T, U)>
    where
        U: Clone + Send + 'static,
    {
        let (zipped, resolver) = Observable::pending();
        let pair: Arc<Mutex<(Option<T>, Option<U>)>> = Arc::new(Mutex::new((None, None)));

        let (left, left_resolver) = (Arc::clone(&pair), resolver.clone());
        self.subscribe(move |result| match result {
            Ok(value) => {
                let ready = {
                    let mut guard = lock(&left);
                    guard.0 = Some(value);
                    ready_pair(&*guard)
                };
                if let Some(both) = ready {
                    left_resolver.set(both);
                }
            }
            Err(error) => left_resolver.set_error(error),
        });

        other.subscribe(move |result| match result {
            Ok(value) => {
                let ready = {
                    let mut guard = lock(&pair);
                    guard.1 = Some(value);
                    ready_pair(&*guard)
                };
                if let Some(both) = ready {
                    resolver.set(both);
                }
            }
            Err(error) => resolver.set_error(error),
        });

        zipped
    }

    pub fn zip3<U, V>(&self, second: &Observable<U>, third: &Observable<V>) -> Observable<(T, U, V)>
    where
        U: Clone + Send + 'static,
        V: Clone + Send + 'static,
    {
        self.zip(second)
            .zip(third)
            .map(|((a, b), c)| Ok((a, b, c)))
    }

    pub fn zip4<U, V, W>(
        &self,
        second: &Observable<U>,
        third: &Observable<V>,
        fourth: &Observable<W>,
    ) -> Observable<(T, U, V, W)>
    where
        U: Clone + Send + 'static,
        V: Clone + Send + 'static,
        W: Clone + Send + 'static,
    {
        self.zip3(second, third)
            .zip(fourth)
            .map(|((a, b, c), d)| Ok((a, b, c, d)))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Resolver;
    use harmony_core::HarmonyError;
    use proptest::prelude::*;

    #[test]
    fn test_batch_keeps_input_order_when_resolved_in_reverse() {
        let (futures, resolvers): (Vec<Future<usize>>, Vec<Resolver<usize>>) =
            (0..5).map(|_| Future::pending()).unzip();
        let batched = Future::batch(futures);
        for (i, resolver) in resolvers.iter().enumerate().rev() {
            assert!(!batched.is_resolved());
            resolver.set(i * 10).unwrap();
        }
        assert_eq!(batched.wait().unwrap(), vec![0, 10, 20, 30, 40]);
    }

    #[test]
    fn test_batch_empty_resolves_immediately() {
        let batched = Future::<u8>::batch(Vec::new());
        assert_eq!(batched.peek(), Some(Ok(Vec::new())));
    }

    #[test]
    fn test_batch_fails_on_first_error() {
        let (pending, _keep) = Future::<u8>::pending();
        let batched = Future::batch(vec![
            pending,
            Future::error(HarmonyError::not_found("second")),
        ]);
        assert!(batched.peek().unwrap().unwrap_err().is_not_found());
    }

    #[test]
    fn test_zip_heterogeneous() {
        let (name, name_resolver) = Future::<String>::pending();
        let zipped = Future::value(1u8).zip3(&name, &Future::value(true));
        assert!(!zipped.is_resolved());
        name_resolver.set("ada".into()).unwrap();
        assert_eq!(zipped.wait().unwrap(), (1, "ada".to_string(), true));

        let four = Future::value(1u8).zip4(&Future::value('x'), &Future::value(2i64), &Future::value(()));
        assert_eq!(four.wait().unwrap(), (1, 'x', 2, ()));
    }

    #[test]
    fn test_zip_fails_without_waiting_for_other_side() {
        let (never, _keep) = Future::<u8>::pending();
        let zipped = Future::<u8>::error(HarmonyError::failed("left")).zip(&never);
        assert!(zipped.peek().unwrap().is_err());
    }

    #[test]
    fn test_observable_batch_reemits_snapshots() {
        let (a, a_resolver) = Observable::<u8>::pending();
        let (b, b_resolver) = Observable::<u8>::pending();
        let batched = Observable::batch(vec![a, b]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        batched.subscribe(move |r| sink.lock().unwrap().push(r));

        a_resolver.set(1);
        b_resolver.set(2);
        a_resolver.set(3);
        b_resolver.set_error(HarmonyError::failed("b down"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], Ok(vec![1, 2]));
        assert_eq!(seen[1], Ok(vec![3, 2]));
        assert!(seen[2].is_err());
    }

    #[test]
    fn test_observable_zip_tracks_latest() {
        let (a, a_resolver) = Observable::<u8>::pending();
        let (b, b_resolver) = Observable::<char>::pending();
        let zipped = a.zip(&b);
        a_resolver.set(1);
        assert_eq!(zipped.latest(), None);
        b_resolver.set('x');
        assert_eq!(zipped.latest(), Some(Ok((1, 'x'))));
        a_resolver.set(2);
        assert_eq!(zipped.latest(), Some(Ok((2, 'x'))));
    }

    proptest! {
        #[test]
        fn prop_batch_order_independent_of_resolution_order(
            order in Just((0..8usize).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let (futures, resolvers): (Vec<Future<usize>>, Vec<Resolver<usize>>) =
                (0..order.len()).map(|_| Future::pending()).unzip();
            let batched = Future::batch(futures);
            for &i in &order {
                resolvers[i].set(i * 3).unwrap();
            }
            let expected: Vec<usize> = (0..order.len()).map(|i| i * 3).collect();
            prop_assert_eq!(batched.wait().unwrap(), expected);
        }
    }
}
