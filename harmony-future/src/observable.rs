//! Multi-shot asynchronous value.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use harmony_core::{HarmonyError, HarmonyResult};

use crate::{lock, timer, Executor, Future};

type Observer<T> = Arc<dyn Fn(HarmonyResult<T>) + Send + Sync>;

enum Delivery<T> {
    /// A new emission for every registered observer.
    All(HarmonyResult<T>),
    /// Replay of the current value to a newly registered observer.
    One(HarmonyResult<T>, Observer<T>),
}

struct State<T> {
    last: Option<HarmonyResult<T>>,
    observers: Vec<(u64, Observer<T>)>,
    next_id: u64,
    queue: VecDeque<Delivery<T>>,
    delivering: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
}

impl<T> Shared<T>
where
    T: Clone + Send + 'static,
{
    fn new(last: Option<HarmonyResult<T>>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                last,
                observers: Vec::new(),
                next_id: 0,
                queue: VecDeque::new(),
                delivering: false,
            }),
        })
    }

    /// Record `result` as the latest value and queue it for every observer.
    fn emit(&self, result: HarmonyResult<T>) {
        self.enqueue(|state| {
            state.last = Some(result.clone());
            state.queue.push_back(Delivery::All(result));
        });
    }

    /// Apply `update` under the lock, then drain the queue unless another
    /// call is already draining it. Observers run without the lock held.
    fn enqueue<F>(&self, update: F)
    where
        F: FnOnce(&mut State<T>),
    {
        {
            let mut state = lock(&self.state);
            update(&mut state);
            if state.delivering {
                return;
            }
            state.delivering = true;
        }

        loop {
            let (result, targets) = {
                let mut state = lock(&self.state);
                match state.queue.pop_front() {
                    Some(Delivery::All(result)) => {
                        let targets = state.observers.iter().map(|(_, o)| Arc::clone(o)).collect();
                        (result, targets)
                    }
                    Some(Delivery::One(result, observer)) => (result, vec![observer]),
                    None => {
                        state.delivering = false;
                        return;
                    }
                }
            };
            for observer in targets {
                observer(result.clone());
            }
        }
    }

    fn remove(&self, id: u64) {
        lock(&self.state).observers.retain(|(observer_id, _)| *observer_id != id);
    }
}

/// Handle to one registered observer.
///
/// Dropping the handle keeps the observer registered; call
/// [`Subscription::unsubscribe`] to remove it. An emission already being
/// delivered may still reach it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    pub(crate) fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A value that may be resolved any number of times.
///
/// Observers stay registered and see every emission, in the order emissions
/// were produced. A new observer immediately receives the latest emission,
/// if there is one.
///
/// Emissions are serialized through a delivery queue: a `set` issued from
/// inside an observer, or from another thread while observers are running,
/// is delivered after the current emission finishes.
pub struct Observable<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.shared.state);
        f.debug_struct("Observable")
            .field("has_value", &state.last.is_some())
            .field("observers", &state.observers.len())
            .field("queued", &state.queue.len())
            .finish()
    }
}

/// Write side of an [`Observable`].
pub struct ObservableResolver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ObservableResolver<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for ObservableResolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableResolver").finish_non_exhaustive()
    }
}

impl<T> ObservableResolver<T>
where
    T: Clone + Send + 'static,
{
    pub fn set(&self, value: T) {
        self.set_result(Ok(value));
    }

    pub fn set_error(&self, error: impl Into<HarmonyError>) {
        self.set_result(Err(error.into()));
    }

    pub fn set_result(&self, result: HarmonyResult<T>) {
        self.shared.emit(result);
    }

    /// Forward every emission of `observable`.
    pub fn set_observable(&self, observable: &Observable<T>) {
        let resolver = self.clone();
        observable.subscribe(move |result| resolver.set_result(result));
    }

    /// Forward the single resolution of `future`.
    pub fn set_future(&self, future: &Future<T>) {
        let resolver = self.clone();
        future.subscribe(move |result| resolver.set_result(result));
    }
}

impl<T> Observable<T>
where
    T: Clone + Send + 'static,
{
    pub fn pending() -> (Self, ObservableResolver<T>) {
        let shared = Shared::new(None);
        let resolver = ObservableResolver {
            shared: Arc::clone(&shared),
        };
        (Self { shared }, resolver)
    }

    pub fn create<F>(body: F) -> Self
    where
        F: FnOnce(ObservableResolver<T>),
    {
        let (observable, resolver) = Self::pending();
        body(resolver);
        observable
    }

    pub fn value(value: T) -> Self {
        Self::from_result(Ok(value))
    }

    pub fn error(error: impl Into<HarmonyError>) -> Self {
        Self::from_result(Err(error.into()))
    }

    pub fn from_result(result: HarmonyResult<T>) -> Self {
        Self {
            shared: Shared::new(Some(result)),
        }
    }

    /// The latest emission, if any.
    pub fn latest(&self) -> Option<HarmonyResult<T>> {
        lock(&self.shared.state).last.clone()
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        lock(&self.shared.state).observers.len()
    }

    /// Register an observer for every current and future emission.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(HarmonyResult<T>) + Send + Sync + 'static,
    {
        let observer: Observer<T> = Arc::new(observer);
        let mut id = 0;
        self.shared.enqueue(|state| {
            id = state.next_id;
            state.next_id += 1;
            state.observers.push((id, Arc::clone(&observer)));
            // A queued emission reaches the new observer when it is drained;
            // replays queued for other observers do not.
            let emission_queued = state.queue.iter().any(|d| matches!(d, Delivery::All(_)));
            if !emission_queued {
                if let Some(result) = state.last.clone() {
                    state.queue.push_back(Delivery::One(result, observer));
                }
            }
        });

        let shared: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(shared) = shared.upgrade() {
                    shared.remove(id);
                }
            })),
        }
    }

    /// Register success and failure observers; one of them fires per emission.
    pub fn resolve<S, E>(&self, on_success: S, on_failure: E)
    where
        S: Fn(T) + Send + Sync + 'static,
        E: Fn(HarmonyError) + Send + Sync + 'static,
    {
        self.subscribe(move |result| match result {
            Ok(value) => on_success(value),
            Err(error) => on_failure(error),
        });
    }

    fn derive<U, F>(&self, on_result: F) -> Observable<U>
    where
        U: Clone + Send + 'static,
        F: Fn(HarmonyResult<T>, &ObservableResolver<U>) + Send + Sync + 'static,
    {
        let (observable, resolver) = Observable::pending();
        self.subscribe(move |result| on_result(result, &resolver));
        observable
    }

    pub fn map<U, F>(&self, transform: F) -> Observable<U>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> HarmonyResult<U> + Send + Sync + 'static,
    {
        self.derive(move |result, resolver| resolver.set_result(result.and_then(&transform)))
    }

    /// Chain an observable-returning step; every emission of each nested
    /// observable is forwarded.
    pub fn flat_map<U, F>(&self, transform: F) -> Observable<U>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> Observable<U> + Send + Sync + 'static,
    {
        self.derive(move |result, resolver| match result {
            Ok(value) => resolver.set_observable(&transform(value)),
            Err(error) => resolver.set_error(error),
        })
    }

    pub fn recover<F>(&self, recovery: F) -> Observable<T>
    where
        F: Fn(HarmonyError) -> Observable<T> + Send + Sync + 'static,
    {
        self.derive(move |result, resolver| match result {
            Ok(value) => resolver.set(value),
            Err(error) => resolver.set_observable(&recovery(error)),
        })
    }

    pub fn map_error<F>(&self, transform: F) -> Observable<T>
    where
        F: Fn(HarmonyError) -> HarmonyError + Send + Sync + 'static,
    {
        self.derive(move |result, resolver| resolver.set_result(result.map_err(&transform)))
    }

    pub fn filter<F>(&self, check: F) -> Observable<T>
    where
        F: Fn(&T) -> HarmonyResult<()> + Send + Sync + 'static,
    {
        self.derive(move |result, resolver| {
            resolver.set_result(result.and_then(|value| check(&value).map(|()| value)))
        })
    }

    pub fn then<F>(&self, on_value: F) -> Observable<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.derive(move |result, resolver| {
            if let Ok(value) = &result {
                on_value(value);
            }
            resolver.set_result(result)
        })
    }

    pub fn fail<F>(&self, on_error: F) -> Observable<T>
    where
        F: Fn(&HarmonyError) + Send + Sync + 'static,
    {
        self.derive(move |result, resolver| {
            if let Err(error) = &result {
                on_error(error);
            }
            resolver.set_result(result)
        })
    }

    pub fn on_completion<F>(&self, done: F) -> Observable<T>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.derive(move |result, resolver| {
            done();
            resolver.set_result(result)
        })
    }

    pub fn on(&self, executor: Arc<dyn Executor>) -> Observable<T> {
        self.derive(move |result, resolver| {
            let resolver = resolver.clone();
            executor.submit(Box::new(move || resolver.set_result(result)));
        })
    }

    /// Re-emit each emission `interval` after it was produced, on `executor`.
    pub fn with_delay(&self, interval: Duration, executor: Arc<dyn Executor>) -> Observable<T> {
        self.derive(move |result, resolver| {
            let resolver = resolver.clone();
            let executor = Arc::clone(&executor);
            timer::schedule(
                interval,
                Box::new(move || {
                    executor.submit(Box::new(move || resolver.set_result(result)));
                }),
            );
        })
    }

    /// A future resolved with the first emission.
    ///
    /// Later emissions are ignored.
    pub fn first(&self) -> Future<T> {
        let (future, resolver) = Future::pending();
        self.subscribe(move |result| {
            if !resolver.is_resolved() {
                resolver.complete(result);
            }
        });
        future
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn collect<T>(observable: &Observable<T>) -> Arc<Mutex<Vec<HarmonyResult<T>>>>
    where
        T: Clone + Send + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        observable.subscribe(move |r| sink.lock().unwrap().push(r));
        seen
    }

    #[test]
    fn test_observers_see_every_emission() {
        let (observable, resolver) = Observable::pending();
        let seen = collect(&observable);
        resolver.set(1);
        resolver.set(2);
        resolver.set_error(HarmonyError::failed("x"));
        resolver.set(3);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[1], Ok(2));
        assert!(seen[2].is_err());
        assert_eq!(seen[3], Ok(3));
    }

    #[test]
    fn test_new_observer_gets_latest() {
        let (observable, resolver) = Observable::pending();
        resolver.set("a");
        resolver.set("b");
        let seen = collect(&observable);
        resolver.set("c");
        assert_eq!(*seen.lock().unwrap(), vec![Ok("b"), Ok("c")]);
    }

    #[test]
    fn test_observers_added_inside_callback_get_latest() {
        let (observable, resolver) = Observable::<u32>::pending();
        let late = Arc::new(Mutex::new(Vec::new()));

        let handle = observable.clone();
        let sink = late.clone();
        let added = Arc::new(AtomicUsize::new(0));
        observable.subscribe(move |_| {
            if added.fetch_add(1, Ordering::SeqCst) > 0 {
                return;
            }
            for name in ["c", "d"] {
                let sink = sink.clone();
                handle.subscribe(move |r| sink.lock().unwrap().push((name, r.unwrap())));
            }
        });

        resolver.set(7);
        assert_eq!(*late.lock().unwrap(), vec![("c", 7), ("d", 7)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let (observable, resolver) = Observable::<u8>::pending();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let subscription = observable.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let kept = collect(&observable);

        resolver.set(1);
        subscription.unsubscribe();
        resolver.set(2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(observable.observer_count(), 1);
        assert_eq!(*kept.lock().unwrap(), vec![Ok(1), Ok(2)]);
    }

    #[test]
    fn test_latest_matches_last_delivery_under_contention() {
        let (observable, resolver) = Observable::<usize>::pending();
        let seen = collect(&observable);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let resolver = resolver.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        resolver.set(t * 100 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let delivered = seen.lock().unwrap().last().cloned();
        assert_eq!(delivered, observable.latest());
    }

    #[test]
    fn test_reentrant_set_is_delivered_after_current() {
        let (observable, resolver) = Observable::<u32>::pending();
        let order = Arc::new(Mutex::new(Vec::new()));

        let echo = resolver.clone();
        let first = order.clone();
        observable.subscribe(move |r| {
            let v = r.unwrap();
            first.lock().unwrap().push(("first", v));
            if v == 1 {
                echo.set(2);
            }
        });
        let second = order.clone();
        observable.subscribe(move |r| second.lock().unwrap().push(("second", r.unwrap())));

        resolver.set(1);
        assert_eq!(
            *order.lock().unwrap(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[test]
    fn test_concurrent_emissions_are_serialized() {
        let (observable, resolver) = Observable::<usize>::pending();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let total = Arc::new(AtomicUsize::new(0));
        {
            let (in_flight, overlaps, total) = (in_flight.clone(), overlaps.clone(), total.clone());
            observable.subscribe(move |_| {
                if in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                thread::yield_now();
                in_flight.fetch_sub(1, Ordering::SeqCst);
                total.fetch_add(1, Ordering::SeqCst);
            });
        }

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let resolver = resolver.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        resolver.set(t * 100 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(total.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn test_map_applies_to_each_emission() {
        let (observable, resolver) = Observable::<i32>::pending();
        let mapped = observable.map(|v| {
            if v < 0 {
                Err(HarmonyError::illegal_argument("negative"))
            } else {
                Ok(v * 10)
            }
        });
        let seen = collect(&mapped);
        resolver.set(1);
        resolver.set(-1);
        resolver.set(2);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], Ok(10));
        assert!(seen[1].is_err());
        assert_eq!(seen[2], Ok(20));
    }

    #[test]
    fn test_flat_map_forwards_nested_emissions() {
        let (nested, nested_resolver) = Observable::<String>::pending();
        let nested_handle = nested.clone();
        let chained = Observable::value(1u8).flat_map(move |_| nested_handle.clone());
        let seen = collect(&chained);
        nested_resolver.set("x".into());
        nested_resolver.set("y".into());
        assert_eq!(*seen.lock().unwrap(), vec![Ok("x".to_string()), Ok("y".to_string())]);
    }

    #[test]
    fn test_first_takes_only_first_emission() {
        let (observable, resolver) = Observable::pending();
        let first = observable.first();
        resolver.set(5u8);
        resolver.set(6u8);
        assert_eq!(first.wait().unwrap(), 5);
    }

    #[test]
    fn test_recover_replaces_errors() {
        let recovered = Observable::<u8>::error(HarmonyError::failed("down"))
            .recover(|_| Observable::value(0));
        assert_eq!(recovered.latest(), Some(Ok(0)));
    }
}
