//! Single-shot asynchronous value.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use harmony_core::{HarmonyError, HarmonyResult};

use crate::{lock, timer, AlreadyResolved, Executor, Observable};

type Callback<T> = Box<dyn FnOnce(HarmonyResult<T>) + Send>;

struct State<T> {
    result: Option<HarmonyResult<T>>,
    callbacks: Vec<Callback<T>>,
    /// The resolving thread is still running callbacks.
    delivering: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    resolved: Condvar,
}

impl<T> Shared<T> {
    fn new(result: Option<HarmonyResult<T>>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                result,
                callbacks: Vec::new(),
                delivering: false,
            }),
            resolved: Condvar::new(),
        })
    }
}

/// A value that becomes available at most once.
///
/// Handles are cheap to clone and all observe the same result. Every callback
/// receives its own clone of the value, in registration order.
///
/// # Example
///
/// ```
/// use harmony_future::Future;
///
/// let (future, resolver) = Future::<u32>::pending();
/// let doubled = future.map(|v| Ok(v * 2));
/// resolver.set(21).unwrap();
/// assert_eq!(doubled.wait().unwrap(), 42);
/// ```
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.shared.state);
        let status = match &state.result {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("Future")
            .field("state", &status)
            .field("callbacks", &state.callbacks.len())
            .finish()
    }
}

/// Write side of a [`Future`].
///
/// Cloning a resolver does not allow resolving twice: the first `set*` call
/// wins and later calls return [`AlreadyResolved`].
pub struct Resolver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("resolved", &lock(&self.shared.state).result.is_some())
            .finish()
    }
}

impl<T> Resolver<T>
where
    T: Clone + Send + 'static,
{
    pub fn set(&self, value: T) -> Result<(), AlreadyResolved> {
        self.set_result(Ok(value))
    }

    pub fn set_error(&self, error: impl Into<HarmonyError>) -> Result<(), AlreadyResolved> {
        self.set_result(Err(error.into()))
    }

    /// Resolve with `result` and deliver it to every pending callback.
    ///
    /// A second call is rejected and logged at error level; the first result
    /// is never overwritten.
    pub fn set_result(&self, result: HarmonyResult<T>) -> Result<(), AlreadyResolved> {
        let mut callbacks = {
            let mut state = lock(&self.shared.state);
            if state.result.is_some() {
                tracing::error!(
                    rejected_ok = result.is_ok(),
                    "future resolved twice, keeping the first result"
                );
                return Err(AlreadyResolved);
            }
            state.result = Some(result.clone());
            state.delivering = true;
            std::mem::take(&mut state.callbacks)
        };
        self.shared.resolved.notify_all();

        // Callbacks registered while these run are queued behind them
        loop {
            for callback in callbacks {
                callback(result.clone());
            }
            let mut state = lock(&self.shared.state);
            callbacks = std::mem::take(&mut state.callbacks);
            if callbacks.is_empty() {
                state.delivering = false;
                return Ok(());
            }
        }
    }

    /// Adopt the resolution of another future.
    pub fn set_future(&self, future: &Future<T>) {
        let resolver = self.clone();
        future.subscribe(move |result| resolver.complete(result));
    }

    pub fn is_resolved(&self) -> bool {
        lock(&self.shared.state).result.is_some()
    }

    /// Resolve a future this crate created and owns exclusively.
    pub(crate) fn complete(&self, result: HarmonyResult<T>) {
        // Rejections are already logged by set_result
        let _ = self.set_result(result);
    }
}

impl<T> Future<T>
where
    T: Clone + Send + 'static,
{
    /// A pending future together with its resolver.
    pub fn pending() -> (Self, Resolver<T>) {
        let shared = Shared::new(None);
        let resolver = Resolver {
            shared: Arc::clone(&shared),
        };
        (Self { shared }, resolver)
    }

    /// Run `body` with the resolver of a new pending future.
    pub fn create<F>(body: F) -> Self
    where
        F: FnOnce(Resolver<T>),
    {
        let (future, resolver) = Self::pending();
        body(resolver);
        future
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

    pub fn is_resolved(&self) -> bool {
        lock(&self.shared.state).result.is_some()
    }

    /// The result, if already known. Never blocks.
    pub fn peek(&self) -> Option<HarmonyResult<T>> {
        lock(&self.shared.state).result.clone()
    }

    /// Block the current thread until the future resolves.
    ///
    /// Deadlocks if the resolution depends on work queued for this same
    /// thread, e.g. on a [`MainThreadExecutor`](crate::MainThreadExecutor)
    /// it owns.
    pub fn wait(&self) -> HarmonyResult<T> {
        let mut state = lock(&self.shared.state);
        loop {
            if let Some(result) = &state.result {
                return result.clone();
            }
            state = self
                .shared
                .resolved
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`Future::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<HarmonyResult<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.shared.state);
        loop {
            if let Some(result) = &state.result {
                return Some(result.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = self
                .shared
                .resolved
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Register a callback for the result.
    ///
    /// Runs immediately on this thread if the future is already resolved and
    /// its earlier callbacks have run. Otherwise it runs exactly once on the
    /// resolving thread, after every callback registered before it.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: FnOnce(HarmonyResult<T>) + Send + 'static,
    {
        let ready = {
            let mut state = lock(&self.shared.state);
            match &state.result {
                Some(result) if !state.delivering => result.clone(),
                _ => {
                    state.callbacks.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(ready);
    }

    /// Register success and failure callbacks; exactly one of them fires.
    pub fn resolve<S, E>(&self, on_success: S, on_failure: E)
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(HarmonyError) + Send + 'static,
    {
        self.subscribe(move |result| match result {
            Ok(value) => on_success(value),
            Err(error) => on_failure(error),
        });
    }

    /// Derive a future from this one's result.
    fn derive<U, F>(&self, on_result: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(HarmonyResult<T>, Resolver<U>) + Send + 'static,
    {
        let (future, resolver) = Future::pending();
        self.subscribe(move |result| on_result(result, resolver));
        future
    }

    /// Transform the value. An `Err` from `transform` fails the derived
    /// future; a failed source skips `transform` entirely.
    pub fn map<U, F>(&self, transform: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> HarmonyResult<U> + Send + 'static,
    {
        self.derive(move |result, resolver| resolver.complete(result.and_then(transform)))
    }

    /// Chain a future-returning step and adopt its resolution.
    pub fn flat_map<U, F>(&self, transform: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        self.derive(move |result, resolver| match result {
            Ok(value) => resolver.set_future(&transform(value)),
            Err(error) => resolver.complete(Err(error)),
        })
    }

    /// Replace a failure with the resolution of another future.
    pub fn recover<F>(&self, recovery: F) -> Future<T>
    where
        F: FnOnce(HarmonyError) -> Future<T> + Send + 'static,
    {
        self.derive(move |result, resolver| match result {
            Ok(value) => resolver.complete(Ok(value)),
            Err(error) => resolver.set_future(&recovery(error)),
        })
    }

    pub fn map_error<F>(&self, transform: F) -> Future<T>
    where
        F: FnOnce(HarmonyError) -> HarmonyError + Send + 'static,
    {
        self.derive(move |result, resolver| resolver.complete(result.map_err(transform)))
    }

    /// Transform either outcome into a new result.
    pub fn map_result<U, F>(&self, transform: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(HarmonyResult<T>) -> HarmonyResult<U> + Send + 'static,
    {
        self.derive(move |result, resolver| resolver.complete(transform(result)))
    }

    /// Chain a future-returning step that sees either outcome.
    ///
    /// Unlike [`flat_map`](Self::flat_map) followed by
    /// [`recover`](Self::recover), a failure of the chained step is never
    /// handed back to the recovery branch.
    pub fn chain<U, F>(&self, next: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(HarmonyResult<T>) -> Future<U> + Send + 'static,
    {
        self.derive(move |result, resolver| resolver.set_future(&next(result)))
    }

    /// Fail with the error returned by `check`, or pass the value through.
    pub fn filter<F>(&self, check: F) -> Future<T>
    where
        F: FnOnce(&T) -> HarmonyResult<()> + Send + 'static,
    {
        self.derive(move |result, resolver| {
            let result = result.and_then(|value| check(&value).map(|()| value));
            resolver.complete(result)
        })
    }

    /// Side effect on success. The returned future resolves after it ran.
    pub fn then<F>(&self, on_value: F) -> Future<T>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.derive(move |result, resolver| {
            if let Ok(value) = &result {
                on_value(value);
            }
            resolver.complete(result)
        })
    }

    /// Side effect on failure. The returned future resolves after it ran.
    pub fn fail<F>(&self, on_error: F) -> Future<T>
    where
        F: FnOnce(&HarmonyError) + Send + 'static,
    {
        self.derive(move |result, resolver| {
            if let Err(error) = &result {
                on_error(error);
            }
            resolver.complete(result)
        })
    }

    /// Side effect on either outcome.
    pub fn on_completion<F>(&self, done: F) -> Future<T>
    where
        F: FnOnce() + Send + 'static,
    {
        self.derive(move |result, resolver| {
            done();
            resolver.complete(result)
        })
    }

    /// Deliver the result through `executor` instead of the resolving thread.
    pub fn on(&self, executor: Arc<dyn Executor>) -> Future<T> {
        self.derive(move |result, resolver| {
            executor.submit(Box::new(move || resolver.complete(result)));
        })
    }

    /// Resolve `interval` after this future does, delivering on `executor`.
    pub fn with_delay(&self, interval: Duration, executor: Arc<dyn Executor>) -> Future<T> {
        self.derive(move |result, resolver| {
            timer::schedule(
                interval,
                Box::new(move || {
                    executor.submit(Box::new(move || resolver.complete(result)));
                }),
            );
        })
    }

    /// An observable that emits this future's result once.
    pub fn to_observable(&self) -> Observable<T> {
        let (observable, resolver) = Observable::pending();
        self.subscribe(move |result| resolver.set_result(result));
        observable
    }
}

impl<T> From<HarmonyResult<T>> for Future<T>
where
    T: Clone + Send + 'static,
{
    fn from(result: HarmonyResult<T>) -> Self {
        Self::from_result(result)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DirectExecutor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_second_set_is_rejected() {
        let (future, resolver) = Future::pending();
        assert_eq!(resolver.set(1), Ok(()));
        assert_eq!(resolver.set(2), Err(AlreadyResolved));
        assert_eq!(
            resolver.set_error(HarmonyError::failed("late")),
            Err(AlreadyResolved)
        );
        assert_eq!(future.wait().unwrap(), 1);
    }

    #[test]
    fn test_callbacks_fire_once_in_registration_order() {
        let (future, resolver) = Future::<u8>::pending();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            future.subscribe(move |_| order.lock().unwrap().push(i));
        }
        resolver.set(9).unwrap();
        let _ = resolver.set(10);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_callback_added_from_other_thread_during_delivery_keeps_order() {
        let (future, resolver) = Future::<u8>::pending();
        let order = Arc::new(Mutex::new(Vec::new()));

        let (handle, sink) = (future.clone(), order.clone());
        future.subscribe(move |_| {
            sink.lock().unwrap().push("a");
            let (handle, sink) = (handle.clone(), sink.clone());
            thread::spawn(move || handle.subscribe(move |_| sink.lock().unwrap().push("c")))
                .join()
                .unwrap();
        });
        let sink = order.clone();
        future.subscribe(move |_| sink.lock().unwrap().push("b"));

        resolver.set(1).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);

        let sink = order.clone();
        future.subscribe(move |_| sink.lock().unwrap().push("d"));
        assert_eq!(order.lock().unwrap().last(), Some(&"d"));
    }

    #[test]
    fn test_late_callback_fires_immediately() {
        let future = Future::value("ready".to_string());
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        future.resolve(move |v| *sink.lock().unwrap() = Some(v), |_| panic!("no error"));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("ready"));
    }

    #[test]
    fn test_map_error_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mapped = Future::value(3).map(move |_| -> HarmonyResult<u32> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(HarmonyError::illegal_argument("bad value"))
        });
        assert!(mapped.wait().unwrap_err().to_string().contains("bad value"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let skipped = Arc::new(AtomicUsize::new(0));
        let counter = skipped.clone();
        let failed = Future::<u32>::error(HarmonyError::not_found("x")).map(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(v)
        });
        assert!(failed.wait().unwrap_err().is_not_found());
        assert_eq!(skipped.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_flat_map_adopts_nested_resolution() {
        let (inner, inner_resolver) = Future::<String>::pending();
        let inner_handle = inner.clone();
        let chained = Future::value(5).flat_map(move |_| inner_handle);
        assert!(!chained.is_resolved());
        inner_resolver.set("nested".into()).unwrap();
        assert_eq!(chained.wait().unwrap(), "nested");
    }

    #[test]
    fn test_recover_and_map_error() {
        let recovered = Future::<u8>::error(HarmonyError::failed("offline"))
            .recover(|_| Future::value(7));
        assert_eq!(recovered.wait().unwrap(), 7);

        let renamed = Future::<u8>::error(HarmonyError::failed("offline"))
            .map_error(|_| HarmonyError::not_found("user"));
        assert!(renamed.wait().unwrap_err().is_not_found());
    }

    #[test]
    fn test_chain_does_not_recover_its_own_failure() {
        let recovered = Future::<u8>::error(HarmonyError::failed("main"))
            .chain(|result| match result {
                Ok(v) => Future::value(v),
                Err(_) => Future::value(9),
            });
        assert_eq!(recovered.wait().unwrap(), 9);

        let chained = Future::value(1u8).chain(|_| Future::<u8>::error(HarmonyError::not_valid("rejected")));
        assert!(chained.wait().unwrap_err().is_not_valid());

        let mapped = Future::<u8>::error(HarmonyError::failed("x")).map_result(|r| Ok(r.is_err()));
        assert_eq!(mapped.wait().unwrap(), true);
    }

    #[test]
    fn test_filter_rejects_value() {
        let filtered = Future::value(-1i32).filter(|v| {
            if *v >= 0 {
                Ok(())
            } else {
                Err(HarmonyError::illegal_argument("negative"))
            }
        });
        assert!(filtered.wait().is_err());
        assert_eq!(Future::value(4i32).filter(|_| Ok(())).wait().unwrap(), 4);
    }

    #[test]
    fn test_then_fail_and_completion_side_effects() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (a, b, c) = (hits.clone(), hits.clone(), hits.clone());
        let ok = Future::value(1)
            .then(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .fail(move |_| {
                b.fetch_add(100, Ordering::SeqCst);
            })
            .on_completion(move || {
                c.fetch_add(10, Ordering::SeqCst);
            });
        assert_eq!(ok.wait().unwrap(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_resolution_from_another_thread() {
        let future = Future::create(|resolver| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                resolver.set(99u64).unwrap();
            });
        });
        assert_eq!(future.wait_timeout(Duration::from_secs(5)), Some(Ok(99)));
    }

    #[test]
    fn test_wait_timeout_on_pending() {
        let (future, _resolver) = Future::<u8>::pending();
        assert_eq!(future.wait_timeout(Duration::from_millis(20)), None);
        assert_eq!(future.peek(), None);
    }

    #[test]
    fn test_derived_future_outlives_dropped_parent() {
        let (parent, resolver) = Future::<u8>::pending();
        let child = parent.map(|v| Ok(v + 1));
        drop(parent);
        resolver.set(1).unwrap();
        assert_eq!(child.wait().unwrap(), 2);
    }

    #[test]
    fn test_with_delay_waits_for_interval() {
        let started = Instant::now();
        let delayed = Future::value(1u8)
            .with_delay(Duration::from_millis(40), Arc::new(DirectExecutor::new()));
        assert_eq!(delayed.wait_timeout(Duration::from_secs(5)), Some(Ok(1)));
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_to_observable_emits_once() {
        let observable = Future::value(3u8).to_observable();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        observable.subscribe(move |r| sink.lock().unwrap().push(r.unwrap()));
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }
}
