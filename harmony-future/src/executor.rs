//! Executors: where submitted work runs.
//!
//! | executor | runs jobs on |
//! |----------|--------------|
//! | [`DirectExecutor`] | the submitting thread, inline |
//! | [`SerialExecutor`] | one dedicated worker thread, FIFO |
//! | [`MainThreadExecutor`] | whichever thread calls `drain`/`run_until` |
//! | [`TokioExecutor`] | a tokio runtime's blocking pool |

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use harmony_core::{HarmonyConfig, HarmonyError, HarmonyResult};

use crate::{lock, Future, Resolver};

/// A unit of work submitted to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

static EXECUTOR_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Next generated executor name, `harmony.executor.<n>`.
pub fn next_executor_name() -> String {
    next_executor_name_with_prefix("harmony.executor")
}

/// Next generated executor name with a custom prefix. Shares the counter
/// with [`next_executor_name`].
pub fn next_executor_name_with_prefix(prefix: &str) -> String {
    let n = EXECUTOR_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("{prefix}.{n}")
}

/// Runs submitted jobs.
pub trait Executor: Send + Sync {
    fn submit(&self, job: Job);

    fn name(&self) -> &str;

    /// True while a job submitted to this executor is running.
    fn is_executing(&self) -> bool;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn submit(&self, job: Job) {
        (**self).submit(job)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_executing(&self) -> bool {
        (**self).is_executing()
    }
}

/// Convenience methods for running work that produces a [`Future`].
pub trait ExecutorExt: Executor {
    /// Run `body` on this executor with the resolver of the returned future.
    fn submit_future<T, F>(&self, body: F) -> Future<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce(Resolver<T>) + Send + 'static,
    {
        let (future, resolver) = Future::pending();
        let guard = JobGuard {
            resolver: Some(resolver.clone()),
            executor: self.name().to_string(),
        };
        self.submit(Box::new(move || {
            let mut guard = guard;
            body(resolver);
            guard.resolver = None;
        }));
        future
    }

    /// Run `work` on this executor and resolve the returned future with its
    /// result.
    fn submit_result<T, F>(&self, work: F) -> Future<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> HarmonyResult<T> + Send + 'static,
    {
        self.submit_future(move |resolver| resolver.complete(work()))
    }
}

impl<E: Executor + ?Sized> ExecutorExt for E {}

/// Fails a submitted future whose job panicked or was dropped unrun.
///
/// Disarmed once the job body returns; a body that hands its resolver on
/// resolves it later.
struct JobGuard<T>
where
    T: Clone + Send + 'static,
{
    resolver: Option<Resolver<T>>,
    executor: String,
}

impl<T> Drop for JobGuard<T>
where
    T: Clone + Send + 'static,
{
    fn drop(&mut self) {
        let Some(resolver) = self.resolver.take() else {
            return;
        };
        if resolver.is_resolved() {
            return;
        }
        let reason = if thread::panicking() {
            "job panicked"
        } else {
            "job was dropped before it ran"
        };
        tracing::warn!(executor = %self.executor, reason, "failing unresolved future");
        resolver.complete(Err(HarmonyError::failed(format!("{reason} on {}", self.executor))));
    }
}

fn run_guarded(executor: &str, job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::error!(executor, "job panicked");
    }
}

// ============================================================================
// DIRECT
// ============================================================================

/// Runs every job inline on the submitting thread.
#[derive(Debug, Default)]
pub struct DirectExecutor {
    depth: AtomicUsize,
}

impl DirectExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Executor for DirectExecutor {
    fn submit(&self, job: Job) {
        self.depth.fetch_add(1, Ordering::SeqCst);
        job();
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "harmony.executor.direct"
    }

    fn is_executing(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }
}

// ============================================================================
// SERIAL
// ============================================================================

/// One dedicated worker thread running jobs in submission order.
///
/// Jobs never overlap. A panicking job is logged and the worker moves on.
/// Dropping the executor lets queued jobs finish, then joins the worker.
pub struct SerialExecutor {
    name: String,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    executing: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl SerialExecutor {
    /// A serial executor with a generated name.
    pub fn new() -> HarmonyResult<Self> {
        Self::named(next_executor_name())
    }

    /// A serial executor named from `executor.name_prefix`.
    pub fn with_config(config: &HarmonyConfig) -> HarmonyResult<Self> {
        Self::named(next_executor_name_with_prefix(&config.executor.name_prefix))
    }

    pub fn named(name: impl Into<String>) -> HarmonyResult<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Job>();
        let executing = Arc::new(AtomicBool::new(false));

        let worker_flag = Arc::clone(&executing);
        let worker_name = name.clone();
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                for job in receiver {
                    worker_flag.store(true, Ordering::SeqCst);
                    run_guarded(&worker_name, job);
                    worker_flag.store(false, Ordering::SeqCst);
                }
                tracing::debug!(executor = %worker_name, "serial executor stopped");
            })
            .map_err(|e| HarmonyError::failed(format!("failed to spawn executor {name}: {e}")))?;

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            executing,
            worker_id: worker.thread().id(),
            worker: Some(worker),
        })
    }
}

impl fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("name", &self.name)
            .field("executing", &self.is_executing())
            .finish()
    }
}

impl Executor for SerialExecutor {
    fn submit(&self, job: Job) {
        let rejected = match lock(&self.sender).as_ref() {
            Some(sender) => sender.send(job).err().map(|returned| returned.0),
            None => Some(job),
        };
        // Dropped outside the lock: a dropped job fails its future, whose
        // callbacks may submit again
        if let Some(job) = rejected {
            tracing::warn!(executor = %self.name, "executor is stopped, job dropped");
            drop(job);
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        lock(&self.sender).take();
        // The last handle may be dropped by one of our own jobs
        if thread::current().id() == self.worker_id {
            return;
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!(executor = %self.name, "executor worker panicked");
            }
        }
    }
}

// ============================================================================
// MAIN THREAD
// ============================================================================

/// Queues jobs for a thread that pumps them explicitly.
///
/// Models a UI main thread: any thread may submit, and the owning thread
/// runs queued jobs with [`MainThreadExecutor::drain`] or
/// [`MainThreadExecutor::run_until`].
pub struct MainThreadExecutor {
    name: String,
    queue: Mutex<VecDeque<Job>>,
    available: Condvar,
    executing: AtomicBool,
}

impl MainThreadExecutor {
    pub fn new() -> Self {
        Self {
            name: "harmony.executor.main".to_string(),
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            executing: AtomicBool::new(false),
        }
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    fn run(&self, job: Job) {
        let outer = self.executing.swap(true, Ordering::SeqCst);
        run_guarded(&self.name, job);
        self.executing.store(outer, Ordering::SeqCst);
    }

    /// Run queued jobs on this thread until the queue is empty, including
    /// jobs submitted while draining. Returns how many ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = lock(&self.queue).pop_front();
            match job {
                Some(job) => {
                    self.run(job);
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Run jobs as they arrive until `done` returns true or `timeout`
    /// elapses. Returns the final value of `done`.
    pub fn run_until<F>(&self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.drain();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let queue = lock(&self.queue);
            if queue.is_empty() {
                // Short slices so conditions set by other threads are noticed
                let slice = (deadline - now).min(Duration::from_millis(10));
                let _unused = self
                    .available
                    .wait_timeout(queue, slice)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }
}

impl Default for MainThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MainThreadExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainThreadExecutor")
            .field("pending", &self.pending())
            .field("executing", &self.is_executing())
            .finish()
    }
}

impl Executor for MainThreadExecutor {
    fn submit(&self, job: Job) {
        lock(&self.queue).push_back(job);
        self.available.notify_all();
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }
}

// ============================================================================
// TOKIO
// ============================================================================

/// Runs jobs on a tokio runtime's blocking thread pool.
///
/// Jobs may run concurrently; there is no ordering between them.
pub struct TokioExecutor {
    name: String,
    handle: tokio::runtime::Handle,
    running: Arc<AtomicUsize>,
}

impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            name: next_executor_name(),
            handle,
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bind to the runtime of the calling task.
    pub fn current() -> HarmonyResult<Self> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| HarmonyError::failed(format!("no tokio runtime: {e}")))?;
        Ok(Self::new(handle))
    }
}

impl fmt::Debug for TokioExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioExecutor")
            .field("name", &self.name)
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

impl Executor for TokioExecutor {
    fn submit(&self, job: Job) {
        let running = Arc::clone(&self.running);
        let name = self.name.clone();
        running.fetch_add(1, Ordering::SeqCst);
        // Detached; completion is observed through the job's own resolver
        let _task = self.handle.spawn_blocking(move || {
            run_guarded(&name, job);
            running.fetch_sub(1, Ordering::SeqCst);
        });
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_executing(&self) -> bool {
        self.running.load(Ordering::SeqCst) > 0
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names_are_unique() {
        let a = next_executor_name();
        let b = next_executor_name();
        assert!(a.starts_with("harmony.executor."));
        assert_ne!(a, b);
        assert!(next_executor_name_with_prefix("app.io").starts_with("app.io."));
    }

    #[test]
    fn test_direct_runs_inline() {
        let executor = Arc::new(DirectExecutor::new());
        let observed = Arc::clone(&executor);
        let seen = Arc::new(AtomicBool::new(false));
        let flag = seen.clone();
        executor.submit(Box::new(move || flag.store(observed.is_executing(), Ordering::SeqCst)));
        assert!(seen.load(Ordering::SeqCst));
        assert!(!executor.is_executing());
    }

    #[test]
    fn test_serial_preserves_order_on_worker_thread() {
        let executor = SerialExecutor::named("test.serial").unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20 {
            let order = order.clone();
            executor.submit(Box::new(move || {
                let name = thread::current().name().map(str::to_string);
                order.lock().unwrap().push((i, name));
            }));
        }
        let done = executor.submit_result(|| Ok(()));
        done.wait().unwrap();

        let order = order.lock().unwrap();
        let indices: Vec<_> = order.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, (0..20).collect::<Vec<_>>());
        assert!(order.iter().all(|(_, name)| name.as_deref() == Some("test.serial")));
    }

    #[test]
    fn test_serial_survives_panicking_job() {
        let executor = SerialExecutor::new().unwrap();
        executor.submit(Box::new(|| panic!("boom")));
        let after = executor.submit_result(|| Ok(5u8));
        assert_eq!(after.wait_timeout(Duration::from_secs(5)), Some(Ok(5)));
    }

    #[test]
    fn test_panicking_job_fails_its_future() {
        let serial = SerialExecutor::new().unwrap();
        let failed = serial.submit_result::<u8, _>(|| panic!("boom"));
        let result = failed.wait_timeout(Duration::from_secs(5)).unwrap();
        assert!(result.unwrap_err().to_string().contains("job panicked"));

        let main = MainThreadExecutor::new();
        let failed = main.submit_future::<u8, _>(|_resolver| panic!("boom"));
        assert_eq!(main.drain(), 1);
        assert!(failed.wait().is_err());
    }

    #[test]
    fn test_dropped_job_fails_its_future() {
        let main = MainThreadExecutor::new();
        let never_run = main.submit_result(|| Ok(1u8));
        drop(main);
        assert!(never_run.wait().unwrap_err().to_string().contains("dropped before it ran"));
    }

    #[test]
    fn test_handed_off_resolver_is_not_failed() {
        let (inner, inner_resolver) = Future::<u8>::pending();
        let adopted = DirectExecutor::new().submit_future(move |resolver| resolver.set_future(&inner));
        assert!(!adopted.is_resolved());
        inner_resolver.set(3).unwrap();
        assert_eq!(adopted.wait().unwrap(), 3);
    }

    #[test]
    fn test_serial_named_from_config() {
        let mut config = HarmonyConfig::default();
        config.executor.name_prefix = "app.io".to_string();
        let executor = SerialExecutor::with_config(&config).unwrap();
        assert!(executor.name().starts_with("app.io."));
    }

    #[test]
    fn test_main_thread_runs_only_when_drained() {
        let main = Arc::new(MainThreadExecutor::new());
        let future = main.submit_result(|| Ok("on main"));
        assert!(!future.is_resolved());
        assert_eq!(main.pending(), 1);

        assert_eq!(main.drain(), 1);
        assert_eq!(future.peek(), Some(Ok("on main")));
    }

    #[test]
    fn test_main_thread_run_until_pumps_cross_thread_jobs() {
        let main = Arc::new(MainThreadExecutor::new());
        let (future, resolver) = Future::<u32>::pending();
        let delivered = future.on(main.clone());

        thread::spawn(move || resolver.set(11).unwrap());
        let finished = main.run_until(Duration::from_secs(5), || delivered.is_resolved());
        assert!(finished);
        assert_eq!(delivered.peek(), Some(Ok(11)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tokio_executor_resolves_future() {
        let executor = TokioExecutor::current().unwrap();
        let value = executor.submit_result(|| Ok(3 * 7)).await;
        assert_eq!(value, Ok(21));
    }

    #[test]
    fn test_tokio_executor_requires_runtime() {
        assert!(TokioExecutor::current().is_err());
    }
}
