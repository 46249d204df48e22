//! Harmony Test Utilities
//!
//! Shared test infrastructure for the Harmony workspace:
//! - Spies that record every data source and repository call
//! - Scripted data sources and a switchable object validator
//! - Fixtures for a timestamped entity and a fixed clock
//! - Proptest generators for queries, operations and entities
//! - Assertions for the Harmony error taxonomy

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Re-export the in-memory source most tests build on
pub use harmony_data::InMemoryDataSource;

// Re-export core types for convenience
pub use harmony_core::{
    DataError, HarmonyError, HarmonyResult, ObjectValidation, Operation, OperationError, Query,
    Time, Timestamped,
};
pub use harmony_future::Future;

use harmony_data::{
    DeleteDataSource, DeleteRepository, GetDataSource, GetRepository, PutDataSource,
    PutRepository,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Install a `tracing` subscriber honouring `RUST_LOG`, once per process.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// CALL RECORDING
// ============================================================================

/// Kind of call made on a data source or repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Get,
    GetAll,
    Put,
    PutAll,
    Delete,
    DeleteAll,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Which spy saw the call, e.g. `"main"` or `"cache"`.
    pub source: String,
    pub kind: CallKind,
    pub query: Query,
    /// Operation name for repository calls.
    pub operation: Option<&'static str>,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:?}({})", self.source, self.kind, self.query)
    }
}

/// Ordered log shared between spies, so tests can assert cross-source order.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    /// Record a free-form marker, e.g. the moment a caller was notified.
    pub fn mark(&self, label: &str) {
        self.record(Call {
            source: label.to_string(),
            kind: CallKind::Get,
            query: Query::Void,
            operation: None,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// `source.kind` pairs in order, markers included as their label.
    pub fn trace(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|call| match call.query {
                Query::Void if call.operation.is_none() => call.source.clone(),
                _ => format!("{}.{:?}", call.source, call.kind),
            })
            .collect()
    }

    pub fn count(&self, source: &str, kind: CallKind) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.source == source && call.kind == kind)
            .count()
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }
}

// ============================================================================
// SPIES
// ============================================================================

/// Records every call, then forwards it to `inner`.
pub struct DataSourceSpy<D> {
    name: String,
    inner: D,
    log: CallLog,
}

impl<D> DataSourceSpy<D> {
    pub fn new(name: impl Into<String>, inner: D) -> Self {
        Self::with_log(name, inner, CallLog::new())
    }

    pub fn with_log(name: impl Into<String>, inner: D, log: CallLog) -> Self {
        Self {
            name: name.into(),
            inner,
            log,
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.log.count(&self.name, kind)
    }

    fn record(&self, kind: CallKind, query: &Query) {
        self.log.record(Call {
            source: self.name.clone(),
            kind,
            query: query.clone(),
            operation: None,
        });
    }
}

impl<T, D> GetDataSource<T> for DataSourceSpy<D>
where
    D: GetDataSource<T>,
{
    fn get(&self, query: &Query) -> Future<T> {
        self.record(CallKind::Get, query);
        self.inner.get(query)
    }

    fn get_all(&self, query: &Query) -> Future<Vec<T>> {
        self.record(CallKind::GetAll, query);
        self.inner.get_all(query)
    }
}

impl<T, D> PutDataSource<T> for DataSourceSpy<D>
where
    D: PutDataSource<T>,
{
    fn put(&self, value: Option<T>, query: &Query) -> Future<T> {
        self.record(CallKind::Put, query);
        self.inner.put(value, query)
    }

    fn put_all(&self, values: Vec<T>, query: &Query) -> Future<Vec<T>> {
        self.record(CallKind::PutAll, query);
        self.inner.put_all(values, query)
    }
}

impl<D> DeleteDataSource for DataSourceSpy<D>
where
    D: DeleteDataSource,
{
    fn delete(&self, query: &Query) -> Future<()> {
        self.record(CallKind::Delete, query);
        self.inner.delete(query)
    }

    fn delete_all(&self, query: &Query) -> Future<()> {
        self.record(CallKind::DeleteAll, query);
        self.inner.delete_all(query)
    }
}

/// Records every repository call together with its operation.
pub struct RepositorySpy<R> {
    inner: R,
    log: CallLog,
}

impl<R> RepositorySpy<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            log: CallLog::new(),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Operation names of every recorded call, in order.
    pub fn operations(&self) -> Vec<&'static str> {
        self.log.calls().iter().filter_map(|call| call.operation).collect()
    }

    fn record(&self, kind: CallKind, query: &Query, operation: Operation) {
        self.log.record(Call {
            source: "repository".to_string(),
            kind,
            query: query.clone(),
            operation: Some(operation.name()),
        });
    }
}

impl<T, R> GetRepository<T> for RepositorySpy<R>
where
    R: GetRepository<T>,
{
    fn get(&self, query: &Query, operation: Operation) -> Future<T> {
        self.record(CallKind::Get, query, operation);
        self.inner.get(query, operation)
    }

    fn get_all(&self, query: &Query, operation: Operation) -> Future<Vec<T>> {
        self.record(CallKind::GetAll, query, operation);
        self.inner.get_all(query, operation)
    }
}

impl<T, R> PutRepository<T> for RepositorySpy<R>
where
    R: PutRepository<T>,
{
    fn put(&self, value: Option<T>, query: &Query, operation: Operation) -> Future<T> {
        self.record(CallKind::Put, query, operation);
        self.inner.put(value, query, operation)
    }

    fn put_all(&self, values: Vec<T>, query: &Query, operation: Operation) -> Future<Vec<T>> {
        self.record(CallKind::PutAll, query, operation);
        self.inner.put_all(values, query, operation)
    }
}

impl<R> DeleteRepository for RepositorySpy<R>
where
    R: DeleteRepository,
{
    fn delete(&self, query: &Query, operation: Operation) -> Future<()> {
        self.record(CallKind::Delete, query, operation);
        self.inner.delete(query, operation)
    }

    fn delete_all(&self, query: &Query, operation: Operation) -> Future<()> {
        self.record(CallKind::DeleteAll, query, operation);
        self.inner.delete_all(query, operation)
    }
}

// ============================================================================
// MOCK SOURCES AND VALIDATORS
// ============================================================================

/// In-memory source whose next calls can be scripted to fail.
///
/// Scripted errors are consumed in order by any call; once the script is
/// empty, calls reach the in-memory store.
pub struct ScriptedDataSource<T> {
    store: InMemoryDataSource<T>,
    failures: Mutex<VecDeque<HarmonyError>>,
    offline: AtomicBool,
}

impl<T> Default for ScriptedDataSource<T> {
    fn default() -> Self {
        Self {
            store: InMemoryDataSource::default(),
            failures: Mutex::new(VecDeque::new()),
            offline: AtomicBool::new(false),
        }
    }
}

impl<T> ScriptedDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call with `error`.
    pub fn fail_next(&self, error: HarmonyError) {
        lock(&self.failures).push_back(error);
    }

    /// Fail every call with a transport error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn store(&self) -> &InMemoryDataSource<T> {
        &self.store
    }

    fn scripted_failure(&self) -> Option<HarmonyError> {
        if self.offline.load(Ordering::SeqCst) {
            return Some(HarmonyError::transport(Offline));
        }
        lock(&self.failures).pop_front()
    }
}

/// Transport error raised by an offline [`ScriptedDataSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offline;

impl fmt::Display for Offline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("network unreachable")
    }
}

impl std::error::Error for Offline {}

impl<T> GetDataSource<T> for ScriptedDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self, query: &Query) -> Future<T> {
        match self.scripted_failure() {
            Some(error) => Future::error(error),
            None => self.store.get(query),
        }
    }

    fn get_all(&self, query: &Query) -> Future<Vec<T>> {
        match self.scripted_failure() {
            Some(error) => Future::error(error),
            None => self.store.get_all(query),
        }
    }
}

impl<T> PutDataSource<T> for ScriptedDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn put(&self, value: Option<T>, query: &Query) -> Future<T> {
        match self.scripted_failure() {
            Some(error) => Future::error(error),
            None => self.store.put(value, query),
        }
    }

    fn put_all(&self, values: Vec<T>, query: &Query) -> Future<Vec<T>> {
        match self.scripted_failure() {
            Some(error) => Future::error(error),
            None => self.store.put_all(values, query),
        }
    }
}

impl<T> DeleteDataSource for ScriptedDataSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn delete(&self, query: &Query) -> Future<()> {
        match self.scripted_failure() {
            Some(error) => Future::error(error),
            None => self.store.delete(query),
        }
    }

    fn delete_all(&self, query: &Query) -> Future<()> {
        match self.scripted_failure() {
            Some(error) => Future::error(error),
            None => self.store.delete_all(query),
        }
    }
}

/// Validator with a switchable answer that counts how often it was asked.
#[derive(Debug)]
pub struct MockObjectValidation {
    valid: AtomicBool,
    checks: AtomicUsize,
}

impl MockObjectValidation {
    pub fn valid() -> Arc<Self> {
        Arc::new(Self {
            valid: AtomicBool::new(true),
            checks: AtomicUsize::new(0),
        })
    }

    pub fn invalid() -> Arc<Self> {
        let validation = Self::valid();
        validation.set_valid(false);
        validation
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl<T> ObjectValidation<T> for MockObjectValidation {
    fn is_object_valid(&self, _object: &T) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.valid.load(Ordering::SeqCst)
    }
}

// ============================================================================
// FIXTURE TYPES
// ============================================================================

/// Timestamped record used across the workspace tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
    pub last_update: Option<DateTime<Utc>>,
}

impl Entity {
    pub fn key(&self) -> Query {
        Query::id(self.id)
    }
}

impl Timestamped for Entity {
    fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use chrono::TimeZone;

    /// Instant every fixed-clock fixture is relative to.
    pub fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Clock for `TimestampStrategy::with_clock` frozen at [`fixed_now`].
    pub fn fixed_clock() -> impl Fn() -> DateTime<Utc> + Send + Sync + Clone + 'static {
        let now = fixed_now();
        move || now
    }

    /// Entity updated at [`fixed_now`].
    pub fn entity(name: &str) -> Entity {
        Entity {
            id: Uuid::now_v7(),
            name: name.to_string(),
            last_update: Some(fixed_now()),
        }
    }

    /// Entity last updated `age_secs` before [`fixed_now`].
    pub fn aged_entity(name: &str, age_secs: i64) -> Entity {
        Entity {
            last_update: Some(fixed_now() - chrono::Duration::seconds(age_secs)),
            ..entity(name)
        }
    }

    /// Entity that was never stamped.
    pub fn unstamped_entity(name: &str) -> Entity {
        Entity {
            last_update: None,
            ..entity(name)
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Harmony types.

    use super::*;
    use harmony_core::Fallback;
    use proptest::prelude::*;

    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,11}"
    }

    /// `Key` or `Id` query.
    pub fn arb_key_query() -> impl Strategy<Value = Query> {
        prop_oneof![arb_key().prop_map(Query::Key), arb_key().prop_map(Query::Id)]
    }

    pub fn arb_query() -> impl Strategy<Value = Query> {
        prop_oneof![
            Just(Query::Void),
            Just(Query::AllObjects),
            arb_key().prop_map(Query::Key),
            arb_key().prop_map(Query::Id),
            proptest::collection::vec(arb_key(), 0..5).prop_map(Query::Ids),
            (0usize..100, 1usize..50).prop_map(|(offset, limit)| Query::Pagination { offset, limit }),
        ]
    }

    pub fn arb_fallback() -> impl Strategy<Value = Fallback> {
        prop_oneof![
            Just(Fallback::Never),
            Just(Fallback::Always),
            Just(Fallback::When(|e: &HarmonyError| e.is_transport())),
        ]
    }

    pub fn arb_operation() -> impl Strategy<Value = Operation> {
        prop_oneof![
            Just(Operation::Default),
            Just(Operation::MainOnly),
            Just(Operation::MainSync),
            any::<bool>().prop_map(|ignore_validation| Operation::CacheOnly { ignore_validation }),
            arb_fallback().prop_map(|fallback| Operation::CacheSync { fallback }),
        ]
    }

    pub fn arb_time() -> impl Strategy<Value = Time> {
        prop_oneof![
            (0u64..10_000).prop_map(Time::Seconds),
            (0u64..1_000).prop_map(Time::Minutes),
            (0u64..100).prop_map(Time::Hours),
            (0u64..30).prop_map(Time::Days),
            (0u64..8).prop_map(Time::Weeks),
            Just(Time::Never),
        ]
    }

    pub fn arb_entity() -> impl Strategy<Value = Entity> {
        (any::<u128>(), "[A-Za-z ]{1,24}", proptest::option::of(0i64..100_000)).prop_map(
            |(id, name, age)| Entity {
                id: Uuid::from_u128(id),
                name,
                last_update: age.map(|secs| fixtures::fixed_now() - chrono::Duration::seconds(secs)),
            },
        )
    }

    /// Data-layer error a source may fail with.
    pub fn arb_data_error() -> impl Strategy<Value = HarmonyError> {
        prop_oneof![
            arb_key().prop_map(HarmonyError::not_found),
            Just(HarmonyError::not_valid("generated")),
            Just(HarmonyError::illegal_argument("generated")),
            Just(HarmonyError::transport(Offline)),
        ]
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for the Harmony error taxonomy.

    use super::*;

    pub fn assert_not_found<T: fmt::Debug>(result: &HarmonyResult<T>) {
        match result {
            Err(error) if error.is_not_found() => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    pub fn assert_not_valid<T: fmt::Debug>(result: &HarmonyResult<T>) {
        match result {
            Err(error) if error.is_not_valid() => {}
            other => panic!("expected NotValid, got {other:?}"),
        }
    }

    pub fn assert_query_not_supported<T: fmt::Debug>(result: &HarmonyResult<T>) {
        assert!(
            matches!(result, Err(HarmonyError::Data(DataError::QueryNotSupported { .. }))),
            "expected QueryNotSupported, got {result:?}"
        );
    }

    pub fn assert_operation_not_supported<T: fmt::Debug>(result: &HarmonyResult<T>) {
        assert!(
            matches!(result, Err(HarmonyError::Operation(OperationError::NotSupported { .. }))),
            "expected OperationError::NotSupported, got {result:?}"
        );
    }

    pub fn assert_offline<T: fmt::Debug>(result: &HarmonyResult<T>) {
        match result {
            Err(HarmonyError::Transport(inner)) if inner.downcast_ref::<Offline>().is_some() => {}
            other => panic!("expected Offline transport error, got {other:?}"),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
