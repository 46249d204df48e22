//! Data source wrappers stacked over a scripted store.

use std::time::Duration;

use harmony_core::{HarmonyError, HarmonyResult, Query};
use harmony_data::{
    DataSourceValidator, DeleteDataSource, GetDataSource, PutDataSource, RetryDataSource,
    TimedCacheDataSource,
};
use harmony_test_utils::assertions::{assert_not_found, assert_not_valid, assert_offline};
use harmony_test_utils::fixtures::entity;
use harmony_test_utils::{
    init_test_tracing, CallKind, CallLog, DataSourceSpy, Entity, MockObjectValidation, Offline,
    ScriptedDataSource,
};

fn seeded(entity: &Entity) -> ScriptedDataSource<Entity> {
    let source = ScriptedDataSource::new();
    source.store().put(Some(entity.clone()), &entity.key()).wait().unwrap();
    source
}

#[test]
fn test_retry_over_timed_cache_hits_source_once_per_success() {
    init_test_tracing();
    let ada = entity("ada");
    let scripted = seeded(&ada);
    scripted.fail_next(HarmonyError::transport(Offline));
    let log = CallLog::new();

    let stack = RetryDataSource::with_retries(
        TimedCacheDataSource::<Entity, _>::new(
            DataSourceSpy::with_log("store", scripted, log.clone()),
            Duration::from_secs(60),
        ),
        2,
    )
    .retry_if(HarmonyError::is_transport);

    assert_eq!(stack.get(&ada.key()).wait().unwrap(), ada);
    assert_eq!(log.count("store", CallKind::Get), 2);

    // Served from the timed cache.
    assert_eq!(stack.get(&ada.key()).wait().unwrap(), ada);
    assert_eq!(log.count("store", CallKind::Get), 2);
}

#[test]
fn test_retry_predicate_refuses_missing_values() {
    let log = CallLog::new();
    let stack = RetryDataSource::with_retries(
        DataSourceSpy::with_log("store", ScriptedDataSource::<Entity>::new(), log.clone()),
        3,
    )
    .retry_if(HarmonyError::is_transport);

    let missing: HarmonyResult<Entity> = stack.get(&Query::key("nobody")).wait();
    assert_not_found(&missing);
    assert_eq!(log.count("store", CallKind::Get), 1);
}

#[test]
fn test_retries_run_out() {
    let scripted = ScriptedDataSource::<Entity>::new();
    scripted.set_offline(true);
    let log = CallLog::new();
    let stack = RetryDataSource::with_retries(DataSourceSpy::with_log("store", scripted, log.clone()), 2);

    let team: HarmonyResult<Vec<Entity>> = stack.get_all(&Query::key("team")).wait();
    assert_offline(&team);
    assert_eq!(log.count("store", CallKind::GetAll), 3);
}

#[test]
fn test_validator_gates_reads_but_not_writes() {
    let ada = entity("ada");
    let validation = MockObjectValidation::invalid();
    let source = DataSourceValidator::new(seeded(&ada), validation.clone());

    let rejected: HarmonyResult<Entity> = source.get(&ada.key()).wait();
    assert_not_valid(&rejected);
    let grace = entity("grace");
    assert_eq!(source.put(Some(grace.clone()), &grace.key()).wait().unwrap(), grace);

    validation.set_valid(true);
    assert_eq!(source.get(&grace.key()).wait().unwrap(), grace);
    assert_eq!(validation.checks(), 2);
}

#[test]
fn test_delete_evicts_timed_entries() {
    let ada = entity("ada");
    let log = CallLog::new();
    let cached = TimedCacheDataSource::<Entity, _>::new(
        DataSourceSpy::with_log("store", seeded(&ada), log.clone()),
        Duration::from_secs(60),
    );

    cached.get(&ada.key()).wait().unwrap();
    cached.delete(&ada.key()).wait().unwrap();
    let gone: HarmonyResult<Entity> = cached.get(&ada.key()).wait();
    assert_not_found(&gone);
    assert_eq!(log.count("store", CallKind::Get), 2);
}
