//! Configuration resolution feeding the store, and the background sweeper.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{make, sid, RecordingDestroyer};
use viewscope::core::config::{
    CapacityResolver, ConfigSource, MapSource, DEFAULT_MAX_ACTIVE_SCOPES, DEFAULT_SCOPE_TTL_SECS,
};
use viewscope::prelude::*;

#[test]
fn test_resolved_config_bounds_the_store() {
    let source = MapSource::new()
        .with("VIEWSCOPE_VIEWS_IN_SESSION", "2")
        .with("VIEWSCOPE_SCOPE_TTL_SECS", "45");
    let cfg = StoreConfig::resolve(&source).unwrap();
    assert_eq!(cfg.max_active_scopes, 2);
    assert_eq!(cfg.scope_ttl_secs, 45);

    let store =
        ScopedResourceStore::with_clock(cfg, RecordingDestroyer::new(), ManualClock::new(0))
            .unwrap();
    for id in 0..5 {
        store.get_or_create_bucket(sid(id)).unwrap();
    }
    assert_eq!(store.len(), 2);
    assert_eq!(store.policy().ttl_secs(), 45);
}

#[test]
fn test_malformed_setting_fails_startup() {
    let source = MapSource::new().with("VIEWSCOPE_MAX_ACTIVE_SCOPES", "twenty");
    let err = StoreConfig::resolve(&source).unwrap_err();
    assert_eq!(
        err,
        ConfigError::Unparseable {
            key: "VIEWSCOPE_MAX_ACTIVE_SCOPES".into(),
            value: "twenty".into(),
        }
    );

    let source = MapSource::new().with("VIEWSCOPE_SESSION_TIMEOUT_SECS", "1h");
    assert!(matches!(
        StoreConfig::resolve(&source),
        Err(ConfigError::Unparseable { .. })
    ));
}

#[test]
fn test_defaults_without_settings() {
    let cfg = StoreConfig::resolve(&MapSource::new()).unwrap();
    assert_eq!(cfg.max_active_scopes, DEFAULT_MAX_ACTIVE_SCOPES);
    assert_eq!(cfg.scope_ttl_secs, DEFAULT_SCOPE_TTL_SECS);
    assert_eq!(cfg.sweep_interval_secs, None);
    assert_eq!(cfg, StoreConfig::default());
}

#[test]
fn test_custom_key_order() {
    struct Layered(Vec<MapSource>);

    impl ConfigSource for Layered {
        fn lookup(&self, key: &str) -> Option<String> {
            self.0.iter().find_map(|s| s.lookup(key))
        }
    }

    let layered = Layered(vec![
        MapSource::new().with("app.views", "8"),
        MapSource::new().with("container.views", "3"),
    ]);
    let resolver = CapacityResolver::with_keys(&layered, &["container.views", "app.views"], 5);
    assert_eq!(resolver.resolve().unwrap(), 3);
    assert_eq!(resolver.keys().len(), 2);
}

#[test]
fn test_from_env() {
    // Only this test touches these variables.
    std::env::set_var("VIEWSCOPE_NUMBER_OF_LOGICAL_VIEWS", "6");
    std::env::set_var("VIEWSCOPE_SESSION_TIMEOUT_SECS", "90");
    let cfg = StoreConfig::from_env();
    std::env::remove_var("VIEWSCOPE_NUMBER_OF_LOGICAL_VIEWS");
    std::env::remove_var("VIEWSCOPE_SESSION_TIMEOUT_SECS");

    let cfg = cfg.unwrap();
    assert_eq!(cfg.max_active_scopes, 6);
    assert_eq!(cfg.scope_ttl_secs, 90);
}

#[test]
fn test_sweeper_reaps_idle_scopes() {
    let clock = ManualClock::new(0);
    let store = Arc::new(
        ScopedResourceStore::with_clock(
            StoreConfig::new(8, 10),
            RecordingDestroyer::new(),
            clock.clone(),
        )
        .unwrap(),
    );
    for id in 0..3 {
        let h = store.get_or_create_bucket(sid(id)).unwrap();
        h.get_or_insert_with("view", || make("view")).unwrap();
    }

    let sweeper = Sweeper::spawn(&store, Duration::from_millis(5)).unwrap();
    clock.advance_secs(11);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !store.is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    sweeper.stop();

    assert!(store.is_empty());
    assert_eq!(store.destroyer().call_count(), 3);
    assert_eq!(store.stats().expired, 3);
}

#[test]
fn test_sweeper_from_config() {
    let store = Arc::new(
        ScopedResourceStore::new(StoreConfig::new(2, 60), RecordingDestroyer::new()).unwrap(),
    );
    assert!(Sweeper::from_config(&store).unwrap().is_none());

    let store = Arc::new(
        ScopedResourceStore::new(
            StoreConfig::new(2, 60).with_sweep_interval(1),
            RecordingDestroyer::new(),
        )
        .unwrap(),
    );
    let sweeper = Sweeper::from_config(&store).unwrap();
    assert!(sweeper.is_some());
    drop(sweeper);
}

#[test]
fn test_sweeper_does_not_keep_store_alive() {
    let destroyer = Arc::new(RecordingDestroyer::new());
    let store = Arc::new(
        ScopedResourceStore::with_shared_destroyer(
            StoreConfig::new(2, 60),
            Arc::clone(&destroyer),
            SystemClock::new(),
        )
        .unwrap(),
    );
    store
        .get_or_create_bucket(sid(1))
        .unwrap()
        .get_or_insert_with("x", || make("x"))
        .unwrap();
    let weak = Arc::downgrade(&store);
    let sweeper = Sweeper::spawn(&store, Duration::from_millis(5)).unwrap();

    drop(store);
    // The worker may briefly hold a strong ref while a sweep is in flight.
    let deadline = Instant::now() + Duration::from_secs(5);
    while weak.upgrade().is_some() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(weak.upgrade().is_none());
    assert_eq!(destroyer.call_count(), 1);
    drop(sweeper);
}

#[test]
fn test_stats_snapshot_serializes() {
    let (store, _) = common::store(1, 60);
    store.get_or_create_bucket(sid(1)).unwrap();
    store.get_or_create_bucket(sid(2)).unwrap();

    let json = serde_json::to_value(store.stats()).unwrap();
    assert_eq!(json["created"], 2);
    assert_eq!(json["evicted"], 1);
    assert_eq!(json["peak_live"], 1);
}
