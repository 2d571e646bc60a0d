//! Integration Tests for the Cache
//!
//! Exercises the public API on real time: tokio timers and the system clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use timed_cache::tasks::current_timestamp_ms;
use timed_cache::{Cache, CacheError, Config, ImportOptions};

// == Helper Functions ==

async fn wait_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn snapshot_of(json: &str) -> Value {
    serde_json::from_str(json).unwrap()
}

// == Basic Operations ==

#[tokio::test]
async fn test_put_get_delete() {
    let cache = Cache::new();

    assert_eq!(cache.put("key", "value".to_string(), None).unwrap(), "value");
    assert_eq!(cache.get("key"), Some("value".to_string()));
    assert_eq!(cache.size(), 1);

    assert!(cache.del("key"));
    assert_eq!(cache.get("key"), None);
    assert!(!cache.del("key"));
    assert_eq!(cache.size(), 0);
}

#[tokio::test]
async fn test_invalid_ttl_rejected() {
    let cache = Cache::new();

    let result = cache.put("key", 1, Some(0));
    match result {
        Err(CacheError::InvalidArgument(msg)) => {
            assert_eq!(msg, "timeout must be a positive number")
        }
        other => panic!("expected InvalidArgument, got {:?}", other),
    }
    assert_eq!(cache.size(), 0);
    assert!(cache.keys().is_empty());
}

#[tokio::test]
async fn test_from_config_sets_debug() {
    let config = Config {
        debug: true,
        ..Config::default()
    };
    let cache: Cache<u32> = Cache::from_config(&config);

    assert!(cache.is_debug());
    cache.get("missing");
    assert_eq!(cache.misses(), 1);
}

// == Expiration ==

#[tokio::test]
async fn test_expiration_invokes_callback_once() {
    let cache = Cache::new();
    let expired = Arc::new(Mutex::new(Vec::new()));

    let log = expired.clone();
    cache
        .put_with_callback("session", "abc".to_string(), Some(1), move |k, v| {
            log.lock().unwrap().push((k, v));
        })
        .unwrap();

    wait_ms(50).await;

    assert_eq!(cache.get("session"), None);
    assert_eq!(cache.size(), 0);
    assert_eq!(
        *expired.lock().unwrap(),
        vec![("session".to_string(), "abc".to_string())]
    );
}

#[tokio::test]
async fn test_delete_before_expiry_skips_callback() {
    let cache = Cache::new();
    let expired = Arc::new(Mutex::new(0));

    let count = expired.clone();
    cache
        .put_with_callback("key", 1, Some(20), move |_, _| *count.lock().unwrap() += 1)
        .unwrap();
    assert!(cache.del("key"));

    wait_ms(60).await;
    assert_eq!(*expired.lock().unwrap(), 0);
    assert_eq!(cache.size(), 0);
}

#[tokio::test]
async fn test_overwrite_resets_timer() {
    let cache = Cache::new();

    cache.put("key", "short".to_string(), Some(20)).unwrap();
    cache.put("key", "long".to_string(), Some(10_000)).unwrap();

    wait_ms(60).await;
    assert_eq!(cache.get("key"), Some("long".to_string()));
    assert_eq!(cache.size(), 1);
}

#[tokio::test]
async fn test_clear_cancels_timers() {
    let cache = Cache::new();
    let expired = Arc::new(Mutex::new(0));

    for key in ["a", "b", "c"] {
        let count = expired.clone();
        cache
            .put_with_callback(key, 1, Some(10), move |_, _| *count.lock().unwrap() += 1)
            .unwrap();
    }
    cache.clear();

    wait_ms(50).await;
    assert_eq!(*expired.lock().unwrap(), 0);
    assert_eq!(cache.size(), 0);
}

// == Snapshots ==

#[tokio::test]
async fn test_export_import_roundtrip() {
    let source = Cache::new();
    source.put("k1", json!({"n": 1}), None).unwrap();
    source.put("k2", json!([1, 2, 3]), Some(60_000)).unwrap();

    let exported = source.export_json().unwrap();
    let parsed = snapshot_of(&exported);
    assert_eq!(parsed["k1"]["expire"], json!("NaN"));
    assert!(parsed["k2"]["expire"].as_u64().unwrap() > current_timestamp_ms());

    let target: Cache<Value> = Cache::new();
    let size = target
        .import_json(&exported, ImportOptions::default())
        .unwrap();

    assert_eq!(size, 2);
    assert_eq!(target.keys(), vec!["k1", "k2"]);
    assert_eq!(target.get("k1"), Some(json!({"n": 1})));
    assert_eq!(target.get("k2"), Some(json!([1, 2, 3])));
}

#[tokio::test]
async fn test_import_keeps_original_deadline() {
    let source = Cache::new();
    source.put("k", 7u32, Some(150)).unwrap();
    let exported = source.export_json().unwrap();

    wait_ms(80).await;
    let target: Cache<u32> = Cache::new();
    target.import_json(&exported, ImportOptions::default()).unwrap();
    assert_eq!(target.get("k"), Some(7));

    // Original deadline passes well before a fresh 150ms TTL would
    wait_ms(120).await;
    assert_eq!(target.get("k"), None);
    assert_eq!(target.size(), 0);
}

#[tokio::test]
async fn test_expired_entries_excluded_on_import() {
    let source = Cache::new();
    source.put("gone", 1u32, Some(5)).unwrap();
    let exported = source.export_json().unwrap();

    wait_ms(30).await;
    let target: Cache<u32> = Cache::new();
    let size = target
        .import_json(&exported, ImportOptions::default())
        .unwrap();

    assert_eq!(size, 0);
    assert_eq!(target.get("gone"), None);
}

#[tokio::test]
async fn test_import_skip_duplicates() {
    let target: Cache<String> = Cache::new();
    target.put("shared", "local".to_string(), None).unwrap();

    let snapshot = r#"{"shared":{"value":"remote","expire":"NaN"}}"#;
    let size = target
        .import_json(
            snapshot,
            ImportOptions {
                skip_duplicates: true,
            },
        )
        .unwrap();

    assert_eq!(size, 1);
    assert_eq!(target.get("shared"), Some("local".to_string()));
}

#[tokio::test]
async fn test_import_malformed_json() {
    let cache: Cache<u32> = Cache::new();

    let result = cache.import_json("not json", ImportOptions::default());
    assert!(matches!(result, Err(CacheError::Snapshot(_))));
    assert_eq!(cache.size(), 0);
}
