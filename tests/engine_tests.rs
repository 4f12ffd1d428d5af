//! Tests for Engine
//!
//! These tests verify:
//! - Basic get/set/delete operations
//! - Durability ordering (log before map)
//! - Error surfacing when the log fails
//! - Concurrent access patterns
//! - Shutdown behaviour

use std::sync::Arc;
use std::thread;

use emberkv::config::Config;
use emberkv::engine::Engine;
use emberkv::wal::MemoryLog;
use emberkv::EmberError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open_path(temp_dir.path()).unwrap();
    (temp_dir, engine)
}

fn setup_memory_engine() -> (TempDir, Engine, MemoryLog) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().data_dir(temp_dir.path()).build();
    let log = MemoryLog::new();
    let engine = Engine::open_with_log(config, Box::new(log.clone())).unwrap();
    (temp_dir, engine, log)
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_open_creates_directory_and_log() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let _engine = Engine::open_path(&data_dir).unwrap();

    assert!(data_dir.exists());
    assert!(data_dir.join("wal.log").exists());
    assert!(!data_dir.join("snapshot.bin").exists());
}

#[test]
fn test_engine_set_get() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("connor", "mcdavid").unwrap();

    assert_eq!(engine.get("connor"), Some("mcdavid".to_string()));
}

#[test]
fn test_engine_get_on_empty_store() {
    let (_temp, engine) = setup_temp_engine();

    assert_eq!(engine.get("utah"), None);
    assert!(engine.is_empty());
}

#[test]
fn test_engine_set_overwrite() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("connor", "mcdavid").unwrap();
    engine.set("connor", "bedard").unwrap();

    assert_eq!(engine.get("connor"), Some("bedard".to_string()));
    assert_eq!(engine.len(), 1);
}

#[test]
fn test_engine_delete() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("key", "value").unwrap();
    engine.delete("key").unwrap();

    assert_eq!(engine.get("key"), None);
}

#[test]
fn test_engine_delete_absent_key_is_noop() {
    let (_temp, engine) = setup_temp_engine();
    engine.set("other", "x").unwrap();

    engine.delete("nonexistent").unwrap();

    assert_eq!(engine.get("nonexistent"), None);
    assert_eq!(engine.len(), 1);
}

#[test]
fn test_engine_writes_reach_log_file() {
    let (temp, engine) = setup_temp_engine();

    engine.set("a", "1").unwrap();
    engine.set("b", "2").unwrap();
    engine.delete("a").unwrap();

    let log = std::fs::read_to_string(temp.path().join("wal.log")).unwrap();
    assert_eq!(log, "SET a 1\nSET b 2\nDELETE a\n");
}

// =============================================================================
// Durability Error Tests
// =============================================================================

#[test]
fn test_append_failure_leaves_map_unchanged() {
    let (_temp, engine, log) = setup_memory_engine();
    engine.set("a", "1").unwrap();

    log.fail_appends(true);
    let err = engine.set("a", "2").unwrap_err();
    assert!(matches!(err, EmberError::WalWrite(_)));
    assert!(err.to_string().starts_with("failed to write to log"));

    let err = engine.delete("a").unwrap_err();
    assert!(matches!(err, EmberError::WalWrite(_)));

    assert_eq!(engine.get("a"), Some("1".to_string()));
    assert_eq!(log.records(), vec!["SET a 1"]);
}

#[test]
fn test_flush_failure_leaves_map_unchanged() {
    let (_temp, engine, log) = setup_memory_engine();

    log.fail_flushes(true);
    let err = engine.set("a", "1").unwrap_err();
    assert!(matches!(err, EmberError::WalSync(_)));
    assert!(err.to_string().starts_with("failed to persist"));

    assert_eq!(engine.get("a"), None);
    assert!(log.records().is_empty());

    // not retried internally; the next call succeeds on its own
    log.fail_flushes(false);
    engine.set("a", "1").unwrap();
    assert_eq!(log.records(), vec!["SET a 1"]);
}

// =============================================================================
// Record Validation Tests
// =============================================================================

#[test]
fn test_unrepresentable_values_are_rejected() {
    let (temp, engine) = setup_temp_engine();
    engine.set("victim", "alive").unwrap();

    for (key, value) in [
        ("k", "hello world"),
        ("empty", ""),
        ("inj", "1\nDELETE victim"),
        ("", "nokey"),
        ("tab\tkey", "v"),
    ] {
        let err = engine.set(key, value).unwrap_err();
        assert!(matches!(err, EmberError::InvalidRecord(_)), "{:?}", err);
        assert_eq!(engine.get(key), None);
    }
    assert!(matches!(
        engine.delete("victim\nSET x 1"),
        Err(EmberError::InvalidRecord(_))
    ));

    // rejected writes never reach the log or the write counter
    let log = std::fs::read_to_string(temp.path().join("wal.log")).unwrap();
    assert_eq!(log, "SET victim alive\n");
    assert_eq!(engine.stats().writes_since_compaction, 1);
    drop(engine);

    let reopened = Engine::open_path(temp.path()).unwrap();
    assert_eq!(reopened.get("victim"), Some("alive".to_string()));
    assert_eq!(reopened.get("inj"), None);
    assert_eq!(reopened.len(), 1);
}

#[test]
fn test_accepted_writes_survive_restart_exactly() {
    let (temp, engine) = setup_temp_engine();
    engine.set("url", "http://x/y?a=1&b=2").unwrap();
    engine.set("unicode", "café").unwrap();
    let before = engine.to_map();
    drop(engine);

    let reopened = Engine::open_path(temp.path()).unwrap();
    assert_eq!(reopened.to_map(), before);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .compaction_threshold(50)
        .build();
    let engine = Arc::new(Engine::open(config).unwrap());

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..60 {
                    engine
                        .set(&format!("t{}-k{}", t, i), &format!("v{}", i))
                        .unwrap();
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..60 {
                    if let Some(v) = engine.get(&format!("t{}-k{}", t, i)) {
                        assert_eq!(v, format!("v{}", i));
                    }
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }
    engine.wait_for_compactions();

    assert_eq!(engine.len(), 240);
    let stats = engine.stats();
    assert!(stats.compactions_completed >= 1);
    assert!(!stats.compaction_pending);

    drop(engine);
    let reopened = Engine::open_path(temp_dir.path()).unwrap();
    assert_eq!(reopened.len(), 240);
    assert_eq!(reopened.get("t3-k59"), Some("v59".to_string()));
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_shutdown_rejects_mutations_but_serves_reads() {
    let (_temp, engine) = setup_temp_engine();
    engine.set("a", "1").unwrap();

    engine.shutdown().unwrap();

    assert!(engine.is_shut_down());
    assert!(matches!(engine.set("b", "2"), Err(EmberError::ShuttingDown)));
    assert!(matches!(engine.delete("a"), Err(EmberError::ShuttingDown)));
    assert!(matches!(engine.compact(), Err(EmberError::ShuttingDown)));
    assert_eq!(engine.get("a"), Some("1".to_string()));
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .compaction_threshold(0)
        .build();

    assert!(matches!(Engine::open(config), Err(EmberError::Config(_))));
}
