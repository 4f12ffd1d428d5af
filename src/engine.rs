//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Own the in-memory map, the write counter and the log handle
//! - Make every mutation durable before it becomes visible
//! - Trigger and run compaction (snapshot + log truncation)
//! - Recover state from snapshot and log on startup

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{EmberError, Result};
use crate::protocol::Command;
use crate::storage::SnapshotFile;
use crate::wal::{FileLog, LogSink, RecoveryResult, WalRecord, WalRecovery};

/// Outcome of a successfully executed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// GET hit
    Value(String),

    /// GET miss
    NotFound,

    /// SET or DELETE applied and durable
    Applied,
}

/// Point-in-time counters, for tests and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Number of keys currently stored
    pub keys: usize,

    /// Successful mutations since the last compaction was initiated
    pub writes_since_compaction: usize,

    /// Compactions that finished successfully
    pub compactions_completed: u64,

    /// Whether a background compaction is queued or running
    pub compaction_pending: bool,
}

/// Everything guarded by the single reader/writer lock
struct State {
    data: HashMap<String, String>,
    writes: usize,
    log: Box<dyn LogSink>,
}

struct Shared {
    config: Config,
    snapshot: SnapshotFile,
    state: RwLock<State>,

    /// Set while a background compaction is queued or running
    compaction_pending: AtomicBool,
    compactions_completed: AtomicU64,

    /// No mutations are accepted once set
    closed: AtomicBool,

    workers: Mutex<Vec<JoinHandle<()>>>,
    recovery: RecoveryResult,
}

/// The main storage engine
///
/// ## Concurrency Model
///
/// One `RwLock` guards the map, the write counter and the log together.
///
/// - **Reads** (`get`): shared lock, never touch the log
/// - **Mutations** (`set`/`delete`): exclusive lock held across
///   append → fsync → map update → counter update
/// - **Compaction**: exclusive lock held across snapshot write → log truncate
///
/// A mutation that crosses the compaction threshold hands compaction off to a
/// background thread after releasing the lock, so the caller never waits for
/// it while later callers queue behind it.
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create data directory if needed
    /// 2. Load the snapshot if one exists
    /// 3. Replay the WAL on top of it
    /// 4. Open the WAL for appends
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let (data, recovery) = Self::recover(&config)?;
        let log = FileLog::open(&config.wal_path())?;

        Ok(Self::assemble(config, data, recovery, Box::new(log)))
    }

    /// Open an engine that appends to `log` instead of the WAL file
    ///
    /// Recovery still reads the snapshot and WAL found in `data_dir`.
    pub fn open_with_log(config: Config, log: Box<dyn LogSink>) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let (data, recovery) = Self::recover(&config)?;
        Ok(Self::assemble(config, data, recovery, log))
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::at(path))
    }

    fn recover(config: &Config) -> Result<(HashMap<String, String>, RecoveryResult)> {
        let started = Instant::now();
        let snapshot = SnapshotFile::new(config.snapshot_path());

        let mut data = snapshot.load()?.unwrap_or_default();
        let snapshot_keys = data.len();

        let mut recovery = WalRecovery::replay(&config.wal_path(), &mut data)
            .map_err(|e| EmberError::Recovery(format!("log replay failed: {}", e)))?;
        recovery.snapshot_keys = snapshot_keys;

        tracing::info!(
            snapshot_keys,
            records = recovery.records_applied,
            skipped = recovery.lines_skipped,
            truncated = recovery.was_truncated,
            keys = data.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recovery complete"
        );

        Ok((data, recovery))
    }

    fn assemble(
        config: Config,
        data: HashMap<String, String>,
        recovery: RecoveryResult,
        log: Box<dyn LogSink>,
    ) -> Self {
        let snapshot = SnapshotFile::new(config.snapshot_path());
        Self {
            shared: Arc::new(Shared {
                config,
                snapshot,
                state: RwLock::new(State {
                    data,
                    writes: 0,
                    log,
                }),
                compaction_pending: AtomicBool::new(false),
                compactions_completed: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                workers: Mutex::new(Vec::new()),
                recovery,
            }),
        }
    }

    /// Execute a parsed command
    pub fn execute(&self, command: Command) -> Result<Outcome> {
        match command {
            Command::Get { key } => Ok(match self.get(&key) {
                Some(value) => Outcome::Value(value),
                None => Outcome::NotFound,
            }),
            Command::Set { key, value } => {
                self.apply(WalRecord::Set { key, value })?;
                Ok(Outcome::Applied)
            }
            Command::Delete { key } => {
                self.apply(WalRecord::Delete { key })?;
                Ok(Outcome::Applied)
            }
        }
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<String> {
        self.shared.state.read().data.get(key).cloned()
    }

    /// Set a key-value pair
    ///
    /// The record is appended and fsynced before the map changes. On failure
    /// the map is untouched and the error is returned as-is. Keys and values
    /// must be non-empty and free of whitespace.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.apply(WalRecord::Set {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Delete a key (absent keys are not an error)
    pub fn delete(&self, key: &str) -> Result<()> {
        self.apply(WalRecord::Delete {
            key: key.to_string(),
        })
    }

    fn apply(&self, record: WalRecord) -> Result<()> {
        record.validate()?;

        let compaction_due = {
            let mut state = self.shared.state.write();
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(EmberError::ShuttingDown);
            }

            state
                .log
                .append(&record.encode())
                .map_err(EmberError::WalWrite)?;
            state.log.flush().map_err(EmberError::WalSync)?;

            record.apply(&mut state.data);

            state.writes += 1;
            if state.writes >= self.shared.config.compaction_threshold {
                state.writes = 0;
                true
            } else {
                false
            }
        };

        if compaction_due {
            self.shared.spawn_compaction();
        }
        Ok(())
    }

    /// Compact now, on the calling thread
    pub fn compact(&self) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(EmberError::ShuttingDown);
        }
        let mut state = self.shared.state.write();
        state.writes = 0;
        self.shared.compact_locked(&mut state)
    }

    /// Block until every background compaction started so far has finished
    pub fn wait_for_compactions(&self) {
        let workers = std::mem::take(&mut *self.shared.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("compaction thread panicked");
            }
        }
    }

    /// Stop accepting mutations, let compactions finish and sync the log
    pub fn shutdown(&self) -> Result<()> {
        {
            let _state = self.shared.state.write();
            self.shared.closed.store(true, Ordering::Release);
        }

        self.wait_for_compactions();

        let mut state = self.shared.state.write();
        state.log.flush().map_err(EmberError::WalSync)?;
        tracing::info!(keys = state.data.len(), "Engine shut down");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Number of keys stored
    pub fn len(&self) -> usize {
        self.shared.state.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the whole map
    pub fn to_map(&self) -> HashMap<String, String> {
        self.shared.state.read().data.clone()
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.shared.state.read();
        EngineStats {
            keys: state.data.len(),
            writes_since_compaction: state.writes,
            compactions_completed: self.shared.compactions_completed.load(Ordering::Acquire),
            compaction_pending: self.shared.compaction_pending.load(Ordering::Acquire),
        }
    }

    /// What startup recovery found
    pub fn recovery(&self) -> &RecoveryResult {
        &self.shared.recovery
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

impl Shared {
    /// Hand compaction to a background thread unless one is already pending
    fn spawn_compaction(self: &Arc<Self>) {
        // `shutdown` sets `closed` before draining `workers`, so checking it
        // under the same lock means every spawned handle gets joined.
        let mut workers = self.workers.lock();
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if self
            .compaction_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Compaction already pending, not starting another");
            return;
        }

        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("emberkv-compaction".to_string())
            .spawn(move || {
                let result = {
                    let mut state = shared.state.write();
                    shared.compact_locked(&mut state)
                };
                if let Err(e) = result {
                    tracing::error!("Background compaction failed: {}", e);
                }
                shared.compaction_pending.store(false, Ordering::Release);
            });

        match spawned {
            Ok(handle) => {
                workers.retain(|w| !w.is_finished());
                workers.push(handle);
            }
            Err(e) => {
                tracing::error!("Failed to spawn compaction thread: {}", e);
                self.compaction_pending.store(false, Ordering::Release);
            }
        }
    }

    /// Snapshot the map, then empty the log (exclusive lock held by caller)
    fn compact_locked(&self, state: &mut State) -> Result<()> {
        let started = Instant::now();

        let bytes = self.snapshot.write(&state.data)?;
        state.log.truncate().map_err(EmberError::WalWrite)?;

        self.compactions_completed.fetch_add(1, Ordering::AcqRel);
        tracing::info!(
            keys = state.data.len(),
            bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Compaction complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::MemoryLog;
    use tempfile::TempDir;

    fn memory_engine(threshold: usize) -> (TempDir, Engine, MemoryLog) {
        let temp = TempDir::new().unwrap();
        let config = Config::builder()
            .data_dir(temp.path())
            .compaction_threshold(threshold)
            .build();
        let log = MemoryLog::new();
        let engine = Engine::open_with_log(config, Box::new(log.clone())).unwrap();
        (temp, engine, log)
    }

    #[test]
    fn test_set_logs_before_apply() {
        let (_temp, engine, log) = memory_engine(100);

        engine.set("calgary", "flames").unwrap();
        engine.delete("calgary").unwrap();

        assert_eq!(log.records(), vec!["SET calgary flames", "DELETE calgary"]);
        assert_eq!(log.flush_count(), 2);
        assert_eq!(engine.get("calgary"), None);
    }

    #[test]
    fn test_counter_resets_at_threshold() {
        let (_temp, engine, log) = memory_engine(3);

        engine.set("a", "1").unwrap();
        engine.set("b", "2").unwrap();
        assert_eq!(engine.stats().writes_since_compaction, 2);

        engine.delete("a").unwrap();
        assert_eq!(engine.stats().writes_since_compaction, 0);

        engine.wait_for_compactions();
        assert_eq!(engine.stats().compactions_completed, 1);
        assert_eq!(log.truncation_count(), 1);
        assert!(log.records().is_empty());
    }

    #[test]
    fn test_failed_write_does_not_count() {
        let (_temp, engine, log) = memory_engine(100);

        log.fail_appends(true);
        assert!(engine.set("a", "1").is_err());
        log.fail_appends(false);

        assert_eq!(engine.stats().writes_since_compaction, 0);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_execute_outcomes() {
        let (_temp, engine, _log) = memory_engine(100);

        let set = Command::Set {
            key: "k".into(),
            value: "v".into(),
        };
        assert_eq!(engine.execute(set).unwrap(), Outcome::Applied);
        assert_eq!(
            engine.execute(Command::Get { key: "k".into() }).unwrap(),
            Outcome::Value("v".into())
        );
        assert_eq!(
            engine.execute(Command::Delete { key: "k".into() }).unwrap(),
            Outcome::Applied
        );
        assert_eq!(
            engine.execute(Command::Get { key: "k".into() }).unwrap(),
            Outcome::NotFound
        );
    }
}
