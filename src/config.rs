//! Configuration for EmberKV
//!
//! Centralized configuration with sensible defaults.

use std::path::{Path, PathBuf};

use crate::error::{EmberError, Result};

/// File name of the write-ahead log inside `data_dir`
pub const WAL_FILENAME: &str = "wal.log";

/// File name of the snapshot inside `data_dir`
pub const SNAPSHOT_FILENAME: &str = "snapshot.bin";

/// Number of successful mutations that triggers a compaction
pub const DEFAULT_COMPACTION_THRESHOLD: usize = 100;

/// Main configuration for an EmberKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── snapshot.bin     (last compacted state)
    pub data_dir: PathBuf,

    /// Mutations since the last compaction that trigger the next one
    pub compaction_threshold: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// How often a blocked connection wakes up to check for shutdown (milliseconds)
    pub poll_interval_ms: u64,

    /// Connection write timeout (milliseconds, 0 disables)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./emberkv_data"),
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            listen_addr: "127.0.0.1:8080".to_string(),
            max_connections: 1024,
            poll_interval_ms: 200,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Path of the write-ahead log
    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(WAL_FILENAME)
    }

    /// Path of the snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILENAME)
    }

    /// Reject settings the engine or server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.compaction_threshold == 0 {
            return Err(EmberError::Config(
                "compaction_threshold must be at least 1".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(EmberError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(EmberError::Config(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Default config rooted at `path`
    pub fn at(path: &Path) -> Self {
        Self {
            data_dir: path.to_path_buf(),
            ..Self::default()
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set how many mutations trigger a compaction
    pub fn compaction_threshold(mut self, writes: usize) -> Self {
        self.config.compaction_threshold = writes;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the shutdown poll interval (in milliseconds)
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
