//! WAL Writer
//!
//! The log destination is a capability: anything that can append a record,
//! force it to stable storage and discard everything after a compaction.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// Destination for WAL records
///
/// The engine calls `append` then `flush` for every mutation and treats the
/// record as durable only once `flush` returns `Ok`.
pub trait LogSink: Send + Sync {
    /// Write one encoded record (newline included)
    fn append(&mut self, record: &str) -> io::Result<()>;

    /// Force every appended record to stable storage
    fn flush(&mut self) -> io::Result<()>;

    /// Drop all records; called only after a snapshot is durable
    fn truncate(&mut self) -> io::Result<()>;
}

// =============================================================================
// File-backed log
// =============================================================================

/// Append-only log file, fsynced on every flush
pub struct FileLog {
    path: PathBuf,
    file: File,

    /// File length covering only flushed records
    durable_len: u64,

    /// File length including records appended since the last flush
    written_len: u64,
}

impl FileLog {
    /// Open or create a log file for appending
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = Self::open_append(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            durable_len: len,
            written_len: len,
        })
    }

    fn open_append(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    /// Get the log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the durable part of the log
    pub fn len(&self) -> u64 {
        self.durable_len
    }

    pub fn is_empty(&self) -> bool {
        self.durable_len == 0
    }

    /// Cut the file back to its last durable length so a failed record
    /// cannot be replayed or glued onto the next one.
    fn rollback(&mut self) {
        match self.file.set_len(self.durable_len) {
            Ok(()) => self.written_len = self.durable_len,
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "failed to roll back unflushed log bytes: {}",
                e
            ),
        }
    }
}

impl LogSink for FileLog {
    fn append(&mut self, record: &str) -> io::Result<()> {
        match self.file.write_all(record.as_bytes()) {
            Ok(()) => {
                self.written_len += record.len() as u64;
                Ok(())
            }
            Err(e) => {
                // a partial write leaves an unknown number of bytes behind
                self.rollback();
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.sync_data() {
            Ok(()) => {
                self.durable_len = self.written_len;
                Ok(())
            }
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    fn truncate(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.file = Self::open_append(&self.path)?;
        self.durable_len = 0;
        self.written_len = 0;
        Ok(())
    }
}

// =============================================================================
// In-memory log
// =============================================================================

#[derive(Debug, Default)]
struct MemoryLogState {
    durable: Vec<String>,
    pending: Vec<String>,
    fail_appends: bool,
    fail_flushes: bool,
    flushes: usize,
    truncations: usize,
}

/// In-memory log for tests
///
/// Clones share the same records, so a test can keep one handle while the
/// engine owns another. Failures can be injected on append or flush.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    state: Arc<Mutex<MemoryLogState>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that have been flushed (without newlines)
    pub fn records(&self) -> Vec<String> {
        self.state
            .lock()
            .durable
            .iter()
            .map(|r| r.trim_end().to_string())
            .collect()
    }

    /// Make subsequent appends fail
    pub fn fail_appends(&self, fail: bool) {
        self.state.lock().fail_appends = fail;
    }

    /// Make subsequent flushes fail
    pub fn fail_flushes(&self, fail: bool) {
        self.state.lock().fail_flushes = fail;
    }

    /// Number of successful flushes
    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }

    /// Number of truncations (one per compaction)
    pub fn truncation_count(&self) -> usize {
        self.state.lock().truncations
    }
}

impl LogSink for MemoryLog {
    fn append(&mut self, record: &str) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.fail_appends {
            return Err(io::Error::new(io::ErrorKind::Other, "injected append failure"));
        }
        state.pending.push(record.to_string());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.fail_flushes {
            state.pending.clear();
            return Err(io::Error::new(io::ErrorKind::Other, "injected flush failure"));
        }
        let pending = std::mem::take(&mut state.pending);
        state.durable.extend(pending);
        state.flushes += 1;
        Ok(())
    }

    fn truncate(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        state.durable.clear();
        state.pending.clear();
        state.truncations += 1;
        Ok(())
    }
}
