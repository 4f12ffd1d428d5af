//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::Path;

use crate::error::Result;

use super::{WalReader, WalRecord};

/// Handles WAL replay after a restart
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Keys loaded from the snapshot before replay
    pub snapshot_keys: usize,

    /// Number of records applied from the log
    pub records_applied: u64,

    /// Number of malformed lines skipped
    pub lines_skipped: u64,

    /// Whether a torn tail was cut from the log
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Replay a WAL file into `data`
    ///
    /// This will:
    /// 1. Apply every well-formed record in file order
    /// 2. Skip malformed lines with a warning
    /// 3. Truncate a trailing partial line so new appends start on a clean line
    ///
    /// A missing file is an empty log.
    pub fn replay(path: &Path, data: &mut HashMap<String, String>) -> Result<RecoveryResult> {
        Self::scan(path, data, true)
    }

    /// Count what a replay would do without modifying the file
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let mut scratch = HashMap::new();
        Self::scan(path, &mut scratch, false)
    }

    fn scan(
        path: &Path,
        data: &mut HashMap<String, String>,
        repair: bool,
    ) -> Result<RecoveryResult> {
        let mut result = RecoveryResult::default();
        let Some(reader) = WalReader::open(path)? else {
            return Ok(result);
        };

        let mut clean_len = 0u64;
        let mut torn_tail = false;

        for line in reader {
            let line = line?;

            if !line.terminated {
                tracing::warn!(
                    line = line.number,
                    bytes = line.bytes.len(),
                    "skipping partial record at end of log"
                );
                result.lines_skipped += 1;
                torn_tail = true;
                break;
            }
            clean_len = line.end_offset;

            let record = match line.text() {
                Some(text) => WalRecord::decode(text),
                None => {
                    tracing::warn!(line = line.number, "skipping non-UTF-8 log line");
                    result.lines_skipped += 1;
                    continue;
                }
            };

            match record {
                Ok(record) => {
                    record.apply(data);
                    result.records_applied += 1;
                }
                Err(e) => {
                    tracing::warn!(line = line.number, "skipping invalid line: {}", e);
                    result.lines_skipped += 1;
                }
            }
        }

        if torn_tail && repair {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(clean_len)?;
            file.sync_all()?;
            result.was_truncated = true;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_log_is_empty() {
        let temp = TempDir::new().unwrap();
        let mut data = HashMap::new();

        let result = WalRecovery::replay(&temp.path().join("wal.log"), &mut data).unwrap();

        assert_eq!(result, RecoveryResult::default());
        assert!(data.is_empty());
    }

    #[test]
    fn test_verify_leaves_torn_tail() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wal.log");
        std::fs::write(&path, "SET a 1\nSET b").unwrap();

        let result = WalRecovery::verify(&path).unwrap();

        assert_eq!(result.records_applied, 1);
        assert_eq!(result.lines_skipped, 1);
        assert!(!result.was_truncated);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "SET a 1\nSET b");
    }
}
