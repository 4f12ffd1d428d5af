//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append a record and force it to stable storage before any mutation
//! - Abstract the log destination behind [`LogSink`] (file or in-memory)
//! - Replay the log on startup, skipping malformed lines
//! - Repair a torn tail left by an interrupted append
//!
//! ## File Format
//! ```text
//! SET <key> <value>\n
//! DELETE <key>\n
//! ...
//! ```
//! One record per line, in the same textual form as client requests. There is
//! no framing or checksum: a line is a record only if it is newline-terminated
//! and parses as `SET` or `DELETE`.

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::WalRecord;
pub use writer::{FileLog, LogSink, MemoryLog};
pub use reader::{LogLine, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
