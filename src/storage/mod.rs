//! Storage Module
//!
//! Persistent snapshot of the full key-value map.
//!
//! ## Responsibilities
//! - Serialize the whole map on compaction
//! - Replace the previous snapshot atomically (write new, sync, rename)
//! - Validate and load the snapshot once at startup
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │ Header                                             │
//! │ ┌──────────┬───────────┬──────────────┬──────────┐ │
//! │ │Magic (4) │Version (2)│Payload Len(8)│ CRC32 (4)│ │
//! │ └──────────┴───────────┴──────────────┴──────────┘ │
//! ├────────────────────────────────────────────────────┤
//! │ Payload: bincode-encoded {entries: key → value}    │
//! └────────────────────────────────────────────────────┘
//! ```

mod snapshot;

pub use snapshot::{SnapshotFile, HEADER_SIZE, MAGIC, VERSION};
