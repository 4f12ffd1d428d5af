//! # EmberKV
//!
//! A single-node key-value store with:
//! - A newline-delimited text protocol over TCP (`GET`, `SET`, `DELETE`)
//! - Write-Ahead Logging (WAL), fsynced before every acknowledged write
//! - Snapshot compaction that bounds log growth
//! - Crash recovery from snapshot + log, tolerant of torn tails
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │             (one thread per connection)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  line → protocol::parse → Command
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │     RwLock { map, write counter, log }                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  Snapshot   │
//!   │  (Append)   │          │ (Compaction)│
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod wal;
pub mod storage;
pub mod engine;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{EmberError, Result};
pub use config::Config;
pub use engine::{Engine, EngineStats, Outcome};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
