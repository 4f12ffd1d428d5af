//! Error types for EmberKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::protocol::ParseError;

/// Result type alias using EmberError
pub type Result<T> = std::result::Result<T, EmberError>;

/// Unified error type for EmberKV operations
#[derive(Debug, Error)]
pub enum EmberError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Protocol(#[from] ParseError),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    /// The record could not be written to the log
    #[error("failed to write to log: {0}")]
    WalWrite(#[source] std::io::Error),

    /// The record was written but could not be forced to stable storage
    #[error("failed to persist: {0}")]
    WalSync(#[source] std::io::Error),

    /// Key or value the line-oriented log cannot represent
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("recovery failed: {0}")]
    Recovery(String),

    // -------------------------------------------------------------------------
    // Snapshot Errors
    // -------------------------------------------------------------------------
    #[error("snapshot write failed: {0}")]
    Snapshot(String),

    #[error("snapshot corrupted: {0}")]
    SnapshotCorrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Lifecycle / Network / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("store is shutting down")]
    ShuttingDown,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for EmberError {
    fn from(err: bincode::Error) -> Self {
        EmberError::Serialization(err.to_string())
    }
}
