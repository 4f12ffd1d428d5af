//! WAL record definitions
//!
//! Defines the structure of individual WAL log records.

use std::collections::HashMap;
use std::fmt;

use crate::error::{EmberError, Result};
use crate::protocol::{self, Command};

/// A single durable mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// Install a value under a key
    Set { key: String, value: String },

    /// Remove a key
    Delete { key: String },
}

impl WalRecord {
    /// Encode as a log line, including the trailing newline
    pub fn encode(&self) -> String {
        format!("{}\n", self)
    }

    /// Decode one log line (with or without its newline)
    ///
    /// Anything that is not a well-formed `SET` or `DELETE` is rejected.
    pub fn decode(line: &str) -> Result<Self> {
        let command = protocol::parse(line)?;
        Self::try_from(command)
    }

    /// Check that every field is a single non-empty, whitespace-free token
    ///
    /// Anything else would encode to a line that replays differently, or as
    /// more than one record.
    pub fn validate(&self) -> Result<()> {
        match self {
            WalRecord::Set { key, value } => {
                check_token("key", key)?;
                check_token("value", value)
            }
            WalRecord::Delete { key } => check_token("key", key),
        }
    }

    /// The key this record touches
    pub fn key(&self) -> &str {
        match self {
            WalRecord::Set { key, .. } | WalRecord::Delete { key } => key,
        }
    }

    /// Apply the record to a map: SET overwrites, DELETE removes
    pub fn apply(self, data: &mut HashMap<String, String>) {
        match self {
            WalRecord::Set { key, value } => {
                data.insert(key, value);
            }
            WalRecord::Delete { key } => {
                data.remove(&key);
            }
        }
    }
}

fn check_token(field: &str, token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(EmberError::InvalidRecord(format!("{} must not be empty", field)));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(EmberError::InvalidRecord(format!(
            "{} must not contain whitespace",
            field
        )));
    }
    Ok(())
}

impl fmt::Display for WalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalRecord::Set { key, value } => write!(f, "SET {} {}", key, value),
            WalRecord::Delete { key } => write!(f, "DELETE {}", key),
        }
    }
}

impl TryFrom<Command> for WalRecord {
    type Error = EmberError;

    fn try_from(command: Command) -> Result<Self> {
        match command {
            Command::Set { key, value } => Ok(WalRecord::Set { key, value }),
            Command::Delete { key } => Ok(WalRecord::Delete { key }),
            Command::Get { key } => Err(EmberError::Recovery(format!(
                "GET {} is not a log record",
                key
            ))),
        }
    }
}
