//! Command definitions
//!
//! Represents commands from clients.

use std::fmt;

/// Operation names recognised on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Set,
    Delete,
}

impl Operation {
    /// Uppercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "GET",
            Operation::Set => "SET",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: String },

    /// Set a key-value pair
    Set { key: String, value: String },

    /// Delete a key
    Delete { key: String },
}

impl Command {
    /// Get the operation of this command
    pub fn operation(&self) -> Operation {
        match self {
            Command::Get { .. } => Operation::Get,
            Command::Set { .. } => Operation::Set,
            Command::Delete { .. } => Operation::Delete,
        }
    }

    /// The key the command addresses
    pub fn key(&self) -> &str {
        match self {
            Command::Get { key } | Command::Set { key, .. } | Command::Delete { key } => key,
        }
    }
}

/// Renders the command back into its request line (without the newline)
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Get { key } => write!(f, "GET {}", key),
            Command::Set { key, value } => write!(f, "SET {} {}", key, value),
            Command::Delete { key } => write!(f, "DELETE {}", key),
        }
    }
}
