//! Response definitions
//!
//! Represents response lines sent to clients.

use std::fmt;
use std::io::Write;

use crate::error::Result;

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// GET hit: the stored value
    Value(String),

    /// Mutation applied
    Ok,

    /// GET miss for the given key
    NotFound(String),

    /// Engine failure, rendered as `ERROR: <message>`
    Error(String),

    /// Malformed request, rendered as the bare protocol message
    Invalid(String),
}

impl Response {
    /// Create an ERROR response
    pub fn error(message: impl fmt::Display) -> Self {
        Response::Error(message.to_string())
    }

    /// Whether the response reports a failure of any kind
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Response::NotFound(_) | Response::Error(_) | Response::Invalid(_)
        )
    }
}

/// The response line without its trailing newline
impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Value(value) => f.write_str(value),
            Response::Ok => f.write_str("OK"),
            Response::NotFound(key) => write!(f, "ERROR: Key '{}' not found.", key),
            Response::Error(message) => write!(f, "ERROR: {}", message),
            Response::Invalid(message) => f.write_str(message),
        }
    }
}

/// Write a response line to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writeln!(writer, "{}", response)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_lines() {
        assert_eq!(Response::Value("2".into()).to_string(), "2");
        assert_eq!(Response::Ok.to_string(), "OK");
        assert_eq!(
            Response::NotFound("missing".into()).to_string(),
            "ERROR: Key 'missing' not found."
        );
        assert_eq!(
            Response::error("failed to persist: disk full").to_string(),
            "ERROR: failed to persist: disk full"
        );
        assert_eq!(
            Response::Invalid("Usage: SET [key] [value]".into()).to_string(),
            "Usage: SET [key] [value]"
        );
        assert!(Response::NotFound("a".into()).is_error());
        assert!(!Response::Value("ERROR".into()).is_error());
    }

    #[test]
    fn test_write_response_appends_newline() {
        let mut out = Vec::new();
        write_response(&mut out, &Response::Ok).unwrap();
        write_response(&mut out, &Response::NotFound("a".into())).unwrap();
        assert_eq!(out, b"OK\nERROR: Key 'a' not found.\n");
    }
}
