//! Command parser
//!
//! Turns one line of text into a validated [`Command`]. Pure and re-entrant.

use thiserror::Error;

use super::{Command, Operation};

/// Errors produced while parsing a command line
///
/// The `Display` text is sent to clients verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty command.")]
    Empty,

    /// GET or DELETE without exactly one key
    #[error("Usage: {0} [key]")]
    KeyUsage(Operation),

    #[error("Usage: SET [key] [value]")]
    SetUsage,

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}

/// Parse a command line
///
/// Surrounding whitespace (including the trailing newline) is ignored and
/// the operation name is matched case-insensitively.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = words.first() else {
        return Err(ParseError::Empty);
    };

    let op = first.to_uppercase();
    match op.as_str() {
        "GET" => match words.as_slice() {
            [_, key] => Ok(Command::Get { key: key.to_string() }),
            _ => Err(ParseError::KeyUsage(Operation::Get)),
        },
        "DELETE" => match words.as_slice() {
            [_, key] => Ok(Command::Delete { key: key.to_string() }),
            _ => Err(ParseError::KeyUsage(Operation::Delete)),
        },
        "SET" => match words.as_slice() {
            [_, key, value] => Ok(Command::Set {
                key: key.to_string(),
                value: value.to_string(),
            }),
            _ => Err(ParseError::SetUsage),
        },
        _ => Err(ParseError::UnknownOperation(op)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get() {
        assert_eq!(parse("GET a\n"), Ok(Command::Get { key: "a".into() }));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            parse("  set key value  "),
            Ok(Command::Set {
                key: "key".into(),
                value: "value".into()
            })
        );
        assert_eq!(parse("Delete k"), Ok(Command::Delete { key: "k".into() }));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("   \r\n"), Err(ParseError::Empty));
        assert_eq!(ParseError::Empty.to_string(), "Empty command.");
    }

    #[test]
    fn test_parse_wrong_arity() {
        assert_eq!(parse("GET"), Err(ParseError::KeyUsage(Operation::Get)));
        assert_eq!(parse("GET a b"), Err(ParseError::KeyUsage(Operation::Get)));
        assert_eq!(parse("delete"), Err(ParseError::KeyUsage(Operation::Delete)));
        assert_eq!(parse("SET onlyonearg"), Err(ParseError::SetUsage));
        assert_eq!(parse("SET a two words"), Err(ParseError::SetUsage));

        assert_eq!(parse("get").unwrap_err().to_string(), "Usage: GET [key]");
        assert_eq!(parse("DELETE").unwrap_err().to_string(), "Usage: DELETE [key]");
        assert_eq!(
            parse("SET x").unwrap_err().to_string(),
            "Usage: SET [key] [value]"
        );
    }

    #[test]
    fn test_parse_unknown_operation() {
        let err = parse("incr counter").unwrap_err();
        assert_eq!(err, ParseError::UnknownOperation("INCR".into()));
        assert_eq!(err.to_string(), "Unknown operation: INCR");
    }

    #[test]
    fn test_display_matches_request_line() {
        let cmd = parse("set k v").unwrap();
        assert_eq!(cmd.to_string(), "SET k v");
        assert_eq!(cmd.operation(), Operation::Set);
        assert_eq!(cmd.key(), "k");
    }
}
