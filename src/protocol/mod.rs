//! Protocol Module
//!
//! Defines the line-oriented wire protocol for client-server communication.
//!
//! ## Protocol Format
//!
//! Every request and every response is a single ASCII line terminated by `\n`.
//!
//! ```text
//! GET <key>             ->  <value>            | ERROR: Key '<key>' not found.
//! SET <key> <value>     ->  OK                 | ERROR: <message>
//! DELETE <key>          ->  OK                 | ERROR: <message>
//! anything else         ->  <protocol error text>
//! ```
//!
//! Operation names are case-insensitive. Keys and values are single
//! whitespace-free tokens.
//!
//! The same textual form is used for WAL records, so recovery replays the log
//! through [`parse`].

mod command;
mod parser;
mod response;

pub use command::{Command, Operation};
pub use parser::{parse, ParseError};
pub use response::{write_response, Response};
