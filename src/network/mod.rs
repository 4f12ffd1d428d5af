//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread polling a non-blocking listener
//! - One thread per connection
//! - Commands routed through Engine

mod server;
mod connection;
mod client;

pub use server::{Server, ShutdownSignal};
pub use connection::{respond, Connection};
pub use client::Client;
