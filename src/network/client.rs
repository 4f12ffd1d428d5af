//! Line protocol client
//!
//! Used by the CLI and by end-to-end tests.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::TcpStream;

use crate::error::{EmberError, Result};
use crate::protocol::Command;

/// Blocking client speaking one request line, one response line
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| EmberError::Network(format!("failed to connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Send a raw line and return the response line without its newline
    pub fn request(&mut self, line: &str) -> Result<String> {
        writeln!(self.writer, "{}", line.trim_end())?;
        self.writer.flush()?;

        let mut response = String::new();
        if self.reader.read_line(&mut response)? == 0 {
            return Err(EmberError::Network("server closed the connection".to_string()));
        }
        Ok(response.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Send a command
    pub fn send(&mut self, command: &Command) -> Result<String> {
        self.request(&command.to_string())
    }

    pub fn get(&mut self, key: &str) -> Result<String> {
        self.send(&Command::Get {
            key: key.to_string(),
        })
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<String> {
        self.send(&Command::Set {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    pub fn delete(&mut self, key: &str) -> Result<String> {
        self.send(&Command::Delete {
            key: key.to_string(),
        })
    }
}
