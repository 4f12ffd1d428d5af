//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{self, BufRead, BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{Engine, Outcome};
use crate::error::{EmberError, Result};
use crate::protocol::{self, write_response, Response};

use super::ShutdownSignal;

/// Turn one request line into its response
///
/// This is the only place engine results become wire text.
pub fn respond(engine: &Engine, line: &str) -> Response {
    let command = match protocol::parse(line) {
        Ok(command) => command,
        Err(e) => return Response::Invalid(e.to_string()),
    };

    let key = command.key().to_string();
    match engine.execute(command) {
        Ok(Outcome::Value(value)) => Response::Value(value),
        Ok(Outcome::NotFound) => Response::NotFound(key),
        Ok(Outcome::Applied) => Response::Ok,
        Err(e) => Response::error(e),
    }
}

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the storage engine
    engine: Arc<Engine>,

    /// Checked whenever a read times out
    shutdown: ShutdownSignal,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, engine: Arc<Engine>, shutdown: ShutdownSignal) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            engine,
            shutdown,
            peer_addr,
        })
    }

    /// Configure connection timeouts
    ///
    /// The read timeout is only a wake-up tick for noticing shutdown; an idle
    /// client is never disconnected by it.
    pub fn set_timeouts(&mut self, poll_ms: u64, write_ms: u64) -> Result<()> {
        if poll_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(poll_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads one line at a time and answers each with one line. Returns when
    /// the client disconnects, a read fails, or the server shuts down between
    /// requests.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        let mut buf = Vec::new();
        loop {
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Ok(_) if buf.last() != Some(&b'\n') => {
                    // EOF in the middle of a line
                    tracing::debug!(
                        "Client {} disconnected with {} unterminated bytes",
                        self.peer_addr,
                        buf.len()
                    );
                    return Ok(());
                }
                Ok(_) => {}
                Err(ref e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    // bytes read before the timeout stay in `buf`
                    if self.shutdown.is_triggered() {
                        tracing::debug!("Closing idle connection {} for shutdown", self.peer_addr);
                        return Ok(());
                    }
                    continue;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!("Read from {} failed: {}", self.peer_addr, e);
                    return Ok(());
                }
            }

            let line = String::from_utf8_lossy(&buf).into_owned();
            buf.clear();

            let response = respond(&self.engine, &line);
            tracing::trace!(
                "{} {:?} -> {}",
                self.peer_addr,
                line.trim_end(),
                response
            );

            if let Err(e) = self.send_response(&response) {
                if let EmberError::Io(ref io_err) = e {
                    match io_err.kind() {
                        io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::ConnectionReset
                        | io::ErrorKind::BrokenPipe => {
                            tracing::debug!(
                                "Client {} disconnected before response could be sent: {}",
                                self.peer_addr,
                                e
                            );
                            return Ok(());
                        }
                        _ => {}
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }

            if self.shutdown.is_triggered() {
                tracing::debug!("Closing connection {} for shutdown", self.peer_addr);
                return Ok(());
            }
        }
    }

    /// Send a response to the client
    fn send_response(&mut self, response: &Response) -> Result<()> {
        write_response(&mut self.writer, response)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
