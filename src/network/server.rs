//! TCP Server
//!
//! Accepts connections and runs each on its own thread.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::sync::WaitGroup;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{EmberError, Result};

use super::Connection;

/// Sleep between accept attempts when no client is waiting
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// Cloneable flag telling the server and its connections to stop
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Decrements the live connection count when a connection thread ends
struct ConnectionSlot {
    active: Arc<AtomicUsize>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// TCP server for EmberKV
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: ShutdownSignal,
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the listen address from `config`
    ///
    /// The engine must already be recovered; binding happens only after.
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            EmberError::Network(format!("failed to listen on {}: {}", config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: ShutdownSignal::new(),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle that stops `run` when triggered
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Accept connections until shutdown, then wait for every connection
    /// thread to finish its current request and exit.
    pub fn run(&self) -> Result<()> {
        tracing::info!("Server listening on {}", self.local_addr()?);

        let wait_group = WaitGroup::new();
        while !self.shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, addr)) => self.dispatch(stream, addr, &wait_group),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_BACKOFF),
                Err(e) => {
                    tracing::warn!("Error accepting connection: {}", e);
                    thread::sleep(ACCEPT_BACKOFF);
                }
            }
        }

        tracing::info!(
            active = self.active_connections(),
            "Stopped accepting, waiting for connections to finish"
        );
        wait_group.wait();
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, addr: SocketAddr, wait_group: &WaitGroup) {
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!("Dropping connection from {}: {}", addr, e);
            return;
        }

        if self.active.fetch_add(1, Ordering::AcqRel) >= self.config.max_connections {
            self.active.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!("Rejecting {}: connection limit reached", addr);
            let mut stream = stream;
            let _ = stream.write_all(b"ERROR: too many connections\n");
            return;
        }
        let slot = ConnectionSlot {
            active: Arc::clone(&self.active),
        };

        let engine = Arc::clone(&self.engine);
        let shutdown = self.shutdown.clone();
        let poll_ms = self.config.poll_interval_ms;
        let write_ms = self.config.write_timeout_ms;
        let wait_group = wait_group.clone();

        let spawned = thread::Builder::new()
            .name(format!("emberkv-conn-{}", addr))
            .spawn(move || {
                let _slot = slot;
                let _wait_group = wait_group;

                let result = Connection::new(stream, engine, shutdown).and_then(|mut conn| {
                    conn.set_timeouts(poll_ms, write_ms)?;
                    conn.handle()
                });
                if let Err(e) = result {
                    tracing::warn!("Connection {} ended with error: {}", addr, e);
                }
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn connection thread for {}: {}", addr, e);
        }
    }
}
