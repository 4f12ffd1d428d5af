//! EmberKV Server Binary
//!
//! Recovers the store, then serves the line protocol over TCP.

use std::sync::Arc;

use clap::Parser;
use emberkv::network::Server;
use emberkv::{Config, EmberError, Engine, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// EmberKV Server
#[derive(Parser, Debug)]
#[command(name = "emberkv-server")]
#[command(about = "Key-value store with WAL durability and snapshot compaction")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./emberkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Writes between compactions
    #[arg(short, long, default_value = "100")]
    compaction_threshold: usize,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,emberkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("EmberKV Server v{}", emberkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .compaction_threshold(args.compaction_threshold)
        .build();

    if let Err(e) = run(config) {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Shutdown complete");
}

fn run(config: Config) -> Result<()> {
    // Recovery finishes before the listener exists
    let engine = Arc::new(Engine::open(config.clone())?);
    tracing::info!("Engine initialized with {} keys", engine.len());

    let server = Server::bind(config, Arc::clone(&engine))?;

    let signal = server.shutdown_signal();
    ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        signal.trigger();
    })
    .map_err(|e| EmberError::Config(format!("failed to install Ctrl+C handler: {}", e)))?;

    server.run()?;
    tracing::info!("Server stopped");

    // The log is released last, after every connection has finished
    engine.shutdown()
}
