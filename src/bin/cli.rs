//! EmberKV CLI Client
//!
//! Command-line interface for interacting with EmberKV.

use clap::{Parser, Subcommand};
use emberkv::network::Client;

/// EmberKV CLI
#[derive(Parser, Debug)]
#[command(name = "emberkv-cli")]
#[command(about = "CLI for EmberKV key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set (a single token)
        value: String,
    },

    /// Delete a key
    #[command(alias = "del")]
    Delete {
        /// The key to delete
        key: String,
    },

    /// Send a raw protocol line
    Raw {
        /// The line to send, e.g. "SET a 1"
        line: Vec<String>,
    },
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let result = match &args.command {
        Commands::Get { key } => client.get(key),
        Commands::Set { key, value } => client.set(key, value),
        Commands::Delete { key } => client.delete(key),
        Commands::Raw { line } => client.request(&line.join(" ")),
    };

    match result {
        Ok(response) => {
            println!("{}", response);
            if response.starts_with("ERROR") {
                std::process::exit(2);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
