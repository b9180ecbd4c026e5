//! stampkv CLI
//!
//! Command-line interface for a local stampkv store.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use stampkv::{Lookup, Stamp, StoreConfig, SyncMode, VersionedStore};
use tracing_subscriber::{fmt, EnvFilter};

/// stampkv CLI
#[derive(Parser, Debug)]
#[command(name = "stampkv")]
#[command(about = "Versioned last-writer-wins key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./stampkv_data")]
    data_dir: String,

    /// Commit without fsync; durable on the next clean close
    #[arg(long)]
    eventual: bool,

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

        /// The value to set
        value: String,

        /// Stamp as 32 hex digits or a v1 UUID (default: now)
        #[arg(short, long)]
        stamp: Option<Stamp>,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,

        /// Stamp as 32 hex digits or a v1 UUID (default: now)
        #[arg(short, long)]
        stamp: Option<Stamp>,
    },

    /// Print a fresh stamp
    Stamp,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,stampkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> stampkv::Result<()> {
    let sync_mode = if args.eventual {
        SyncMode::Eventual
    } else {
        SyncMode::Immediate
    };

    let config = StoreConfig::builder()
        .data_dir(&args.data_dir)
        .sync_mode(sync_mode)
        .build();

    match args.command {
        Commands::Stamp => {
            println!("{}", stampkv::new_stamp());
            Ok(())
        }
        command => execute(config, command),
    }
}

fn execute(config: StoreConfig, command: Commands) -> stampkv::Result<()> {
    let store = VersionedStore::open(config)?;

    match command {
        Commands::Get { key } => match store.get(key.as_bytes())? {
            Lookup::Found(envelope) => {
                println!("{}", String::from_utf8_lossy(envelope.payload()));
                println!("stamp: {}", envelope.stamp());
            }
            Lookup::NotFound => println!("(not found)"),
            Lookup::Corrupt(reason) => println!("(corrupt: {})", reason),
        },
        Commands::Set { key, value, stamp } => {
            let stamp = stamp.unwrap_or_else(|| store.new_stamp());
            let outcome = store.conditional_set(key.as_bytes(), value.into_bytes(), stamp)?;
            println!("{} ({})", outcome, stamp);
        }
        Commands::Del { key, stamp } => {
            let stamp = stamp.unwrap_or_else(|| store.new_stamp());
            let outcome = store.conditional_delete(key.as_bytes(), stamp)?;
            println!("{} ({})", outcome, stamp);
        }
        Commands::Stamp => println!("{}", store.new_stamp()),
    }

    store.close()
}
