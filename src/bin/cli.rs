//! replikv CLI Client
//!
//! Command-line interface for reading and writing a replikv cluster.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use replikv::{Client, ClientOptions, Table};
use tracing_subscriber::{fmt, EnvFilter};

/// replikv CLI
#[derive(Parser, Debug)]
#[command(name = "replikv-cli")]
#[command(about = "CLI for a replikv key-value cluster")]
#[command(version)]
struct Args {
    /// Meta server list ("ip:port,ip:port,...")
    #[arg(short, long, default_value = "127.0.0.1:34601")]
    meta: String,

    /// Table name
    #[arg(short, long)]
    table: String,

    /// Operation timeout in milliseconds (0 uses the client default)
    #[arg(long, default_value = "0")]
    timeout_ms: u64,

    /// Number of dispatch workers
    #[arg(long, default_value = "1")]
    workers: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value
    Get {
        hash_key: String,
        sort_key: String,
    },

    /// Set a value
    Set {
        hash_key: String,
        sort_key: String,
        value: String,

        /// Time to live in seconds (0 = no expiry)
        #[arg(long, default_value = "0")]
        ttl: u32,
    },

    /// Delete a value
    Del {
        hash_key: String,
        sort_key: String,
    },

    /// Check whether a key exists
    Exist {
        hash_key: String,
        sort_key: String,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,replikv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!("replikv CLI v{}", replikv::VERSION);

    match run(&args) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> replikv::Result<String> {
    let options = ClientOptions::builder()
        .meta_servers(&args.meta)
        .async_workers(args.workers)
        // A one-shot CLI never benefits from periodic refresh
        .refresh_interval(Duration::from_secs(3600))
        .build()?;

    let client = Client::connect_tcp(options)?;
    let table = client.open_table(&args.table)?;
    execute(&table, &args.command, args.timeout_ms)
}

fn execute(table: &Table, command: &Commands, timeout_ms: u64) -> replikv::Result<String> {
    match command {
        Commands::Get { hash_key, sort_key } => {
            let value = table.get(hash_key.as_bytes(), sort_key.as_bytes(), timeout_ms)?;
            Ok(match value {
                Some(value) => String::from_utf8_lossy(&value).into_owned(),
                None => "(nil)".to_string(),
            })
        }
        Commands::Set {
            hash_key,
            sort_key,
            value,
            ttl,
        } => {
            table.set(
                hash_key.as_bytes(),
                sort_key.as_bytes(),
                value.as_bytes(),
                *ttl,
                timeout_ms,
            )?;
            Ok("OK".to_string())
        }
        Commands::Del { hash_key, sort_key } => {
            table.del(hash_key.as_bytes(), sort_key.as_bytes(), timeout_ms)?;
            Ok("OK".to_string())
        }
        Commands::Exist { hash_key, sort_key } => {
            let exists = table.exist(hash_key.as_bytes(), sort_key.as_bytes(), timeout_ms)?;
            Ok(exists.to_string())
        }
    }
}
