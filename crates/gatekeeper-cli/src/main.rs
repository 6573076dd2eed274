//! Command-line front end for the gatekeeper store.
//!
//! Opens the store directory directly, so it must not run concurrently with
//! another process serving the same directory. Every invocation replays the
//! directory on open, which also triggers the startup garbage collection.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use gatekeeper_error::Result;
use gatekeeper_store::{Gatekeeper, segment};
use gatekeeper_types::{Location, StoreConfig};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "gatekeeper")]
#[command(about = "Append-only URL content store")]
#[command(version)]
struct Args {
    /// Store directory
    #[arg(short, long, default_value = "./gatekeeper_data")]
    dir: PathBuf,

    /// Maximum segment size in bytes before rotation
    #[arg(long)]
    max_segment_size: Option<u64>,

    /// Seconds between durability flushes of the active segment
    #[arg(long)]
    sync_interval_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a document under a URL
    Write {
        /// The URL the document was fetched from
        url: String,

        /// Read the payload from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Resolve a URL to its stored location
    Find {
        /// The URL to look up
        url: String,
    },

    /// Print the stored document for a URL
    Read {
        /// The URL to fetch
        url: String,
    },

    /// Summarize the store: key count, index size, segment ids
    Stats,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gatekeeper_store=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let mut config = StoreConfig::new(&args.dir);
    if let Some(bytes) = args.max_segment_size {
        config = config.with_max_segment_size(bytes);
    }
    if let Some(secs) = args.sync_interval_secs {
        config = config.with_sync_interval(Duration::from_secs(secs));
    }
    let store = Gatekeeper::open(config)?;

    match &args.command {
        Command::Write { url, file } => {
            let payload = match file {
                Some(path) => std::fs::read(path)?,
                None => {
                    let mut buf = Vec::new();
                    io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            let location = store.write(url, &payload)?;
            store.close()?;
            print_location(&location);
            Ok(ExitCode::SUCCESS)
        }
        Command::Find { url } => match store.find(url)? {
            Some(location) => {
                print_location(&location);
                Ok(ExitCode::SUCCESS)
            }
            None => {
                eprintln!("not found");
                Ok(ExitCode::from(2))
            }
        },
        Command::Read { url } => match store.find(url)? {
            Some(location) => {
                let payload = store.read(&location)?;
                io::stdout().write_all(&payload)?;
                Ok(ExitCode::SUCCESS)
            }
            None => {
                eprintln!("not found");
                Ok(ExitCode::from(2))
            }
        },
        Command::Stats => {
            let ids: Vec<u64> = segment::list_segments(&args.dir)?
                .into_iter()
                .map(|(id, _)| id)
                .collect();
            let stats = serde_json::json!({
                "keys": store.key_count(),
                "index_nodes": store.node_count(),
                "segments": ids,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).expect("stats value serializes")
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_location(location: &Location) {
    println!(
        "{}",
        serde_json::to_string(location).expect("location serializes")
    );
}
