//! Souk directory binary.
//!
//! # Usage
//!
//! ```bash
//! souk-directory --bind 127.0.0.1:8888 --store-dir ./market-data
//! ```

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use souk_core::JsonFileStore;
use souk_directory::serve;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Souk marketplace directory
#[derive(Parser, Debug)]
#[command(name = "souk-directory")]
#[command(about = "Marketplace directory serving seller listings")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1:8888")]
    bind: String,

    /// Directory holding sellers.json / buyers.json
    #[arg(long, default_value = "./market-data")]
    store_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let store = Arc::new(JsonFileStore::new(&args.store_dir));
    let listener = TcpListener::bind(&args.bind).await?;

    serve(listener, store).await?;

    Ok(())
}
