//! Souk seller node binary.
//!
//! # Usage
//!
//! ```bash
//! # Sell the default catalog on an ephemeral port
//! souk-seller --id 1 --bind 127.0.0.1:5000
//!
//! # Custom catalog, published into a directory store
//! souk-seller --id 2 --bind 127.0.0.1:5001 \
//!     --items "flower=5,sugar=10" --store-dir ./market-data
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use souk_core::{JsonFileStore, RecordStore, SALE_DURATION_SECS};
use souk_proto::SellerRecord;
use souk_seller::{Server, ServerRuntimeConfig, parse_items};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Souk seller node
#[derive(Parser, Debug)]
#[command(name = "souk-seller")]
#[command(about = "Timed-sale marketplace seller node")]
#[command(version)]
struct Args {
    /// Seller identifier published in the directory
    #[arg(long)]
    id: String,

    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    bind: String,

    /// Starting inventory, e.g. "flower=5,sugar=10,potato=8,oil=6"
    #[arg(long, default_value = "flower=5,sugar=10,potato=8,oil=6")]
    items: String,

    /// Sale session length in seconds
    #[arg(long, default_value_t = SALE_DURATION_SECS)]
    sale_duration: u64,

    /// Directory holding sellers.json / buyers.json; omit to skip
    /// publishing this seller
    #[arg(long)]
    store_dir: Option<PathBuf>,

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

    tracing::info!("seller {} starting", args.id);

    let config = ServerRuntimeConfig {
        node_id: args.id.clone(),
        bind_address: args.bind,
        items: parse_items(&args.items)?,
        sale_duration: Duration::from_secs(args.sale_duration),
    };

    let server = Server::bind(config).await?;
    let addr = server.local_addr()?;

    if let Some(dir) = args.store_dir {
        let store = JsonFileStore::new(dir);
        let record = SellerRecord { host: addr.ip().to_string(), port: addr.port() };
        store.put_seller(&args.id, &record)?;
        tracing::info!("published seller {} at {}", args.id, record.address());
    }

    server.run().await?;

    Ok(())
}
