//! Souk buyer binary: interactive terminal client.
//!
//! # Usage
//!
//! ```bash
//! souk-buyer --directory 127.0.0.1:8888 --store-dir ./market-data
//! ```
//!
//! Presents a menu for directory lookups and seller sessions. Broadcasts
//! from the connected seller are printed as they arrive, prefixed with
//! `>>`, even while the menu is waiting for input.

use std::path::PathBuf;

use clap::Parser;
use souk_buyer::{BuyerError, SellerLink, fetch_market_listing, random_buyer_id};
use souk_core::{JsonFileStore, RecordStore};
use souk_proto::{BuyerRecord, Command};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Souk marketplace buyer
#[derive(Parser, Debug)]
#[command(name = "souk-buyer")]
#[command(about = "Interactive marketplace buyer client")]
#[command(version)]
struct Args {
    /// Directory service address
    #[arg(short, long, default_value = "127.0.0.1:8888")]
    directory: String,

    /// Buyer ID; a random four-digit ID is generated when omitted
    #[arg(long)]
    id: Option<String>,

    /// Directory holding sellers.json / buyers.json; omit to skip
    /// registering this buyer
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

struct Client {
    buyer_id: String,
    directory: String,
    store: Option<JsonFileStore>,
    link: Option<SellerLink>,
}

impl Client {
    fn set_connected(&self, connected: bool) {
        if let Some(store) = &self.store {
            if let Err(err) = store.put_buyer(&self.buyer_id, &BuyerRecord { connected }) {
                tracing::warn!("failed to update buyer record: {}", err);
            }
        }
    }

    async fn show_directory(&self) {
        match fetch_market_listing(&self.directory).await {
            Ok(listing) => print!("{listing}"),
            Err(err) => println!("Directory lookup failed: {err}"),
        }
    }

    async fn connect(&mut self, addr: &str) {
        if self.link.is_some() {
            println!("Already connected; leave the current seller first.");
            return;
        }

        let (mut link, greeting) = match SellerLink::connect(addr).await {
            Ok(connected) => connected,
            Err(err) => {
                println!("Connection failed: {err}");
                return;
            },
        };
        println!("{greeting}");

        if let Some(mut notifications) = link.take_notifications() {
            tokio::spawn(async move {
                while let Some(text) = notifications.recv().await {
                    println!(">> {text}");
                }
            });
        }

        match link.request(&Command::Id(self.buyer_id.clone())).await {
            Ok(reply) => println!("{reply}"),
            Err(err) => {
                println!("Registration failed: {err}");
                return;
            },
        }

        self.link = Some(link);
        self.set_connected(true);
    }

    async fn request(&mut self, command: Command) {
        let Some(link) = self.link.as_mut() else {
            println!("Not connected to a seller.");
            return;
        };

        match link.request(&command).await {
            Ok(reply) => println!("{reply}"),
            Err(err) => {
                println!("Request failed: {err}");
                self.drop_link();
            },
        }
    }

    async fn leave(&mut self) {
        let Some(link) = self.link.take() else {
            println!("Not connected to a seller.");
            return;
        };

        match link.quit().await {
            Ok(farewell) => println!("{farewell}"),
            Err(BuyerError::Disconnected) => {},
            Err(err) => println!("Error while leaving: {err}"),
        }
        self.set_connected(false);
    }

    fn drop_link(&mut self) {
        self.link = None;
        self.set_connected(false);
    }
}

async fn prompt(input: &mut Lines<BufReader<Stdin>>, text: &str) -> Option<String> {
    println!("{text}");
    let line = input.next_line().await.ok().flatten()?;
    let line = line.trim().to_string();
    if line.is_empty() { None } else { Some(line) }
}

fn print_menu() {
    println!();
    println!("--- Souk buyer ---");
    println!("1) Show market directory");
    println!("2) Connect to a seller");
    println!("3) List items");
    println!("4) Current sale");
    println!("5) Buy");
    println!("6) Leave seller");
    println!("0) Exit");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let buyer_id = args.id.unwrap_or_else(random_buyer_id);
    println!("Your buyer ID: {buyer_id}");

    let store = args.store_dir.map(JsonFileStore::new);
    let mut client = Client { buyer_id, directory: args.directory, store, link: None };
    client.set_connected(false);

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_menu();
        println!("Choice:");
        // Stdin EOF ends the session.
        let Some(line) = input.next_line().await.ok().flatten() else {
            break;
        };

        match line.trim() {
            "1" => client.show_directory().await,
            "2" => {
                let Some(addr) = prompt(&mut input, "Seller address (host:port):").await else {
                    continue;
                };
                client.connect(&addr).await;
            },
            "3" => client.request(Command::List).await,
            "4" => client.request(Command::Current).await,
            "5" => {
                let Some(amount) = prompt(&mut input, "Amount:").await else {
                    continue;
                };
                let qty = amount.parse::<u64>().ok().filter(|&q| q > 0);
                client.request(Command::Buy { qty }).await;
            },
            "6" => client.leave().await,
            "0" => break,
            "" => {},
            other => println!("Unknown choice: {other}"),
        }
    }

    if client.link.is_some() {
        client.leave().await;
    }

    Ok(())
}
