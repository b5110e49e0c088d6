//! Souk seller node.
//!
//! This crate provides the production seller runtime:
//! - Tokio TCP transport, one reader and one writer task per buyer
//! - A single `Mutex<Market>` serializing all shared-state access
//! - A ticker task driving the sale countdown and the session scheduler
//!
//! ## Architecture
//!
//! ```text
//! souk-seller
//!   ├─ SystemEnv            (production Environment impl)
//!   ├─ ConnectionRegistry   (conn_id -> writer channel, broadcast fan-out)
//!   ├─ Mutex<Market>        (souk-core: inventory + sale session)
//!   └─ ticker task          (1s tick: countdown, warning, scheduling)
//! ```
//!
//! Market actions are delivered while the lock is still held: a delivery is
//! one non-blocking push onto the connection's writer channel, never a
//! socket write, so buyers observe broadcasts in state-change order and no
//! network I/O ever happens while another buyer's command is waiting on the
//! lock.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod registry;
mod system_env;

use std::{sync::Arc, time::Duration};

pub use error::SellerError;
pub use registry::ConnectionRegistry;
use souk_core::{
    ConnId, Inventory, Market, MarketAction, MarketEvent, SALE_DURATION_SECS, env::Environment,
};
use souk_proto::{Command, ServerMessage};
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, tcp::OwnedWriteHalf},
    sync::{Mutex, mpsc},
};

/// Interval of the session ticker.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Seller runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// This seller's identifier, as published in the directory.
    pub node_id: String,
    /// Address to bind to (e.g. "127.0.0.1:5000").
    pub bind_address: String,
    /// Starting inventory as `(name, stock)` pairs, in sale order.
    pub items: Vec<(String, u64)>,
    /// Length of each sale session.
    pub sale_duration: Duration,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            node_id: "1".to_string(),
            bind_address: "127.0.0.1:5000".to_string(),
            items: vec![
                ("flower".to_string(), 5),
                ("sugar".to_string(), 10),
                ("potato".to_string(), 8),
                ("oil".to_string(), 6),
            ],
            sale_duration: Duration::from_secs(SALE_DURATION_SECS),
        }
    }
}

/// Parse an item spec of the form `flower=5,sugar=10`.
///
/// # Errors
///
/// Returns `SellerError::Config` for a malformed entry or a non-numeric
/// stock value.
pub fn parse_items(spec: &str) -> Result<Vec<(String, u64)>, SellerError> {
    spec.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, stock) = entry
                .split_once('=')
                .ok_or_else(|| SellerError::Config(format!("bad item entry: {entry}")))?;
            let stock = stock
                .trim()
                .parse::<u64>()
                .map_err(|_| SellerError::Config(format!("bad stock for {name}: {stock}")))?;
            Ok((name.trim().to_string(), stock))
        })
        .collect()
}

/// Production seller node.
///
/// Wraps the sans-IO [`Market`] with TCP transport and the session ticker.
pub struct Server {
    listener: TcpListener,
    market: Arc<Mutex<Market<SystemEnv>>>,
    registry: Arc<ConnectionRegistry>,
    env: SystemEnv,
}

impl Server {
    /// Create and bind a new seller node.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, SellerError> {
        let listener = TcpListener::bind(&config.bind_address).await?;
        let env = SystemEnv::new();
        let market = Market::new(
            env.clone(),
            config.node_id,
            Inventory::new(config.items),
            config.sale_duration,
        );

        Ok(Self {
            listener,
            market: Arc::new(Mutex::new(market)),
            registry: Arc::new(ConnectionRegistry::new()),
            env,
        })
    }

    /// The local address the node is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, SellerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the seller node: tick the sale scheduler and accept buyers.
    ///
    /// Runs until the process is terminated; per-connection faults are
    /// contained and never stop the loop.
    pub async fn run(self) -> Result<(), SellerError> {
        tracing::info!("seller listening on {}", self.listener.local_addr()?);

        let ticker_market = Arc::clone(&self.market);
        let ticker_registry = Arc::clone(&self.registry);
        let ticker_env = self.env.clone();
        tokio::spawn(async move {
            loop {
                dispatch(&ticker_market, &ticker_registry, MarketEvent::Tick).await;
                ticker_env.sleep(TICK_INTERVAL).await;
            }
        });

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let conn_id = self.env.random_u64();
                    tracing::debug!(conn_id, %addr, "accepted buyer connection");

                    let market = Arc::clone(&self.market);
                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move {
                        handle_connection(stream, conn_id, market, registry).await;
                    });
                },
                Err(e) => {
                    tracing::error!("accept error: {}", e);
                },
            }
        }
    }
}

/// Per-connection dispatcher: read commands, run them through the market,
/// execute the resulting actions. Teardown always runs exactly once and
/// never propagates an error past this function.
async fn handle_connection(
    stream: tokio::net::TcpStream,
    conn_id: ConnId,
    market: Arc<Mutex<Market<SystemEnv>>>,
    registry: Arc<ConnectionRegistry>,
) {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    registry.register(conn_id, tx);
    tokio::spawn(write_loop(write_half, rx));

    dispatch(&market, &registry, MarketEvent::ConnectionAccepted { conn_id }).await;

    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            // EOF or receive error: terminate without a reply.
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(conn_id, "read error: {}", e);
                break;
            },
        };

        match Command::parse(&line) {
            Ok(command) => {
                let event = MarketEvent::CommandReceived { conn_id, command };
                let disconnected = dispatch(&market, &registry, event).await;
                if disconnected.contains(&conn_id) {
                    break;
                }
            },
            Err(err) => {
                tracing::debug!(conn_id, %err, "unparseable command");
                registry.send_to(conn_id, &ServerMessage::Reply(err.reply_text()));
            },
        }
    }

    registry.remove(conn_id);
    dispatch(&market, &registry, MarketEvent::ConnectionClosed { conn_id }).await;
    tracing::debug!(conn_id, "connection torn down");
}

/// Writer task: drain the connection's channel onto the socket, one line
/// per message. A write failure ends the task; subsequent sends to this
/// connection then fail and the registry prunes it.
async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<ServerMessage>) {
    while let Some(message) = rx.recv().await {
        let line = format!("{message}\n");
        if writer.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Feed one event through the market and deliver the resulting actions.
///
/// The actions are delivered while the market lock is still held. A
/// delivery is one non-blocking push onto the connection's writer channel,
/// not a socket write, so the lock hold stays short; holding it keeps every
/// buyer's stream of broadcasts in the same order as the state changes that
/// produced them. Two back-to-back purchases can therefore never announce
/// their stock levels to any buyer out of order.
///
/// Returns the connections closed by `Disconnect` actions so a dispatcher
/// can notice its own teardown. Dead connections discovered during a
/// broadcast are reported back to the market in the same critical section.
async fn dispatch(
    market: &Mutex<Market<SystemEnv>>,
    registry: &ConnectionRegistry,
    event: MarketEvent,
) -> Vec<ConnId> {
    let mut market = market.lock().await;
    let actions = market.handle(event);

    let mut disconnected = Vec::new();
    for action in actions {
        match action {
            MarketAction::Send { conn_id, message } => {
                if !registry.send_to(conn_id, &message) {
                    tracing::debug!(conn_id, "send to dead connection dropped");
                }
            },

            MarketAction::Broadcast { message } => {
                for conn_id in registry.broadcast(&message) {
                    tracing::debug!(conn_id, "pruned dead connection during broadcast");
                    let _ = market.handle(MarketEvent::ConnectionClosed { conn_id });
                }
            },

            MarketAction::Disconnect { conn_id } => {
                registry.remove(conn_id);
                disconnected.push(conn_id);
            },
        }
    }

    disconnected
}
