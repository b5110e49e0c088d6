//! Market state machine.
//!
//! `Market` is the single aggregate the seller runtime serializes behind
//! one lock: inventory, sale session, and attached buyer connections. It is
//! action-based: every event returns the sends and broadcasts the caller
//! must perform, and no I/O happens in here. That keeps socket writes out
//! of the lock's critical section and makes every concurrency property
//! testable without sockets.
//!
//! ## Responsibilities
//!
//! - Connection lifecycle: register on accept, drop on QUIT/disconnect
//! - Command dispatch: LIST / CURRENT / BUY / ID / QUIT against shared state
//! - Sale scheduling: start successive sessions, tick the countdown,
//!   broadcast start/warning/stock/sellout/end notices

use std::{collections::HashMap, time::Duration};

use souk_proto::{Command, ServerMessage};

use crate::{
    env::Environment,
    inventory::{Inventory, InventoryError},
    session::SaleSession,
};

/// Identifier for one attached buyer connection.
pub type ConnId = u64;

/// A registered buyer connection.
///
/// The connection handle itself lives in the runtime's registry; the market
/// only tracks the identity state the protocol needs.
#[derive(Debug)]
struct BuyerConn {
    /// Buyer ID, set lazily by the `ID` command.
    buyer_id: Option<String>,
}

/// Events fed into the market by the seller runtime.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    /// A buyer connection was accepted.
    ConnectionAccepted {
        /// Identifier assigned to the new connection.
        conn_id: ConnId,
    },

    /// A complete command line was received from a buyer.
    CommandReceived {
        /// Connection the command arrived on.
        conn_id: ConnId,
        /// The parsed command.
        command: Command,
    },

    /// A buyer connection was torn down (EOF, reset, or write failure).
    ConnectionClosed {
        /// Connection that went away.
        conn_id: ConnId,
    },

    /// Periodic timer tick driving the sale countdown and the scheduler.
    Tick,
}

/// Actions returned by the market for the runtime to execute.
///
/// The runtime delivers these as non-blocking pushes onto per-connection
/// writer channels while still holding the market lock, so broadcasts reach
/// every buyer in state-change order and a slow or dead peer still cannot
/// block the ticker or another buyer's command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketAction {
    /// Deliver a message to one connection.
    Send {
        /// Target connection.
        conn_id: ConnId,
        /// Message to deliver.
        message: ServerMessage,
    },

    /// Deliver a notification to every attached connection.
    Broadcast {
        /// Message to fan out.
        message: ServerMessage,
    },

    /// Close one connection (after any preceding `Send` to it).
    Disconnect {
        /// Connection to close.
        conn_id: ConnId,
    },
}

/// The seller node's shared state: inventory, session, connections.
pub struct Market<E: Environment> {
    node_id: String,
    inventory: Inventory,
    session: Option<SaleSession>,
    sale_duration: Duration,
    connections: HashMap<ConnId, BuyerConn>,
    /// Set once the catalog is exhausted; the scheduler then stays idle.
    closed: bool,
    env: E,
}

impl<E: Environment> Market<E> {
    /// Create a market for `node_id` selling `inventory`, with each sale
    /// session lasting `sale_duration`.
    pub fn new(env: E, node_id: impl Into<String>, inventory: Inventory, sale_duration: Duration) -> Self {
        Self {
            node_id: node_id.into(),
            inventory,
            session: None,
            sale_duration,
            connections: HashMap::new(),
            closed: false,
            env,
        }
    }

    /// Process one event and return the actions to execute.
    pub fn handle(&mut self, event: MarketEvent) -> Vec<MarketAction> {
        match event {
            MarketEvent::ConnectionAccepted { conn_id } => self.handle_accepted(conn_id),
            MarketEvent::CommandReceived { conn_id, command } => self.handle_command(conn_id, command),
            MarketEvent::ConnectionClosed { conn_id } => {
                if self.connections.remove(&conn_id).is_some() {
                    tracing::debug!(conn_id, "buyer disconnected");
                }
                Vec::new()
            },
            MarketEvent::Tick => self.handle_tick(),
        }
    }

    /// True while a sale session is running.
    pub fn is_selling(&self) -> bool {
        self.session.is_some()
    }

    /// The current sale as `(item, stock, time_left)`, if one is active.
    pub fn current(&self) -> Option<(&str, u64, u64)> {
        let session = self.session.as_ref()?;
        let stock = self.inventory.stock(session.item()).unwrap_or(0);
        Some((session.item(), stock, session.time_left(self.env.now())))
    }

    /// Remaining stock for an item.
    pub fn stock(&self, item: &str) -> Option<u64> {
        self.inventory.stock(item)
    }

    /// Number of attached buyer connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// True once the catalog is exhausted and the market has closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn handle_accepted(&mut self, conn_id: ConnId) -> Vec<MarketAction> {
        self.connections.insert(conn_id, BuyerConn { buyer_id: None });
        tracing::debug!(conn_id, "buyer connected");

        vec![MarketAction::Send {
            conn_id,
            message: ServerMessage::Connected(format!("Connected to seller {}.", self.node_id)),
        }]
    }

    fn handle_command(&mut self, conn_id: ConnId, command: Command) -> Vec<MarketAction> {
        if !self.connections.contains_key(&conn_id) {
            // Command raced a teardown; nothing to reply to.
            return Vec::new();
        }

        match command {
            Command::Id(id) => {
                tracing::debug!(conn_id, buyer_id = %id, "buyer registered ID");
                if let Some(conn) = self.connections.get_mut(&conn_id) {
                    conn.buyer_id = Some(id);
                }
                vec![reply(conn_id, "Buyer ID registered.")]
            },

            Command::List => {
                vec![reply(conn_id, format!("Items: {}", self.inventory.render()))]
            },

            Command::Current => match self.current() {
                None => vec![reply(conn_id, "No active sale.")],
                Some((item, stock, left)) => {
                    vec![reply(conn_id, format!("Current: {item}, stock={stock}, time={left}s"))]
                },
            },

            Command::Buy { qty } => self.handle_buy(conn_id, qty),

            Command::Quit => {
                self.connections.remove(&conn_id);
                tracing::debug!(conn_id, "buyer left");
                vec![reply(conn_id, "You have left."), MarketAction::Disconnect { conn_id }]
            },
        }
    }

    /// BUY precondition order: buyer ID, active sale, then the quantity
    /// argument. Only then is the decrement attempted.
    fn handle_buy(&mut self, conn_id: ConnId, qty: Option<u64>) -> Vec<MarketAction> {
        let now = self.env.now();

        let Some(buyer_id) = self.connections.get(&conn_id).and_then(|c| c.buyer_id.clone()) else {
            return vec![reply(conn_id, "Error: Buyer ID not set.")];
        };

        let active = self.session.as_ref().is_some_and(|s| !s.expired(now));
        if !active {
            return vec![reply(conn_id, "Sale is over. You cannot buy.")];
        }

        let Some(qty) = qty else {
            return vec![reply(conn_id, "Usage: BUY <amount>")];
        };

        let item = match self.session.as_ref() {
            Some(session) => session.item().to_string(),
            None => return vec![reply(conn_id, "Sale is over. You cannot buy.")],
        };

        match self.inventory.decrement(&item, qty) {
            Err(InventoryError::InsufficientStock { remaining }) => {
                vec![reply(conn_id, format!("Only {remaining} left."))]
            },
            Err(InventoryError::UnknownItem { item }) => {
                // The session item always exists in the inventory; treat a
                // mismatch as a closed sale rather than crashing the node.
                tracing::error!(%item, "sale session references unknown item");
                vec![reply(conn_id, "Sale is over. You cannot buy.")]
            },
            Ok(new_stock) => {
                tracing::info!(%buyer_id, %item, qty, new_stock, "purchase");

                let mut actions = vec![
                    reply(conn_id, format!("Purchase OK: bought {qty}.")),
                    MarketAction::Broadcast {
                        message: ServerMessage::Notification(format!(
                            "Item '{item}' now has {new_stock} left."
                        )),
                    },
                ];

                if new_stock == 0 {
                    // Stock exhaustion ends the session right here, so the
                    // sellout notice is the session's end notification.
                    self.session = None;
                    tracing::info!(%item, "sold out");
                    actions.push(MarketAction::Broadcast {
                        message: ServerMessage::Notification(format!(
                            "'{item}' has been sold out."
                        )),
                    });
                    self.start_next_sale(&mut actions);
                }

                actions
            },
        }
    }

    /// Tick: advance the countdown, fire the one-time warning, end the
    /// session on expiry, and keep the scheduler loop going.
    fn handle_tick(&mut self) -> Vec<MarketAction> {
        let now = self.env.now();
        let mut actions = Vec::new();

        if let Some(session) = self.session.as_mut() {
            if session.take_warning(now) {
                actions.push(MarketAction::Broadcast {
                    message: ServerMessage::Notification(
                        "10 seconds left for this item.".to_string(),
                    ),
                });
            }

            if session.expired(now) {
                tracing::info!(item = session.item(), "sale session ended");
                self.session = None;
                actions.push(MarketAction::Broadcast {
                    message: ServerMessage::Notification("Sale session ended.".to_string()),
                });
            }
        }

        if self.session.is_none() && !self.closed {
            self.start_next_sale(&mut actions);
        }

        actions
    }

    /// Selecting: put the next in-stock item on sale, or close the market
    /// once the catalog is exhausted. Appends the announcement to `actions`.
    fn start_next_sale(&mut self, actions: &mut Vec<MarketAction>) {
        match self.inventory.next_on_sale() {
            Some(item) => {
                let item = item.to_string();
                let stock = self.inventory.stock(&item).unwrap_or(0);
                let now = self.env.now();
                self.session = Some(SaleSession::new(item.clone(), now, self.sale_duration));

                tracing::info!(%item, stock, "new item on sale");
                actions.push(MarketAction::Broadcast {
                    message: ServerMessage::Notification(format!(
                        "New item on sale: {item} (stock: {stock})"
                    )),
                });
            },
            None => {
                self.closed = true;
                tracing::info!("catalog exhausted, market closed");
                actions.push(MarketAction::Broadcast {
                    message: ServerMessage::Notification(
                        "Market closed: all items are sold out.".to_string(),
                    ),
                });
            },
        }
    }
}

impl<E: Environment> std::fmt::Debug for Market<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Market")
            .field("node_id", &self.node_id)
            .field("selling", &self.session.as_ref().map(SaleSession::item))
            .field("connections", &self.connections.len())
            .field("closed", &self.closed)
            .finish()
    }
}

fn reply(conn_id: ConnId, text: impl Into<String>) -> MarketAction {
    MarketAction::Send { conn_id, message: ServerMessage::Reply(text.into()) }
}
