//! Connection registry and broadcast fan-out.
//!
//! Maps each attached connection to the unbounded channel feeding its
//! writer task. Delivery is fire-and-forget: a send only fails once the
//! writer task has died (peer gone), so a slow or dead peer never blocks
//! the ticker or another buyer's command. Broadcasts iterate a snapshot
//! and prune failures afterwards, never mutating while iterating.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use souk_core::ConnId;
use souk_proto::ServerMessage;
use tokio::sync::mpsc;

/// The live set of buyer connections eligible for delivery.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: Mutex<HashMap<ConnId, mpsc::UnboundedSender<ServerMessage>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's writer channel.
    pub fn register(&self, conn_id: ConnId, sender: mpsc::UnboundedSender<ServerMessage>) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.insert(conn_id, sender);
    }

    /// Remove a connection. Dropping the sender lets the writer task drain
    /// any queued messages and then close the socket. Returns `false` if
    /// the connection was already gone (teardown runs at most once).
    pub fn remove(&self, conn_id: ConnId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.remove(&conn_id).is_some()
    }

    /// Deliver a message to one connection.
    ///
    /// Returns `false` when the connection is unknown or its writer task
    /// has died; the caller treats that as a connection fault, never an
    /// error to propagate.
    pub fn send_to(&self, conn_id: ConnId, message: &ServerMessage) -> bool {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.get(&conn_id).is_some_and(|sender| sender.send(message.clone()).is_ok())
    }

    /// Broadcast a message to every registered connection.
    ///
    /// Iterates a stable snapshot; connections whose delivery fails are
    /// removed after the sweep and returned so the market can forget them.
    pub fn broadcast(&self, message: &ServerMessage) -> Vec<ConnId> {
        let snapshot: Vec<(ConnId, mpsc::UnboundedSender<ServerMessage>)> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.iter().map(|(&id, sender)| (id, sender.clone())).collect()
        };

        let mut dead = Vec::new();
        for (conn_id, sender) in snapshot {
            if sender.send(message.clone()).is_err() {
                dead.push(conn_id);
            }
        }

        if !dead.is_empty() {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            for conn_id in &dead {
                inner.remove(conn_id);
            }
        }

        dead
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.len()
    }

    /// True when no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> ServerMessage {
        ServerMessage::Notification("Sale session ended.".to_string())
    }

    #[test]
    fn send_to_unknown_connection_fails() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.send_to(1, &notification()));
    }

    #[test]
    fn register_and_send() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(1, tx);

        assert!(registry.send_to(1, &notification()));
        assert_eq!(rx.try_recv().expect("queued"), notification());
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(1, tx);

        assert!(registry.remove(1));
        assert!(!registry.remove(1));
        assert!(!registry.send_to(1, &notification()));
    }

    #[test]
    fn broadcast_reaches_all_live_connections() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(1, tx1);
        registry.register(2, tx2);

        let dead = registry.broadcast(&notification());
        assert!(dead.is_empty());
        assert_eq!(rx1.try_recv().expect("queued"), notification());
        assert_eq!(rx2.try_recv().expect("queued"), notification());
    }

    #[test]
    fn broadcast_prunes_dead_connections_after_the_sweep() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();
        registry.register(1, tx1);
        registry.register(2, tx2);
        drop(rx2); // peer died

        let dead = registry.broadcast(&notification());
        assert_eq!(dead, vec![2]);
        assert_eq!(registry.len(), 1);

        // The live connection still got the message.
        assert_eq!(rx1.try_recv().expect("queued"), notification());
    }
}
