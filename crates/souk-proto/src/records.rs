//! Persisted identity record schemas.
//!
//! These are the only records the marketplace persists: the directory's
//! seller endpoints and the buyers' connect/disconnect flags. They are
//! written through the injected record store; the schema makes no
//! assumption about the persistence technology behind it.

use serde::{Deserialize, Serialize};

/// Directory entry for a seller: where buyers can reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerRecord {
    /// Host the seller is listening on.
    pub host: String,
    /// Port the seller is listening on.
    pub port: u16,
}

impl SellerRecord {
    /// The seller's address in `host:port` form.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Identity entry for a buyer.
///
/// The seller node never reads these; the buyer updates its own flag on
/// connect and disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuyerRecord {
    /// Whether the buyer currently holds a seller connection.
    pub connected: bool,
}
