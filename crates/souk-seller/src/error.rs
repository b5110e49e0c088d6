//! Seller node error types.

use souk_core::StoreError;

/// Errors that can occur while starting or running the seller node.
///
/// Per-connection faults never surface here; they are contained to the
/// affected connection's handler. These are the genuinely fatal startup
/// and listener failures.
#[derive(Debug, thiserror::Error)]
pub enum SellerError {
    /// Invalid configuration (bad item spec, bad bind address).
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error on the listening socket.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Directory record store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
