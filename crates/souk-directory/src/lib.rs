//! Souk directory service.
//!
//! Buyers connect, receive one plaintext listing of the known sellers, and
//! the connection closes. No session state is kept. The listing is read
//! from the injected record store on every lookup, so sellers published
//! after the directory started are visible immediately.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use souk_core::{RecordStore, StoreError};
use souk_proto::SellerRecord;
use tokio::{io::AsyncWriteExt, net::TcpListener};

/// Errors from the directory service.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// Transport/network error on the listening socket.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Record store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Render the seller listing sent to a buyer.
///
/// One `ID=.., Host=.., Port=..` line per seller, or a "no sellers"
/// message when the directory is empty.
pub fn render_listing(sellers: &[(String, SellerRecord)]) -> String {
    if sellers.is_empty() {
        return "No sellers available.\n".to_string();
    }

    let mut listing = String::from("Available Sellers:\n");
    for (id, record) in sellers {
        listing.push_str(&format!("ID={id}, Host={}, Port={}\n", record.host, record.port));
    }
    listing
}

/// Serve directory lookups until the process is terminated.
///
/// Each accepted connection receives one listing and is closed; a faulty
/// lookup is contained to that connection.
pub async fn serve(listener: TcpListener, store: Arc<dyn RecordStore>) -> Result<(), DirectoryError> {
    tracing::info!("directory listening on {}", listener.local_addr()?);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tracing::debug!(%addr, "lookup");
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    handle_lookup(stream, &*store).await;
                });
            },
            Err(e) => {
                tracing::error!("accept error: {}", e);
            },
        }
    }
}

/// Answer one lookup: write the listing, close the stream.
async fn handle_lookup(mut stream: tokio::net::TcpStream, store: &dyn RecordStore) {
    let listing = match store.sellers() {
        Ok(sellers) => render_listing(&sellers),
        Err(e) => {
            tracing::error!("failed to load sellers: {}", e);
            "No sellers available.\n".to_string()
        },
    };

    if let Err(e) = stream.write_all(listing.as_bytes()).await {
        tracing::debug!("failed to deliver listing: {}", e);
    }
    let _ = stream.shutdown().await;
}
