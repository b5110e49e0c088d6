//! Souk buyer client library.
//!
//! Two entry points: [`fetch_market_listing`] performs a one-shot directory
//! lookup, and [`SellerLink`] holds a live connection to a seller node.
//!
//! A link runs a background reader task that splits the incoming stream by
//! tag: replies go to a channel the next [`SellerLink::request`] call
//! receives from, notifications go to a separate channel the caller drains
//! at its own pace. `request` therefore blocks until the seller answers
//! instead of polling, and broadcasts never get mistaken for replies.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use souk_proto::{Command, MessageError, ServerMessage};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
};

/// Errors from buyer-side operations.
#[derive(Debug, thiserror::Error)]
pub enum BuyerError {
    /// Transport/network error.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The seller sent a line that is not a tagged message.
    #[error("protocol error: {0}")]
    Protocol(#[from] MessageError),

    /// The seller closed the connection.
    #[error("seller disconnected")]
    Disconnected,
}

/// Generate a random four-digit buyer ID.
///
/// Falls back to a fixed ID if the OS entropy source fails, which is
/// acceptable here: IDs are labels, not credentials, and sellers allow
/// duplicates.
pub fn random_buyer_id() -> String {
    let mut bytes = [0_u8; 8];
    if let Err(err) = getrandom::fill(&mut bytes) {
        tracing::error!("random source failed: {}", err);
    }
    let n = u64::from_le_bytes(bytes);
    format!("{}", 1000 + n % 9000)
}

/// Fetch the seller listing from the directory at `addr`.
///
/// The directory writes one listing and closes, so this reads to EOF.
pub async fn fetch_market_listing(addr: &str) -> Result<String, BuyerError> {
    let mut stream = TcpStream::connect(addr).await?;
    let mut listing = String::new();
    stream.read_to_string(&mut listing).await?;
    Ok(listing)
}

/// A live connection to one seller node.
pub struct SellerLink {
    writer: OwnedWriteHalf,
    replies: mpsc::UnboundedReceiver<String>,
    notifications: Option<mpsc::UnboundedReceiver<String>>,
}

impl SellerLink {
    /// Connect to a seller and wait for its greeting.
    ///
    /// Returns the link and the greeting text.
    pub async fn connect(addr: &str) -> Result<(Self, String), BuyerError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();

        let (reply_tx, replies) = mpsc::unbounded_channel();
        let (notify_tx, notifications) = mpsc::unbounded_channel();
        tokio::spawn(read_loop(read_half, reply_tx, notify_tx));

        let mut link =
            Self { writer: write_half, replies, notifications: Some(notifications) };
        let greeting = link.replies.recv().await.ok_or(BuyerError::Disconnected)?;
        Ok((link, greeting))
    }

    /// Take the notification stream.
    ///
    /// Callers typically hand this to a task that displays broadcasts as
    /// they arrive. Returns `None` after the first call.
    pub fn take_notifications(&mut self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.notifications.take()
    }

    /// Send a command and wait for the seller's reply.
    pub async fn request(&mut self, command: &Command) -> Result<String, BuyerError> {
        self.writer.write_all(format!("{command}\n").as_bytes()).await?;
        self.replies.recv().await.ok_or(BuyerError::Disconnected)
    }

    /// Send QUIT and return the farewell reply. The seller closes the
    /// connection afterwards.
    pub async fn quit(mut self) -> Result<String, BuyerError> {
        self.request(&Command::Quit).await
    }
}

/// Route incoming seller lines until the connection closes.
async fn read_loop(
    read_half: OwnedReadHalf,
    reply_tx: mpsc::UnboundedSender<String>,
    notify_tx: mpsc::UnboundedSender<String>,
) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::debug!("read error: {}", err);
                break;
            },
        };

        match ServerMessage::parse(&line) {
            Ok(ServerMessage::Connected(text) | ServerMessage::Reply(text)) => {
                if reply_tx.send(text).is_err() {
                    break;
                }
            },
            Ok(ServerMessage::Notification(text)) => {
                // The caller may have dropped the notification stream;
                // keep routing replies regardless.
                let _ = notify_tx.send(text);
            },
            Err(err) => {
                tracing::warn!("unparseable seller line: {} ({})", line, err);
            },
        }
    }
}
