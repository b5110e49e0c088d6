//! Seller-to-buyer message framing.
//!
//! Every seller message is one line of the form `<tag>|<text>`. The tag
//! tells the buyer whether the line answers a command (`Reply`), greets a
//! fresh connection (`Connected`), or is an unsolicited broadcast
//! (`Notification`). The text never contains a newline.

use std::fmt;

/// A message sent from a seller to a buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Greeting sent once when a connection is accepted.
    Connected(String),

    /// Response to a buyer command.
    Reply(String),

    /// Unsolicited broadcast: sale start/end, time warning, stock update,
    /// sellout.
    Notification(String),
}

/// Errors from parsing a seller message line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// The line has no `|` separator.
    #[error("missing '|' separator in message")]
    MissingSeparator,

    /// The tag before the separator is not a known message kind.
    #[error("unknown message tag: {0}")]
    UnknownTag(String),
}

impl ServerMessage {
    /// Parse one seller message line (without the trailing newline).
    ///
    /// # Errors
    ///
    /// Returns `MessageError` when the separator is missing or the tag is
    /// not `Connected`, `Reply`, or `Notification`.
    pub fn parse(line: &str) -> Result<Self, MessageError> {
        let (tag, text) = line.split_once('|').ok_or(MessageError::MissingSeparator)?;
        match tag {
            "Connected" => Ok(Self::Connected(text.to_string())),
            "Reply" => Ok(Self::Reply(text.to_string())),
            "Notification" => Ok(Self::Notification(text.to_string())),
            other => Err(MessageError::UnknownTag(other.to_string())),
        }
    }

    /// The human-readable text carried by the message.
    pub fn text(&self) -> &str {
        match self {
            Self::Connected(text) | Self::Reply(text) | Self::Notification(text) => text,
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(text) => write!(f, "Connected|{text}"),
            Self::Reply(text) => write!(f, "Reply|{text}"),
            Self::Notification(text) => write!(f, "Notification|{text}"),
        }
    }
}
