//! Buyer command parsing.
//!
//! Commands are single lines of whitespace-separated tokens. The verb is
//! case-insensitive; arguments are taken verbatim. Parsing is total: any
//! input maps to either a `Command` or a `CommandError`, never a panic.

use std::fmt;

/// A command sent by a buyer to a seller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Associate a buyer ID with this connection.
    Id(String),

    /// Request the full item listing with current stock.
    List,

    /// Request the item currently on sale.
    Current,

    /// Purchase a quantity of the item on sale.
    ///
    /// `qty` is `None` when the argument was missing, zero, or not a
    /// positive integer. The seller validates it after the buyer-ID and
    /// sale-active preconditions, so the argument is carried through parse
    /// rather than rejected here.
    Buy {
        /// Requested quantity, when it parsed as a positive integer.
        qty: Option<u64>,
    },

    /// Leave the seller. The connection is closed after the farewell reply.
    Quit,
}

/// Errors from parsing a buyer command line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The line contained no tokens.
    #[error("empty command")]
    Empty,

    /// The verb is not part of the protocol.
    #[error("unknown command: {0}")]
    UnknownVerb(String),

    /// The verb requires an argument that was not supplied.
    #[error("missing argument for {verb}")]
    MissingArgument {
        /// The verb that was missing its argument.
        verb: &'static str,
    },
}

impl CommandError {
    /// The reply text a seller sends for a line that failed to parse.
    ///
    /// Lives here so the wording has one home beside the parser: a bare
    /// `ID` gets a usage hint, everything else is an unknown command.
    pub fn reply_text(&self) -> String {
        match self {
            Self::MissingArgument { verb } => format!("Usage: {verb} <id>"),
            Self::Empty | Self::UnknownVerb(_) => "Unknown command.".to_string(),
        }
    }
}

impl Command {
    /// Parse one command line.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` for an empty line, an unknown verb, or a
    /// bare `ID` with no argument. A malformed `BUY` quantity is not a
    /// parse error; it surfaces as `Buy { qty: None }`.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next().ok_or(CommandError::Empty)?;

        match verb.to_ascii_uppercase().as_str() {
            "ID" => {
                let id = tokens.next().ok_or(CommandError::MissingArgument { verb: "ID" })?;
                Ok(Self::Id(id.to_string()))
            },
            "LIST" => Ok(Self::List),
            "CURRENT" => Ok(Self::Current),
            "BUY" => {
                let qty = tokens.next().and_then(|arg| arg.parse::<u64>().ok()).filter(|&q| q > 0);
                Ok(Self::Buy { qty })
            },
            "QUIT" => Ok(Self::Quit),
            other => Err(CommandError::UnknownVerb(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "ID {id}"),
            Self::List => write!(f, "LIST"),
            Self::Current => write!(f, "CURRENT"),
            Self::Buy { qty: Some(qty) } => write!(f, "BUY {qty}"),
            Self::Buy { qty: None } => write!(f, "BUY"),
            Self::Quit => write!(f, "QUIT"),
        }
    }
}
