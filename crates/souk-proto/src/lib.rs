//! Souk wire protocol.
//!
//! The seller and buyer speak a line-delimited text protocol over one
//! persistent stream per buyer-seller pair:
//!
//! - Buyer -> seller: `ID <id>`, `LIST`, `CURRENT`, `BUY <qty>`, `QUIT`
//! - Seller -> buyer: `Connected|<text>` (on accept), `Reply|<text>`
//!   (response to a command), `Notification|<text>` (unsolicited broadcast)
//!
//! This crate also defines the record schemas persisted through the
//! directory store (`SellerRecord`, `BuyerRecord`).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod message;
mod records;

pub use command::{Command, CommandError};
pub use message::{MessageError, ServerMessage};
pub use records::{BuyerRecord, SellerRecord};
