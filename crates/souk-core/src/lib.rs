//! Sans-IO marketplace logic for the Souk seller node.
//!
//! The heart of this crate is [`Market`], a state machine that owns the
//! inventory, the current sale session, and the set of attached buyer
//! connections. It consumes [`MarketEvent`]s and returns [`MarketAction`]s
//! for the caller to execute; it performs no I/O itself. The seller runtime
//! wraps one `Market` in a single mutex and delivers the returned actions
//! as writer-channel pushes while still holding the lock, so every buyer
//! observes broadcasts in state-change order; socket writes happen in
//! per-connection writer tasks, never under the lock.
//!
//! ## Architecture
//!
//! ```text
//! souk-seller (tokio runtime)
//!   ├─ SystemEnv            (production Environment impl)
//!   ├─ ConnectionRegistry   (conn_id -> writer task)
//!   └─ Mutex<Market>        (this crate: events in, actions out)
//!        ├─ Inventory       (item -> stock, sole mutation point)
//!        └─ SaleSession     (timed selling round for one item)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
mod inventory;
mod market;
mod session;
pub mod store;

pub use inventory::{Inventory, InventoryError};
pub use market::{ConnId, Market, MarketAction, MarketEvent};
pub use session::{SALE_DURATION_SECS, SaleSession, WARNING_THRESHOLD_SECS};
pub use store::{JsonFileStore, MemoryStore, RecordStore, StoreError};
