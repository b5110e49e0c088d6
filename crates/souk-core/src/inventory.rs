//! Seller inventory.
//!
//! An ordered mapping of item name to remaining stock. Declaration order is
//! preserved so `LIST` output and the Selecting policy are deterministic.
//! `decrement` is the only mutator; stock never goes negative.

/// Errors from inventory operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    /// The named item does not exist in this inventory.
    #[error("unknown item: {item}")]
    UnknownItem {
        /// The item name that was not found.
        item: String,
    },

    /// The requested quantity exceeds the remaining stock.
    ///
    /// The inventory is left unchanged; `remaining` is the true stock at
    /// the time of the attempt, for the rejection reply.
    #[error("insufficient stock: only {remaining} left")]
    InsufficientStock {
        /// Stock remaining at the time of the failed decrement.
        remaining: u64,
    },
}

/// Ordered item -> stock mapping, created once at node startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    items: Vec<(String, u64)>,
}

impl Inventory {
    /// Create an inventory from `(name, stock)` pairs in declaration order.
    ///
    /// A repeated name keeps the last declared stock.
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut ordered: Vec<(String, u64)> = Vec::new();
        for (name, stock) in items {
            if let Some(entry) = ordered.iter_mut().find(|(n, _)| *n == name) {
                entry.1 = stock;
            } else {
                ordered.push((name, stock));
            }
        }
        Self { items: ordered }
    }

    /// Remaining stock for an item, or `None` if the item is unknown.
    pub fn stock(&self, item: &str) -> Option<u64> {
        self.items.iter().find(|(name, _)| name == item).map(|&(_, stock)| stock)
    }

    /// Decrement an item's stock by `qty`.
    ///
    /// This is the only mutation the inventory supports. On success the new
    /// stock is returned.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::UnknownItem` for a missing name and
    /// `InventoryError::InsufficientStock` when `qty` exceeds the remaining
    /// stock; in both cases nothing is mutated.
    pub fn decrement(&mut self, item: &str, qty: u64) -> Result<u64, InventoryError> {
        let entry = self
            .items
            .iter_mut()
            .find(|(name, _)| name == item)
            .ok_or_else(|| InventoryError::UnknownItem { item: item.to_string() })?;

        if qty > entry.1 {
            return Err(InventoryError::InsufficientStock { remaining: entry.1 });
        }

        entry.1 -= qty;
        Ok(entry.1)
    }

    /// Deterministic comma-joined rendering: `name(stock), name(stock)`.
    pub fn render(&self) -> String {
        self.items
            .iter()
            .map(|(name, stock)| format!("{name}({stock})"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The first declared item with stock remaining, if any.
    ///
    /// This is the automated Selecting policy: items go on sale in
    /// declaration order, skipping exhausted ones.
    pub fn next_on_sale(&self) -> Option<&str> {
        self.items.iter().find(|(_, stock)| *stock > 0).map(|(name, _)| name.as_str())
    }

    /// True when every item's stock is zero.
    pub fn is_exhausted(&self) -> bool {
        self.items.iter().all(|(_, stock)| *stock == 0)
    }

    /// Number of distinct items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the inventory holds no items at all.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
