//! Injected record store for directory and buyer identity records.
//!
//! The core only ever reads and writes records through [`RecordStore`]; it
//! assumes nothing about the persistence technology. [`MemoryStore`] backs
//! tests, [`JsonFileStore`] persists the original flat-file layout (one
//! JSON object per namespace: `sellers.json`, `buyers.json`). Writes are
//! not required to be atomic across crashes.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError, RwLock},
};

use serde::{Serialize, de::DeserializeOwned};
use souk_proto::{BuyerRecord, SellerRecord};

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying I/O failure.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be encoded or decoded.
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Narrow key-value interface over the marketplace's identity records.
///
/// Sellers append/update their own directory entry at startup; buyers
/// register their identity and flip the `connected` flag on connect and
/// disconnect. Nothing else touches these records.
pub trait RecordStore: Send + Sync {
    /// All known seller records, in stable (sorted) order.
    fn sellers(&self) -> Result<Vec<(String, SellerRecord)>, StoreError>;

    /// Look up one seller's directory entry.
    fn seller(&self, id: &str) -> Result<Option<SellerRecord>, StoreError>;

    /// Insert or update a seller's directory entry.
    fn put_seller(&self, id: &str, record: &SellerRecord) -> Result<(), StoreError>;

    /// Look up one buyer's identity entry.
    fn buyer(&self, id: &str) -> Result<Option<BuyerRecord>, StoreError>;

    /// Insert or update a buyer's identity entry.
    fn put_buyer(&self, id: &str, record: &BuyerRecord) -> Result<(), StoreError>;
}

/// In-memory record store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sellers: RwLock<BTreeMap<String, SellerRecord>>,
    buyers: RwLock<BTreeMap<String, BuyerRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn sellers(&self) -> Result<Vec<(String, SellerRecord)>, StoreError> {
        let sellers = self.sellers.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sellers.iter().map(|(id, rec)| (id.clone(), rec.clone())).collect())
    }

    fn seller(&self, id: &str) -> Result<Option<SellerRecord>, StoreError> {
        let sellers = self.sellers.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sellers.get(id).cloned())
    }

    fn put_seller(&self, id: &str, record: &SellerRecord) -> Result<(), StoreError> {
        let mut sellers = self.sellers.write().unwrap_or_else(PoisonError::into_inner);
        sellers.insert(id.to_string(), record.clone());
        Ok(())
    }

    fn buyer(&self, id: &str) -> Result<Option<BuyerRecord>, StoreError> {
        let buyers = self.buyers.read().unwrap_or_else(PoisonError::into_inner);
        Ok(buyers.get(id).copied())
    }

    fn put_buyer(&self, id: &str, record: &BuyerRecord) -> Result<(), StoreError> {
        let mut buyers = self.buyers.write().unwrap_or_else(PoisonError::into_inner);
        buyers.insert(id.to_string(), *record);
        Ok(())
    }
}

/// Flat-file JSON record store.
///
/// Each namespace is one JSON object keyed by ID, read and rewritten whole
/// on every update. A process-local mutex serializes the read-modify-write;
/// cross-process writers are last-write-wins, matching the original files.
#[derive(Debug)]
pub struct JsonFileStore {
    sellers_path: PathBuf,
    buyers_path: PathBuf,
    write_guard: Mutex<()>,
}

impl JsonFileStore {
    /// Store records as `sellers.json` and `buyers.json` under `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            sellers_path: dir.join("sellers.json"),
            buyers_path: dir.join("buyers.json"),
            write_guard: Mutex::new(()),
        }
    }

    fn load<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn save<T: Serialize>(path: &Path, records: &BTreeMap<String, T>) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(records)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn update<T, F>(&self, path: &Path, apply: F) -> Result<(), StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut BTreeMap<String, T>),
    {
        let _guard = self.write_guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut records = Self::load(path)?;
        apply(&mut records);
        Self::save(path, &records)
    }
}

impl RecordStore for JsonFileStore {
    fn sellers(&self) -> Result<Vec<(String, SellerRecord)>, StoreError> {
        Ok(Self::load::<SellerRecord>(&self.sellers_path)?.into_iter().collect())
    }

    fn seller(&self, id: &str) -> Result<Option<SellerRecord>, StoreError> {
        Ok(Self::load::<SellerRecord>(&self.sellers_path)?.remove(id))
    }

    fn put_seller(&self, id: &str, record: &SellerRecord) -> Result<(), StoreError> {
        self.update(&self.sellers_path, |records: &mut BTreeMap<String, SellerRecord>| {
            records.insert(id.to_string(), record.clone());
        })
    }

    fn buyer(&self, id: &str) -> Result<Option<BuyerRecord>, StoreError> {
        Ok(Self::load::<BuyerRecord>(&self.buyers_path)?.remove(id))
    }

    fn put_buyer(&self, id: &str, record: &BuyerRecord) -> Result<(), StoreError> {
        self.update(&self.buyers_path, |records: &mut BTreeMap<String, BuyerRecord>| {
            records.insert(id.to_string(), *record);
        })
    }
}
