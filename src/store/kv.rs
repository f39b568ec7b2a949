//! Flat keyed byte storage.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use crate::store::StoreError;

/// One write in an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    Put(String, Vec<u8>),
    Delete(String),
}

/// A flat keyed store with atomic multi-key writes.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Applies every operation or none of them.
    fn apply(&self, ops: Vec<KvOp>) -> Result<(), StoreError>;

    /// Bytes used, when the backend can tell.
    fn usage(&self) -> Option<u64>;
}

/// sled-backed store living under a data directory.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            StoreError::ReadFailure(format!("open {}: {e}", path.as_ref().display()))
        })?;
        log::info!("Opened sound store at {}", path.as_ref().display());
        Ok(Self { db })
    }

    /// A store deleted when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::ReadFailure(format!("open temporary store: {e}")))?;
        Ok(Self { db })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.db
            .get(key.as_bytes())
            .map(|value| value.map(|v| v.to_vec()))
            .map_err(|e| StoreError::ReadFailure(format!("get {key}: {e}")))
    }

    fn apply(&self, ops: Vec<KvOp>) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for op in ops {
            match op {
                KvOp::Put(key, value) => batch.insert(key.as_bytes(), value),
                KvOp::Delete(key) => batch.remove(key.as_bytes()),
            }
        }
        self.db
            .apply_batch(batch)
            .map_err(|e| StoreError::WriteFailure(format!("apply batch: {e}")))?;
        self.db
            .flush()
            .map_err(|e| StoreError::WriteFailure(format!("flush: {e}")))?;
        Ok(())
    }

    fn usage(&self) -> Option<u64> {
        match self.db.size_on_disk() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::warn!("Storage usage unavailable: {e}");
                None
            }
        }
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key currently stored, in order.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::ReadFailure("memory store poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn apply(&self, ops: Vec<KvOp>) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::WriteFailure("memory store poisoned".to_string()))?;
        for op in ops {
            match op {
                KvOp::Put(key, value) => {
                    entries.insert(key, value);
                }
                KvOp::Delete(key) => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn usage(&self) -> Option<u64> {
        let entries = self.entries.lock().ok()?;
        Some(
            entries
                .iter()
                .map(|(key, value)| (key.len() + value.len()) as u64)
                .sum(),
        )
    }
}
