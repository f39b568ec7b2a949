//! Persistent sound store.
//!
//! Each sound is two records, JSON metadata and the raw blob, plus one entry in an ordered
//! JSON index. Every operation that touches more than one record goes through a single atomic
//! batch, so metadata and blob are always written and deleted together.

pub mod kv;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::sound::{AudioBlob, Sound, UNKNOWN_MIME_TYPE};
use kv::{KeyValueStore, KvOp};

/// Errors raised by the sound store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sound not found: {0}")]
    NotFound(String),

    #[error("failed to write to storage: {0}")]
    WriteFailure(String),

    #[error("failed to read from storage: {0}")]
    ReadFailure(String),

    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Index entry describing one stored sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundMetadata {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl From<&Sound> for SoundMetadata {
    fn from(sound: &Sound) -> Self {
        Self {
            id: sound.id.clone(),
            name: sound.name.clone(),
            created_at: sound.created_at,
            duration: sound.duration,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SoundRecord {
    #[serde(flatten)]
    metadata: SoundMetadata,
    #[serde(default = "unknown_mime_type")]
    mime_type: String,
}

fn unknown_mime_type() -> String {
    UNKNOWN_MIME_TYPE.to_string()
}

/// Best-effort storage usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    pub used: u64,
    pub quota: u64,
}

impl StorageEstimate {
    pub fn used_megabytes(&self) -> f64 {
        self.used as f64 / (1024.0 * 1024.0)
    }
}

pub struct SoundStore<K> {
    kv: K,
    namespace: String,
    quota: u64,
}

impl<K: KeyValueStore> SoundStore<K> {
    pub fn new(kv: K, namespace: impl Into<String>, quota: u64) -> Self {
        Self {
            kv,
            namespace: namespace.into(),
            quota,
        }
    }

    pub fn backend(&self) -> &K {
        &self.kv
    }

    fn meta_key(&self, id: &str) -> String {
        format!("{}-sound-{id}-meta", self.namespace)
    }

    fn blob_key(&self, id: &str) -> String {
        format!("{}-sound-{id}-blob", self.namespace)
    }

    fn index_key(&self) -> String {
        format!("{}-sounds-index", self.namespace)
    }

    fn read_index(&self) -> Result<Vec<SoundMetadata>, StoreError> {
        let key = self.index_key();
        match self.kv.get(&key)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                key,
                reason: e.to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }

    fn index_op(&self, index: &[SoundMetadata]) -> Result<KvOp, StoreError> {
        let bytes = serde_json::to_vec(index)
            .map_err(|e| StoreError::WriteFailure(format!("encode index: {e}")))?;
        Ok(KvOp::Put(self.index_key(), bytes))
    }

    fn read_record(&self, id: &str) -> Result<Option<SoundRecord>, StoreError> {
        let key = self.meta_key(id);
        let Some(bytes) = self.kv.get(&key)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key,
                reason: e.to_string(),
            })
    }

    fn put_ops(&self, sound: &Sound) -> Result<[KvOp; 2], StoreError> {
        let record = SoundRecord {
            metadata: SoundMetadata::from(sound),
            mime_type: sound.audio.mime_type.clone(),
        };
        let record_bytes = serde_json::to_vec(&record)
            .map_err(|e| StoreError::WriteFailure(format!("encode {}: {e}", sound.id)))?;
        Ok([
            KvOp::Put(self.meta_key(&sound.id), record_bytes),
            KvOp::Put(self.blob_key(&sound.id), sound.audio.data.to_vec()),
        ])
    }

    /// Writes metadata, blob and index entry together, replacing any sound with the same id.
    pub fn save_sound(&self, sound: &Sound) -> Result<(), StoreError> {
        let metadata = SoundMetadata::from(sound);
        let mut index = self.read_index()?;
        match index.iter_mut().find(|entry| entry.id == sound.id) {
            Some(entry) => *entry = metadata,
            None => index.push(metadata),
        }

        let mut ops = Vec::from(self.put_ops(sound)?);
        ops.push(self.index_op(&index)?);
        self.kv.apply(ops)?;

        log::debug!("Saved {} ({} bytes)", sound.id, sound.audio.len());
        Ok(())
    }

    /// Stores `sound` and removes the sound `from` in one batch. The index entry of `from`
    /// is taken over by `sound`.
    pub fn move_sound(&self, from: &str, sound: &Sound) -> Result<(), StoreError> {
        let metadata = SoundMetadata::from(sound);
        let mut index = self.read_index()?;
        index.retain(|entry| entry.id != sound.id);
        match index.iter_mut().find(|entry| entry.id == from) {
            Some(entry) => *entry = metadata,
            None => index.push(metadata),
        }

        let mut ops = Vec::from(self.put_ops(sound)?);
        ops.push(KvOp::Delete(self.meta_key(from)));
        ops.push(KvOp::Delete(self.blob_key(from)));
        ops.push(self.index_op(&index)?);
        self.kv.apply(ops)?;

        log::debug!("Moved {from} to {}", sound.id);
        Ok(())
    }

    /// Loads a sound. Partial entries (metadata without blob or the reverse) read as absent.
    pub fn load_sound(&self, id: &str) -> Result<Option<Sound>, StoreError> {
        let record = self.read_record(id)?;
        let blob = self.kv.get(&self.blob_key(id))?;

        let (Some(record), Some(data)) = (record, blob) else {
            return Ok(None);
        };

        Ok(Some(Sound {
            id: record.metadata.id,
            name: record.metadata.name,
            audio: AudioBlob {
                mime_type: record.mime_type,
                data: Arc::from(data.into_boxed_slice()),
            },
            created_at: record.metadata.created_at,
            duration: record.metadata.duration,
        }))
    }

    /// Index entries without touching any blob.
    pub fn list_metadata(&self) -> Result<Vec<SoundMetadata>, StoreError> {
        self.read_index()
    }

    /// Every complete sound, newest first. Incomplete or unreadable entries are purged.
    pub fn load_all(&self) -> Result<Vec<Sound>, StoreError> {
        let mut sounds = Vec::new();
        for entry in self.read_index()? {
            let loaded = match self.load_sound(&entry.id) {
                Ok(loaded) => loaded,
                Err(e @ StoreError::Corrupt { .. }) => {
                    log::warn!("Skipping unreadable sound {}: {e}", entry.id);
                    None
                }
                Err(e) => return Err(e),
            };
            match loaded {
                Some(sound) => sounds.push(sound),
                None => {
                    log::warn!("Purging incomplete sound entry {}", entry.id);
                    if let Err(e) = self.delete_sound(&entry.id) {
                        log::warn!("Failed to purge {}: {e}", entry.id);
                    }
                }
            }
        }
        sounds.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sounds)
    }

    /// Removes metadata, blob and index entry. Deleting an absent id succeeds.
    pub fn delete_sound(&self, id: &str) -> Result<(), StoreError> {
        let mut index = self.read_index()?;
        index.retain(|entry| entry.id != id);

        self.kv.apply(vec![
            KvOp::Delete(self.meta_key(id)),
            KvOp::Delete(self.blob_key(id)),
            self.index_op(&index)?,
        ])?;

        log::debug!("Deleted {id}");
        Ok(())
    }

    pub fn rename_sound(&self, id: &str, name: &str) -> Result<(), StoreError> {
        let mut record = self
            .read_record(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.metadata.name = name.to_string();

        let mut index = self.read_index()?;
        match index.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => entry.name = name.to_string(),
            None => index.push(record.metadata.clone()),
        }

        let record_bytes = serde_json::to_vec(&record)
            .map_err(|e| StoreError::WriteFailure(format!("encode {id}: {e}")))?;
        self.kv.apply(vec![
            KvOp::Put(self.meta_key(id), record_bytes),
            self.index_op(&index)?,
        ])
    }

    /// Deletes every indexed sound and the index itself.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let index = self.read_index()?;
        let mut ops = Vec::with_capacity(index.len() * 2 + 1);
        for entry in &index {
            ops.push(KvOp::Delete(self.meta_key(&entry.id)));
            ops.push(KvOp::Delete(self.blob_key(&entry.id)));
        }
        ops.push(KvOp::Delete(self.index_key()));
        self.kv.apply(ops)?;

        log::info!("Cleared {} sounds", index.len());
        Ok(())
    }

    pub fn estimate_usage(&self) -> Option<StorageEstimate> {
        self.kv.usage().map(|used| StorageEstimate {
            used,
            quota: self.quota,
        })
    }
}
