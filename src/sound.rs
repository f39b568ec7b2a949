//! Persisted sound entities and slot addressing.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::audio_engine::constants::GRID_SIZE;

/// Prefix shared by every grid-bound sound id.
pub const SLOT_ID_PREFIX: &str = "slot-";

/// MIME type assumed for blobs whose type was never recorded.
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// Raw encoded audio payload tagged with its MIME type.
///
/// The payload is shared: cloning a blob never copies the audio bytes.
#[derive(Debug, Clone)]
pub struct AudioBlob {
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl AudioBlob {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: Arc::from(data.into_boxed_slice()),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The MIME type without codec parameters, e.g. `audio/webm` for `audio/webm;codecs=opus`.
    pub fn essence(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
    }
}

/// A user-recorded sound.
#[derive(Debug, Clone)]
pub struct Sound {
    /// `slot-<index>` for grid-bound sounds, anything else for legacy sounds.
    pub id: String,
    pub name: String,
    pub audio: AudioBlob,
    pub created_at: DateTime<Utc>,
    /// Length in seconds, absent when the blob could not be decoded at save time.
    pub duration: Option<f64>,
}

impl Sound {
    pub fn slot(&self) -> Option<SlotIndex> {
        SlotIndex::parse(&self.id)
    }

    /// Returns the same sound bound to another id.
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }
}

/// A validated grid position in `[0, GRID_SIZE)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub fn new(index: usize) -> Option<Self> {
        (index < GRID_SIZE).then_some(Self(index))
    }

    /// Parses a `slot-<index>` id. Non-numeric or out-of-range indices are not slot ids.
    pub fn parse(id: &str) -> Option<Self> {
        let digits = id.strip_prefix(SLOT_ID_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().and_then(Self::new)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..GRID_SIZE).map(Self)
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn sound_id(self) -> String {
        format!("{SLOT_ID_PREFIX}{}", self.0)
    }

    /// Name given to a freshly recorded sound in this slot.
    pub fn default_sound_name(self) -> String {
        format!("Sound {}", self.0)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SLOT_ID_PREFIX}{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_index_bounds() {
        assert!(SlotIndex::new(0).is_some());
        assert!(SlotIndex::new(GRID_SIZE - 1).is_some());
        assert!(SlotIndex::new(GRID_SIZE).is_none());
        assert_eq!(SlotIndex::all().count(), GRID_SIZE);
    }

    #[test]
    fn test_slot_index_parse() {
        assert_eq!(SlotIndex::parse("slot-0"), SlotIndex::new(0));
        assert_eq!(SlotIndex::parse("slot-11"), SlotIndex::new(11));
        assert_eq!(SlotIndex::parse("slot-12"), None);
        assert_eq!(SlotIndex::parse("slot-"), None);
        assert_eq!(SlotIndex::parse("slot-+1"), None);
        assert_eq!(SlotIndex::parse("slot-x"), None);
        assert_eq!(SlotIndex::parse("abc123"), None);
    }

    #[test]
    fn test_slot_sound_id_and_name() {
        let slot = SlotIndex::new(7).unwrap();
        assert_eq!(slot.sound_id(), "slot-7");
        assert_eq!(slot.to_string(), "slot-7");
        assert_eq!(slot.default_sound_name(), "Sound 7");
    }

    #[test]
    fn test_blob_essence_strips_codec_parameters() {
        let blob = AudioBlob::new("audio/webm; codecs=opus", vec![1, 2, 3]);
        assert_eq!(blob.essence(), "audio/webm");
        assert_eq!(blob.len(), 3);
        assert!(!blob.is_empty());
    }
}
