//! In-memory view of the slot grid.

use crate::audio_engine::constants::GRID_SIZE;
use crate::sound::{SlotIndex, Sound};

/// Fixed grid of slots, each holding at most one sound whose id is that slot's id.
#[derive(Debug, Clone)]
pub struct SlotGrid {
    slots: [Option<Sound>; GRID_SIZE],
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotGrid {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    pub fn get(&self, slot: SlotIndex) -> Option<&Sound> {
        self.slots[slot.get()].as_ref()
    }

    /// Places a slot-bound sound, returning the sound it replaced. Legacy ids are refused.
    pub fn insert(&mut self, sound: Sound) -> Result<Option<Sound>, Sound> {
        match sound.slot() {
            Some(slot) => Ok(self.slots[slot.get()].replace(sound)),
            None => Err(sound),
        }
    }

    pub fn remove(&mut self, slot: SlotIndex) -> Option<Sound> {
        self.slots[slot.get()].take()
    }

    pub fn rename(&mut self, slot: SlotIndex, name: &str) -> bool {
        match self.slots[slot.get()].as_mut() {
            Some(sound) => {
                sound.name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn is_occupied(&self, slot: SlotIndex) -> bool {
        self.slots[slot.get()].is_some()
    }

    /// Lowest-numbered empty slot.
    pub fn first_free(&self) -> Option<SlotIndex> {
        SlotIndex::all().find(|&slot| !self.is_occupied(slot))
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, Option<&Sound>)> {
        SlotIndex::all().map(move |slot| (slot, self.get(slot)))
    }
}
