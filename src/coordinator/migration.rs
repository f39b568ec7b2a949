//! Moves legacy sounds into free grid slots.

use crate::coordinator::grid::SlotGrid;
use crate::sound::{SlotIndex, Sound};
use crate::store::kv::KeyValueStore;
use crate::store::{SoundStore, StoreError};

/// Outcome of one migration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Legacy id and the slot it now lives in, in migration order.
    pub migrated: Vec<(String, SlotIndex)>,
    /// Legacy ids left in storage because the grid was full.
    pub unmigrated: Vec<String>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.migrated.is_empty() && self.unmigrated.is_empty()
    }
}

/// Builds the grid from loaded sounds, migrating every legacy sound that fits.
///
/// Legacy sounds are taken in load order and each goes to the lowest empty slot. Saving under
/// the slot id and deleting the legacy record happen in one batch, so a failed write leaves the
/// legacy record as the only copy and aborts the pass. Sounds that do not fit stay in storage
/// untouched.
pub fn migrate_legacy<K: KeyValueStore>(
    store: &SoundStore<K>,
    sounds: Vec<Sound>,
) -> Result<(SlotGrid, MigrationReport), StoreError> {
    let mut grid = SlotGrid::new();
    let mut legacy = Vec::new();

    for sound in sounds {
        if let Err(sound) = grid.insert(sound) {
            legacy.push(sound);
        }
    }

    let mut report = MigrationReport::default();
    for sound in legacy {
        let Some(slot) = grid.first_free() else {
            log::warn!("No free slot for legacy sound {}, leaving it in storage", sound.id);
            report.unmigrated.push(sound.id);
            continue;
        };

        let migrated = sound.with_id(slot.sound_id());
        store.move_sound(&sound.id, &migrated)?;

        log::info!("Migrated legacy sound {} to {slot}", sound.id);
        report.migrated.push((sound.id, slot));
        if grid.insert(migrated).is_err() {
            log::error!("Migrated sound for {slot} was refused by the grid");
        }
    }

    Ok((grid, report))
}
