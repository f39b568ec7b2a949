//! Slot coordination.
//!
//! [`SlotCoordinator`] owns the store, the playback engine, the capture session and the
//! in-memory grid. Every operation runs to completion before the next one starts (`&mut self`),
//! and the grid is only changed after the store write it depends on has succeeded. Each
//! outcome, success or failure, is queued as a [`Notification`] for the presentation layer.

pub mod grid;
pub mod migration;

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use thiserror::Error;

use crate::audio_engine::PlaybackEngine;
use crate::audio_engine::errors::{CaptureError, PlaybackError};
use crate::capture::CaptureSession;
use crate::capture::microphone::{CpalMicrophone, PermissionState};
use crate::config::{ConfigError, SoundboardConfig};
use crate::messages::Notification;
use crate::sound::{SlotIndex, Sound};
use crate::store::kv::{KeyValueStore, SledStore};
use crate::store::{SoundStore, StorageEstimate, StoreError};
use grid::SlotGrid;
use migration::{MigrationReport, migrate_legacy};

/// Errors surfaced at the coordinator boundary.
#[derive(Debug, Error)]
pub enum SoundboardError {
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("name must not be empty")]
    EmptyName,

    #[error("{0} is empty")]
    EmptySlot(String),

    #[error("slot index {0} is out of range")]
    SlotOutOfRange(usize),
}

pub struct SlotCoordinator<K> {
    store: SoundStore<K>,
    engine: PlaybackEngine,
    capture: CaptureSession,
    grid: SlotGrid,
    /// A finished recording whose save failed, kept until it is saved or replaced.
    unsaved: Option<Sound>,
    notifications: VecDeque<Notification>,
}

impl SlotCoordinator<SledStore> {
    /// Opens the sled store under the configured data dir, the default output device and the
    /// default microphone.
    pub fn open(config: &SoundboardConfig) -> Result<Self, SoundboardError> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            StoreError::WriteFailure(format!("create {}: {e}", config.data_dir.display()))
        })?;
        let store = SoundStore::new(
            SledStore::open(&config.data_dir)?,
            config.key_namespace.clone(),
            config.storage_quota_bytes,
        );
        let engine = PlaybackEngine::open_default(config.loop_gap())?;
        let capture = CaptureSession::new(
            Box::new(CpalMicrophone::new()),
            config.chunk_interval(),
            config.mime_preferences.clone(),
        );
        Ok(Self::new(store, engine, capture))
    }
}

impl<K: KeyValueStore> SlotCoordinator<K> {
    pub fn new(store: SoundStore<K>, engine: PlaybackEngine, capture: CaptureSession) -> Self {
        Self {
            store,
            engine,
            capture,
            grid: SlotGrid::new(),
            unsaved: None,
            notifications: VecDeque::new(),
        }
    }

    pub fn store(&self) -> &SoundStore<K> {
        &self.store
    }

    pub fn engine_mut(&mut self) -> &mut PlaybackEngine {
        &mut self.engine
    }

    pub fn slots(&self) -> &SlotGrid {
        &self.grid
    }

    pub fn poll_notification(&mut self) -> Option<Notification> {
        self.notifications.pop_front()
    }

    fn notify_info(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{message}");
        self.notifications.push_back(Notification::info(message));
    }

    fn report<T>(
        &mut self,
        action: &str,
        result: Result<T, SoundboardError>,
    ) -> Result<T, SoundboardError> {
        if let Err(e) = &result {
            log::error!("Failed to {action}: {e}");
            self.notifications
                .push_back(Notification::error(format!("Failed to {action}: {e}")));
        }
        result
    }

    /// Loads every stored sound into the grid, migrating legacy sounds into free slots.
    pub fn load(&mut self) -> Result<MigrationReport, SoundboardError> {
        let result = self.load_grid();
        let report = self.report("load sounds", result)?;
        if !report.unmigrated.is_empty() {
            self.notifications.push_back(Notification::error(format!(
                "{} sounds did not fit in the grid",
                report.unmigrated.len()
            )));
        }
        Ok(report)
    }

    fn load_grid(&mut self) -> Result<MigrationReport, SoundboardError> {
        let sounds = self.store.load_all()?;
        let (grid, report) = migrate_legacy(&self.store, sounds)?;
        log::info!(
            "Loaded {} sounds ({} migrated)",
            grid.occupied_count(),
            report.migrated.len()
        );
        self.grid = grid;
        Ok(report)
    }

    /// Starts recording into slot `index`. Another active recording makes this fail.
    pub fn start_recording(&mut self, index: usize) -> Result<DateTime<Utc>, SoundboardError> {
        let result = slot(index).and_then(|slot| Ok(self.capture.start(slot)?));
        let started_at = self.report("start recording", result)?;
        if let Some(dropped) = self.unsaved.take() {
            log::warn!("Discarding unsaved recording for {}", dropped.id);
        }
        self.notify_info("Recording started...");
        Ok(started_at)
    }

    /// Stops the active recording and saves it into the slot it targets.
    ///
    /// When a previous save failed and no recording is active, that recording is saved again.
    pub fn stop_recording(&mut self) -> Result<Sound, SoundboardError> {
        let result = self.save_recording();
        let sound = self.report("save recording", result)?;
        self.notify_info(format!("Sound \"{}\" saved successfully!", sound.name));
        Ok(sound)
    }

    fn save_recording(&mut self) -> Result<Sound, SoundboardError> {
        let sound = match self.unsaved.take() {
            Some(sound) if !self.capture.is_recording() => sound,
            _ => self.finish_capture()?,
        };

        if let Err(e) = self.persist_recording(&sound) {
            self.unsaved = Some(sound);
            return Err(e);
        }

        if let Err(refused) = self.grid.insert(sound.clone()) {
            log::error!("Grid refused recorded sound {}", refused.id);
        }
        Ok(sound)
    }

    fn finish_capture(&mut self) -> Result<Sound, SoundboardError> {
        let captured = self.capture.stop()?;
        let target = captured.target;

        let seconds = self.engine.get_audio_duration(&captured.blob);
        Ok(Sound {
            id: target.sound_id(),
            name: target.default_sound_name(),
            audio: captured.blob,
            created_at: Utc::now(),
            duration: (seconds > 0.0).then_some(seconds),
        })
    }

    fn persist_recording(&mut self, sound: &Sound) -> Result<(), SoundboardError> {
        self.engine.stop(Some(&sound.id))?;
        self.engine.invalidate_cache(&sound.id);
        self.store.save_sound(sound)?;
        Ok(())
    }

    /// Whether a finished recording is waiting to be saved again.
    pub fn has_unsaved_recording(&self) -> bool {
        self.unsaved.is_some()
    }

    /// Discards the active recording and any recording left unsaved. Returns whether there was
    /// one.
    pub fn cancel_recording(&mut self) -> bool {
        let cancelled = self.capture.cancel() | self.unsaved.take().is_some();
        if cancelled {
            self.notify_info("Recording cancelled");
        }
        cancelled
    }

    /// Ends the active recording early if the microphone has failed.
    pub fn check_recording(&mut self) -> Result<(), SoundboardError> {
        let result = self.capture.check_device().map_err(SoundboardError::from);
        self.report("keep recording", result)
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    pub fn recording_started_at(&self) -> Option<DateTime<Utc>> {
        self.capture.started_at()
    }

    pub fn recording_target(&self) -> Option<SlotIndex> {
        self.capture.target()
    }

    pub fn microphone_permission(&self) -> PermissionState {
        self.capture.permission()
    }

    /// Plays slot `index`, replacing that slot's current voice. Other slots keep playing.
    pub fn play(&mut self, index: usize, looping: bool) -> Result<(), SoundboardError> {
        let result = self.play_slot(index, looping);
        self.report("play sound", result)
    }

    fn play_slot(&mut self, index: usize, looping: bool) -> Result<(), SoundboardError> {
        let slot = slot(index)?;
        let sound = self
            .grid
            .get(slot)
            .ok_or_else(|| SoundboardError::EmptySlot(slot.sound_id()))?;
        self.engine.play(&sound.id, &sound.audio, looping)?;
        Ok(())
    }

    /// Stops slot `index` when it is playing, otherwise plays it once. Returns whether the
    /// slot is playing afterwards.
    pub fn toggle(&mut self, index: usize) -> Result<bool, SoundboardError> {
        let result = slot(index).map(|slot| self.engine.is_playing(Some(&slot.sound_id())));
        if self.report("play sound", result)? {
            self.stop_playback(Some(index))?;
            Ok(false)
        } else {
            self.play(index, false)?;
            Ok(true)
        }
    }

    /// Stops slot `index`, or every slot when `None`.
    pub fn stop_playback(&mut self, index: Option<usize>) -> Result<(), SoundboardError> {
        let result = match index {
            Some(index) => slot(index)
                .and_then(|slot| Ok(self.engine.stop(Some(&slot.sound_id()))?)),
            None => self.engine.stop(None).map_err(SoundboardError::from),
        };
        self.report("stop sound", result)
    }

    pub fn is_playing(&mut self, index: Option<usize>) -> bool {
        match index {
            Some(index) => match SlotIndex::new(index) {
                Some(slot) => self.engine.is_playing(Some(&slot.sound_id())),
                None => false,
            },
            None => self.engine.is_playing(None),
        }
    }

    /// Slots with an active voice.
    pub fn playing_slots(&mut self) -> Vec<SlotIndex> {
        self.engine
            .active_sound_ids()
            .iter()
            .filter_map(|id| SlotIndex::parse(id))
            .collect()
    }

    /// Renames the sound in slot `index`. The name is trimmed and must not be empty.
    pub fn rename(&mut self, index: usize, name: &str) -> Result<(), SoundboardError> {
        let result = self.rename_slot(index, name);
        self.report("rename sound", result)?;
        self.notify_info("Sound renamed successfully!");
        Ok(())
    }

    fn rename_slot(&mut self, index: usize, name: &str) -> Result<(), SoundboardError> {
        let slot = slot(index)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SoundboardError::EmptyName);
        }
        self.store.rename_sound(&slot.sound_id(), name)?;
        self.grid.rename(slot, name);
        Ok(())
    }

    /// Clears slot `index`: stops its voice, deletes the stored sound and drops its decode.
    pub fn delete(&mut self, index: usize) -> Result<(), SoundboardError> {
        let result = self.delete_slot(index);
        self.report("clear slot", result)?;
        self.notify_info("Sound cleared from slot");
        Ok(())
    }

    fn delete_slot(&mut self, index: usize) -> Result<(), SoundboardError> {
        let slot = slot(index)?;
        let id = slot.sound_id();
        self.engine.stop(Some(&id))?;
        self.store.delete_sound(&id)?;
        self.grid.remove(slot);
        self.engine.invalidate_cache(&id);
        Ok(())
    }

    /// Stops every voice and deletes every stored sound, leaving an empty grid.
    pub fn clear_all(&mut self) -> Result<(), SoundboardError> {
        let result = self.clear_everything();
        self.report("clear sounds", result)?;
        self.notify_info("All sounds cleared");
        Ok(())
    }

    fn clear_everything(&mut self) -> Result<(), SoundboardError> {
        self.engine.stop(None)?;
        self.store.clear_all()?;
        self.engine.clear_cache();
        self.grid = SlotGrid::new();
        self.unsaved = None;
        Ok(())
    }

    /// Storage usage, when the backend can report it.
    pub fn storage_usage(&self) -> Option<StorageEstimate> {
        let estimate = self.store.estimate_usage();
        if estimate.is_none() {
            log::warn!("Storage usage unavailable");
        }
        estimate
    }
}

fn slot(index: usize) -> Result<SlotIndex, SoundboardError> {
    SlotIndex::new(index).ok_or(SoundboardError::SlotOutOfRange(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::audio_engine::audio_stream::MixerEndpoint;
    use crate::audio_engine::constants::GRID_SIZE;
    use crate::audio_engine::sample_loader::OutputFormat;
    use crate::audio_engine::sample_loader::tests::wav_blob;
    use crate::capture::microphone::testing::FakeMicrophone;
    use crate::messages::NotificationLevel;
    use crate::store::kv::MemoryStore;
    use crate::store::kv::testing::FailingStore;

    const RATE: u32 = 8_000;

    struct Harness<K> {
        board: SlotCoordinator<K>,
        endpoint: MixerEndpoint,
        mic: FakeMicrophone,
    }

    fn harness_with<K: KeyValueStore>(kv: K) -> Harness<K> {
        let mic = FakeMicrophone::new();
        let (engine, endpoint) = PlaybackEngine::headless(
            OutputFormat {
                channels: 1,
                sample_rate: RATE,
            },
            Duration::from_millis(10),
        );
        let capture = CaptureSession::new(
            Box::new(mic.clone()),
            Duration::from_millis(5),
            Vec::new(),
        );
        let board = SlotCoordinator::new(SoundStore::new(kv, "sb", 1 << 20), engine, capture);
        Harness {
            board,
            endpoint,
            mic,
        }
    }

    fn harness() -> Harness<MemoryStore> {
        harness_with(MemoryStore::new())
    }

    fn stored(id: &str, name: &str) -> Sound {
        Sound {
            id: id.to_string(),
            name: name.to_string(),
            audio: wav_blob(1, RATE, &[0.5; 800]),
            created_at: Utc::now(),
            duration: Some(0.1),
        }
    }

    fn drain(board: &mut SlotCoordinator<impl KeyValueStore>) -> Vec<Notification> {
        std::iter::from_fn(|| board.poll_notification()).collect()
    }

    fn record<K: KeyValueStore>(h: &mut Harness<K>, index: usize, level: f32) -> Sound {
        h.board.start_recording(index).unwrap();
        h.mic.feed(&vec![level; 800]);
        h.board.stop_recording().unwrap()
    }

    fn render(endpoint: &mut MixerEndpoint, frames: usize) -> Vec<f32> {
        let mut data = vec![0.0; frames];
        endpoint.process(&mut data);
        data
    }

    #[test]
    fn test_empty_store_gives_empty_grid() {
        let mut h = harness();

        let report = h.board.load().unwrap();

        assert!(report.is_noop());
        assert_eq!(h.board.slots().iter().count(), GRID_SIZE);
        assert!(h.board.slots().iter().all(|(_, sound)| sound.is_none()));
    }

    #[test]
    fn test_load_migrates_legacy_sound() {
        let mut h = harness();
        for id in ["slot-0", "slot-1", "slot-2", "abc123"] {
            h.board.store().save_sound(&stored(id, id)).unwrap();
        }

        let report = h.board.load().unwrap();

        let third = SlotIndex::new(3).unwrap();
        assert_eq!(report.migrated, vec![("abc123".to_string(), third)]);
        assert_eq!(h.board.slots().get(third).unwrap().name, "abc123");
        let mut ids: Vec<_> = h
            .board
            .store()
            .list_metadata()
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["slot-0", "slot-1", "slot-2", "slot-3"]);
    }

    #[test]
    fn test_unmigrated_sounds_are_reported() {
        let mut h = harness();
        for index in 0..GRID_SIZE {
            let id = format!("slot-{index}");
            h.board.store().save_sound(&stored(&id, &id)).unwrap();
        }
        h.board.store().save_sound(&stored("extra", "extra")).unwrap();

        let report = h.board.load().unwrap();

        assert_eq!(report.unmigrated, vec!["extra".to_string()]);
        let notes = drain(&mut h.board);
        assert!(notes.iter().any(|n| n.level == NotificationLevel::Error));
    }

    #[test]
    fn test_record_and_save() {
        let mut h = harness();

        let sound = record(&mut h, 5, 0.25);

        assert_eq!(sound.id, "slot-5");
        assert_eq!(sound.name, "Sound 5");
        let duration = sound.duration.unwrap();
        assert!((duration - 0.1).abs() < 1e-3);

        let slot = SlotIndex::new(5).unwrap();
        assert_eq!(h.board.slots().get(slot).unwrap().id, "slot-5");
        assert!(h.board.store().load_sound("slot-5").unwrap().is_some());
        assert_eq!(h.mic.held_tracks(), 0);

        let messages: Vec<_> = drain(&mut h.board).into_iter().map(|n| n.message).collect();
        assert_eq!(
            messages,
            vec![
                "Recording started...".to_string(),
                "Sound \"Sound 5\" saved successfully!".to_string(),
            ]
        );
    }

    #[test]
    fn test_rerecording_replaces_occupant() {
        let mut h = harness();
        record(&mut h, 0, 0.25);

        h.board.play(0, false).unwrap();
        assert!(h.board.engine_mut().is_cached("slot-0"));

        record(&mut h, 0, 0.75);

        assert!(!h.board.is_playing(Some(0)));
        assert!(!h.board.engine_mut().is_cached("slot-0"));
        assert_eq!(h.board.store().list_metadata().unwrap().len(), 1);
        assert_eq!(h.board.slots().occupied_count(), 1);

        h.board.play(0, false).unwrap();
        let out = render(&mut h.endpoint, 64);
        assert!(out.iter().all(|&s| (s - 0.75).abs() < 0.01));
    }

    #[test]
    fn test_second_recording_is_rejected() {
        let mut h = harness();
        h.board.start_recording(0).unwrap();

        assert!(matches!(
            h.board.start_recording(1),
            Err(SoundboardError::Capture(CaptureError::AlreadyRecording))
        ));
        assert_eq!(h.board.recording_target(), SlotIndex::new(0));
        assert!(h.board.recording_started_at().is_some());
    }

    #[test]
    fn test_cancel_recording_writes_nothing() {
        let mut h = harness();
        h.board.start_recording(2).unwrap();
        h.mic.feed(&[0.5; 400]);

        assert!(h.board.cancel_recording());
        assert!(!h.board.cancel_recording());

        assert!(h.board.store().backend().keys().is_empty());
        assert_eq!(h.mic.held_tracks(), 0);
        assert!(h.board.recording_started_at().is_none());
        assert!(matches!(
            h.board.stop_recording(),
            Err(SoundboardError::Capture(CaptureError::NoActiveRecording))
        ));
    }

    #[test]
    fn test_device_fault_is_reported() {
        let mut h = harness();
        h.board.start_recording(2).unwrap();
        h.mic.inject_fault("unplugged");

        assert!(h.board.check_recording().is_err());
        assert!(!h.board.is_recording());
        assert_eq!(h.mic.held_tracks(), 0);
        assert!(
            drain(&mut h.board)
                .iter()
                .any(|n| n.level == NotificationLevel::Error && n.message.contains("unplugged"))
        );
    }

    #[test]
    fn test_out_of_range_slot() {
        let mut h = harness();
        assert!(matches!(
            h.board.start_recording(GRID_SIZE),
            Err(SoundboardError::SlotOutOfRange(_))
        ));
        assert_eq!(h.mic.acquisitions(), 0);
        assert!(matches!(
            h.board.play(99, false),
            Err(SoundboardError::SlotOutOfRange(99))
        ));
    }

    #[test]
    fn test_play_empty_slot() {
        let mut h = harness();
        assert!(matches!(
            h.board.play(4, false),
            Err(SoundboardError::EmptySlot(id)) if id == "slot-4"
        ));
        assert_eq!(
            drain(&mut h.board)[0].message,
            "Failed to play sound: slot-4 is empty"
        );
    }

    #[test]
    fn test_concurrent_slots_and_toggle() {
        let mut h = harness();
        h.board.store().save_sound(&stored("slot-0", "a")).unwrap();
        h.board.store().save_sound(&stored("slot-1", "b")).unwrap();
        h.board.load().unwrap();

        h.board.play(0, false).unwrap();
        h.board.play(1, true).unwrap();
        assert_eq!(
            h.board.playing_slots(),
            vec![SlotIndex::new(0).unwrap(), SlotIndex::new(1).unwrap()]
        );

        assert!(!h.board.toggle(1).unwrap());
        assert!(!h.board.is_playing(Some(1)));
        assert!(h.board.is_playing(Some(0)));

        assert!(h.board.toggle(1).unwrap());
        h.board.stop_playback(None).unwrap();
        assert!(!h.board.is_playing(None));
    }

    #[test]
    fn test_rename() {
        let mut h = harness();
        h.board.store().save_sound(&stored("slot-3", "Old")).unwrap();
        h.board.load().unwrap();

        h.board.rename(3, "  Drum roll ").unwrap();

        let slot = SlotIndex::new(3).unwrap();
        assert_eq!(h.board.slots().get(slot).unwrap().name, "Drum roll");
        assert_eq!(
            h.board.store().load_sound("slot-3").unwrap().unwrap().name,
            "Drum roll"
        );
        assert!(matches!(
            h.board.rename(3, "   "),
            Err(SoundboardError::EmptyName)
        ));
    }

    #[test]
    fn test_rename_missing_sound() {
        let mut h = harness();
        h.board.load().unwrap();

        let result = h.board.rename(9, "Nope");

        assert!(matches!(
            result,
            Err(SoundboardError::Store(StoreError::NotFound(id))) if id == "slot-9"
        ));
        assert_eq!(h.board.slots().occupied_count(), 0);
        let notes = drain(&mut h.board);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Error);
    }

    #[test]
    fn test_delete_stops_and_clears() {
        let mut h = harness();
        record(&mut h, 7, 0.5);
        h.board.play(7, true).unwrap();

        h.board.delete(7).unwrap();

        assert!(!h.board.is_playing(Some(7)));
        assert!(!h.board.engine_mut().is_cached("slot-7"));
        assert!(h.board.store().load_sound("slot-7").unwrap().is_none());
        assert!(!h.board.slots().is_occupied(SlotIndex::new(7).unwrap()));

        h.board.delete(7).unwrap();
    }

    #[test]
    fn test_write_failure_leaves_grid_unchanged() {
        let mut h = harness_with(FailingStore::default());
        h.board.store().save_sound(&stored("slot-1", "Keep")).unwrap();
        h.board.load().unwrap();
        h.board.store().backend().set_failing(true);

        h.board.start_recording(0).unwrap();
        h.mic.feed(&[0.5; 100]);
        assert!(matches!(
            h.board.stop_recording(),
            Err(SoundboardError::Store(StoreError::WriteFailure(_)))
        ));
        assert!(!h.board.slots().is_occupied(SlotIndex::new(0).unwrap()));
        assert_eq!(h.mic.held_tracks(), 0);

        assert!(h.board.rename(1, "Changed").is_err());
        assert!(h.board.delete(1).is_err());

        let kept = h.board.slots().get(SlotIndex::new(1).unwrap()).unwrap();
        assert_eq!(kept.name, "Keep");
        assert_eq!(h.board.storage_usage(), None);
    }

    #[test]
    fn test_failed_save_can_be_retried() {
        let mut h = harness_with(FailingStore::default());
        h.board.store().backend().set_failing(true);

        h.board.start_recording(4).unwrap();
        h.mic.feed(&[0.5; 800]);
        assert!(h.board.stop_recording().is_err());
        assert!(h.board.has_unsaved_recording());
        assert!(!h.board.is_recording());

        h.board.store().backend().set_failing(false);
        let sound = h.board.stop_recording().unwrap();

        assert_eq!(sound.id, "slot-4");
        assert!(!h.board.has_unsaved_recording());
        assert!(h.board.slots().is_occupied(SlotIndex::new(4).unwrap()));
        let saved = h.board.store().load_sound("slot-4").unwrap().unwrap();
        assert_eq!(saved.audio.data, sound.audio.data);
        assert_eq!(h.mic.acquisitions(), 1);
    }

    #[test]
    fn test_cancel_discards_unsaved_recording() {
        let mut h = harness_with(FailingStore::default());
        h.board.store().backend().set_failing(true);
        h.board.start_recording(4).unwrap();
        h.mic.feed(&[0.5; 100]);
        assert!(h.board.stop_recording().is_err());

        assert!(h.board.cancel_recording());

        assert!(!h.board.has_unsaved_recording());
        assert!(matches!(
            h.board.stop_recording(),
            Err(SoundboardError::Capture(CaptureError::NoActiveRecording))
        ));
    }

    #[test]
    fn test_clear_all() {
        let mut h = harness();
        h.board.store().save_sound(&stored("slot-0", "a")).unwrap();
        h.board.store().save_sound(&stored("slot-5", "b")).unwrap();
        h.board.load().unwrap();
        h.board.play(0, true).unwrap();
        h.board.play(5, false).unwrap();

        h.board.clear_all().unwrap();
        render(&mut h.endpoint, 10);

        assert!(!h.board.is_playing(None));
        assert_eq!(h.endpoint.mixer().active_voices(), 0);
        assert!(!h.board.engine_mut().is_cached("slot-0"));
        assert_eq!(h.board.slots().occupied_count(), 0);
        assert!(h.board.store().backend().keys().is_empty());
        assert_eq!(
            drain(&mut h.board).last().map(|n| n.message.clone()),
            Some("All sounds cleared".to_string())
        );
    }

    #[test]
    fn test_storage_usage() {
        let mut h = harness();
        record(&mut h, 0, 0.1);

        let usage = h.board.storage_usage().unwrap();
        assert!(usage.used > 0);
        assert_eq!(usage.quota, 1 << 20);
    }
}
