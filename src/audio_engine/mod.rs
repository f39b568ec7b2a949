//! Audio Engine Module
//!
//! This module provides real-time playback of recorded sounds. It is organized into
//! sub-modules, each with a specific responsibility:
//!
//! - [`audio_stream`]: CPAL output stream management and the real-time mixer endpoint
//! - [`constants`]: Configuration constants and limits
//! - [`errors`]: Audio-specific error types
//! - [`voice_slot`]: Preallocated voice state
//! - [`mixer`]: Real-time mixing engine
//! - [`sample_loader`]: Blob decoding, resampling and duration measurement
//!
//! The main [`PlaybackEngine`] struct keeps the control-side view of what is playing: a decode
//! cache keyed by sound id and a map of at most one active voice per sound id.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::audio_engine::audio_stream::{MixerEndpoint, OutputLink, create_audio_stream, create_link};
use crate::audio_engine::errors::PlaybackError;
use crate::audio_engine::sample_loader::{
    OutputFormat, decode_blob_to_sample_buffer, measure_duration,
};
use crate::messages::{AudioMessage, ControlMessage, SampleBuffer, VoiceId};
use crate::sound::AudioBlob;

pub mod audio_stream;
pub mod channels;
pub mod constants;
pub mod errors;
pub mod mixer;
pub mod sample_loader;
pub mod voice_slot;

/// A decoded buffer plus a weak handle to the blob it was decoded from.
struct CachedDecode {
    source: Weak<[u8]>,
    sample: SampleBuffer,
}

impl CachedDecode {
    fn is_decoded_from(&self, blob: &AudioBlob) -> bool {
        self.source
            .upgrade()
            .is_some_and(|data| Arc::ptr_eq(&data, &blob.data))
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveVoice {
    voice: VoiceId,
    looping: bool,
    loops: u64,
}

/// Control-side playback engine.
///
/// Owns the output stream (when attached to a device), the decoded-buffer cache and the
/// voice map. Completion events from the audio thread are matched by [`VoiceId`], so an event
/// for a voice that was already stopped or replaced never changes the current state.
pub struct PlaybackEngine {
    _stream: Option<cpal::Stream>,
    link: OutputLink,
    cache: HashMap<String, CachedDecode>,
    voices: HashMap<String, ActiveVoice>,
    next_voice: VoiceId,
}

impl PlaybackEngine {
    /// Opens the default output device and starts its stream.
    pub fn open_default(loop_gap: Duration) -> Result<Self, PlaybackError> {
        let (stream, link) = create_audio_stream(loop_gap)?;
        Ok(Self::with_link(Some(stream), link))
    }

    /// Creates an engine whose mixer is driven by the caller instead of a device.
    pub fn headless(format: OutputFormat, loop_gap: Duration) -> (Self, MixerEndpoint) {
        let (link, endpoint) = create_link(format, loop_gap);
        (Self::with_link(None, link), endpoint)
    }

    fn with_link(stream: Option<cpal::Stream>, link: OutputLink) -> Self {
        Self {
            _stream: stream,
            link,
            cache: HashMap::new(),
            voices: HashMap::new(),
            next_voice: 1,
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        self.link.format
    }

    /// Plays `blob` as the sound `sound_id`, replacing any voice already playing that id.
    ///
    /// The existing voice is stopped before decoding starts. Decodes are cached per id and
    /// reused while the same blob is played again.
    pub fn play(
        &mut self,
        sound_id: &str,
        blob: &AudioBlob,
        looping: bool,
    ) -> Result<(), PlaybackError> {
        self.drain_audio_messages();

        if let Some(previous) = self.voices.get(sound_id).copied() {
            self.send(ControlMessage::StopVoice {
                voice: previous.voice,
            })?;
            self.voices.remove(sound_id);
        }

        let sample = self.decoded(sound_id, blob)?;

        let voice = self.next_voice;
        self.next_voice += 1;

        self.send(ControlMessage::StartVoice {
            voice,
            sample,
            looping,
        })?;
        self.voices.insert(
            sound_id.to_string(),
            ActiveVoice {
                voice,
                looping,
                loops: 0,
            },
        );

        log::debug!("Started voice {voice} for {sound_id} (looping: {looping})");
        Ok(())
    }

    /// Stops one sound's voice, or every voice when `sound_id` is `None`.
    ///
    /// Stopping a sound that is not playing is a no-op.
    pub fn stop(&mut self, sound_id: Option<&str>) -> Result<(), PlaybackError> {
        match sound_id {
            Some(id) => {
                let Some(active) = self.voices.get(id).copied() else {
                    return Ok(());
                };
                self.send(ControlMessage::StopVoice {
                    voice: active.voice,
                })?;
                self.voices.remove(id);
            }
            None => {
                self.send(ControlMessage::StopAll())?;
                self.voices.clear();
            }
        }
        Ok(())
    }

    /// Whether `sound_id` (or any sound, when `None`) has an active voice.
    pub fn is_playing(&mut self, sound_id: Option<&str>) -> bool {
        self.drain_audio_messages();
        match sound_id {
            Some(id) => self.voices.contains_key(id),
            None => !self.voices.is_empty(),
        }
    }

    /// Ids of every sound with an active voice, sorted.
    pub fn active_sound_ids(&mut self) -> Vec<String> {
        self.drain_audio_messages();
        let mut ids: Vec<String> = self.voices.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether the sound's active voice was started with looping enabled.
    pub fn is_looping(&mut self, sound_id: &str) -> bool {
        self.drain_audio_messages();
        self.voices.get(sound_id).is_some_and(|active| active.looping)
    }

    /// How many times the sound's active voice has restarted.
    ///
    /// Restarts are not counted while the event queue is nearly full, so this is a lower bound.
    pub fn loop_count(&mut self, sound_id: &str) -> u64 {
        self.drain_audio_messages();
        self.voices.get(sound_id).map_or(0, |active| active.loops)
    }

    /// Measures a blob's length in seconds without caching the decode. Returns `0.0` when the
    /// blob cannot be decoded.
    pub fn get_audio_duration(&self, blob: &AudioBlob) -> f64 {
        measure_duration(blob)
    }

    /// Drops the cached decode for a sound. Required whenever the blob bound to an id changes.
    pub fn invalidate_cache(&mut self, sound_id: &str) {
        if self.cache.remove(sound_id).is_some() {
            log::debug!("Invalidated decode cache for {sound_id}");
        }
    }

    /// Drops every cached decode.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn is_cached(&self, sound_id: &str) -> bool {
        self.cache.contains_key(sound_id)
    }

    fn decoded(&mut self, sound_id: &str, blob: &AudioBlob) -> Result<SampleBuffer, PlaybackError> {
        if let Some(cached) = self.cache.get(sound_id) {
            if cached.is_decoded_from(blob) {
                return Ok(cached.sample.clone());
            }
        }

        let sample = decode_blob_to_sample_buffer(blob, self.link.format)?;
        self.cache.insert(
            sound_id.to_string(),
            CachedDecode {
                source: Arc::downgrade(&blob.data),
                sample: sample.clone(),
            },
        );
        Ok(sample)
    }

    fn send(&mut self, message: ControlMessage) -> Result<(), PlaybackError> {
        self.link
            .producer
            .push(message)
            .map_err(|_| PlaybackError::OutputBusy)
    }

    /// Applies completion events from the audio thread to the voice map.
    fn drain_audio_messages(&mut self) {
        while let Ok(message) = self.link.consumer.pop() {
            match message {
                AudioMessage::VoiceEnded { voice } => {
                    self.voices.retain(|_, active| active.voice != voice);
                }
                AudioMessage::VoiceLooped { voice } => {
                    if let Some(active) = self.voices.values_mut().find(|a| a.voice == voice) {
                        active.loops += 1;
                    }
                }
                AudioMessage::VoiceDropped { voice } => {
                    let before = self.voices.len();
                    self.voices.retain(|_, active| active.voice != voice);
                    if self.voices.len() != before {
                        log::warn!("Voice {voice} was dropped by the mixer");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::sample_loader::tests::wav_blob;

    const FORMAT: OutputFormat = OutputFormat {
        channels: 1,
        sample_rate: 8_000,
    };

    fn engine() -> (PlaybackEngine, MixerEndpoint) {
        PlaybackEngine::headless(FORMAT, Duration::from_millis(10))
    }

    fn render(endpoint: &mut MixerEndpoint, frames: usize) -> Vec<f32> {
        let mut data = vec![0.0; frames * FORMAT.channels];
        endpoint.process(&mut data);
        data
    }

    #[test]
    fn test_play_starts_voice() {
        let (mut engine, mut endpoint) = engine();
        let blob = wav_blob(1, 8_000, &[0.5; 800]);

        engine.play("slot-0", &blob, false).unwrap();
        let out = render(&mut endpoint, 100);

        assert!(engine.is_playing(Some("slot-0")));
        assert!(engine.is_playing(None));
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-3));
        assert_eq!(endpoint.mixer().active_voices(), 1);
    }

    #[test]
    fn test_repeated_play_keeps_one_voice_per_id() {
        let (mut engine, mut endpoint) = engine();
        let blob = wav_blob(1, 8_000, &[0.5; 800]);

        for _ in 0..5 {
            engine.play("slot-0", &blob, false).unwrap();
        }
        render(&mut endpoint, 10);

        assert_eq!(engine.active_sound_ids(), vec!["slot-0".to_string()]);
        assert_eq!(endpoint.mixer().active_voices(), 1);
    }

    #[test]
    fn test_replacing_blob_plays_latest_decode() {
        let (mut engine, mut endpoint) = engine();
        let blob_a = wav_blob(1, 8_000, &[0.25; 800]);
        let blob_b = wav_blob(1, 8_000, &[-0.5; 800]);

        engine.play("slot-0", &blob_a, false).unwrap();
        engine.play("slot-0", &blob_b, false).unwrap();
        let out = render(&mut endpoint, 50);

        assert_eq!(endpoint.mixer().active_voices(), 1);
        assert!(out.iter().all(|s| (s + 0.5).abs() < 1e-3));
    }

    #[test]
    fn test_distinct_sounds_play_concurrently() {
        let (mut engine, mut endpoint) = engine();
        let blob_a = wav_blob(1, 8_000, &[0.25; 800]);
        let blob_b = wav_blob(1, 8_000, &[0.25; 800]);

        engine.play("slot-0", &blob_a, false).unwrap();
        engine.play("slot-1", &blob_b, false).unwrap();
        let out = render(&mut endpoint, 50);

        assert_eq!(
            engine.active_sound_ids(),
            vec!["slot-0".to_string(), "slot-1".to_string()]
        );
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-3));
    }

    #[test]
    fn test_voice_end_clears_playing_state() {
        let (mut engine, mut endpoint) = engine();
        let blob = wav_blob(1, 8_000, &[0.5; 40]);

        engine.play("slot-3", &blob, false).unwrap();
        render(&mut endpoint, 100);

        assert!(!engine.is_playing(Some("slot-3")));
        assert!(engine.active_sound_ids().is_empty());
    }

    #[test]
    fn test_stale_end_event_does_not_clear_replacement() {
        let (mut engine, mut endpoint) = engine();
        let short = wav_blob(1, 8_000, &[0.5; 10]);
        let long = wav_blob(1, 8_000, &[0.5; 800]);

        engine.play("slot-0", &short, false).unwrap();
        // The first voice ends on the audio thread before the replacement is requested.
        render(&mut endpoint, 20);
        engine.play("slot-0", &long, false).unwrap();
        render(&mut endpoint, 20);

        assert!(engine.is_playing(Some("slot-0")));
    }

    #[test]
    fn test_looping_voice_restarts_until_stopped() {
        let (mut engine, mut endpoint) = engine();
        let blob = wav_blob(1, 8_000, &[0.5; 80]);

        engine.play("slot-2", &blob, true).unwrap();
        // 80 frames of audio plus an 80-frame gap (10 ms @ 8 kHz) per cycle.
        for _ in 0..8 {
            render(&mut endpoint, 100);
        }

        assert!(engine.is_playing(Some("slot-2")));
        assert!(engine.is_looping("slot-2"));
        assert!(engine.loop_count("slot-2") >= 4);

        engine.stop(Some("slot-2")).unwrap();
        render(&mut endpoint, 100);

        assert!(!engine.is_playing(Some("slot-2")));
        assert_eq!(endpoint.mixer().active_voices(), 0);
    }

    #[test]
    fn test_fast_loop_does_not_hide_voice_end() {
        let (mut engine, mut endpoint) = PlaybackEngine::headless(FORMAT, Duration::ZERO);
        let click = wav_blob(1, 8_000, &[0.1; 1]);
        let long = wav_blob(1, 8_000, &[0.5; 16_000]);

        engine.play("slot-1", &click, true).unwrap();
        engine.play("slot-0", &long, false).unwrap();
        // One restart per frame floods the event queue long before slot-0 ends.
        for _ in 0..40 {
            render(&mut endpoint, 512);
        }

        assert_eq!(endpoint.mixer().active_voices(), 1);
        assert!(!engine.is_playing(Some("slot-0")));
        assert!(engine.is_playing(Some("slot-1")));
        assert!(engine.loop_count("slot-1") > 0);
    }

    #[test]
    fn test_stop_keeps_voice_tracked_when_queue_is_full() {
        let (mut engine, mut endpoint) = engine();
        let blob = wav_blob(1, 8_000, &[0.5; 800]);

        engine.play("slot-0", &blob, false).unwrap();
        while engine.play("slot-1", &blob, false).is_ok() {}

        assert!(matches!(
            engine.stop(Some("slot-0")),
            Err(PlaybackError::OutputBusy)
        ));
        assert!(engine.is_playing(Some("slot-0")));
        assert!(matches!(engine.stop(None), Err(PlaybackError::OutputBusy)));
        assert!(engine.is_playing(Some("slot-0")));

        render(&mut endpoint, 10);
        engine.stop(Some("slot-0")).unwrap();
        render(&mut endpoint, 10);

        assert!(!engine.is_playing(Some("slot-0")));
        assert!(!endpoint.mixer().is_voice_active(1));
    }

    #[test]
    fn test_stop_single_sound() {
        let (mut engine, mut endpoint) = engine();
        let blob = wav_blob(1, 8_000, &[0.5; 800]);

        engine.play("slot-0", &blob, false).unwrap();
        engine.play("slot-1", &blob, true).unwrap();
        engine.stop(Some("slot-0")).unwrap();
        render(&mut endpoint, 10);

        assert_eq!(engine.active_sound_ids(), vec!["slot-1".to_string()]);
        assert_eq!(endpoint.mixer().active_voices(), 1);
    }

    #[test]
    fn test_stop_all() {
        let (mut engine, mut endpoint) = engine();
        let blob = wav_blob(1, 8_000, &[0.5; 800]);

        engine.play("slot-0", &blob, true).unwrap();
        engine.play("slot-1", &blob, false).unwrap();
        engine.stop(None).unwrap();
        render(&mut endpoint, 10);

        assert!(!engine.is_playing(None));
        assert_eq!(endpoint.mixer().active_voices(), 0);
    }

    #[test]
    fn test_stop_sound_without_voice_is_noop() {
        let (mut engine, _endpoint) = engine();
        assert!(engine.stop(Some("slot-5")).is_ok());
    }

    #[test]
    fn test_decode_error_is_reported() {
        let (mut engine, _endpoint) = engine();
        let blob = AudioBlob::new("audio/wav", b"garbage".to_vec());

        let result = engine.play("slot-0", &blob, false);

        assert!(matches!(result, Err(PlaybackError::Decode(_))));
        assert!(!engine.is_playing(None));
        assert!(!engine.is_cached("slot-0"));
    }

    #[test]
    fn test_decode_is_cached_per_id_and_invalidated() {
        let (mut engine, _endpoint) = engine();
        let blob = wav_blob(1, 8_000, &[0.5; 80]);

        engine.play("slot-0", &blob, false).unwrap();
        assert!(engine.is_cached("slot-0"));

        let cached = engine.cache.get("slot-0").unwrap().sample.samples.clone();
        engine.play("slot-0", &blob, false).unwrap();
        let reused = engine.cache.get("slot-0").unwrap().sample.samples.clone();
        assert!(Arc::ptr_eq(&cached, &reused));

        engine.invalidate_cache("slot-0");
        assert!(!engine.is_cached("slot-0"));
    }

    #[test]
    fn test_get_audio_duration() {
        let (engine, _endpoint) = engine();

        let blob = wav_blob(1, 8_000, &[0.0; 4_000]);
        assert!((engine.get_audio_duration(&blob) - 0.5).abs() < 1e-9);

        let broken = AudioBlob::new("audio/webm", vec![1, 2, 3]);
        assert_eq!(engine.get_audio_duration(&broken), 0.0);
        assert!(!engine.is_cached("slot-0"));
    }
}
