//! Microphone capture session.
//!
//! A session moves `Idle -> Recording -> Produced | Cancelled`. While recording, the input
//! device pushes samples into a ring buffer and a collector thread encodes a chunk every
//! interval. The device is released on every way out of `Recording`, including drops.

pub mod collector;
pub mod encoder;
pub mod microphone;

use chrono::{DateTime, Utc};
use rtrb::RingBuffer;
use std::time::Duration;

use crate::audio_engine::constants::CAPTURE_BUFFER_SECONDS;
use crate::audio_engine::errors::CaptureError;
use crate::sound::{AudioBlob, SlotIndex};
use collector::ChunkCollector;
use encoder::{WavChunkEncoder, negotiate_mime_type};
use microphone::{CaptureConstraints, DeviceFault, InputTrack, Microphone, PermissionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording {
        target: SlotIndex,
        started_at: DateTime<Utc>,
    },
    Produced {
        target: SlotIndex,
    },
    Cancelled,
}

impl CaptureState {
    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. })
    }
}

/// A finished recording.
#[derive(Debug, Clone)]
pub struct CapturedAudio {
    pub target: SlotIndex,
    pub blob: AudioBlob,
    pub started_at: DateTime<Utc>,
}

struct ActiveCapture {
    track: Box<dyn InputTrack>,
    collector: Option<ChunkCollector>,
    encoder: WavChunkEncoder,
    fault: DeviceFault,
    mime_type: String,
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        self.track.stop();
        if let Some(collector) = self.collector.take() {
            collector.halt();
        }
    }
}

pub struct CaptureSession {
    microphone: Box<dyn Microphone>,
    constraints: CaptureConstraints,
    chunk_interval: Duration,
    mime_preferences: Vec<String>,
    state: CaptureState,
    active: Option<ActiveCapture>,
}

impl CaptureSession {
    pub fn new(
        microphone: Box<dyn Microphone>,
        chunk_interval: Duration,
        mime_preferences: Vec<String>,
    ) -> Self {
        Self {
            microphone,
            constraints: CaptureConstraints::default(),
            chunk_interval,
            mime_preferences,
            state: CaptureState::Idle,
            active: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            CaptureState::Recording { started_at, .. } => Some(started_at),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<SlotIndex> {
        match self.state {
            CaptureState::Recording { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn permission(&self) -> PermissionState {
        self.microphone.permission()
    }

    /// MIME type negotiated for the active recording.
    pub fn mime_type(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.mime_type.as_str())
    }

    /// Opens the microphone and starts recording for `target`.
    ///
    /// Rejected with `AlreadyRecording` while another recording is active; the active one is
    /// left untouched.
    pub fn start(&mut self, target: SlotIndex) -> Result<DateTime<Utc>, CaptureError> {
        if self.state.is_recording() {
            return Err(CaptureError::AlreadyRecording);
        }

        let mut track = self.microphone.acquire(&self.constraints)?;
        let format = track.format();
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(CaptureError::DeviceUnavailable(format!(
                "Unusable input format ({} ch@{} Hz)",
                format.channels, format.sample_rate
            )));
        }

        let capacity =
            format.sample_rate as usize * usize::from(format.channels) * CAPTURE_BUFFER_SECONDS;
        let (producer, consumer) = RingBuffer::new(capacity);
        let fault = DeviceFault::new();
        track.start(producer, fault.clone())?;

        let encoder = WavChunkEncoder::new(format);
        let collector = ChunkCollector::spawn(consumer, encoder.clone(), self.chunk_interval)?;
        let mime_type = negotiate_mime_type(&self.mime_preferences);

        let started_at = Utc::now();
        log::info!("Recording started for {target} ({mime_type})");

        self.active = Some(ActiveCapture {
            track,
            collector: Some(collector),
            encoder,
            fault,
            mime_type,
        });
        self.state = CaptureState::Recording { target, started_at };
        Ok(started_at)
    }

    /// Finalizes the active recording into a single blob and releases the microphone.
    pub fn stop(&mut self) -> Result<CapturedAudio, CaptureError> {
        let CaptureState::Recording { target, started_at } = self.state else {
            return Err(CaptureError::NoActiveRecording);
        };
        let mut active = self.active.take().ok_or(CaptureError::NoActiveRecording)?;

        if let Some(reason) = active.fault.get() {
            drop(active);
            self.state = CaptureState::Cancelled;
            log::error!("Recording for {target} failed: {reason}");
            return Err(CaptureError::DeviceUnavailable(reason));
        }

        active.track.stop();
        let chunks = active
            .collector
            .take()
            .map(ChunkCollector::finish)
            .unwrap_or_default();

        let bytes = match active.encoder.finish(&chunks) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.state = CaptureState::Cancelled;
                return Err(e);
            }
        };

        let blob = AudioBlob::new(active.mime_type.clone(), bytes);
        log::info!(
            "Recording for {target} produced {} bytes in {} chunks",
            blob.len(),
            chunks.len()
        );

        self.state = CaptureState::Produced { target };
        Ok(CapturedAudio {
            target,
            blob,
            started_at,
        })
    }

    /// Releases the microphone and discards buffered audio. No-op unless recording.
    ///
    /// Returns whether a recording was cancelled.
    pub fn cancel(&mut self) -> bool {
        if !self.state.is_recording() {
            return false;
        }
        self.active = None;
        self.state = CaptureState::Cancelled;
        log::info!("Recording cancelled");
        true
    }

    /// Ends the recording if the device reported a fault since `start`.
    pub fn check_device(&mut self) -> Result<(), CaptureError> {
        let Some(reason) = self.active.as_ref().and_then(|a| a.fault.get()) else {
            return Ok(());
        };
        self.active = None;
        self.state = CaptureState::Cancelled;
        log::error!("Microphone failed during recording: {reason}");
        Err(CaptureError::DeviceUnavailable(reason))
    }
}
