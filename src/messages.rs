//! Message definitions for communication between the control side and the audio thread.
//!
//! This module defines the enums that serve as the wire format for messages passed through the
//! ring buffers between the control thread and the real-time audio thread, plus the user-facing
//! notifications the coordinator emits.

use std::sync::Arc;

/// Decoded, ready-to-play audio shared between the decode cache and active voices.
///
/// Samples are interleaved and already mapped to the output channel count and sample rate.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub channels: usize,
    pub samples: Arc<[f32]>,
}

impl SampleBuffer {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels
    }
}

/// Identifies a single started voice.
///
/// Every `play` allocates a fresh id, so completions that refer to an older id are stale.
pub type VoiceId = u64;

/// Message that is emitted from the audio thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioMessage {
    /// A non-looping voice reached the end of its buffer and was released.
    VoiceEnded { voice: VoiceId },

    /// A looping voice reached its end and restarted from the beginning.
    VoiceLooped { voice: VoiceId },

    /// A voice could not be started (no free voice slot or channel mismatch).
    VoiceDropped { voice: VoiceId },
}

/// Message that is emitted from the control side.
#[derive(Debug, Clone)]
pub enum ControlMessage {
    /// Start a voice from a decoded buffer.
    ///
    /// # Parameters
    /// * `voice` - Unique id of this voice
    /// * `sample` - Pre-decoded immutable sample buffer (shared handle)
    /// * `looping` - Restart the voice whenever it reaches its end
    StartVoice {
        voice: VoiceId,
        sample: SampleBuffer,
        looping: bool,
    },

    /// Stop a voice. Unknown ids are ignored.
    StopVoice { voice: VoiceId },

    /// Stop all currently active voices.
    StopAll(),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A user-facing message produced by the coordinator for every completed or failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}
