//! Audio-specific error types.

use thiserror::Error;

/// Errors that can occur while decoding an audio blob into a playable buffer.
#[derive(Debug, Error)]
pub enum SampleLoadError {
    /// The blob could not be decoded as audio.
    #[error("failed to decode audio: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    /// Failed to create resampler.
    #[error("failed to create resampler: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    /// Failed to resample audio.
    #[error("failed to resample audio: {0}")]
    Resample(#[from] rubato::ResampleError),

    /// Audio blob has no default track.
    #[error("audio blob has no default track")]
    NoDefaultTrack,

    /// Audio blob is missing sample rate information.
    #[error("audio blob is missing a sample rate")]
    MissingSampleRate,

    /// Audio blob is missing channel information.
    #[error("audio blob is missing channel information")]
    MissingChannels,

    /// A channel layout with zero channels was requested or found.
    #[error("channel layout has no channels")]
    EmptyChannelLayout,
}

/// Errors raised by the playback engine.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The blob bound to a sound could not be decoded.
    #[error("could not decode sound: {0}")]
    Decode(#[from] SampleLoadError),

    /// No output device or stream could be opened.
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),

    /// The control queue to the audio thread is full.
    #[error("audio output is busy, try again")]
    OutputBusy,
}

/// Errors raised by the capture session.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The platform refused microphone access.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// No microphone, or the platform failed to capture from it.
    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),

    /// `stop` was called while no recording was active.
    #[error("no active recording")]
    NoActiveRecording,

    /// `start` was called while a recording was already active.
    #[error("a recording is already in progress")]
    AlreadyRecording,

    /// Buffered chunks could not be assembled into a blob.
    #[error("failed to create audio blob: {0}")]
    Encode(String),
}
