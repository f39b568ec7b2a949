pub mod audio_engine;
pub mod capture;
pub mod config;
pub mod coordinator;
pub mod messages;
pub mod sound;
pub mod store;

#[cfg(feature = "python")]
mod python;

pub use audio_engine::PlaybackEngine;
pub use audio_engine::audio_stream::setup_logger;
pub use capture::CaptureSession;
pub use config::SoundboardConfig;
pub use coordinator::{SlotCoordinator, SoundboardError};
pub use store::SoundStore;

/// The Python module implemented in Rust.
#[cfg(feature = "python")]
#[pyo3::pymodule]
mod soundboard_audio {
    #[pymodule_export]
    use super::python::Soundboard;
}
