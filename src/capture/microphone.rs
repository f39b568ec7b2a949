//! Microphone access.
//!
//! [`Microphone`] acquires an [`InputTrack`]; a started track pushes interleaved f32 samples
//! into an `rtrb` producer from the device thread. Faults reported by the device are raised on
//! a shared [`DeviceFault`] the capture session checks.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample, Stream, StreamConfig};
use rtrb::Producer;
use std::sync::{Arc, Mutex};

use crate::audio_engine::errors::CaptureError;
use crate::capture::encoder::InputFormat;

/// Processing requested from the platform when opening the microphone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

impl PermissionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Prompt => "prompt",
        }
    }
}

/// Shared slot a device thread writes its first fault into.
#[derive(Debug, Clone, Default)]
pub struct DeviceFault(Arc<Mutex<Option<String>>>);

impl DeviceFault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a fault. Only the first fault is kept.
    pub fn raise(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.0.lock() {
            slot.get_or_insert_with(|| reason.into());
        }
    }

    pub fn get(&self) -> Option<String> {
        self.0.lock().ok().and_then(|slot| slot.clone())
    }
}

/// A source of microphone input.
pub trait Microphone {
    /// Current permission state. Hosts without a permission API report `Prompt`.
    fn permission(&self) -> PermissionState;

    /// Acquires the input device.
    fn acquire(&self, constraints: &CaptureConstraints)
    -> Result<Box<dyn InputTrack>, CaptureError>;
}

/// An acquired microphone input.
///
/// Dropping a track must release the device, as must `stop`.
pub trait InputTrack {
    fn format(&self) -> InputFormat;

    /// Starts delivering samples into `sink`. Device faults are raised on `fault`.
    fn start(&mut self, sink: Producer<f32>, fault: DeviceFault) -> Result<(), CaptureError>;

    /// Stops the device. Safe to call more than once.
    fn stop(&mut self);
}

/// The host's default input device through CPAL.
pub struct CpalMicrophone {
    host: cpal::Host,
}

impl CpalMicrophone {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

impl Default for CpalMicrophone {
    fn default() -> Self {
        Self::new()
    }
}

impl Microphone for CpalMicrophone {
    fn permission(&self) -> PermissionState {
        // CPAL exposes no permission query.
        PermissionState::Prompt
    }

    fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn InputTrack>, CaptureError> {
        let device = self
            .host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("No input device found".to_string()))?;

        let config = device
            .default_input_config()
            .map_err(|e| classify_device_error(&e.to_string()))?;

        log::debug!(
            "Requested capture processing {:?}; the host applies its own input chain",
            constraints
        );

        Ok(Box::new(CpalInputTrack {
            device,
            config,
            stream: None,
        }))
    }
}

struct CpalInputTrack {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    stream: Option<Stream>,
}

impl CpalInputTrack {
    fn build<T>(
        &self,
        config: &StreamConfig,
        mut sink: Producer<f32>,
        fault: DeviceFault,
    ) -> Result<Stream, cpal::BuildStreamError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        self.device.build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Drop whole buffers on overrun so frames stay aligned.
                if sink.slots() < data.len() {
                    return;
                }
                for &sample in data {
                    let _ = sink.push(sample.to_sample::<f32>());
                }
            },
            move |err| {
                fault.raise(err.to_string());
            },
            None,
        )
    }
}

impl InputTrack for CpalInputTrack {
    fn format(&self) -> InputFormat {
        InputFormat {
            channels: self.config.channels(),
            sample_rate: self.config.sample_rate(),
        }
    }

    fn start(&mut self, sink: Producer<f32>, fault: DeviceFault) -> Result<(), CaptureError> {
        let config: StreamConfig = self.config.config();

        let stream = match self.config.sample_format() {
            cpal::SampleFormat::F32 => self.build::<f32>(&config, sink, fault),
            cpal::SampleFormat::I16 => self.build::<i16>(&config, sink, fault),
            cpal::SampleFormat::U16 => self.build::<u16>(&config, sink, fault),
            cpal::SampleFormat::I32 => self.build::<i32>(&config, sink, fault),
            other => {
                return Err(CaptureError::DeviceUnavailable(format!(
                    "Unsupported input sample format: {other}"
                )));
            }
        }
        .map_err(|e| classify_device_error(&e.to_string()))?;

        stream
            .play()
            .map_err(|e| classify_device_error(&e.to_string()))?;

        log::info!(
            "Microphone open ({} ch@{} Hz)",
            self.config.channels(),
            self.config.sample_rate()
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            drop(stream);
            log::info!("Microphone released");
        }
    }
}

impl Drop for CpalInputTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Maps a host error message onto the capture error taxonomy.
fn classify_device_error(message: &str) -> CaptureError {
    let lowered = message.to_ascii_lowercase();
    let denied = ["permission", "denied", "not allowed", "not authorized", "unauthorized"]
        .iter()
        .any(|needle| lowered.contains(needle));

    if denied {
        CaptureError::PermissionDenied
    } else {
        CaptureError::DeviceUnavailable(message.to_string())
    }
}
