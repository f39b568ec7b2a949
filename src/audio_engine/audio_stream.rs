//! Audio Stream Module
//!
//! This module handles CPAL output stream management including:
//! - Stream initialization and configuration
//! - The mixer endpoint that runs inside the real-time callback
//! - Ring buffers between the control side and the audio thread
//! - Logger setup

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Stream, StreamConfig};
use env_logger::{Builder, Env};
use rtrb::{Consumer, Producer, RingBuffer};
use std::time::Duration;

use crate::audio_engine::constants::{EVENT_QUEUE_RESERVE, MESSAGE_QUEUE_CAPACITY};
use crate::audio_engine::errors::PlaybackError;
use crate::audio_engine::mixer::RtMixer;
use crate::audio_engine::sample_loader::OutputFormat;
use crate::messages::{AudioMessage, ControlMessage};

/// Control-side end of the ring buffers connected to a mixer.
pub struct OutputLink {
    pub producer: Producer<ControlMessage>,
    pub consumer: Consumer<AudioMessage>,
    pub format: OutputFormat,
}

/// Audio-thread end of the ring buffers, owning the mixer.
///
/// Inside a CPAL callback this is driven by the device; headless, it can be driven by hand.
pub struct MixerEndpoint {
    mixer: RtMixer,
    commands: Consumer<ControlMessage>,
    events: Producer<AudioMessage>,
}

impl MixerEndpoint {
    /// Applies pending control messages, then renders one block of interleaved audio.
    pub fn process(&mut self, data: &mut [f32]) {
        let events = &mut self.events;
        let mut emit = |msg: AudioMessage| {
            if matches!(msg, AudioMessage::VoiceLooped { .. })
                && events.slots() <= EVENT_QUEUE_RESERVE
            {
                return;
            }
            let _ = events.push(msg);
        };

        while let Ok(message) = self.commands.pop() {
            match message {
                ControlMessage::StartVoice {
                    voice,
                    sample,
                    looping,
                } => {
                    self.mixer.start_voice(voice, sample, looping, &mut emit);
                }
                ControlMessage::StopVoice { voice } => {
                    self.mixer.stop_voice(voice);
                }
                ControlMessage::StopAll() => {
                    self.mixer.stop_all();
                }
            }
        }

        self.mixer.render(data, &mut emit);
    }

    pub fn mixer(&self) -> &RtMixer {
        &self.mixer
    }
}

/// Setup and configure the logger.
pub fn setup_logger() {
    // Default to `info`; override via `RUST_LOG`, e.g. `RUST_LOG=debug` when troubleshooting.
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .try_init()
        .unwrap_or(()); // Ignore initialization errors
}

/// Number of frames in `loop_gap` at `sample_rate`.
pub fn gap_frames(loop_gap: Duration, sample_rate: u32) -> usize {
    (loop_gap.as_secs_f64() * f64::from(sample_rate)).round() as usize
}

/// Creates the ring buffers and mixer for an output format without touching any device.
pub fn create_link(format: OutputFormat, loop_gap: Duration) -> (OutputLink, MixerEndpoint) {
    // Control messages (engine -> audio thread)
    let (producer_in, consumer_in) = RingBuffer::new(MESSAGE_QUEUE_CAPACITY);

    // Voice events (audio thread -> engine)
    let (producer_out, consumer_out) = RingBuffer::new(MESSAGE_QUEUE_CAPACITY);

    let endpoint = MixerEndpoint {
        mixer: RtMixer::new(format.channels, gap_frames(loop_gap, format.sample_rate)),
        commands: consumer_in,
        events: producer_out,
    };

    let link = OutputLink {
        producer: producer_in,
        consumer: consumer_out,
        format,
    };

    (link, endpoint)
}

/// Create, configure and start the default output stream.
///
/// This function:
/// 1. Sets up the default audio device
/// 2. Creates ring buffers and the mixer for the device's format
/// 3. Builds the stream with the mixer endpoint in its callback
/// 4. Starts the stream
pub fn create_audio_stream(loop_gap: Duration) -> Result<(Stream, OutputLink), PlaybackError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PlaybackError::OutputUnavailable("No audio device found".to_string()))?;

    let config = device
        .default_output_config()
        .map_err(|e| PlaybackError::OutputUnavailable(format!("No default output config: {e}")))?;
    let sample_rate = config.sample_rate();
    let channels = config.channels();

    log::info!(
        "Starting playback engine... ({} ch@{} Hz)",
        channels,
        sample_rate
    );

    let format = OutputFormat {
        channels: channels as usize,
        sample_rate,
    };
    let (link, mut endpoint) = create_link(format, loop_gap);

    let stream_config = StreamConfig {
        channels,
        sample_rate,
        buffer_size: BufferSize::Fixed(512),
    };

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                endpoint.process(data);
            },
            |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| {
            PlaybackError::OutputUnavailable(format!("Failed to create audio stream: {e}"))
        })?;

    stream.play().map_err(|e| {
        PlaybackError::OutputUnavailable(format!("Failed to play audio stream: {e}"))
    })?;

    Ok((stream, link))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::messages::SampleBuffer;

    #[test]
    fn test_logger_setup() {
        // Multiple calls should be safe (though only the first takes effect)
        setup_logger();
        setup_logger();
    }

    #[test]
    fn test_gap_frames() {
        assert_eq!(gap_frames(Duration::from_millis(10), 48_000), 480);
        assert_eq!(gap_frames(Duration::ZERO, 48_000), 0);
    }

    #[test]
    fn test_endpoint_applies_messages_before_render() {
        let format = OutputFormat {
            channels: 1,
            sample_rate: 1_000,
        };
        let (mut link, mut endpoint) = create_link(format, Duration::ZERO);

        let sample = SampleBuffer {
            channels: 1,
            samples: Arc::from(vec![0.25; 4].into_boxed_slice()),
        };
        link.producer
            .push(ControlMessage::StartVoice {
                voice: 1,
                sample,
                looping: false,
            })
            .unwrap();

        let mut data = vec![0.0; 8];
        endpoint.process(&mut data);

        assert_eq!(&data[..4], &[0.25; 4]);
        assert_eq!(link.consumer.pop(), Ok(AudioMessage::VoiceEnded { voice: 1 }));
        assert!(link.consumer.pop().is_err());
    }

    #[test]
    fn test_audio_stream_creation() {
        // Actual stream creation requires audio hardware
        if cpal::default_host().default_output_device().is_none() {
            return;
        }

        // We expect this to potentially fail in test environments
        let _ = create_audio_stream(Duration::from_millis(10));
    }
}
