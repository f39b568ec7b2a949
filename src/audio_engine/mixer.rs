//! Real-time audio mixer implementation.
//!
//! This module provides the [`RtMixer`] struct which mixes every active voice into the output
//! buffer. Voices are started and stopped by id; the mixer reports when a voice ends, loops or
//! cannot be started so the control side can keep its own voice map in sync.
//!
//! Buffers arrive already decoded by
//! [`decode_blob_to_sample_buffer`](crate::audio_engine::sample_loader::decode_blob_to_sample_buffer).

use crate::audio_engine::constants::MAX_VOICES;
use crate::audio_engine::voice_slot::VoiceSlot;
use crate::messages::{AudioMessage, SampleBuffer, VoiceId};
use cpal::Sample;

/// Real-time mixer that owns the voice slots.
///
/// The mixer never allocates while rendering and never blocks.
pub struct RtMixer {
    /// Number of output channels.
    channels: usize,

    /// Silent frames inserted before a looping voice restarts.
    loop_gap_frames: usize,

    /// Active voices with MAX_VOICES slots.
    voices: [VoiceSlot; MAX_VOICES],
}

impl RtMixer {
    /// Creates a new RtMixer.
    ///
    /// # Parameters
    ///
    /// - `channels`: Number of output channels
    /// - `loop_gap_frames`: Frames of silence between the end of a looping voice and its restart
    pub fn new(channels: usize, loop_gap_frames: usize) -> Self {
        Self {
            channels,
            loop_gap_frames,
            voices: std::array::from_fn(|_| VoiceSlot::new()),
        }
    }

    /// Starts a voice.
    ///
    /// A voice whose buffer does not match the mixer's channel count, or that finds no free
    /// slot, is dropped and reported with [`AudioMessage::VoiceDropped`].
    pub fn start_voice(
        &mut self,
        voice: VoiceId,
        sample: SampleBuffer,
        looping: bool,
        emit: &mut impl FnMut(AudioMessage),
    ) {
        if sample.channels != self.channels {
            emit(AudioMessage::VoiceDropped { voice });
            return;
        }

        match self.voices.iter_mut().find(|slot| !slot.active) {
            Some(slot) => slot.start(voice, sample, looping),
            None => emit(AudioMessage::VoiceDropped { voice }),
        }
    }

    /// Stops a voice. Unknown or already finished voices are ignored.
    pub fn stop_voice(&mut self, voice: VoiceId) {
        for slot in &mut self.voices {
            if slot.is_playing_voice(voice) {
                slot.stop();
            }
        }
    }

    /// Stops all active voices.
    pub fn stop_all(&mut self) {
        for slot in &mut self.voices {
            slot.stop();
        }
    }

    /// Number of voices currently holding a slot.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|slot| slot.active).count()
    }

    pub fn is_voice_active(&self, voice: VoiceId) -> bool {
        self.voices.iter().any(|slot| slot.is_playing_voice(voice))
    }

    /// Renders audio frames to the output buffer.
    ///
    /// Mixes all active voices into the interleaved `output` buffer. Voices that reach their
    /// end are either released (`VoiceEnded`) or, when looping, restarted after the loop gap
    /// (`VoiceLooped`).
    pub fn render(&mut self, output: &mut [f32], emit: &mut impl FnMut(AudioMessage)) {
        output.fill(Sample::EQUILIBRIUM);

        if self.channels == 0 {
            return;
        }

        let frames = output.len() / self.channels;
        if frames == 0 {
            return;
        }

        let channels = self.channels;
        let loop_gap_frames = self.loop_gap_frames;

        for slot in &mut self.voices {
            if !slot.active {
                continue;
            }

            let Some(sample) = slot.sample.clone() else {
                slot.stop();
                continue;
            };

            let sample_frames = sample.frames();
            if sample_frames == 0 {
                emit(AudioMessage::VoiceEnded { voice: slot.voice });
                slot.stop();
                continue;
            }

            let mut frame = 0;
            while frame < frames {
                if slot.gap_remaining > 0 {
                    let skip = slot.gap_remaining.min(frames - frame);
                    slot.gap_remaining -= skip;
                    frame += skip;
                    if slot.gap_remaining == 0 {
                        slot.restart();
                        emit(AudioMessage::VoiceLooped { voice: slot.voice });
                    }
                    continue;
                }

                if slot.frame_pos >= sample_frames {
                    if !slot.looping {
                        break;
                    }
                    if loop_gap_frames == 0 {
                        slot.restart();
                        emit(AudioMessage::VoiceLooped { voice: slot.voice });
                    } else {
                        slot.gap_remaining = loop_gap_frames;
                    }
                    continue;
                }

                let run = (sample_frames - slot.frame_pos).min(frames - frame);
                let src = &sample.samples[slot.frame_pos * channels..(slot.frame_pos + run) * channels];
                let dst = &mut output[frame * channels..(frame + run) * channels];
                for (out, value) in dst.iter_mut().zip(src) {
                    *out += *value;
                }

                slot.frame_pos += run;
                frame += run;
            }

            if !slot.looping && slot.frame_pos >= sample_frames {
                emit(AudioMessage::VoiceEnded { voice: slot.voice });
                slot.stop();
            }
        }
    }

    /// Gets the number of channels configured for this mixer.
    pub fn channels(&self) -> usize {
        self.channels
    }
}
