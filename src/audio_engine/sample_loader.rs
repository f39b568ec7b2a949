//! Audio blob decoding functionality.
//!
//! This module turns recorded blobs into sample buffers the real-time mixer can play, and
//! measures blob durations for sound metadata.

use rubato::{FftFixedIn, Resampler};
use std::io::Cursor;
use std::sync::Arc;
use symphonia::core::{
    audio::SampleBuffer as SymphoniaSampleBuffer, codecs::DecoderOptions,
    errors::Error as SymphoniaError, formats::FormatOptions, io::MediaSourceStream,
    meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};

use crate::audio_engine::channels::map_channels;
use crate::audio_engine::constants::RESAMPLE_CHUNK_FRAMES;
use crate::audio_engine::errors::SampleLoadError;
use crate::messages::SampleBuffer;
use crate::sound::{AudioBlob, UNKNOWN_MIME_TYPE};

/// Output configuration decoded buffers are converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub channels: usize,
    pub sample_rate: u32,
}

/// Interleaved samples exactly as stored in the blob.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub channels: usize,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}

/// Decodes an audio blob with Symphonia, using its MIME type as a probe hint.
///
/// # Errors
///
/// - The container or codec is not recognized
/// - The blob has no default track, sample rate or channel layout
/// - A packet is corrupt
pub fn decode_blob(blob: &AudioBlob) -> Result<DecodedAudio, SampleLoadError> {
    let source = Cursor::new(Arc::clone(&blob.data));
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    let essence = blob.essence();
    if !essence.is_empty() && essence != UNKNOWN_MIME_TYPE {
        hint.mime_type(essence);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or(SampleLoadError::NoDefaultTrack)?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(SampleLoadError::MissingSampleRate)?;
    let channels = track
        .codec_params
        .channels
        .ok_or(SampleLoadError::MissingChannels)?
        .count();
    if channels == 0 {
        return Err(SampleLoadError::EmptyChannelLayout);
    }

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(SampleLoadError::Decode(err)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let audio_buf = decoder.decode(&packet)?;
        let spec = *audio_buf.spec();
        let duration = audio_buf.capacity() as u64;

        let mut sample_buf = SymphoniaSampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(DecodedAudio {
        channels,
        sample_rate,
        samples,
    })
}

/// Decodes a blob and converts it to the mixer's channel count and sample rate.
pub fn decode_blob_to_sample_buffer(
    blob: &AudioBlob,
    output: OutputFormat,
) -> Result<SampleBuffer, SampleLoadError> {
    let decoded = decode_blob(blob)?;
    let resampled = resample_interleaved(
        &decoded.samples,
        decoded.channels,
        decoded.sample_rate,
        output.sample_rate,
    )?;
    let mapped = map_channels(resampled, decoded.channels, output.channels)?;

    Ok(SampleBuffer {
        channels: output.channels,
        samples: Arc::from(mapped.into_boxed_slice()),
    })
}

/// Measures a blob's length in seconds by decoding it once.
///
/// Duration is advisory metadata, so decode failures yield `0.0` instead of an error.
pub fn measure_duration(blob: &AudioBlob) -> f64 {
    match decode_blob(blob) {
        Ok(decoded) => decoded.duration_secs(),
        Err(err) => {
            log::warn!("Could not measure duration of {} blob: {err}", blob.mime_type);
            0.0
        }
    }
}

/// Resamples interleaved audio from `from_hz` to `to_hz`.
///
/// The resampler's leading delay is trimmed, so the result has the expected frame count.
pub fn resample_interleaved(
    samples: &[f32],
    channels: usize,
    from_hz: u32,
    to_hz: u32,
) -> Result<Vec<f32>, SampleLoadError> {
    if channels == 0 {
        return Err(SampleLoadError::EmptyChannelLayout);
    }

    let frames = samples.len() / channels;
    if from_hz == to_hz || frames == 0 {
        return Ok(samples[..frames * channels].to_vec());
    }

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|channel| {
            samples
                .iter()
                .skip(channel)
                .step_by(channels)
                .take(frames)
                .copied()
                .collect()
        })
        .collect();

    let mut resampler = FftFixedIn::<f32>::new(
        from_hz as usize,
        to_hz as usize,
        RESAMPLE_CHUNK_FRAMES,
        2,
        channels,
    )?;

    let delay = resampler.output_delay();
    let expected = (frames as u64 * u64::from(to_hz) / u64::from(from_hz)) as usize;
    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

    let mut pos = 0;
    loop {
        let needed = resampler.input_frames_next();
        if frames - pos < needed {
            break;
        }
        let chunk: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..pos + needed]).collect();
        append_planar(&mut out, resampler.process(chunk.as_slice(), None)?);
        pos += needed;
    }

    if pos < frames {
        let tail: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..]).collect();
        append_planar(&mut out, resampler.process_partial(Some(tail.as_slice()), None)?);
    }

    // Flush the filter tail until the delayed output covers every input frame.
    while out[0].len() < expected + delay {
        let before = out[0].len();
        append_planar(
            &mut out,
            resampler.process_partial(None::<&[Vec<f32>]>, None)?,
        );
        if out[0].len() == before {
            break;
        }
    }

    let mut interleaved = Vec::with_capacity(expected * channels);
    for frame in delay..(delay + expected).min(out[0].len()) {
        for channel in &out {
            interleaved.push(channel[frame]);
        }
    }

    Ok(interleaved)
}

fn append_planar(out: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (channel, samples) in out.iter_mut().zip(block) {
        channel.extend_from_slice(&samples);
    }
}
