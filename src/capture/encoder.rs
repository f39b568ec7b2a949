//! Recording format negotiation and chunk encoding.
//!
//! The recorder natively emits 16-bit PCM WAV. Chunks hold little-endian PCM frames and are
//! wrapped in a WAV container when the recording is finalized.

use std::io::Cursor;

use crate::audio_engine::errors::CaptureError;

/// Container/codec preferences, most preferred first.
pub const PREFERRED_MIME_TYPES: [&str; 3] = ["audio/webm;codecs=opus", "audio/mp4", "audio/webm"];

/// Format used when no preference is supported.
pub const DEFAULT_MIME_TYPE: &str = "audio/wav";

const SUPPORTED_MIME_TYPES: [&str; 3] = ["audio/wav", "audio/wave", "audio/x-wav"];

/// Whether the built-in recorder can emit `mime_type`.
pub fn is_type_supported(mime_type: &str) -> bool {
    let normalized: String = mime_type
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    SUPPORTED_MIME_TYPES.contains(&normalized.as_str())
}

/// Picks the first supported preference, falling back to [`DEFAULT_MIME_TYPE`].
///
/// Never fails: an empty or entirely unsupported preference list yields the default.
pub fn negotiate_mime_type<S: AsRef<str>>(preferences: &[S]) -> String {
    for preference in preferences {
        let preference = preference.as_ref();
        if is_type_supported(preference) {
            return preference.to_string();
        }
        log::debug!("Recorder cannot emit {preference}, trying next format");
    }
    DEFAULT_MIME_TYPE.to_string()
}

/// Channel count and sample rate of captured audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

/// Encodes captured samples into chunks and assembles chunks into a blob payload.
#[derive(Debug, Clone)]
pub struct WavChunkEncoder {
    format: InputFormat,
}

impl WavChunkEncoder {
    pub fn new(format: InputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> InputFormat {
        self.format
    }

    /// Converts interleaved f32 samples into one chunk of 16-bit little-endian PCM.
    pub fn encode_chunk(&self, samples: &[f32]) -> Vec<u8> {
        let mut chunk = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            chunk.extend_from_slice(&value.to_le_bytes());
        }
        chunk
    }

    /// Concatenates chunks into a complete WAV file.
    pub fn finish(&self, chunks: &[Vec<u8>]) -> Result<Vec<u8>, CaptureError> {
        let spec = hound::WavSpec {
            channels: self.format.channels,
            sample_rate: self.format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| CaptureError::Encode(e.to_string()))?;

            for chunk in chunks {
                for bytes in chunk.chunks_exact(2) {
                    writer
                        .write_sample(i16::from_le_bytes([bytes[0], bytes[1]]))
                        .map_err(|e| CaptureError::Encode(e.to_string()))?;
                }
            }

            writer
                .finalize()
                .map_err(|e| CaptureError::Encode(e.to_string()))?;
        }

        Ok(cursor.into_inner())
    }
}
