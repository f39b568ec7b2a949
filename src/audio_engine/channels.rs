use crate::audio_engine::errors::SampleLoadError;

/// Maps interleaved audio samples from one channel layout to another.
///
/// - Same channel count: returned unchanged
/// - Mono → N channels: the mono signal is copied to every channel
/// - N channels → Mono: each frame is averaged
/// - Any other N → M: the first `min(N, M)` channels are kept, extra output channels are silent
///
/// A trailing partial frame is dropped.
pub fn map_channels(
    samples: Vec<f32>,
    source_channels: usize,
    output_channels: usize,
) -> Result<Vec<f32>, SampleLoadError> {
    if source_channels == 0 || output_channels == 0 {
        return Err(SampleLoadError::EmptyChannelLayout);
    }

    if source_channels == output_channels {
        return Ok(samples);
    }

    let frames = samples.len() / source_channels;
    let mut out = Vec::with_capacity(frames * output_channels);

    for frame in samples.chunks_exact(source_channels) {
        match (source_channels, output_channels) {
            (1, _) => out.extend(std::iter::repeat_n(frame[0], output_channels)),
            (_, 1) => out.push(frame.iter().sum::<f32>() / source_channels as f32),
            _ => {
                let shared = source_channels.min(output_channels);
                out.extend_from_slice(&frame[..shared]);
                out.extend(std::iter::repeat_n(0.0, output_channels - shared));
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_channels_mono_to_stereo() {
        let output = map_channels(vec![0.5, -0.3, 0.8], 1, 2).unwrap();
        assert_eq!(output, vec![0.5, 0.5, -0.3, -0.3, 0.8, 0.8]);
    }

    #[test]
    fn test_map_channels_stereo_to_mono() {
        let output = map_channels(vec![0.5, 0.3, -0.2, 0.4, 0.8, 0.6], 2, 1).unwrap();

        assert_eq!(output.len(), 3);
        assert!((output[0] - 0.4).abs() < 1e-6);
        assert!((output[1] - 0.1).abs() < 1e-6);
        assert!((output[2] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_map_channels_same_channels() {
        let input = vec![0.5, -0.3, 0.8, 0.2];
        let output = map_channels(input.clone(), 2, 2).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_map_channels_stereo_to_quad_pads_silence() {
        let output = map_channels(vec![0.1, 0.2, 0.3, 0.4], 2, 4).unwrap();
        assert_eq!(output, vec![0.1, 0.2, 0.0, 0.0, 0.3, 0.4, 0.0, 0.0]);
    }

    #[test]
    fn test_map_channels_drops_partial_frame() {
        let output = map_channels(vec![0.1, 0.2, 0.3], 2, 1).unwrap();
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_map_channels_rejects_empty_layout() {
        assert!(matches!(
            map_channels(vec![0.1], 0, 2),
            Err(SampleLoadError::EmptyChannelLayout)
        ));
    }
}
