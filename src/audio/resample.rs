//! Sample-rate and channel conversion for output devices.

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

/// Duplicate each mono sample across `channels` interleaved channels.
pub fn expand_to_channels(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let mut output = Vec::with_capacity(samples.len() * channels);
    for &sample in samples {
        output.extend(std::iter::repeat_n(sample, channels));
    }
    output
}

/// Convert mono PCM at `from_rate` into interleaved frames for a device.
pub fn prepare_for_device(
    samples: &[i16],
    from_rate: u32,
    device_rate: u32,
    device_channels: usize,
) -> Vec<i16> {
    let resampled = resample(samples, from_rate, device_rate);
    expand_to_channels(&resampled, device_channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_identity_same_rate() {
        let samples = vec![1i16, 2, 3, 4, 5];
        assert_eq!(resample(&samples, 22050, 22050), samples);
    }

    #[test]
    fn resample_doubles_length_for_double_rate() {
        let samples = vec![0i16, 1000, 2000];
        let resampled = resample(&samples, 22050, 44100);

        assert_eq!(resampled.len(), 6);
        assert_eq!(resampled[0], 0);
        assert!(resampled[1] > 0 && resampled[1] < 1000);
        assert_eq!(resampled[2], 1000);
    }

    #[test]
    fn resample_downsample_length() {
        let samples = vec![0i16; 4410];
        assert_eq!(resample(&samples, 44100, 22050).len(), 2205);
    }

    #[test]
    fn resample_22050_to_48000_keeps_duration() {
        let samples = vec![0i16; 22050];
        let resampled = resample(&samples, 22050, 48000);
        assert!((47_999..=48_001).contains(&resampled.len()));
    }

    #[test]
    fn resample_handles_edge_cases() {
        assert!(resample(&[], 22050, 48000).is_empty());
        let single = resample(&[100i16], 22050, 44100);
        assert!(single.iter().all(|&s| s == 100));
    }

    #[test]
    fn resample_preserves_constant_signal() {
        let samples = vec![1000i16; 500];
        let resampled = resample(&samples, 22050, 48000);
        assert!(resampled.iter().all(|&s| (999..=1001).contains(&s)));
    }

    #[test]
    fn expand_interleaves_channels() {
        assert_eq!(expand_to_channels(&[1, 2], 2), vec![1, 1, 2, 2]);
        assert_eq!(expand_to_channels(&[1, 2], 1), vec![1, 2]);
        assert_eq!(expand_to_channels(&[7], 3), vec![7, 7, 7]);
    }

    #[test]
    fn prepare_for_stereo_device() {
        let out = prepare_for_device(&[0; 100], 22050, 44100, 2);
        assert_eq!(out.len(), 400);
    }
}
