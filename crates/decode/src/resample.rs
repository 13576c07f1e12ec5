use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::{DecodeError, DecodedAudio};

/// Resample to `target_sample_rate` with sinc interpolation.
/// Audio already at the target rate is returned as a cheap clone.
pub fn resample(audio: &DecodedAudio, target_sample_rate: u32) -> Result<DecodedAudio, DecodeError> {
    if audio.sample_rate() == target_sample_rate {
        return Ok(audio.clone());
    }

    let channels = audio.channels() as usize;
    let input_frames = audio.frames();
    if input_frames == 0 {
        return Ok(DecodedAudio::new(Vec::new(), target_sample_rate, audio.channels()));
    }

    let ratio = target_sample_rate as f64 / audio.sample_rate() as f64;

    // rubato wants one Vec per channel
    let mut input = vec![Vec::with_capacity(input_frames); channels];
    for frame in audio.samples().chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            input[ch].push(*sample);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input_frames, channels)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let output = resampler
        .process(&input, None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let output_frames = output.first().map_or(0, Vec::len);
    let mut samples = Vec::with_capacity(output_frames * channels);
    for frame_idx in 0..output_frames {
        for channel in &output {
            samples.push(channel[frame_idx]);
        }
    }

    log::debug!(
        "resampled {} -> {} Hz ({} -> {} frames)",
        audio.sample_rate(),
        target_sample_rate,
        input_frames,
        output_frames
    );

    Ok(DecodedAudio::new(samples, target_sample_rate, audio.channels()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(sample_rate: u32, seconds: f32, channels: u16) -> DecodedAudio {
        let frames = (sample_rate as f32 * seconds) as usize;
        let mut samples = Vec::with_capacity(frames * channels as usize);
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let value = (2.0 * std::f32::consts::PI * 440.0 * t).sin();
            for _ in 0..channels {
                samples.push(value);
            }
        }
        DecodedAudio::new(samples, sample_rate, channels)
    }

    #[test]
    fn test_same_rate_is_shared() {
        let audio = sine(44100, 0.05, 2);
        let resampled = resample(&audio, 44100).expect("resample");

        assert_eq!(resampled.sample_rate(), 44100);
        assert_eq!(resampled.frames(), audio.frames());
    }

    #[test]
    fn test_upsampling_scales_length() {
        let audio = sine(44100, 0.1, 2);
        let resampled = resample(&audio, 48000).expect("resample");

        assert_eq!(resampled.sample_rate(), 48000);
        assert_eq!(resampled.channels(), 2);

        let expected = (audio.frames() as f64 * 48000.0 / 44100.0) as i64;
        let tolerance = (expected as f64 * 0.03) as i64;
        let got = resampled.frames() as i64;
        assert!(
            (got - expected).abs() <= tolerance,
            "expected ~{expected} frames, got {got}"
        );
    }

    #[test]
    fn test_empty_input() {
        let audio = DecodedAudio::new(Vec::new(), 22050, 1);
        let resampled = resample(&audio, 48000).expect("resample");

        assert_eq!(resampled.frames(), 0);
        assert_eq!(resampled.sample_rate(), 48000);
    }
}
