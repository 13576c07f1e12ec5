mod cache;
mod resample;
mod resolve;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub use cache::AudioCache;
pub use resample::resample;
pub use resolve::ResourceResolver;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("audio file not found: {0}")]
    NotFound(PathBuf),

    #[error("remote resource '{0}' must be fetched before it can be decoded")]
    Remote(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Symphonia(#[from] symphonia::core::errors::Error),

    #[error("no default audio track in {0}")]
    NoDefaultTrack(PathBuf),

    #[error("resampling failed: {0}")]
    Resample(String),
}

/// Decoded, interleaved PCM. Cloning shares the sample data.
#[derive(Clone)]
pub struct DecodedAudio {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl DecodedAudio {
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        // Drop a trailing partial frame rather than index past it later.
        samples.truncate(samples.len() - samples.len() % channels as usize);
        Self {
            samples: Arc::from(samples),
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Frame index for a position in seconds, clamped to the clip length.
    pub fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds.max(0.0) * self.sample_rate as f64) as usize;
        frame.min(self.frames())
    }
}

impl std::fmt::Debug for DecodedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedAudio")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}

pub fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    if !path.exists() {
        return Err(DecodeError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| DecodeError::NoDefaultTrack(path.to_path_buf()))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2) as u16;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet costs a few milliseconds of audio, not the clip.
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                log::warn!("skipping corrupt packet in {}: {e}", path.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;

        let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    log::debug!(
        "decoded {} ({} samples, {} Hz, {} ch)",
        path.display(),
        samples.len(),
        sample_rate,
        channels
    );

    Ok(DecodedAudio::new(samples, sample_rate, channels))
}


#[cfg(test)]
mod tests {
    use super::test_support::write_sine_wav;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_decode_wav() {
        let dir = tempdir().expect("tempdir");
        let path = write_sine_wav(dir.path(), "tone.wav", 44100, 2, 4410);

        let audio = decode_file(&path).expect("decode");

        assert_eq!(audio.sample_rate(), 44100);
        assert_eq!(audio.channels(), 2);
        assert_eq!(audio.frames(), 4410);
        assert!((audio.duration_secs() - 0.1).abs() < 1e-6);
        assert!(audio.samples().iter().any(|s| s.abs() > 0.1), "audio should not be silent");
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_file(Path::new("definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, DecodeError::NotFound(_)));
    }

    #[test]
    fn test_decode_garbage_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"this is not audio").expect("write");

        assert!(decode_file(&path).is_err());
    }

    #[test]
    fn test_partial_frame_is_dropped() {
        let audio = DecodedAudio::new(vec![0.0, 0.1, 0.2, 0.3, 0.4], 44100, 2);
        assert_eq!(audio.frames(), 2);
        assert_eq!(audio.samples().len(), 4);
    }

    #[test]
    fn test_frame_at_clamps() {
        let audio = DecodedAudio::new(vec![0.0; 200], 100, 2);
        assert_eq!(audio.frame_at(0.5), 50);
        assert_eq!(audio.frame_at(-1.0), 0);
        assert_eq!(audio.frame_at(10.0), 100);
    }
}
