//! Audio-thread side of the engine: a fixed-capacity bank of voices.
//!
//! Nothing in here allocates or frees once the bank is built. Audio data
//! arrives as `basedrop::Shared`, so dropping a finished voice only queues the
//! buffer for the collector on the control thread.

use basedrop::Shared;
use emcee_decode::DecodedAudio;

/// Upper bound on simultaneously sounding segments.
pub const MAX_VOICES: usize = 64;

/// Identifies one started voice. A fresh key is issued for every start, so
/// late status from a replaced voice can be told apart from the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceKey(pub u64);

pub enum Command {
    Start {
        key: VoiceKey,
        audio: Shared<DecodedAudio>,
        start_frame: usize,
        gain: f32,
    },
    Stop(VoiceKey),
    StopAll,
    SetGain {
        key: VoiceKey,
        gain: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// First block of the voice was rendered.
    Started(VoiceKey),
    /// The voice ran out of samples and was removed.
    Ended(VoiceKey),
    /// The bank was full; the start was dropped.
    Rejected(VoiceKey),
}

struct Voice {
    key: VoiceKey,
    audio: Shared<DecodedAudio>,
    frame: usize,
    gain: f32,
    announced: bool,
}

pub struct VoiceBank {
    voices: Vec<Voice>,
}

impl VoiceBank {
    pub fn new() -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn apply(&mut self, command: Command, emit: &mut impl FnMut(Status)) {
        match command {
            Command::Start {
                key,
                audio,
                start_frame,
                gain,
            } => {
                if self.voices.len() == MAX_VOICES {
                    emit(Status::Rejected(key));
                    return;
                }
                self.voices.push(Voice {
                    key,
                    audio,
                    frame: start_frame,
                    gain,
                    announced: false,
                });
            }
            Command::Stop(key) => {
                if let Some(index) = self.voices.iter().position(|v| v.key == key) {
                    self.voices.swap_remove(index);
                }
            }
            Command::StopAll => self.voices.clear(),
            Command::SetGain { key, gain } => {
                if let Some(voice) = self.voices.iter_mut().find(|v| v.key == key) {
                    voice.gain = gain;
                }
            }
        }
    }

    /// Mix every voice into `out` (interleaved, `channels` wide), replacing
    /// its contents.
    pub fn render(&mut self, out: &mut [f32], channels: usize, emit: &mut impl FnMut(Status)) {
        out.fill(0.0);
        if channels == 0 {
            return;
        }
        let frames = out.len() / channels;

        let mut index = 0;
        while index < self.voices.len() {
            let voice = &mut self.voices[index];
            if !voice.announced {
                voice.announced = true;
                emit(Status::Started(voice.key));
            }

            let source = voice.audio.samples();
            let source_channels = voice.audio.channels() as usize;
            let source_frames = voice.audio.frames();

            for frame in 0..frames {
                if voice.frame >= source_frames {
                    break;
                }
                let base = voice.frame * source_channels;
                for ch in 0..channels {
                    let sample = source[base + ch % source_channels];
                    out[frame * channels + ch] += sample * voice.gain;
                }
                voice.frame += 1;
            }

            if voice.frame >= source_frames {
                emit(Status::Ended(voice.key));
                self.voices.swap_remove(index);
            } else {
                index += 1;
            }
        }
    }
}

impl Default for VoiceBank {
    fn default() -> Self {
        Self::new()
    }
}
