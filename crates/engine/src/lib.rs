//! cpal-backed [`AudioResourceManager`].
//!
//! The control side (this struct) decodes through a [`Library`] and
//! talks to the output callback over two lock-free rings: commands in,
//! status out. Decoded buffers cross as `basedrop::Shared` and are reclaimed
//! by the collector whenever events are drained.

mod library;
mod voice;

use std::collections::{HashMap, HashSet};

use basedrop::{Collector, Handle, Shared};
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use emcee_decode::ResourceResolver;
use emcee_transport::{
    AudioResourceManager, PlayOptions, PlaybackError, PlaybackEvent, ResourceHandle, SegmentId,
};

pub use library::Library;
pub use voice::{Command, MAX_VOICES, Status, VoiceBank, VoiceKey};

const COMMAND_CAPACITY: usize = 256;
const STATUS_CAPACITY: usize = 256;
/// Frames mixed per pass of the output callback's scratch buffer.
const SCRATCH_FRAMES: usize = 1024;

pub struct CpalAudioManager {
    commands: rtrb::Producer<Command>,
    status: rtrb::Consumer<Status>,
    collector: Collector,
    handle: Handle,
    library: Library,
    /// Current voice of each sounding segment.
    voices: HashMap<SegmentId, VoiceKey>,
    /// Reverse map for translating status back into segment ids.
    owners: HashMap<VoiceKey, SegmentId>,
    /// Resource each segment last played, for cache eviction on release.
    resources: HashMap<SegmentId, ResourceHandle>,
    playing: HashSet<SegmentId>,
    /// Errors raised on the control side, reported with the next drain.
    pending: Vec<PlaybackEvent>,
    next_key: u64,
    /// A `StopAll` that did not fit in the command ring yet.
    stop_all_deferred: bool,
    sample_rate: u32,
    stream: Option<cpal::Stream>,
    disposed: bool,
}

impl CpalAudioManager {
    /// Open the default output device and start an idle stream.
    pub fn start(resolver: ResourceResolver) -> anyhow::Result<Self> {
        let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(COMMAND_CAPACITY);
        let (status_tx, status_rx) = rtrb::RingBuffer::<Status>::new(STATUS_CAPACITY);

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate().0;
        log::info!(
            "audio output: {} ({} Hz, {} ch, {})",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate,
            config.channels(),
            config.sample_format()
        );

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &config.into(), command_rx, status_tx)?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &config.into(), command_rx, status_tx)?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &config.into(), command_rx, status_tx)?
            }
            sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
        };

        stream.play()?;

        Ok(Self::with_rings(
            command_tx,
            status_rx,
            Library::new(resolver, sample_rate),
            sample_rate,
            Some(stream),
        ))
    }

    fn with_rings(
        commands: rtrb::Producer<Command>,
        status: rtrb::Consumer<Status>,
        library: Library,
        sample_rate: u32,
        stream: Option<cpal::Stream>,
    ) -> Self {
        let collector = Collector::new();
        let handle = collector.handle();
        Self {
            commands,
            status,
            collector,
            handle,
            library,
            voices: HashMap::new(),
            owners: HashMap::new(),
            resources: HashMap::new(),
            playing: HashSet::new(),
            pending: Vec::new(),
            next_key: 0,
            stop_all_deferred: false,
            sample_rate,
            stream,
            disposed: false,
        }
    }

    /// A manager with no device behind it. The caller plays the audio
    /// thread through the returned ring ends.
    #[cfg(test)]
    fn detached(
        resolver: ResourceResolver,
        sample_rate: u32,
        capacity: usize,
    ) -> (Self, rtrb::Consumer<Command>, rtrb::Producer<Status>) {
        let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(capacity);
        let (status_tx, status_rx) = rtrb::RingBuffer::<Status>::new(capacity);
        let manager = Self::with_rings(
            command_tx,
            status_rx,
            Library::new(resolver, sample_rate),
            sample_rate,
            None,
        );
        (manager, command_rx, status_tx)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Push a deferred `StopAll` ahead of anything else. Returns false while
    /// the ring is still full.
    fn flush_stop_all(&mut self) -> bool {
        if !self.stop_all_deferred {
            return true;
        }
        if self.commands.push(Command::StopAll).is_err() {
            return false;
        }
        self.stop_all_deferred = false;
        self.voices.clear();
        self.owners.clear();
        self.playing.clear();
        true
    }

    fn send(&mut self, command: Command) -> bool {
        if !self.flush_stop_all() || self.commands.push(command).is_err() {
            log::warn!("engine command queue full, dropping command");
            return false;
        }
        true
    }

    fn stop_voice(&mut self, id: &SegmentId) {
        if let Some(key) = self.voices.remove(id) {
            self.owners.remove(&key);
            self.send(Command::Stop(key));
        }
        self.playing.remove(id);
    }

    fn fail(&mut self, id: &SegmentId, error: PlaybackError) {
        log::warn!("segment {id}: {error}");
        self.pending.push(PlaybackEvent::Error {
            id: id.clone(),
            error,
        });
    }
}

impl AudioResourceManager for CpalAudioManager {
    fn play(&mut self, id: &SegmentId, resource: &ResourceHandle, options: PlayOptions) {
        if self.disposed {
            return;
        }

        if !self.library.is_loaded(resource) {
            log::warn!("{resource} was not preloaded, decoding before segment {id} can start");
        }
        let audio = match self.library.load(resource) {
            Ok(audio) => audio,
            Err(error) => {
                self.fail(id, error);
                return;
            }
        };

        // Restarting replaces the old voice; never two per segment.
        self.stop_voice(id);

        let key = VoiceKey(self.next_key);
        self.next_key += 1;

        let start_frame = audio.frame_at(options.start_offset);
        let audio = Shared::new(&self.handle, audio);
        let sent = self.send(Command::Start {
            key,
            audio,
            start_frame,
            gain: options.volume.clamp(0.0, 1.0),
        });
        if !sent {
            self.fail(id, PlaybackError::Device("command queue full".to_string()));
            return;
        }

        log::debug!("segment {id}: voice {} from {:.3}s", key.0, options.start_offset);
        self.voices.insert(id.clone(), key);
        self.owners.insert(key, id.clone());
        self.resources.insert(id.clone(), resource.clone());
        self.playing.insert(id.clone());
    }

    fn pause(&mut self, id: &SegmentId) {
        self.stop_voice(id);
    }

    fn preload(&mut self, resource: &ResourceHandle) -> Result<f64, PlaybackError> {
        if self.disposed {
            return Err(PlaybackError::Device("audio engine disposed".to_string()));
        }
        self.library.load(resource).map(|audio| audio.duration_secs())
    }

    fn stop_all(&mut self) {
        if self.disposed {
            return;
        }
        // Voices stay tracked until the command is actually queued.
        self.stop_all_deferred = true;
        if !self.flush_stop_all() {
            log::warn!(
                "engine command queue full, {} voice(s) keep playing until the next drain",
                self.voices.len()
            );
        }
    }

    fn release(&mut self, id: &SegmentId) {
        self.stop_voice(id);
        let Some(resource) = self.resources.remove(id) else {
            return;
        };
        let still_used = self.resources.values().any(|r| r == &resource);
        if !still_used && self.library.evict(&resource) {
            log::debug!("released decoded audio for {resource}");
        }
    }

    fn is_playing(&self, id: &SegmentId) -> bool {
        self.playing.contains(id)
    }

    fn set_volume(&mut self, id: &SegmentId, volume: f32) {
        if let Some(&key) = self.voices.get(id) {
            self.send(Command::SetGain {
                key,
                gain: volume.clamp(0.0, 1.0),
            });
        }
    }

    fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        self.flush_stop_all();
        let mut events = std::mem::take(&mut self.pending);

        while let Ok(status) = self.status.pop() {
            match status {
                Status::Started(key) => {
                    if let Some(id) = self.owners.get(&key) {
                        events.push(PlaybackEvent::Started(id.clone()));
                    }
                }
                Status::Ended(key) => {
                    if let Some(id) = self.owners.remove(&key) {
                        self.voices.remove(&id);
                        self.playing.remove(&id);
                        events.push(PlaybackEvent::Ended(id));
                    }
                }
                Status::Rejected(key) => {
                    if let Some(id) = self.owners.remove(&key) {
                        self.voices.remove(&id);
                        self.playing.remove(&id);
                        log::warn!("segment {id}: all {MAX_VOICES} voices busy");
                        events.push(PlaybackEvent::Error {
                            id,
                            error: PlaybackError::Device(format!(
                                "all {MAX_VOICES} voices are busy"
                            )),
                        });
                    }
                }
            }
        }

        self.collector.collect();
        events
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.stop_all();
        // Dropping the stream stops the callback and its voices.
        self.stream.take();
        self.disposed = true;
        self.voices.clear();
        self.owners.clear();
        self.resources.clear();
        self.pending.clear();
        self.library.clear();
        self.collector.collect();
        log::debug!("audio engine disposed");
    }
}

impl Drop for CpalAudioManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut command_rx: rtrb::Consumer<Command>,
    mut status_tx: rtrb::Producer<Status>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut bank = VoiceBank::new();
    let mut scratch = vec![0.0f32; SCRATCH_FRAMES * channels];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            // A full status ring only loses notifications, never audio.
            let mut emit = |status: Status| {
                let _ = status_tx.push(status);
            };

            while let Ok(command) = command_rx.pop() {
                bank.apply(command, &mut emit);
            }

            for chunk in data.chunks_mut(SCRATCH_FRAMES * channels) {
                let mixed = &mut scratch[..chunk.len()];
                bank.render(mixed, channels, &mut emit);
                for (out, sample) in chunk.iter_mut().zip(mixed.iter()) {
                    *out = T::from_sample(sample.clamp(-1.0, 1.0));
                }
            }
        },
        |err| log::error!("stream error: {err}"),
        None,
    )?;

    Ok(stream)
}
