use crate::{ResourceHandle, SegmentId};

/// Per-start parameters for a segment voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    /// Linear gain, 0.0 to 1.0.
    pub volume: f32,
    /// Seconds into the clip to start from.
    pub start_offset: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    #[error("failed to decode '{resource}': {message}")]
    Decode { resource: String, message: String },

    #[error("audio resource '{0}' is unavailable")]
    Unavailable(String),

    #[error("audio device error: {0}")]
    Device(String),
}

/// Notifications raised by a manager, drained by the scheduler once per tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started(SegmentId),
    /// The clip ran out of audio.
    Ended(SegmentId),
    Error { id: SegmentId, error: PlaybackError },
}

/// Owns the actual playback handles, one per segment.
///
/// Commands are fire-and-forget: a failing `play` is reported later as a
/// [`PlaybackEvent::Error`], never as a return value, so the caller's tick
/// loop can keep going.
pub trait AudioResourceManager {
    /// Start (or restart) the segment's voice at the given offset and gain.
    fn play(&mut self, id: &SegmentId, resource: &ResourceHandle, options: PlayOptions);

    /// Decode `resource` now so a later `play` of it starts without
    /// decoding. Returns the clip length in seconds.
    fn preload(&mut self, resource: &ResourceHandle) -> Result<f64, PlaybackError>;

    /// Stop one voice. Unknown ids are ignored.
    fn pause(&mut self, id: &SegmentId);

    fn stop_all(&mut self);

    /// Stop the voice and drop any decode resources owned by the segment.
    fn release(&mut self, id: &SegmentId);

    fn is_playing(&self, id: &SegmentId) -> bool;

    /// Adjust the gain of a running voice without restarting it.
    fn set_volume(&mut self, id: &SegmentId, volume: f32);

    /// Take every event raised since the last call, oldest first.
    fn drain_events(&mut self) -> Vec<PlaybackEvent>;

    /// Tear everything down. Owners call this exactly once.
    fn dispose(&mut self);
}
