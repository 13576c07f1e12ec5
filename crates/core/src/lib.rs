//! Playback scheduling and timeline editing for multi-track voice projects.

pub mod config;
pub mod error;
pub mod mixer;
pub mod placement;
pub mod scheduler;
pub mod session;
pub mod time;

#[cfg(test)]
mod testing;

pub use config::{EndOfTimeline, OverlapPolicy, SchedulerConfig};
pub use error::{EditorError, EditorResult};
pub use placement::{MoveRequest, Placement};
pub use scheduler::{Scheduler, TransportEvent};
pub use session::Session;
pub use time::{Position, TimelineView, format_position};

pub use emcee_transport::{
    AudioResourceManager, IntervalBounds, PlayOptions, PlaybackError, PlaybackEvent,
    ResourceHandle, Segment, SegmentId, SegmentStatus, Timeline, Track, TrackId, TrackKind,
};
