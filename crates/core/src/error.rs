use emcee_transport::{PlaybackError, SegmentId, TrackId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorError {
    /// Not fatal: the segment is skipped with a warning.
    #[error("segment {0} has no playable audio")]
    ResourceUnavailable(SegmentId),

    #[error("segment {id} failed to play: {error}")]
    PlaybackDecode { id: SegmentId, error: PlaybackError },

    #[error("track {0} is locked")]
    TrackLocked(TrackId),

    #[error("invalid time range {start:.3}s..{end:.3}s (timeline is {duration:.3}s)")]
    InvalidTimeRange { start: f64, end: f64, duration: f64 },

    #[error("track {0} not found")]
    TrackNotFound(TrackId),

    #[error("segment {0} not found")]
    SegmentNotFound(SegmentId),

    #[error("segment would overlap {0}")]
    Overlap(SegmentId),

    #[error("segment {0} already exists")]
    DuplicateSegment(SegmentId),

    #[error("session has been disposed")]
    Disposed,
}

impl EditorError {
    /// Errors the user caused by an edit, as opposed to playback trouble.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            EditorError::ResourceUnavailable(_) | EditorError::PlaybackDecode { .. }
        )
    }
}

pub type EditorResult<T> = Result<T, EditorError>;
