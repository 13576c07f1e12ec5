//! Timeline data model shared by every emcee crate.
//!
//! Times are `f64` seconds on the project timeline. Segments are kept sorted
//! by start time inside their track; use the track methods to mutate spans so
//! the ordering holds.

mod manager;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use manager::{AudioResourceManager, PlayOptions, PlaybackError, PlaybackEvent};

/// Opaque segment identifier, stable for the lifetime of the segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub String);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SegmentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SegmentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to playable audio: either a URL or a storage key / file path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle(pub String);

impl ResourceHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_url(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceHandle {
    fn from(handle: &str) -> Self {
        Self(handle.to_string())
    }
}

impl From<String> for ResourceHandle {
    fn from(handle: String) -> Self {
        Self(handle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentStatus {
    #[default]
    Draft,
    Generating,
    Generated,
    Failed,
}

/// How a segment's interval treats its end point when deciding membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalBounds {
    /// `[start, end)`: touching segments never overlap in time.
    #[default]
    HalfOpen,
    /// `[start, end]`: both ends count.
    Inclusive,
}

/// An audio clip placed on a track.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: SegmentId,
    pub start_time: f64,
    pub end_time: f64,
    /// Script text or imported file name. Never interpreted by playback.
    pub content: String,
    pub audio_resource: Option<ResourceHandle>,
    pub status: SegmentStatus,
}

impl Segment {
    /// Create a draft segment without audio.
    pub fn new(
        id: impl Into<SegmentId>,
        start_time: f64,
        end_time: f64,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time,
            content: content.into(),
            audio_resource: None,
            status: SegmentStatus::Draft,
        }
    }

    /// Builder form of [`Segment::attach_audio`].
    pub fn with_audio(mut self, handle: impl Into<ResourceHandle>) -> Self {
        self.attach_audio(handle.into());
        self
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Only generated segments with a resource are eligible for playback.
    pub fn is_playable(&self) -> bool {
        self.status == SegmentStatus::Generated && self.audio_resource.is_some()
    }

    pub fn contains(&self, time: f64, bounds: IntervalBounds) -> bool {
        match bounds {
            IntervalBounds::HalfOpen => time >= self.start_time && time < self.end_time,
            IntervalBounds::Inclusive => time >= self.start_time && time <= self.end_time,
        }
    }

    /// Offset into the clip for a timeline position, clamped to the clip.
    pub fn offset_at(&self, time: f64) -> f64 {
        (time - self.start_time).clamp(0.0, self.duration())
    }

    /// Open-interval overlap test; touching spans do not overlap.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        start < self.end_time && self.start_time < end
    }

    pub fn mark_generating(&mut self) {
        self.status = SegmentStatus::Generating;
    }

    pub fn attach_audio(&mut self, handle: ResourceHandle) {
        self.audio_resource = Some(handle);
        self.status = SegmentStatus::Generated;
    }

    pub fn mark_failed(&mut self) {
        self.status = SegmentStatus::Failed;
    }
}

/// Display category of a track. Has no effect on scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackKind {
    #[default]
    Voice,
    Background,
    Effects,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub kind: TrackKind,
    /// 0-100
    pub volume: f32,
    pub muted: bool,
    pub solo: bool,
    /// Locked tracks reject every segment mutation.
    pub locked: bool,
    /// Always sorted by start time. Overlap is a placement policy, not
    /// something this list enforces.
    segments: Vec<Segment>,
}

impl Track {
    pub fn new(id: TrackId, name: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            volume: 100.0,
            muted: false,
            solo: false,
            locked: false,
            segments: Vec::new(),
        }
    }

    pub fn from_segments(
        id: TrackId,
        name: impl Into<String>,
        kind: TrackKind,
        segments: Vec<Segment>,
    ) -> Self {
        let mut track = Self::new(id, name, kind);
        for segment in segments {
            track.insert_segment(segment);
        }
        track
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, id: &SegmentId) -> Option<&Segment> {
        self.segments.iter().find(|s| &s.id == id)
    }

    /// Mutable access for status/resource/content changes. Use
    /// [`Track::set_segment_span`] to move a segment.
    pub fn segment_mut(&mut self, id: &SegmentId) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| &s.id == id)
    }

    pub fn contains_segment(&self, id: &SegmentId) -> bool {
        self.segments.iter().any(|s| &s.id == id)
    }

    pub fn insert_segment(&mut self, segment: Segment) {
        let index = self
            .segments
            .partition_point(|s| s.start_time <= segment.start_time);
        self.segments.insert(index, segment);
    }

    pub fn remove_segment(&mut self, id: &SegmentId) -> Option<Segment> {
        let index = self.segments.iter().position(|s| &s.id == id)?;
        Some(self.segments.remove(index))
    }

    /// Move a segment to a new span, keeping the list ordered.
    /// Returns false if the segment is not on this track.
    pub fn set_segment_span(&mut self, id: &SegmentId, start_time: f64, end_time: f64) -> bool {
        let Some(mut segment) = self.remove_segment(id) else {
            return false;
        };
        segment.start_time = start_time;
        segment.end_time = end_time;
        self.insert_segment(segment);
        true
    }

    /// Segments whose span overlaps `[start, end)`, optionally ignoring one.
    pub fn overlapping<'a>(
        &'a self,
        start: f64,
        end: f64,
        except: Option<&'a SegmentId>,
    ) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments
            .iter()
            .filter(move |s| Some(&s.id) != except && s.overlaps(start, end))
    }

    /// End of the last segment on this track.
    pub fn content_end(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.end_time)
            .fold(0.0, f64::max)
    }
}

/// All tracks of a project plus its duration.
#[derive(Debug, Clone)]
pub struct Timeline {
    tracks: Vec<Track>,
    duration: f64,
}

impl Timeline {
    pub fn new(duration: f64) -> Self {
        Self {
            tracks: Vec::new(),
            duration,
        }
    }

    pub fn with_tracks(duration: f64, tracks: Vec<Track>) -> Self {
        Self { tracks, duration }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Callers are responsible for keeping every segment inside the new
    /// duration.
    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration;
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.tracks
    }

    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn next_track_id(&self) -> TrackId {
        TrackId(self.tracks.iter().map(|t| t.id.0 + 1).max().unwrap_or(0))
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    /// Track currently holding the segment.
    pub fn locate(&self, id: &SegmentId) -> Option<TrackId> {
        self.tracks
            .iter()
            .find(|t| t.contains_segment(id))
            .map(|t| t.id)
    }

    pub fn segment(&self, id: &SegmentId) -> Option<(&Track, &Segment)> {
        self.tracks
            .iter()
            .find_map(|t| t.segment(id).map(|s| (t, s)))
    }

    pub fn segment_mut(&mut self, id: &SegmentId) -> Option<&mut Segment> {
        self.tracks.iter_mut().find_map(|t| t.segment_mut(id))
    }

    /// Every segment with its owning track, tracks in order, segments by time.
    pub fn segments(&self) -> impl Iterator<Item = (&Track, &Segment)> {
        self.tracks
            .iter()
            .flat_map(|t| t.segments().iter().map(move |s| (t, s)))
    }

    /// Latest segment end over all tracks.
    pub fn content_end(&self) -> f64 {
        self.tracks
            .iter()
            .map(Track::content_end)
            .fold(0.0, f64::max)
    }
}
