//! Pure functions for segment placement, testable without an audio manager.
//!
//! Every operation validates first and mutates last, so a rejected edit
//! leaves the timeline untouched.

use emcee_transport::{Segment, SegmentId, Timeline, Track, TrackId};

use crate::config::OverlapPolicy;
use crate::error::{EditorError, EditorResult};
use crate::time::{TimelineView, snap};

/// Slack for float drift from snapping and duration arithmetic.
const TIME_EPSILON: f64 = 1e-9;

/// A finished drag: which segment, onto which track, and where it was
/// released in lane pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveRequest {
    pub segment_id: SegmentId,
    pub target_track: TrackId,
    pub drop_x: f64,
    pub track_width_px: f64,
}

/// Where a segment ended up after a successful move.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub segment_id: SegmentId,
    pub from_track: TrackId,
    pub to_track: TrackId,
    pub start_time: f64,
    pub end_time: f64,
}

impl Placement {
    pub fn changed_track(&self) -> bool {
        self.from_track != self.to_track
    }
}

/// Timeline position for a drop at `drop_x` pixels, snapped to `snap_seconds`.
pub fn drop_time(
    drop_x: f64,
    track_width_px: f64,
    duration: f64,
    snap_seconds: f64,
) -> EditorResult<f64> {
    if track_width_px <= 0.0 || !track_width_px.is_finite() || !drop_x.is_finite() {
        return Err(EditorError::InvalidTimeRange {
            start: drop_x,
            end: drop_x,
            duration,
        });
    }
    let view = TimelineView::new(duration, track_width_px);
    Ok(snap(view.pixels_to_seconds(drop_x), snap_seconds))
}

/// Check that `[start, end]` is a non-empty span inside `[0, duration]`.
pub fn validate_range(start: f64, end: f64, duration: f64) -> EditorResult<()> {
    let valid = start.is_finite()
        && end.is_finite()
        && start >= -TIME_EPSILON
        && start < end
        && end <= duration + TIME_EPSILON;
    if valid {
        Ok(())
    } else {
        Err(EditorError::InvalidTimeRange {
            start,
            end,
            duration,
        })
    }
}

fn check_overlap(
    track: &Track,
    start: f64,
    end: f64,
    except: Option<&SegmentId>,
    policy: OverlapPolicy,
) -> EditorResult<()> {
    if policy == OverlapPolicy::Allow {
        return Ok(());
    }
    match track.overlapping(start, end, except).next() {
        Some(other) => Err(EditorError::Overlap(other.id.clone())),
        None => Ok(()),
    }
}

fn unlocked_track(timeline: &Timeline, id: TrackId) -> EditorResult<&Track> {
    let track = timeline.track(id).ok_or(EditorError::TrackNotFound(id))?;
    if track.locked {
        return Err(EditorError::TrackLocked(id));
    }
    Ok(track)
}

/// Apply a drag: the drop position becomes the new start, duration is kept.
pub fn move_segment(
    timeline: &mut Timeline,
    policy: OverlapPolicy,
    snap_seconds: f64,
    request: &MoveRequest,
) -> EditorResult<Placement> {
    let start = drop_time(
        request.drop_x,
        request.track_width_px,
        timeline.duration(),
        snap_seconds,
    )?;
    move_segment_to(
        timeline,
        policy,
        &request.segment_id,
        request.target_track,
        start,
    )
}

/// Move a segment to `new_start` on `target_track`, keeping its duration.
pub fn move_segment_to(
    timeline: &mut Timeline,
    policy: OverlapPolicy,
    id: &SegmentId,
    target_track: TrackId,
    new_start: f64,
) -> EditorResult<Placement> {
    let (source, segment) = timeline
        .segment(id)
        .ok_or_else(|| EditorError::SegmentNotFound(id.clone()))?;
    let from_track = source.id;
    if source.locked {
        return Err(EditorError::TrackLocked(from_track));
    }

    let duration = segment.duration();
    // Snapping can leave a start a hair below zero.
    let new_start = if new_start < 0.0 && new_start > -TIME_EPSILON {
        0.0
    } else {
        new_start
    };
    let new_end = new_start + duration;
    validate_range(new_start, new_end, timeline.duration())?;

    let target = unlocked_track(timeline, target_track)?;
    check_overlap(target, new_start, new_end, Some(id), policy)?;

    if from_track == target_track {
        let moved = timeline
            .track_mut(from_track)
            .is_some_and(|t| t.set_segment_span(id, new_start, new_end));
        if !moved {
            return Err(EditorError::SegmentNotFound(id.clone()));
        }
    } else {
        let mut segment = timeline
            .track_mut(from_track)
            .and_then(|t| t.remove_segment(id))
            .ok_or_else(|| EditorError::SegmentNotFound(id.clone()))?;
        segment.start_time = new_start;
        segment.end_time = new_end;
        timeline
            .track_mut(target_track)
            .ok_or(EditorError::TrackNotFound(target_track))?
            .insert_segment(segment);
    }

    log::debug!("moved {id} to track {target_track} at {new_start:.2}s..{new_end:.2}s");

    Ok(Placement {
        segment_id: id.clone(),
        from_track,
        to_track: target_track,
        start_time: new_start,
        end_time: new_end,
    })
}

pub fn add_segment(
    timeline: &mut Timeline,
    policy: OverlapPolicy,
    track_id: TrackId,
    segment: Segment,
) -> EditorResult<()> {
    if timeline.locate(&segment.id).is_some() {
        return Err(EditorError::DuplicateSegment(segment.id));
    }
    validate_range(segment.start_time, segment.end_time, timeline.duration())?;

    let track = unlocked_track(timeline, track_id)?;
    check_overlap(track, segment.start_time, segment.end_time, None, policy)?;

    timeline
        .track_mut(track_id)
        .ok_or(EditorError::TrackNotFound(track_id))?
        .insert_segment(segment);
    Ok(())
}

/// Remove a segment from its track. The track itself always survives.
pub fn delete_segment(timeline: &mut Timeline, id: &SegmentId) -> EditorResult<Segment> {
    let track_id = timeline
        .locate(id)
        .ok_or_else(|| EditorError::SegmentNotFound(id.clone()))?;
    unlocked_track(timeline, track_id)?;

    timeline
        .track_mut(track_id)
        .and_then(|t| t.remove_segment(id))
        .ok_or_else(|| EditorError::SegmentNotFound(id.clone()))
}

/// Earliest start where a clip of `length` seconds fits on `track` without
/// touching another segment and without running past `timeline_duration`.
pub fn find_free_slot(track: &Track, length: f64, timeline_duration: f64) -> Option<f64> {
    if length <= 0.0 || !length.is_finite() {
        return None;
    }
    let mut candidate = 0.0_f64;
    for segment in track.segments() {
        if segment.overlaps(candidate, candidate + length) {
            candidate = candidate.max(segment.end_time);
        }
    }
    (candidate + length <= timeline_duration + TIME_EPSILON).then_some(candidate)
}
