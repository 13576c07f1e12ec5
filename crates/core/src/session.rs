use std::time::Instant;

use emcee_transport::{
    AudioResourceManager, ResourceHandle, Segment, SegmentId, Timeline, Track, TrackId, TrackKind,
};

use crate::config::SchedulerConfig;
use crate::error::{EditorError, EditorResult};
use crate::placement::{self, MoveRequest, Placement};
use crate::scheduler::{Scheduler, TransportEvent};
use crate::time::format_position;

/// One open editor: the timeline, its scheduler and the audio manager they
/// drive. Every mutation goes through `&mut self`, so a tick never sees a
/// half-applied edit.
pub struct Session<M: AudioResourceManager> {
    timeline: Timeline,
    scheduler: Scheduler,
    manager: M,
}

impl<M: AudioResourceManager> Session<M> {
    pub fn new(timeline: Timeline, manager: M, config: SchedulerConfig) -> Self {
        Self {
            timeline,
            scheduler: Scheduler::new(config),
            manager,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn config(&self) -> &SchedulerConfig {
        self.scheduler.config()
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut M {
        &mut self.manager
    }

    pub fn current_time(&self) -> f64 {
        self.scheduler.current_time()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    pub fn is_disposed(&self) -> bool {
        self.scheduler.is_disposed()
    }

    pub fn master_volume(&self) -> f32 {
        self.scheduler.master_volume()
    }

    pub fn active_segments(&self) -> Vec<SegmentId> {
        self.scheduler.active_segments()
    }

    pub fn drain_events(&mut self) -> Vec<TransportEvent> {
        self.scheduler.drain_events()
    }

    /// Cursor and duration as `m:ss.t / m:ss.t`.
    pub fn position_label(&self) -> String {
        format!(
            "{} / {}",
            format_position(self.current_time()),
            format_position(self.timeline.duration())
        )
    }

    fn ensure_live(&self) -> EditorResult<()> {
        if self.scheduler.is_disposed() {
            return Err(EditorError::Disposed);
        }
        Ok(())
    }

    // Transport

    pub fn play(&mut self) {
        self.scheduler.play(&self.timeline, &mut self.manager);
    }

    pub fn pause(&mut self) {
        self.scheduler.pause(&mut self.manager);
    }

    pub fn toggle_playback(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Pause and return to the start.
    pub fn stop(&mut self) {
        self.pause();
        self.seek(0.0);
    }

    pub fn seek(&mut self, time: f64) {
        self.scheduler.seek(time, &self.timeline, &mut self.manager);
    }

    pub fn skip_by(&mut self, delta: f64) {
        self.scheduler
            .skip_by(delta, &self.timeline, &mut self.manager);
    }

    pub fn tick(&mut self, elapsed: f64) {
        self.scheduler
            .tick(elapsed, &self.timeline, &mut self.manager);
    }

    pub fn tick_at(&mut self, now: Instant) {
        self.scheduler
            .tick_at(now, &self.timeline, &mut self.manager);
    }

    /// Start playback at the beginning of one segment.
    ///
    /// Returns `Ok(false)` without touching the transport when the segment
    /// has no playable audio yet.
    pub fn audition(&mut self, id: &SegmentId) -> EditorResult<bool> {
        self.ensure_live()?;
        let (_, segment) = self
            .timeline
            .segment(id)
            .ok_or_else(|| EditorError::SegmentNotFound(id.clone()))?;

        if !segment.is_playable() {
            log::warn!("{}", EditorError::ResourceUnavailable(id.clone()));
            return Ok(false);
        }

        let start = segment.start_time;
        self.seek(start);
        self.play();
        Ok(true)
    }

    // Editing

    pub fn add_track(&mut self, name: impl Into<String>, kind: TrackKind) -> EditorResult<TrackId> {
        self.ensure_live()?;
        let id = self.timeline.next_track_id();
        self.timeline.add_track(Track::new(id, name, kind));
        Ok(id)
    }

    pub fn add_segment(&mut self, track: TrackId, segment: Segment) -> EditorResult<()> {
        self.ensure_live()?;
        let id = segment.id.clone();
        placement::add_segment(
            &mut self.timeline,
            self.scheduler.config().overlap,
            track,
            segment,
        )?;
        self.scheduler
            .invalidate(&id, &self.timeline, &mut self.manager);
        Ok(())
    }

    /// Remove a segment and free whatever the manager holds for it.
    pub fn delete_segment(&mut self, id: &SegmentId) -> EditorResult<Segment> {
        self.ensure_live()?;
        let removed = placement::delete_segment(&mut self.timeline, id)?;
        self.scheduler
            .invalidate(id, &self.timeline, &mut self.manager);
        self.manager.release(id);
        log::debug!("deleted {id}");
        Ok(removed)
    }

    pub fn move_segment(&mut self, request: &MoveRequest) -> EditorResult<Placement> {
        self.ensure_live()?;
        let config = self.scheduler.config();
        let placement = placement::move_segment(
            &mut self.timeline,
            config.overlap,
            config.snap_seconds,
            request,
        )?;
        self.scheduler
            .invalidate(&placement.segment_id, &self.timeline, &mut self.manager);
        Ok(placement)
    }

    pub fn move_segment_to(
        &mut self,
        id: &SegmentId,
        track: TrackId,
        start_time: f64,
    ) -> EditorResult<Placement> {
        self.ensure_live()?;
        let placement = placement::move_segment_to(
            &mut self.timeline,
            self.scheduler.config().overlap,
            id,
            track,
            start_time,
        )?;
        self.scheduler
            .invalidate(id, &self.timeline, &mut self.manager);
        Ok(placement)
    }

    pub fn set_segment_content(&mut self, id: &SegmentId, content: impl Into<String>) -> EditorResult<()> {
        self.ensure_live()?;
        let track = self
            .timeline
            .locate(id)
            .ok_or_else(|| EditorError::SegmentNotFound(id.clone()))?;
        if self.timeline.track(track).is_some_and(|t| t.locked) {
            return Err(EditorError::TrackLocked(track));
        }
        self.segment_mut(id)?.content = content.into();
        Ok(())
    }

    // Generation status. These come from the audio pipeline rather than the
    // user, so they are accepted on locked tracks too.

    pub fn mark_generating(&mut self, id: &SegmentId) -> EditorResult<()> {
        self.ensure_live()?;
        self.segment_mut(id)?.mark_generating();
        self.scheduler
            .invalidate(id, &self.timeline, &mut self.manager);
        Ok(())
    }

    pub fn attach_audio(&mut self, id: &SegmentId, resource: ResourceHandle) -> EditorResult<()> {
        self.ensure_live()?;
        self.segment_mut(id)?.attach_audio(resource);
        // A new resource means any decoded copy of the old one is stale.
        self.manager.release(id);
        self.scheduler
            .invalidate(id, &self.timeline, &mut self.manager);
        Ok(())
    }

    pub fn mark_failed(&mut self, id: &SegmentId) -> EditorResult<()> {
        self.ensure_live()?;
        self.segment_mut(id)?.mark_failed();
        self.scheduler
            .invalidate(id, &self.timeline, &mut self.manager);
        Ok(())
    }

    fn segment_mut(&mut self, id: &SegmentId) -> EditorResult<&mut Segment> {
        self.timeline
            .segment_mut(id)
            .ok_or_else(|| EditorError::SegmentNotFound(id.clone()))
    }

    // Mixing

    fn track_mut(&mut self, id: TrackId) -> EditorResult<&mut Track> {
        self.timeline
            .track_mut(id)
            .ok_or(EditorError::TrackNotFound(id))
    }

    fn refresh(&mut self) {
        self.scheduler
            .refresh_volumes(&self.timeline, &mut self.manager);
    }

    pub fn set_track_muted(&mut self, id: TrackId, muted: bool) -> EditorResult<()> {
        self.ensure_live()?;
        self.track_mut(id)?.muted = muted;
        self.refresh();
        Ok(())
    }

    /// Returns the new mute state.
    pub fn toggle_track_muted(&mut self, id: TrackId) -> EditorResult<bool> {
        self.ensure_live()?;
        let track = self.track_mut(id)?;
        track.muted = !track.muted;
        let muted = track.muted;
        self.refresh();
        Ok(muted)
    }

    /// `volume` is 0-100; out-of-range values are clamped.
    pub fn set_track_volume(&mut self, id: TrackId, volume: f32) -> EditorResult<()> {
        self.ensure_live()?;
        self.track_mut(id)?.volume = volume.clamp(0.0, 100.0);
        self.refresh();
        Ok(())
    }

    pub fn set_track_solo(&mut self, id: TrackId, solo: bool) -> EditorResult<()> {
        self.ensure_live()?;
        self.track_mut(id)?.solo = solo;
        self.refresh();
        Ok(())
    }

    /// Solo `id` and clear every other solo.
    pub fn solo_track_exclusive(&mut self, id: TrackId) -> EditorResult<()> {
        self.ensure_live()?;
        if self.timeline.track(id).is_none() {
            return Err(EditorError::TrackNotFound(id));
        }
        for track in self.timeline.tracks_mut() {
            track.solo = track.id == id;
        }
        self.refresh();
        Ok(())
    }

    pub fn set_track_locked(&mut self, id: TrackId, locked: bool) -> EditorResult<()> {
        self.ensure_live()?;
        self.track_mut(id)?.locked = locked;
        Ok(())
    }

    pub fn set_master_volume(&mut self, volume: f32) -> EditorResult<()> {
        self.ensure_live()?;
        self.scheduler.set_master_volume(volume);
        self.refresh();
        Ok(())
    }

    /// Change the project duration. Every segment must still fit.
    pub fn set_duration(&mut self, duration: f64) -> EditorResult<()> {
        self.ensure_live()?;
        let content_end = self.timeline.content_end();
        if !duration.is_finite() || duration <= 0.0 || duration < content_end {
            return Err(EditorError::InvalidTimeRange {
                start: 0.0,
                end: content_end,
                duration,
            });
        }
        self.timeline.set_duration(duration);
        if self.current_time() > duration {
            self.seek(duration);
        }
        Ok(())
    }

    /// Stop everything and release the audio manager. Safe to call more
    /// than once.
    pub fn dispose(&mut self) {
        self.scheduler.dispose(&mut self.manager);
    }
}

impl<M: AudioResourceManager> Drop for Session<M> {
    fn drop(&mut self) {
        if !self.scheduler.is_disposed() {
            log::warn!("session dropped without dispose");
            self.dispose();
        }
    }
}
