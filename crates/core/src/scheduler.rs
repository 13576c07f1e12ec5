//! Keeps the set of sounding segments in step with the playback cursor.
//!
//! The scheduler owns no audio. Each tick it works out which segments should
//! be audible at the current time, diffs that against what it has already
//! started, and issues stop/start commands to an [`AudioResourceManager`]:
//! leavers are stopped before entrants are started, and segments that stay
//! in the set are never restarted. Completion and failures come back as
//! manager events, drained once per tick.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use emcee_transport::{
    AudioResourceManager, PlayOptions, PlaybackEvent, ResourceHandle, SegmentId, Timeline,
};

use crate::config::{EndOfTimeline, SchedulerConfig};
use crate::error::EditorError;
use crate::mixer;

/// Notifications for the UI, collected with [`Scheduler::drain_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    SegmentStarted(SegmentId),
    SegmentEnded(SegmentId),
    SegmentFailed { id: SegmentId, message: String },
    /// An unplayable segment sat under the cursor. Reported once per play
    /// cycle.
    SegmentSkipped(SegmentId),
    ReachedEnd,
}

struct Wanted<'t> {
    id: &'t SegmentId,
    resource: &'t ResourceHandle,
    offset: f64,
    volume: f32,
}

pub struct Scheduler {
    config: SchedulerConfig,
    current_time: f64,
    is_playing: bool,
    /// 0-100
    master_volume: f32,
    /// Segments holding a playback handle, with the gain last sent.
    active: HashMap<SegmentId, f32>,
    /// Starts not yet confirmed by the manager, with their deadline on
    /// `clock`.
    pending: HashMap<SegmentId, f64>,
    /// Segments that errored during this play cycle.
    failed: HashSet<SegmentId>,
    /// Clips that ran out before their interval did. Cleared once the
    /// cursor leaves them or jumps.
    exhausted: HashSet<SegmentId>,
    skipped: HashSet<SegmentId>,
    events: Vec<TransportEvent>,
    /// Playing time accumulated by ticks; unlike `current_time` it never
    /// jumps.
    clock: f64,
    reference: Option<Instant>,
    disposed: bool,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            current_time: 0.0,
            is_playing: false,
            master_volume: 100.0,
            active: HashMap::new(),
            pending: HashMap::new(),
            failed: HashSet::new(),
            exhausted: HashSet::new(),
            skipped: HashSet::new(),
            events: Vec::new(),
            clock: 0.0,
            reference: None,
            disposed: false,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Takes effect on the next [`Scheduler::refresh_volumes`] or tick.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 100.0);
    }

    /// Ids of the segments currently holding a playback handle, sorted.
    pub fn active_segments(&self) -> Vec<SegmentId> {
        let mut ids: Vec<_> = self.active.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_active(&self, id: &SegmentId) -> bool {
        self.active.contains_key(id)
    }

    pub fn drain_events(&mut self) -> Vec<TransportEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn play<M: AudioResourceManager>(&mut self, timeline: &Timeline, manager: &mut M) {
        if self.disposed {
            return;
        }
        if self.is_playing {
            log::debug!("play ignored, already playing");
            return;
        }

        self.absorb_events(manager);

        if self.current_time >= timeline.duration() {
            self.current_time = 0.0;
        }
        self.failed.clear();
        self.exhausted.clear();
        self.skipped.clear();
        self.pending.clear();

        self.is_playing = true;
        self.reference = Some(Instant::now());
        log::info!("play from {:.2}s", self.current_time);

        self.reconcile(timeline, manager);
    }

    pub fn pause<M: AudioResourceManager>(&mut self, manager: &mut M) {
        if self.disposed || !self.is_playing {
            return;
        }
        self.halt(manager);
        log::info!("paused at {:.2}s", self.current_time);
    }

    /// Advance the cursor by `elapsed` seconds of wall-clock time.
    /// Negative and non-finite values count as zero.
    pub fn tick<M: AudioResourceManager>(
        &mut self,
        elapsed: f64,
        timeline: &Timeline,
        manager: &mut M,
    ) {
        if self.disposed {
            return;
        }
        self.absorb_events(manager);
        if !self.is_playing {
            return;
        }

        let elapsed = if elapsed.is_finite() && elapsed > 0.0 {
            elapsed
        } else {
            0.0
        };
        self.clock += elapsed;
        self.current_time += elapsed;

        if self.current_time >= timeline.duration() {
            self.reach_end(timeline, manager);
            return;
        }

        self.reconcile(timeline, manager);
        self.expire_pending(timeline, manager);
    }

    /// Tick using the time since the previous tick (or since `play`).
    pub fn tick_at<M: AudioResourceManager>(
        &mut self,
        now: Instant,
        timeline: &Timeline,
        manager: &mut M,
    ) {
        let elapsed = match (self.is_playing, self.reference) {
            (true, Some(previous)) => {
                self.reference = Some(previous.max(now));
                now.saturating_duration_since(previous).as_secs_f64()
            }
            _ => 0.0,
        };
        self.tick(elapsed, timeline, manager);
    }

    /// Jump to `target`, clamped to the timeline. Everything sounding is
    /// stopped first; when playing, the new desired set starts at its new
    /// offsets.
    pub fn seek<M: AudioResourceManager>(
        &mut self,
        target: f64,
        timeline: &Timeline,
        manager: &mut M,
    ) {
        if self.disposed {
            return;
        }
        if !target.is_finite() {
            log::warn!("ignoring seek to {target}");
            return;
        }

        manager.stop_all();
        self.active.clear();
        self.pending.clear();
        self.exhausted.clear();

        self.current_time = target.clamp(0.0, timeline.duration().max(0.0));
        log::debug!("seek to {:.2}s", self.current_time);

        if self.is_playing {
            self.reference = Some(Instant::now());
            self.reconcile(timeline, manager);
        }
    }

    pub fn skip_by<M: AudioResourceManager>(
        &mut self,
        delta: f64,
        timeline: &Timeline,
        manager: &mut M,
    ) {
        self.seek(self.current_time + delta, timeline, manager);
    }

    /// The segment's interval, resource or status changed: drop whatever
    /// is sounding for it and let it start fresh if it is still wanted.
    pub fn invalidate<M: AudioResourceManager>(
        &mut self,
        id: &SegmentId,
        timeline: &Timeline,
        manager: &mut M,
    ) {
        if self.disposed {
            return;
        }
        if self.active.contains_key(id) {
            log::debug!("restarting {id}");
            self.stop(id, manager);
        }
        self.pending.remove(id);
        self.exhausted.remove(id);
        self.failed.remove(id);
        self.skipped.remove(id);

        if self.is_playing {
            self.reconcile(timeline, manager);
        }
    }

    /// Re-apply mute, solo and volume without waiting for the next tick.
    pub fn refresh_volumes<M: AudioResourceManager>(
        &mut self,
        timeline: &Timeline,
        manager: &mut M,
    ) {
        if self.disposed || !self.is_playing {
            return;
        }
        self.reconcile(timeline, manager);
    }

    /// Stop everything and hand the manager its teardown. Only the first
    /// call does anything.
    pub fn dispose<M: AudioResourceManager>(&mut self, manager: &mut M) {
        if self.disposed {
            log::debug!("scheduler already disposed");
            return;
        }
        manager.stop_all();
        manager.dispose();

        self.active.clear();
        self.pending.clear();
        self.failed.clear();
        self.exhausted.clear();
        self.skipped.clear();
        self.events.clear();
        self.is_playing = false;
        self.reference = None;
        self.disposed = true;
        log::info!("playback disposed");
    }

    fn halt<M: AudioResourceManager>(&mut self, manager: &mut M) {
        manager.stop_all();
        self.active.clear();
        self.pending.clear();
        self.is_playing = false;
        self.reference = None;
    }

    fn reach_end<M: AudioResourceManager>(&mut self, timeline: &Timeline, manager: &mut M) {
        let duration = timeline.duration().max(0.0);
        self.current_time = match self.config.end_of_timeline {
            EndOfTimeline::Rewind => 0.0,
            EndOfTimeline::Hold => duration,
        };
        self.halt(manager);
        log::info!("reached end of timeline ({duration:.2}s)");
        self.events.push(TransportEvent::ReachedEnd);
    }

    fn reconcile<M: AudioResourceManager>(&mut self, timeline: &Timeline, manager: &mut M) {
        let time = self.current_time;
        let bounds = self.config.boundary;
        let any_solo = mixer::any_solo(timeline.tracks());

        self.exhausted.retain(|id| {
            timeline
                .segment(id)
                .is_some_and(|(_, segment)| segment.contains(time, bounds))
        });

        let mut wanted = Vec::new();
        for (track, segment) in timeline.segments() {
            if track.muted || !segment.contains(time, bounds) {
                continue;
            }
            let resource = match &segment.audio_resource {
                Some(resource) if segment.is_playable() => resource,
                _ => {
                    if self.skipped.insert(segment.id.clone()) {
                        log::warn!("{}", EditorError::ResourceUnavailable(segment.id.clone()));
                        self.events
                            .push(TransportEvent::SegmentSkipped(segment.id.clone()));
                    }
                    continue;
                }
            };
            if self.failed.contains(&segment.id) || self.exhausted.contains(&segment.id) {
                continue;
            }
            wanted.push(Wanted {
                id: &segment.id,
                resource,
                offset: segment.offset_at(time),
                volume: mixer::effective_volume(track, self.master_volume, any_solo),
            });
        }

        let leaving: Vec<SegmentId> = self
            .active
            .keys()
            .filter(|id| !wanted.iter().any(|w| w.id == *id))
            .cloned()
            .collect();
        for id in &leaving {
            self.stop(id, manager);
        }

        for want in wanted {
            match self.active.get_mut(want.id) {
                Some(volume) => {
                    if (*volume - want.volume).abs() > f32::EPSILON {
                        manager.set_volume(want.id, want.volume);
                        *volume = want.volume;
                    }
                }
                None => self.start(want, manager),
            }
        }
    }

    fn start<M: AudioResourceManager>(&mut self, want: Wanted<'_>, manager: &mut M) {
        log::debug!(
            "start {} at +{:.2}s (gain {:.2})",
            want.id,
            want.offset,
            want.volume
        );
        manager.play(
            want.id,
            want.resource,
            PlayOptions {
                volume: want.volume,
                start_offset: want.offset,
            },
        );
        self.active.insert(want.id.clone(), want.volume);
        self.pending.insert(
            want.id.clone(),
            self.clock + self.config.start_debounce_secs(),
        );
    }

    fn stop<M: AudioResourceManager>(&mut self, id: &SegmentId, manager: &mut M) {
        log::debug!("stop {id}");
        manager.pause(id);
        self.active.remove(id);
        self.pending.remove(id);
    }

    /// Starts whose debounce window ran out without a `Started` event. A
    /// voice the manager reports as playing is confirmed; anything else is
    /// restarted once at the current offset.
    fn expire_pending<M: AudioResourceManager>(&mut self, timeline: &Timeline, manager: &mut M) {
        let clock = self.clock;
        let due: Vec<SegmentId> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= clock)
            .map(|(id, _)| id.clone())
            .collect();

        for id in due {
            self.pending.remove(&id);
            if manager.is_playing(&id) {
                continue;
            }
            let Some(volume) = self.active.get(&id).copied() else {
                continue;
            };
            let Some((_, segment)) = timeline.segment(&id) else {
                continue;
            };
            let Some(resource) = &segment.audio_resource else {
                continue;
            };

            log::warn!("start of {id} was never confirmed, retrying");
            manager.pause(&id);
            manager.play(
                &id,
                resource,
                PlayOptions {
                    volume,
                    start_offset: segment.offset_at(self.current_time),
                },
            );
        }
    }

    fn absorb_events<M: AudioResourceManager>(&mut self, manager: &mut M) {
        for event in manager.drain_events() {
            match event {
                PlaybackEvent::Started(id) => {
                    self.pending.remove(&id);
                    if self.active.contains_key(&id) {
                        self.events.push(TransportEvent::SegmentStarted(id));
                    }
                }
                PlaybackEvent::Ended(id) => {
                    self.pending.remove(&id);
                    if self.active.remove(&id).is_some() {
                        log::debug!("{id} ended");
                        self.exhausted.insert(id.clone());
                        self.events.push(TransportEvent::SegmentEnded(id));
                    }
                }
                PlaybackEvent::Error { id, error } => {
                    self.pending.remove(&id);
                    self.active.remove(&id);
                    if self.is_playing {
                        self.failed.insert(id.clone());
                    }
                    let error = EditorError::PlaybackDecode {
                        id: id.clone(),
                        error,
                    };
                    log::warn!("{error}");
                    self.events.push(TransportEvent::SegmentFailed {
                        id,
                        message: error.to_string(),
                    });
                }
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingManager};
    use emcee_transport::{
        IntervalBounds, PlaybackError, Segment, SegmentStatus, Track, TrackId, TrackKind,
    };

    fn generated(id: &str, start: f64, end: f64) -> Segment {
        Segment::new(id, start, end, id).with_audio(format!("{id}.wav"))
    }

    /// Voice: a [0,10) b [10,20). Music: c [5,15) and a draft d [2,8).
    fn timeline() -> Timeline {
        let voice = Track::from_segments(
            TrackId(0),
            "Voice",
            TrackKind::Voice,
            vec![generated("a", 0.0, 10.0), generated("b", 10.0, 20.0)],
        );
        let music = Track::from_segments(
            TrackId(1),
            "Music",
            TrackKind::Background,
            vec![generated("c", 5.0, 15.0), Segment::new("d", 2.0, 8.0, "draft")],
        );
        Timeline::with_tracks(20.0, vec![voice, music])
    }

    fn ids(names: &[&str]) -> Vec<SegmentId> {
        names.iter().map(|n| SegmentId::from(*n)).collect()
    }

    fn expected_active(timeline: &Timeline, time: f64, bounds: IntervalBounds) -> Vec<SegmentId> {
        let mut expected: Vec<_> = timeline
            .segments()
            .filter(|(track, s)| {
                s.status == SegmentStatus::Generated
                    && s.audio_resource.is_some()
                    && !track.muted
                    && s.contains(time, bounds)
            })
            .map(|(_, s)| s.id.clone())
            .collect();
        expected.sort();
        expected
    }

    fn playing_at(time: f64) -> (Scheduler, Timeline, RecordingManager) {
        let timeline = timeline();
        let mut manager = RecordingManager::new();
        let mut scheduler = Scheduler::default();
        scheduler.seek(time, &timeline, &mut manager);
        scheduler.play(&timeline, &mut manager);
        manager.clear_calls();
        scheduler.drain_events();
        (scheduler, timeline, manager)
    }

    #[test]
    fn test_active_set_tracks_cursor() {
        let (mut scheduler, timeline, mut manager) = playing_at(0.0);

        while scheduler.is_playing() {
            let time = scheduler.current_time();
            let expected = expected_active(&timeline, time, IntervalBounds::HalfOpen);
            assert_eq!(scheduler.active_segments(), expected, "scheduler at t={time}");
            assert_eq!(manager.playing(), expected, "manager at t={time}");
            scheduler.tick(0.25, &timeline, &mut manager);
        }

        assert_eq!(manager.max_handles(), 1, "never two handles for one segment");
    }

    #[test]
    fn test_only_second_segment_at_fifteen() {
        let (scheduler, _, _) = playing_at(15.0);
        assert_eq!(scheduler.active_segments(), ids(&["b"]));
    }

    #[test]
    fn test_inclusive_bounds_overlap_at_touch_point() {
        let timeline = timeline();
        let mut manager = RecordingManager::new();
        let mut scheduler = Scheduler::new(SchedulerConfig {
            boundary: IntervalBounds::Inclusive,
            ..Default::default()
        });
        scheduler.seek(10.0, &timeline, &mut manager);
        scheduler.play(&timeline, &mut manager);

        assert_eq!(scheduler.active_segments(), ids(&["a", "b", "c"]));
    }

    #[test]
    fn test_time_is_monotonic_while_playing() {
        let (mut scheduler, timeline, mut manager) = playing_at(0.0);
        let mut previous = scheduler.current_time();

        for elapsed in [0.05, 0.0, -1.0, f64::NAN, f64::INFINITY, 0.1, 0.05] {
            scheduler.tick(elapsed, &timeline, &mut manager);
            assert!(
                scheduler.current_time() >= previous,
                "tick({elapsed}) moved time backwards"
            );
            previous = scheduler.current_time();
        }
        assert!((scheduler.current_time() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_tick_at_uses_wall_clock() {
        let (mut scheduler, timeline, mut manager) = playing_at(1.0);
        let start = Instant::now();

        scheduler.tick_at(start + std::time::Duration::from_millis(500), &timeline, &mut manager);
        assert!(scheduler.current_time() >= 1.5);

        let time = scheduler.current_time();
        scheduler.tick_at(start, &timeline, &mut manager);
        assert_eq!(scheduler.current_time(), time, "an earlier instant adds nothing");
    }

    #[test]
    fn test_stayers_are_not_restarted() {
        let (mut scheduler, timeline, mut manager) = playing_at(1.0);

        for _ in 0..10 {
            scheduler.tick(0.05, &timeline, &mut manager);
        }

        assert!(manager.calls.is_empty(), "unexpected calls: {:?}", manager.calls);
    }

    #[test]
    fn test_leavers_stop_before_entrants_start() {
        let (mut scheduler, timeline, mut manager) = playing_at(9.9);

        scheduler.tick(0.2, &timeline, &mut manager);

        let stop = manager
            .calls
            .iter()
            .position(|c| *c == Call::Pause(SegmentId::from("a")))
            .expect("a stopped");
        let start = manager
            .calls
            .iter()
            .position(|c| matches!(c, Call::Play { id, .. } if id.0 == "b"))
            .expect("b started");
        assert!(stop < start);
        assert!((manager.plays("b")[0] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_seek_restarts_at_new_offset() {
        let (mut scheduler, timeline, mut manager) = playing_at(5.0);

        scheduler.seek(7.0, &timeline, &mut manager);

        assert_eq!(manager.calls.first(), Some(&Call::StopAll));
        assert_eq!(manager.plays("a"), vec![7.0]);
        assert_eq!(manager.handles("a"), 1);
        assert_eq!(manager.max_handles(), 1);
        assert!(scheduler.is_playing());
    }

    #[test]
    fn test_seek_is_clamped() {
        let (mut scheduler, timeline, mut manager) = playing_at(5.0);

        scheduler.seek(-4.0, &timeline, &mut manager);
        assert_eq!(scheduler.current_time(), 0.0);

        scheduler.seek(99.0, &timeline, &mut manager);
        assert_eq!(scheduler.current_time(), 20.0);
        assert!(scheduler.active_segments().is_empty());

        scheduler.skip_by(-5.0, &timeline, &mut manager);
        assert_eq!(scheduler.current_time(), 15.0);
        assert_eq!(scheduler.active_segments(), ids(&["b"]));
    }

    #[test]
    fn test_seek_while_stopped_only_moves_cursor() {
        let timeline = timeline();
        let mut manager = RecordingManager::new();
        let mut scheduler = Scheduler::default();

        scheduler.seek(6.0, &timeline, &mut manager);

        assert_eq!(scheduler.current_time(), 6.0);
        assert!(manager.plays("a").is_empty());
        assert!(scheduler.active_segments().is_empty());
    }

    #[test]
    fn test_pause_then_play_restores_active_set() {
        let (mut scheduler, timeline, mut manager) = playing_at(6.0);
        let before = scheduler.active_segments();

        scheduler.pause(&mut manager);
        assert!(!scheduler.is_playing());
        assert!(scheduler.active_segments().is_empty());
        assert!(manager.playing().is_empty());
        assert_eq!(scheduler.current_time(), 6.0);

        scheduler.play(&timeline, &mut manager);

        assert_eq!(scheduler.active_segments(), before);
        assert_eq!(manager.plays("a"), vec![6.0]);
        assert_eq!(manager.plays("c"), vec![1.0]);
    }

    #[test]
    fn test_play_twice_is_ignored() {
        let (mut scheduler, timeline, mut manager) = playing_at(1.0);
        scheduler.play(&timeline, &mut manager);
        assert!(manager.calls.is_empty());
    }

    #[test]
    fn test_mute_removes_on_next_tick() {
        let (mut scheduler, mut timeline, mut manager) = playing_at(6.0);

        timeline.track_mut(TrackId(1)).expect("music").muted = true;
        scheduler.tick(0.05, &timeline, &mut manager);

        assert_eq!(scheduler.active_segments(), ids(&["a"]));
        assert_eq!(manager.playing(), ids(&["a"]));
        assert!((scheduler.current_time() - 6.05).abs() < 1e-9);

        timeline.track_mut(TrackId(1)).expect("music").muted = false;
        scheduler.refresh_volumes(&timeline, &mut manager);
        assert_eq!(scheduler.active_segments(), ids(&["a", "c"]));
        assert!((scheduler.current_time() - 6.05).abs() < 1e-9);
    }

    #[test]
    fn test_solo_silences_without_stopping() {
        let (mut scheduler, mut timeline, mut manager) = playing_at(6.0);

        timeline.track_mut(TrackId(0)).expect("voice").solo = true;
        scheduler.refresh_volumes(&timeline, &mut manager);

        assert_eq!(scheduler.active_segments(), ids(&["a", "c"]));
        assert_eq!(manager.last_volume("c"), Some(0.0));
        assert!(manager.plays("c").is_empty(), "volume changes never restart");
    }

    #[test]
    fn test_master_volume_is_pushed_live() {
        let (mut scheduler, timeline, mut manager) = playing_at(6.0);

        scheduler.set_master_volume(50.0);
        scheduler.refresh_volumes(&timeline, &mut manager);

        assert_eq!(manager.last_volume("a"), Some(0.5));
        assert_eq!(manager.last_volume("c"), Some(0.5));
        assert!(manager.plays("a").is_empty());
    }

    #[test]
    fn test_end_of_timeline_rewinds() {
        let (mut scheduler, timeline, mut manager) = playing_at(18.0);

        scheduler.tick(3.0, &timeline, &mut manager);

        assert!(!scheduler.is_playing());
        assert_eq!(scheduler.current_time(), 0.0);
        assert!(scheduler.active_segments().is_empty());
        assert!(manager.playing().is_empty());
        assert!(scheduler.drain_events().contains(&TransportEvent::ReachedEnd));
    }

    #[test]
    fn test_end_of_timeline_holds_when_configured() {
        let timeline = timeline();
        let mut manager = RecordingManager::new();
        let mut scheduler = Scheduler::new(SchedulerConfig {
            end_of_timeline: EndOfTimeline::Hold,
            ..Default::default()
        });
        scheduler.seek(18.0, &timeline, &mut manager);
        scheduler.play(&timeline, &mut manager);

        scheduler.tick(3.0, &timeline, &mut manager);
        assert_eq!(scheduler.current_time(), 20.0);
        assert!(!scheduler.is_playing());

        // Playing again from the end starts over.
        scheduler.play(&timeline, &mut manager);
        assert_eq!(scheduler.current_time(), 0.0);
        assert_eq!(scheduler.active_segments(), ids(&["a"]));
    }

    #[test]
    fn test_unconfirmed_start_is_retried_once() {
        let timeline = timeline();
        let mut manager = RecordingManager::new();
        manager.confirms_playing = false;
        let mut scheduler = Scheduler::default();
        scheduler.seek(1.0, &timeline, &mut manager);
        scheduler.play(&timeline, &mut manager);

        scheduler.tick(0.1, &timeline, &mut manager);
        scheduler.tick(0.1, &timeline, &mut manager);
        assert_eq!(manager.plays("a").len(), 1, "no second start inside the window");

        scheduler.tick(0.15, &timeline, &mut manager);
        let plays = manager.plays("a");
        assert_eq!(plays.len(), 2, "stalled start re-issued after the window");
        assert!((plays[1] - 1.35).abs() < 1e-9);

        for _ in 0..10 {
            scheduler.tick(0.1, &timeline, &mut manager);
        }
        assert_eq!(manager.plays("a").len(), 2, "only one retry");
        assert_eq!(manager.max_handles(), 1);
    }

    #[test]
    fn test_started_event_confirms_start() {
        let timeline = timeline();
        let mut manager = RecordingManager::new();
        manager.confirms_playing = false;
        let mut scheduler = Scheduler::default();
        scheduler.seek(1.0, &timeline, &mut manager);
        scheduler.play(&timeline, &mut manager);

        manager.push_event(PlaybackEvent::Started(SegmentId::from("a")));
        for _ in 0..8 {
            scheduler.tick(0.1, &timeline, &mut manager);
        }

        assert_eq!(manager.plays("a").len(), 1);
        assert_eq!(
            scheduler.drain_events(),
            vec![TransportEvent::SegmentStarted(SegmentId::from("a"))]
        );
    }

    #[test]
    fn test_leaving_cancels_pending_start() {
        let mut timeline = timeline();
        let mut manager = RecordingManager::new();
        manager.confirms_playing = false;
        let mut scheduler = Scheduler::default();
        scheduler.seek(6.0, &timeline, &mut manager);
        scheduler.play(&timeline, &mut manager);
        assert_eq!(manager.plays("c").len(), 1);

        timeline.track_mut(TrackId(1)).expect("music").muted = true;
        scheduler.tick(0.1, &timeline, &mut manager);
        assert!(!scheduler.is_active(&SegmentId::from("c")));

        // The first window runs out while muted; nothing is owed a retry.
        scheduler.tick(0.3, &timeline, &mut manager);
        assert_eq!(manager.plays("c").len(), 1);

        timeline.track_mut(TrackId(1)).expect("music").muted = false;
        scheduler.tick(0.1, &timeline, &mut manager);
        scheduler.tick(0.1, &timeline, &mut manager);

        let plays = manager.plays("c");
        assert_eq!(plays.len(), 2, "one fresh start and no stale retry");
        assert!((plays[1] - 1.5).abs() < 1e-9);
        assert_eq!(manager.max_handles(), 1);
    }

    #[test]
    fn test_failed_segment_sits_out_the_cycle() {
        let (mut scheduler, timeline, mut manager) = playing_at(6.0);

        manager.fail(
            "c",
            PlaybackError::Decode {
                resource: "c.wav".into(),
                message: "bad header".into(),
            },
        );
        for _ in 0..5 {
            scheduler.tick(0.1, &timeline, &mut manager);
        }

        assert_eq!(scheduler.active_segments(), ids(&["a"]), "other segments keep playing");
        assert!(manager.plays("c").is_empty(), "no retry loop");
        let events = scheduler.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            TransportEvent::SegmentFailed { id, message } if id.0 == "c" && message.contains("bad header")
        )));

        // A new play cycle gives it another chance.
        scheduler.pause(&mut manager);
        scheduler.play(&timeline, &mut manager);
        assert_eq!(scheduler.active_segments(), ids(&["a", "c"]));
    }

    #[test]
    fn test_short_clip_does_not_loop() {
        let (mut scheduler, timeline, mut manager) = playing_at(2.0);

        manager.finish("a");
        for _ in 0..5 {
            scheduler.tick(0.1, &timeline, &mut manager);
        }

        assert!(!scheduler.is_active(&SegmentId::from("a")));
        assert!(manager.plays("a").is_empty());
        assert_eq!(
            scheduler.drain_events(),
            vec![TransportEvent::SegmentEnded(SegmentId::from("a"))]
        );

        scheduler.seek(3.0, &timeline, &mut manager);
        assert_eq!(manager.plays("a"), vec![3.0], "a seek makes it playable again");
    }

    #[test]
    fn test_unplayable_segment_is_skipped_once() {
        let timeline = timeline();
        let mut manager = RecordingManager::new();
        let mut scheduler = Scheduler::default();
        scheduler.seek(3.0, &timeline, &mut manager);
        scheduler.play(&timeline, &mut manager);

        for _ in 0..5 {
            scheduler.tick(0.1, &timeline, &mut manager);
        }

        let skipped: Vec<_> = scheduler
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, TransportEvent::SegmentSkipped(_)))
            .collect();
        assert_eq!(skipped, vec![TransportEvent::SegmentSkipped(SegmentId::from("d"))]);
        assert!(!scheduler.is_active(&SegmentId::from("d")));
    }

    #[test]
    fn test_invalidate_restarts_moved_segment() {
        let (mut scheduler, mut timeline, mut manager) = playing_at(6.0);

        timeline
            .track_mut(TrackId(1))
            .expect("music")
            .set_segment_span(&SegmentId::from("c"), 4.0, 14.0);
        scheduler.invalidate(&SegmentId::from("c"), &timeline, &mut manager);

        assert_eq!(manager.plays("c"), vec![2.0]);
        assert_eq!(manager.plays("a"), Vec::<f64>::new(), "others untouched");
        assert_eq!(manager.max_handles(), 1);
    }

    #[test]
    fn test_dispose_releases_everything_once() {
        let (mut scheduler, timeline, mut manager) = playing_at(6.0);

        scheduler.dispose(&mut manager);
        scheduler.dispose(&mut manager);

        assert_eq!(manager.disposed, 1);
        for id in ids(&["a", "b", "c", "d"]) {
            assert!(!manager.is_playing(&id));
        }
        assert!(!scheduler.is_playing());

        manager.clear_calls();
        scheduler.tick(1.0, &timeline, &mut manager);
        scheduler.play(&timeline, &mut manager);
        scheduler.seek(2.0, &timeline, &mut manager);
        assert!(manager.calls.is_empty(), "nothing runs after dispose");
        assert_eq!(scheduler.current_time(), 6.0);
    }
}
