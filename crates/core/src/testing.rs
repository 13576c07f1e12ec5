//! In-memory [`AudioResourceManager`] for tests.

use std::collections::HashMap;

use emcee_transport::{
    AudioResourceManager, PlayOptions, PlaybackError, PlaybackEvent, ResourceHandle, SegmentId,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Play {
        id: SegmentId,
        resource: ResourceHandle,
        volume: f32,
        offset: f64,
    },
    Pause(SegmentId),
    Preload(ResourceHandle),
    StopAll,
    Release(SegmentId),
    SetVolume { id: SegmentId, volume: f32 },
    Dispose,
}

/// Records every command and counts live handles per segment. A `play`
/// for a segment that is already sounding opens a second handle, so a
/// scheduler that double-starts shows up in [`RecordingManager::max_handles`].
#[derive(Debug)]
pub struct RecordingManager {
    pub calls: Vec<Call>,
    handles: HashMap<SegmentId, usize>,
    max_handles: usize,
    queued: Vec<PlaybackEvent>,
    /// When false, `is_playing` reports nothing, like a backend that has
    /// not confirmed any start yet.
    pub confirms_playing: bool,
    pub disposed: usize,
    /// Length `preload` reports for every local resource.
    pub clip_length: f64,
}

impl RecordingManager {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            handles: HashMap::new(),
            max_handles: 0,
            queued: Vec::new(),
            confirms_playing: true,
            disposed: 0,
            clip_length: 10.0,
        }
    }

    pub fn playing(&self) -> Vec<SegmentId> {
        let mut ids: Vec<_> = self
            .handles
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn handles(&self, id: &str) -> usize {
        self.handles.get(&SegmentId::from(id)).copied().unwrap_or(0)
    }

    /// Highest number of simultaneous handles any one segment ever had.
    pub fn max_handles(&self) -> usize {
        self.max_handles
    }

    pub fn push_event(&mut self, event: PlaybackEvent) {
        self.queued.push(event);
    }

    /// Clip ran out of samples: drop its handle and queue `Ended`.
    pub fn finish(&mut self, id: &str) {
        let id = SegmentId::from(id);
        self.handles.remove(&id);
        self.queued.push(PlaybackEvent::Ended(id));
    }

    /// Backend failed the segment: drop its handle and queue `Error`.
    pub fn fail(&mut self, id: &str, error: PlaybackError) {
        let id = SegmentId::from(id);
        self.handles.remove(&id);
        self.queued.push(PlaybackEvent::Error { id, error });
    }

    pub fn plays(&self, id: &str) -> Vec<f64> {
        let id = SegmentId::from(id);
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Play { id: played, offset, .. } if *played == id => Some(*offset),
                _ => None,
            })
            .collect()
    }

    pub fn last_volume(&self, id: &str) -> Option<f32> {
        let id = SegmentId::from(id);
        self.calls.iter().rev().find_map(|call| match call {
            Call::Play { id: played, volume, .. } if *played == id => Some(*volume),
            Call::SetVolume { id: set, volume } if *set == id => Some(*volume),
            _ => None,
        })
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl Default for RecordingManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioResourceManager for RecordingManager {
    fn play(&mut self, id: &SegmentId, resource: &ResourceHandle, options: PlayOptions) {
        self.calls.push(Call::Play {
            id: id.clone(),
            resource: resource.clone(),
            volume: options.volume,
            offset: options.start_offset,
        });
        let count = self.handles.entry(id.clone()).or_insert(0);
        *count += 1;
        self.max_handles = self.max_handles.max(*count);
    }

    fn pause(&mut self, id: &SegmentId) {
        self.calls.push(Call::Pause(id.clone()));
        self.handles.remove(id);
    }

    fn preload(&mut self, resource: &ResourceHandle) -> Result<f64, PlaybackError> {
        self.calls.push(Call::Preload(resource.clone()));
        if resource.is_url() {
            return Err(PlaybackError::Unavailable(resource.to_string()));
        }
        Ok(self.clip_length)
    }

    fn stop_all(&mut self) {
        self.calls.push(Call::StopAll);
        self.handles.clear();
    }

    fn release(&mut self, id: &SegmentId) {
        self.calls.push(Call::Release(id.clone()));
        self.handles.remove(id);
    }

    fn is_playing(&self, id: &SegmentId) -> bool {
        self.confirms_playing && self.handles.get(id).is_some_and(|count| *count > 0)
    }

    fn set_volume(&mut self, id: &SegmentId, volume: f32) {
        self.calls.push(Call::SetVolume {
            id: id.clone(),
            volume,
        });
    }

    fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.queued)
    }

    fn dispose(&mut self) {
        self.calls.push(Call::Dispose);
        self.disposed += 1;
        self.handles.clear();
        self.queued.clear();
    }
}
