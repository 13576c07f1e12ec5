//! Gain math. Track volume and master volume are both on a 0-100 scale;
//! the result is a linear gain in `[0, 1]` for the audio manager.

use emcee_transport::Track;

pub fn any_solo(tracks: &[Track]) -> bool {
    tracks.iter().any(|t| t.solo)
}

/// Gain for everything on `track`.
///
/// Mute always wins: a muted track is silent even when soloed. While any
/// track is soloed, every non-solo track is silent regardless of its own
/// settings.
pub fn effective_volume(track: &Track, master_volume: f32, any_solo: bool) -> f32 {
    if track.muted || (any_solo && !track.solo) {
        return 0.0;
    }
    let track_gain = track.volume.clamp(0.0, 100.0) / 100.0;
    let master_gain = master_volume.clamp(0.0, 100.0) / 100.0;
    (track_gain * master_gain).clamp(0.0, 1.0)
}
