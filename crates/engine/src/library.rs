use emcee_decode::{AudioCache, DecodeError, DecodedAudio, ResourceResolver};
use emcee_transport::{PlaybackError, ResourceHandle};

/// Decoded clips at the device rate. Anything not preloaded is decoded on
/// first `load`, which blocks the caller for the length of the decode.
pub struct Library {
    cache: AudioCache,
    decodes: usize,
}

impl Library {
    pub fn new(resolver: ResourceResolver, sample_rate: u32) -> Self {
        Self {
            cache: AudioCache::with_sample_rate(resolver, sample_rate),
            decodes: 0,
        }
    }

    pub fn is_loaded(&self, resource: &ResourceHandle) -> bool {
        self.cache.contains(resource)
    }

    pub fn load(&mut self, resource: &ResourceHandle) -> Result<DecodedAudio, PlaybackError> {
        if !self.cache.contains(resource) {
            self.decodes += 1;
            log::debug!("decoding {resource}");
        }
        self.cache
            .get_or_load(resource)
            .map_err(|err| playback_error(resource, err))
    }

    /// Number of decodes attempted so far.
    pub fn decodes(&self) -> usize {
        self.decodes
    }

    pub fn evict(&mut self, resource: &ResourceHandle) -> bool {
        self.cache.evict(resource)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

fn playback_error(resource: &ResourceHandle, err: DecodeError) -> PlaybackError {
    match err {
        DecodeError::NotFound(_) | DecodeError::Remote(_) => {
            PlaybackError::Unavailable(resource.to_string())
        }
        other => PlaybackError::Decode {
            resource: resource.to_string(),
            message: other.to_string(),
        },
    }
}
