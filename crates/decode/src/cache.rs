use std::collections::HashMap;

use emcee_transport::ResourceHandle;

use crate::{DecodeError, DecodedAudio, ResourceResolver, decode_file, resample};

/// Decoded audio keyed by resource handle, optionally resampled to a fixed
/// output rate on load.
pub struct AudioCache {
    resolver: ResourceResolver,
    target_sample_rate: Option<u32>,
    entries: HashMap<ResourceHandle, DecodedAudio>,
}

impl AudioCache {
    pub fn new(resolver: ResourceResolver) -> Self {
        Self {
            resolver,
            target_sample_rate: None,
            entries: HashMap::new(),
        }
    }

    pub fn with_sample_rate(resolver: ResourceResolver, sample_rate: u32) -> Self {
        Self {
            target_sample_rate: Some(sample_rate),
            ..Self::new(resolver)
        }
    }

    pub fn get_or_load(&mut self, handle: &ResourceHandle) -> Result<DecodedAudio, DecodeError> {
        if let Some(audio) = self.entries.get(handle) {
            return Ok(audio.clone());
        }

        let path = self.resolver.resolve(handle)?;
        let mut audio = decode_file(&path)?;
        if let Some(rate) = self.target_sample_rate {
            audio = resample(&audio, rate)?;
        }

        self.entries.insert(handle.clone(), audio.clone());
        Ok(audio)
    }

    pub fn contains(&self, handle: &ResourceHandle) -> bool {
        self.entries.contains_key(handle)
    }

    /// Returns true if an entry was dropped.
    pub fn evict(&mut self, handle: &ResourceHandle) -> bool {
        self.entries.remove(handle).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
