use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::{ResolvedSound, SoundDescriptor, SoundId};
use crate::util::{AssetError, MAX_CHAIN_DEPTH};

/// Immutable-per-session descriptor table, addressable by id or name.
#[derive(Debug, Default, Clone)]
pub struct SoundCatalog {
    by_id: HashMap<SoundId, Arc<SoundDescriptor>>,
    // lower-cased name -> id
    by_name: HashMap<String, SoundId>,
}

impl SoundCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = SoundDescriptor>) -> Self {
        let mut catalog = Self::new();
        for d in descriptors {
            catalog.insert(d);
        }
        catalog
    }

    /// Register a descriptor, replacing any previous one with the same id.
    pub fn insert(&mut self, descriptor: SoundDescriptor) {
        let id = descriptor.id;
        if let Some(old) = self.by_id.get(&id) {
            self.by_name.remove(&old.name.to_ascii_lowercase());
        }
        self.by_name.insert(descriptor.name.to_ascii_lowercase(), id);
        self.by_id.insert(id, Arc::new(descriptor));
    }

    pub fn get(&self, id: SoundId) -> Option<&Arc<SoundDescriptor>> {
        self.by_id.get(&id)
    }

    pub fn id_by_name(&self, name: &str) -> Option<SoundId> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<SoundDescriptor>> {
        self.id_by_name(name).and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Flatten the alias chain, then the link chain, of `id`.
    ///
    /// Priority and singularity come from the descriptor left after alias
    /// resolution. The first link supplies a fixed pitch and a volume
    /// adjustment. Sample data and distances come from the end of the chain.
    pub fn resolve(&self, id: SoundId) -> Result<ResolvedSound, AssetError> {
        let mut hops = 0usize;
        let mut current = self.fetch(id)?;

        while let Some(next) = current.alias {
            hops += 1;
            if hops > MAX_CHAIN_DEPTH {
                return Err(AssetError::ChainTooLong(id));
            }
            current = self.fetch(next)?;
        }

        let requested = current.clone();
        let mut pitch = None;
        let mut volume_adjust = 0;
        if requested.link.is_some() {
            pitch = Some(requested.link_pitch);
            volume_adjust = requested.link_volume;
        }

        while let Some(next) = current.alias.or(current.link) {
            hops += 1;
            if hops > MAX_CHAIN_DEPTH {
                return Err(AssetError::ChainTooLong(id));
            }
            current = self.fetch(next)?;
        }

        Ok(ResolvedSound {
            priority: requested.priority,
            singularity: requested.singularity,
            pitch_profile: requested.pitch_profile,
            pitch,
            volume_adjust,
            data: current,
        })
    }

    fn fetch(&self, id: SoundId) -> Result<Arc<SoundDescriptor>, AssetError> {
        self.by_id.get(&id).cloned().ok_or(AssetError::UnknownSound(id))
    }
}
