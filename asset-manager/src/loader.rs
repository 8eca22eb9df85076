use lru::LruCache;
use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::SoundId;
use crate::sfx::PcmSample;
use crate::util::{AssetError, DEFAULT_SFX_MEMORY_BUDGET_BYTES};

/// Where raw sample lumps come from (a WAD directory, a pack file, a test map).
pub trait LumpSource: Send + Sync {
    fn lump(&self, name: &str) -> Option<Arc<[u8]>>;
}

/// In-memory lump table keyed by upper-cased lump name.
#[derive(Debug, Default, Clone)]
pub struct MemoryLumps {
    lumps: HashMap<String, Arc<[u8]>>,
}

impl MemoryLumps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, bytes: impl Into<Arc<[u8]>>) {
        self.lumps.insert(name.to_ascii_uppercase(), bytes.into());
    }

    pub fn with(mut self, name: &str, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl LumpSource for MemoryLumps {
    fn lump(&self, name: &str) -> Option<Arc<[u8]>> {
        self.lumps.get(&name.to_ascii_uppercase()).cloned()
    }
}

struct CachedSample {
    sample: Arc<PcmSample>,
    users: usize,
}

// shorten the reclaimable tier type
type ReclaimableTier = LruCache<SoundId, Arc<PcmSample>>;

/// Decoded samples, reference counted by the channels playing them.
///
/// A sample with at least one user lives in the in-use tier and is never
/// dropped. When the last user releases it, it moves to the reclaimable tier,
/// which is trimmed least-recently-released first once it exceeds the memory
/// budget. Re-acquiring a reclaimable sample promotes it without decoding.
pub struct SampleCache {
    in_use: HashMap<SoundId, CachedSample>,
    reclaimable: ReclaimableTier,
    reclaimable_bytes: usize,
    memory_budget: usize,
}

impl Default for SampleCache {
    fn default() -> Self {
        Self::new(DEFAULT_SFX_MEMORY_BUDGET_BYTES)
    }
}

impl SampleCache {
    pub fn new(memory_budget: usize) -> Self {
        Self {
            in_use: HashMap::new(),
            reclaimable: LruCache::unbounded(),
            reclaimable_bytes: 0,
            memory_budget,
        }
    }

    /// Take a reference on the decoded sample for `id`, decoding on a miss.
    pub fn acquire_with<F>(&mut self, id: SoundId, decode: F) -> Result<Arc<PcmSample>, AssetError>
    where
        F: FnOnce() -> Result<PcmSample, AssetError>,
    {
        if let Some(entry) = self.in_use.get_mut(&id) {
            entry.users += 1;
            return Ok(entry.sample.clone());
        }

        let sample = match self.reclaimable.pop(&id) {
            Some(sample) => {
                self.reclaimable_bytes = self.reclaimable_bytes.saturating_sub(sample.size_bytes());
                tracing::trace!(sound = id.0, "sample promoted from reclaimable tier");
                sample
            }
            None => {
                let sample = Arc::new(decode()?);
                tracing::debug!(sound = id.0, bytes = sample.size_bytes(), "sample decoded");
                sample
            }
        };

        self.in_use.insert(id, CachedSample { sample: sample.clone(), users: 1 });
        Ok(sample)
    }

    /// Drop one reference on `id`. Releasing an id with no users is a no-op.
    pub fn release(&mut self, id: SoundId) {
        let Some(entry) = self.in_use.get_mut(&id) else {
            return;
        };
        entry.users = entry.users.saturating_sub(1);
        if entry.users > 0 {
            return;
        }
        if let Some(entry) = self.in_use.remove(&id) {
            self.reclaimable_bytes += entry.sample.size_bytes();
            self.reclaimable.put(id, entry.sample);
            self.trim();
        }
    }

    pub fn users(&self, id: SoundId) -> usize {
        self.in_use.get(&id).map(|e| e.users).unwrap_or(0)
    }

    pub fn is_reclaimable(&self, id: SoundId) -> bool {
        self.reclaimable.contains(&id)
    }

    pub fn reclaimable_bytes(&self) -> usize {
        self.reclaimable_bytes
    }

    /// Free every sample no channel references.
    pub fn purge_reclaimable(&mut self) {
        self.reclaimable.clear();
        self.reclaimable_bytes = 0;
    }

    fn trim(&mut self) {
        while self.reclaimable_bytes > self.memory_budget {
            match self.reclaimable.pop_lru() {
                Some((id, sample)) => {
                    self.reclaimable_bytes = self.reclaimable_bytes.saturating_sub(sample.size_bytes());
                    tracing::trace!(sound = id.0, "sample evicted from reclaimable tier");
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(len: usize) -> PcmSample {
        PcmSample { sample_rate: 11025, data: vec![128; len] }
    }

    #[test]
    fn shared_users_keep_sample_in_use() {
        let mut cache = SampleCache::new(1024);
        let a = cache.acquire_with(SoundId(1), || Ok(pcm(8))).unwrap();
        let b = cache.acquire_with(SoundId(1), || panic!("must not decode twice")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.users(SoundId(1)), 2);

        cache.release(SoundId(1));
        assert_eq!(cache.users(SoundId(1)), 1);
        assert!(!cache.is_reclaimable(SoundId(1)));

        cache.release(SoundId(1));
        assert_eq!(cache.users(SoundId(1)), 0);
        assert!(cache.is_reclaimable(SoundId(1)));
    }

    #[test]
    fn extra_release_is_noop() {
        let mut cache = SampleCache::new(1024);
        cache.acquire_with(SoundId(3), || Ok(pcm(4))).unwrap();
        cache.release(SoundId(3));
        cache.release(SoundId(3));
        cache.release(SoundId(99));
        assert_eq!(cache.users(SoundId(3)), 0);
        assert_eq!(cache.reclaimable_bytes(), 4);
    }

    #[test]
    fn reacquire_promotes_without_decoding() {
        let mut cache = SampleCache::new(1024);
        cache.acquire_with(SoundId(2), || Ok(pcm(16))).unwrap();
        cache.release(SoundId(2));
        let s = cache
            .acquire_with(SoundId(2), || Err(AssetError::Empty))
            .expect("should come from reclaimable tier");
        assert_eq!(s.len(), 16);
        assert_eq!(cache.reclaimable_bytes(), 0);
    }

    #[test]
    fn budget_evicts_least_recently_released() {
        let mut cache = SampleCache::new(20);
        for id in 1..=3 {
            cache.acquire_with(SoundId(id), || Ok(pcm(10))).unwrap();
        }
        for id in 1..=3 {
            cache.release(SoundId(id));
        }
        assert!(!cache.is_reclaimable(SoundId(1)));
        assert!(cache.is_reclaimable(SoundId(2)));
        assert!(cache.is_reclaimable(SoundId(3)));
        assert_eq!(cache.reclaimable_bytes(), 20);
    }

    #[test]
    fn purge_drops_only_unreferenced_samples() {
        let mut cache = SampleCache::new(1024);
        cache.acquire_with(SoundId(1), || Ok(pcm(8))).unwrap();
        cache.acquire_with(SoundId(2), || Ok(pcm(8))).unwrap();
        cache.release(SoundId(2));
        cache.purge_reclaimable();
        assert_eq!(cache.reclaimable_bytes(), 0);
        assert!(!cache.is_reclaimable(SoundId(2)));
        assert_eq!(cache.users(SoundId(1)), 1);
    }

    #[test]
    fn decode_failure_leaves_no_entry() {
        let mut cache = SampleCache::default();
        assert!(cache.acquire_with(SoundId(5), || Err(AssetError::Empty)).is_err());
        assert_eq!(cache.users(SoundId(5)), 0);
        assert!(!cache.is_reclaimable(SoundId(5)));
    }
}
