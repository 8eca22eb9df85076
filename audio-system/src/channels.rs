//! Fixed pool of mixing channels and the allocation/eviction policy.

use std::sync::Arc;

use asset_manager::{SoundDescriptor, SoundId};
use audio_backend::{PlaybackEngine, VoiceParams};

use crate::audio_world::{OriginId, SourcePose};
use crate::spatial::Attenuation;

/// The subset of the playback engine the channel pool and ticker drive.
///
/// Lets tests swap in a recording fake for the real mixer.
pub trait PlaybackEngineLike: Send + Sync {
    fn install(&self, handle: usize, sound: &SoundDescriptor, params: VoiceParams, looping: bool, instance_id: u32) -> bool;
    fn update_params(&self, handle: usize, volume: i32, separation: i32, pitch: i32);
    fn stop(&self, handle: usize);
    fn is_playing(&self, handle: usize) -> bool;
    fn instance_id(&self, handle: usize) -> u32;
}

impl PlaybackEngineLike for PlaybackEngine {
    fn install(&self, handle: usize, sound: &SoundDescriptor, params: VoiceParams, looping: bool, instance_id: u32) -> bool {
        PlaybackEngine::install(self, handle, sound, params, looping, instance_id)
    }
    fn update_params(&self, handle: usize, volume: i32, separation: i32, pitch: i32) {
        PlaybackEngine::update_params(self, handle, volume, separation, pitch)
    }
    fn stop(&self, handle: usize) {
        PlaybackEngine::stop(self, handle)
    }
    fn is_playing(&self, handle: usize) -> bool {
        PlaybackEngine::is_playing(self, handle)
    }
    fn instance_id(&self, handle: usize) -> u32 {
        PlaybackEngine::instance_id(self, handle)
    }
}

/// Tracking state for one occupied slot. The slot index is the engine handle.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Id the caller asked for, before alias/link resolution.
    pub sound_id: SoundId,
    /// Descriptor supplying data and distances.
    pub sound: Arc<SoundDescriptor>,
    /// `None` for global sounds and for channels detached from their origin.
    pub origin: Option<OriginId>,
    /// Detached channels keep playing at `last_pose`.
    pub detached: bool,
    pub last_pose: SourcePose,
    pub volume: i32,
    pub attenuation: Attenuation,
    pub pitch: i32,
    pub original_priority: i32,
    pub priority: i32,
    pub singularity: i32,
    pub looping: bool,
    pub instance_id: u32,
}

/// Owned replacement for a global channel array.
#[derive(Debug, Default)]
pub struct ChannelPool {
    slots: Vec<Option<Channel>>,
}

impl ChannelPool {
    pub fn new(channels: usize) -> Self {
        let mut pool = Self::default();
        pool.init(channels);
        pool
    }

    /// Size the pool to `channels` empty slots. Call `shutdown` first if the
    /// pool is live, otherwise the engine keeps voices nobody tracks.
    pub fn init(&mut self, channels: usize) {
        if self.occupied() > 0 {
            tracing::warn!(occupied = self.occupied(), "channel pool re-initialized while channels are active");
        }
        self.slots.clear();
        self.slots.resize_with(channels, || None);
        tracing::debug!(channels, "channel pool initialized");
    }

    /// Stop every channel and release the slots.
    pub fn shutdown(&mut self, engine: &dyn PlaybackEngineLike) {
        for handle in 0..self.slots.len() {
            self.stop_channel(engine, handle);
        }
        self.slots.clear();
        tracing::debug!("channel pool shut down");
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn get(&self, handle: usize) -> Option<&Channel> {
        self.slots.get(handle).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: usize) -> Option<&mut Channel> {
        self.slots.get_mut(handle).and_then(Option::as_mut)
    }

    /// Occupied slots with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Channel)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.as_ref().map(|c| (i, c)))
    }

    /// Pick the slot for a new sound, making it free.
    ///
    /// A channel already playing the same `(origin, singularity)` pair is
    /// stopped and reused whatever its priority; global sounds never match.
    /// Otherwise the first free slot wins. With no free slot the numerically largest priority is evicted if
    /// `priority` is strictly smaller; otherwise nothing changes and `None` is
    /// returned.
    pub fn get_channel(
        &mut self,
        engine: &dyn PlaybackEngineLike,
        origin: Option<OriginId>,
        priority: i32,
        singularity: i32,
    ) -> Option<usize> {
        let same = origin.and_then(|o| {
            self.iter()
                .find(|(_, c)| !c.detached && c.origin == Some(o) && c.singularity == singularity)
                .map(|(i, _)| i)
        });
        if let Some(handle) = same {
            tracing::debug!(handle, ?origin, singularity, "replacing sound of the same singularity");
            self.stop_channel(engine, handle);
            return Some(handle);
        }

        let mut worst: Option<(usize, i32)> = None;
        for (handle, slot) in self.slots.iter().enumerate() {
            match slot {
                None => return Some(handle),
                Some(c) => {
                    if worst.is_none_or(|(_, p)| c.priority > p) {
                        worst = Some((handle, c.priority));
                    }
                }
            }
        }

        match worst {
            Some((handle, worst_priority)) if priority < worst_priority => {
                tracing::debug!(handle, evicted_priority = worst_priority, priority, "evicting channel");
                self.stop_channel(engine, handle);
                Some(handle)
            }
            _ => {
                tracing::debug!(priority, "no channel available");
                None
            }
        }
    }

    /// Free `handle`, stopping its voice if the engine still holds this
    /// occupancy. Stopping a free slot does nothing.
    pub fn stop_channel(&mut self, engine: &dyn PlaybackEngineLike, handle: usize) {
        let Some(channel) = self.slots.get_mut(handle).and_then(Option::take) else {
            return;
        };
        if engine.instance_id(handle) == channel.instance_id {
            engine.stop(handle);
        }
        tracing::trace!(handle, sound = %channel.sound.name, "channel stopped");
    }

    /// Drop tracking for `handle` without touching the engine.
    pub fn clear_channel(&mut self, handle: usize) -> Option<Channel> {
        self.slots.get_mut(handle).and_then(Option::take)
    }

    /// Record `channel` in a slot returned by `get_channel`.
    pub fn occupy(&mut self, handle: usize, channel: Channel) {
        if let Some(slot) = self.slots.get_mut(handle) {
            *slot = Some(channel);
        }
    }
}
