//! Positional sound effects: channel allocation, spatial parameters and the
//! per-tick update that keeps the mixer in step with a moving listener.
//!
//! `SoundSystem` lives on the simulation thread. The `PlaybackEngine` it drives
//! is shared with the device callback through `render_fn`.

use std::sync::Arc;

use anyhow::{bail, Result};
use asset_manager::descriptor::NORM_PITCH;
use asset_manager::{LumpSource, PitchProfile, SoundCatalog, SoundId};
use audio_backend::{render_fn_for_engine, PlaybackEngine, RenderFn, VoiceParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub mod audio_world;
pub mod channels;
pub mod config;
pub mod fixed;
pub mod spatial;

pub use audio_world::{GroupId, ListenerPose, OriginId, PortalOffset, SoundWorld, SourcePose, StaticWorld};
pub use channels::{Channel, ChannelPool, PlaybackEngineLike};
pub use config::{ConfigError, SoundConfig};
pub use spatial::{Attenuation, SpatialParameterComputer, SpatialParams};

pub struct SoundSystem {
    config: SoundConfig,
    catalog: Arc<SoundCatalog>,
    engine: Arc<PlaybackEngine>,
    pool: ChannelPool,
    spatial: SpatialParameterComputer,
    listener: Option<ListenerPose>,
    rng: StdRng,
    next_instance: u32,
}

impl SoundSystem {
    /// Build a system with its own playback engine sized from `config`.
    pub fn new(config: SoundConfig, catalog: Arc<SoundCatalog>, lumps: Arc<dyn LumpSource>) -> Result<Self> {
        let config = config.validated()?;
        let engine = Arc::new(PlaybackEngine::new(config.channels, config.output_rate, lumps, config.cache_budget_bytes));
        Self::with_engine(config, catalog, engine)
    }

    /// Build a system around an existing engine, e.g. one sized for a device's rate.
    pub fn with_engine(config: SoundConfig, catalog: Arc<SoundCatalog>, engine: Arc<PlaybackEngine>) -> Result<Self> {
        let config = config.validated()?;
        if engine.voice_count() < config.channels {
            bail!("playback engine has {} voices, {} channels requested", engine.voice_count(), config.channels);
        }
        engine.set_flip_pan(config.flip_pan);
        tracing::info!(
            channels = config.channels,
            output_rate = engine.output_rate(),
            sfx_volume = config.sfx_volume,
            pitched = config.pitched_sounds,
            "sound system initialized"
        );
        Ok(Self {
            pool: ChannelPool::new(config.channels),
            spatial: SpatialParameterComputer::new(config.sfx_volume),
            config,
            catalog,
            engine,
            listener: None,
            rng: StdRng::from_entropy(),
            next_instance: 0,
        })
    }

    pub fn config(&self) -> &SoundConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    /// Device callback that mixes this system's channels.
    pub fn render_fn(&self) -> RenderFn {
        render_fn_for_engine(self.engine.clone())
    }

    /// Deterministic pitch randomization, for tests and demo recording.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn set_listener(&mut self, listener: ListenerPose) {
        self.listener = Some(listener);
    }

    pub fn set_sfx_volume(&mut self, volume: i32) {
        self.config.sfx_volume = volume.clamp(0, config::MAX_VOLUME_SETTING);
        self.spatial = SpatialParameterComputer::new(self.config.sfx_volume);
        tracing::debug!(sfx_volume = self.config.sfx_volume, "sfx volume changed");
    }

    /// Start `sound` from `origin` (`None` for a global sound).
    ///
    /// Returns the channel handle, or `None` when the request was dropped:
    /// unknown or undecodable sound, out of range, or no channel to spare.
    pub fn start_sound(
        &mut self,
        world: &dyn SoundWorld,
        origin: Option<OriginId>,
        sound: SoundId,
        volume: i32,
        attenuation: Attenuation,
        looping: bool,
    ) -> Option<usize> {
        let resolved = match self.catalog.resolve(sound) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(sound = sound.0, error = %e, "cannot start sound");
                return None;
            }
        };

        let volume = (volume + resolved.volume_adjust).min(audio_backend::MAX_VOLUME);
        if volume <= 0 {
            return None;
        }

        let positioned = origin.filter(|o| self.listener.and_then(|l| l.origin) != Some(*o));
        let pose = match positioned {
            Some(o) => match world.origin_pose(o) {
                Some(pose) => pose,
                None => {
                    tracing::debug!(origin = o.0, sound = sound.0, "origin not in world, sound dropped");
                    return None;
                }
            },
            None => SourcePose::default(),
        };
        let listener = positioned.and(self.listener);
        let params = self.spatial.compute(
            listener.as_ref(),
            &pose,
            volume,
            resolved.priority,
            attenuation,
            &resolved.data,
            world,
        );
        if !params.audible || params.volume <= 0 {
            tracing::trace!(sound = sound.0, "sound inaudible");
            return None;
        }

        let pitch = match resolved.pitch {
            Some(p) => p,
            None if self.config.pitched_sounds => random_pitch(resolved.pitch_profile, &mut self.rng),
            None => NORM_PITCH,
        };

        // the sample must load before any slot is freed for it
        let sample = self.engine.prepare(&resolved.data).ok()?;
        let Some(handle) = self.pool.get_channel(self.engine.as_ref(), origin, params.priority, resolved.singularity) else {
            self.engine.release_prepared(resolved.data.id);
            return None;
        };
        let instance_id = self.next_instance_id();
        let voice = VoiceParams { volume: params.volume, separation: params.separation, pitch };
        if !self.engine.install_prepared(handle, &resolved.data, sample, voice, looping, instance_id) {
            return None;
        }

        tracing::debug!(
            handle,
            sound = %resolved.data.name,
            origin = ?origin,
            volume = params.volume,
            separation = params.separation,
            pitch,
            priority = params.priority,
            "sound started"
        );
        self.pool.occupy(
            handle,
            Channel {
                sound_id: sound,
                sound: resolved.data.clone(),
                origin,
                detached: false,
                last_pose: pose,
                volume,
                attenuation,
                pitch,
                original_priority: resolved.priority,
                priority: params.priority,
                singularity: resolved.singularity,
                looping,
                instance_id,
            },
        );
        Some(handle)
    }

    /// Start a sound looked up by its (case-insensitive) name.
    pub fn start_sound_named(
        &mut self,
        world: &dyn SoundWorld,
        origin: Option<OriginId>,
        name: &str,
        volume: i32,
        attenuation: Attenuation,
        looping: bool,
    ) -> Option<usize> {
        let Some(id) = self.catalog.id_by_name(name) else {
            tracing::warn!(name, "unknown sound name");
            return None;
        };
        self.start_sound(world, origin, id, volume, attenuation, looping)
    }

    /// Stop every sound emitted by `origin`.
    pub fn stop_sound(&mut self, origin: OriginId) {
        let handles: Vec<usize> = self.pool.iter().filter(|(_, c)| c.origin == Some(origin)).map(|(i, _)| i).collect();
        for handle in handles {
            self.pool.stop_channel(self.engine.as_ref(), handle);
        }
    }

    pub fn stop_all(&mut self) {
        for handle in 0..self.pool.len() {
            self.pool.stop_channel(self.engine.as_ref(), handle);
        }
    }

    /// Detach `origin`'s channels so they play out at `last_pose`.
    pub fn unlink_origin(&mut self, origin: OriginId, last_pose: SourcePose) {
        for handle in 0..self.pool.len() {
            if let Some(c) = self.pool.get_mut(handle) {
                if c.origin == Some(origin) {
                    c.origin = None;
                    c.detached = true;
                    c.last_pose = last_pose;
                    tracing::debug!(handle, origin = origin.0, "channel detached from origin");
                }
            }
        }
    }

    /// Whether `origin` is currently playing `sound` (the id it was started with).
    pub fn is_playing(&self, origin: Option<OriginId>, sound: SoundId) -> bool {
        self.pool.iter().any(|(handle, c)| {
            c.origin == origin
                && c.sound_id == sound
                && self.engine.instance_id(handle) == c.instance_id
                && self.engine.is_playing(handle)
        })
    }

    pub fn active_channels(&self) -> usize {
        self.pool.occupied()
    }

    pub fn channel(&self, handle: usize) -> Option<&Channel> {
        self.pool.get(handle)
    }

    /// Once per tick: retire finished or inaudible channels and push fresh
    /// parameters for the rest.
    pub fn update_sounds(&mut self, world: &dyn SoundWorld, listener: &ListenerPose) {
        self.listener = Some(*listener);
        let engine = self.engine.clone();
        tick(&mut self.pool, engine.as_ref(), &self.spatial, world, listener);
    }

    /// Stop everything and release the pool. The system accepts no sounds afterwards.
    pub fn shutdown(&mut self) {
        self.pool.shutdown(self.engine.as_ref());
        self.engine.purge_unused_samples();
        tracing::info!("sound system shut down");
    }

    fn next_instance_id(&mut self) -> u32 {
        self.next_instance = self.next_instance.wrapping_add(1);
        if self.next_instance == 0 {
            self.next_instance = 1;
        }
        self.next_instance
    }
}

/// Per-tick channel walk, independent of the concrete engine.
pub fn tick(
    pool: &mut ChannelPool,
    engine: &dyn PlaybackEngineLike,
    spatial: &SpatialParameterComputer,
    world: &dyn SoundWorld,
    listener: &ListenerPose,
) {
    for handle in 0..pool.len() {
        let Some(c) = pool.get(handle) else {
            continue;
        };

        if engine.instance_id(handle) != c.instance_id {
            tracing::debug!(handle, sound = %c.sound.name, "channel recycled by the engine");
            pool.clear_channel(handle);
            continue;
        }
        if !engine.is_playing(handle) {
            pool.stop_channel(engine, handle);
            continue;
        }

        let pose = if c.detached {
            c.last_pose
        } else {
            match c.origin {
                None => continue,
                Some(o) if listener.origin == Some(o) => continue,
                Some(o) => world.origin_pose(o).unwrap_or(c.last_pose),
            }
        };

        let params = spatial.compute(Some(listener), &pose, c.volume, c.original_priority, c.attenuation, &c.sound, world);
        if !params.audible {
            tracing::debug!(handle, sound = %c.sound.name, "channel no longer audible");
            pool.stop_channel(engine, handle);
            continue;
        }

        engine.update_params(handle, params.volume, params.separation, c.pitch);
        if let Some(c) = pool.get_mut(handle) {
            c.priority = params.priority;
            c.last_pose = pose;
        }
    }
}

fn random_pitch(profile: PitchProfile, rng: &mut impl Rng) -> i32 {
    let mut r = || rng.gen::<u8>() as i32;
    match profile {
        PitchProfile::None => NORM_PITCH,
        PitchProfile::Doom => NORM_PITCH + 16 - (r() & 31),
        PitchProfile::DoomSaw => NORM_PITCH + 8 - (r() & 15),
        PitchProfile::Heretic => NORM_PITCH + (r() & 7) - (r() & 7),
    }
}
