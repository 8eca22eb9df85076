//! Volume, stereo separation and priority for a sound relative to the listener.

use asset_manager::descriptor::SoundDescriptor;
use audio_backend::{MAX_VOLUME, NORM_SEP};
use serde::Deserialize;

use crate::audio_world::{ListenerPose, SoundWorld, SourcePose};
use crate::fixed::{finesine, fixed_mul, point_to_angle, point_to_dist, to_fixed, ANGLETOFINESHIFT, FRACBITS};

/// Stereo swing in map units.
const S_STEREO_SWING: i32 = 96;
const MAX_PRIORITY: i32 = 255;

const IDLE_CLOSE_DIST: i32 = 200;
const IDLE_CLIPPING_DIST: i32 = 1200;
const STATIC_CLIPPING_DIST: i32 = 192;

/// Falloff model for a started sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attenuation {
    /// Use the descriptor's own close/clipping distances.
    #[default]
    Normal,
    /// Engine default distances, ignoring the descriptor.
    Idle,
    /// Short fixed falloff.
    Static,
    /// Everywhere at full volume.
    None,
}

impl Attenuation {
    /// `(attenuator, close, clipping)` in map units.
    fn distances(self, desc: &SoundDescriptor) -> (i32, i32, i32) {
        match self {
            Attenuation::Normal => {
                let close = desc.close_dist;
                let clip = desc.clipping_dist;
                (clip - close, close, clip)
            }
            Attenuation::Idle => (IDLE_CLIPPING_DIST - IDLE_CLOSE_DIST, IDLE_CLOSE_DIST, IDLE_CLIPPING_DIST),
            Attenuation::Static => (STATIC_CLIPPING_DIST, 0, STATIC_CLIPPING_DIST),
            Attenuation::None => (0, 0, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialParams {
    pub volume: i32,
    pub separation: i32,
    /// Effective priority after the quietness bias.
    pub priority: i32,
    pub audible: bool,
}

impl SpatialParams {
    fn silent(priority: i32) -> Self {
        Self { volume: 0, separation: NORM_SEP, priority, audible: false }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpatialParameterComputer {
    /// Global sfx scalar, 0..=15.
    pub sfx_volume: i32,
}

impl Default for SpatialParameterComputer {
    fn default() -> Self {
        Self { sfx_volume: 15 }
    }
}

impl SpatialParameterComputer {
    pub fn new(sfx_volume: i32) -> Self {
        Self { sfx_volume: sfx_volume.clamp(0, 15) }
    }

    /// Channel volume scaled by the global sfx volume, in 0..=127.
    pub fn scaled_volume(&self, channel_volume: i32) -> i32 {
        (channel_volume * self.sfx_volume / 15).clamp(0, MAX_VOLUME)
    }

    /// Parameters for `source` heard by `listener`.
    ///
    /// A missing listener means a global sound: full scaled volume, centered,
    /// priority untouched.
    pub fn compute(
        &self,
        listener: Option<&ListenerPose>,
        source: &SourcePose,
        channel_volume: i32,
        priority: i32,
        attenuation: Attenuation,
        desc: &SoundDescriptor,
        world: &dyn SoundWorld,
    ) -> SpatialParams {
        let base = self.scaled_volume(channel_volume);
        let Some(listener) = listener else {
            return SpatialParams { volume: base, separation: NORM_SEP, priority, audible: true };
        };

        match self.attenuate(listener, source, base, attenuation, desc, world) {
            Some((volume, separation)) => SpatialParams {
                volume,
                separation,
                priority: bias_priority(priority, volume),
                audible: volume > 0,
            },
            None => SpatialParams::silent(bias_priority(priority, 0)),
        }
    }

    /// `Some((volume, separation))`, or `None` when the sound cannot be heard.
    fn attenuate(
        &self,
        listener: &ListenerPose,
        source: &SourcePose,
        base: i32,
        attenuation: Attenuation,
        desc: &SoundDescriptor,
        world: &dyn SoundWorld,
    ) -> Option<(i32, i32)> {
        if listener.kill_sound || source.kill_sound {
            return None;
        }

        let (attenuator, close, clip) = attenuation.distances(desc);
        if attenuator <= 0 {
            return Some((base, NORM_SEP));
        }

        let (mut sx, mut sy) = (source.x, source.y);
        if source.group != listener.group {
            if let Some(offset) = world.portal_offset(source.group, listener.group) {
                sx = sx.wrapping_add(offset.dx);
                sy = sy.wrapping_add(offset.dy);
            }
        }

        let dist = point_to_dist(listener.x, listener.y, sx, sy);
        if dist == 0 {
            return Some((base, NORM_SEP));
        }
        if dist >= to_fixed(clip) {
            return None;
        }

        let mut angle = point_to_angle(listener.x, listener.y, sx, sy);
        if angle <= listener.angle {
            angle = angle.wrapping_add(0xffff_ffff);
        }
        let fine = (angle.wrapping_sub(listener.angle) >> ANGLETOFINESHIFT) as usize;
        let separation = NORM_SEP - (fixed_mul(to_fixed(S_STEREO_SWING), finesine(fine)) >> FRACBITS);

        let volume = if dist < to_fixed(close) {
            base
        } else {
            let remaining = ((to_fixed(clip) - dist) >> FRACBITS) as i64;
            (base as i64 * remaining / attenuator as i64) as i32
        };
        Some((volume, separation))
    }
}

fn bias_priority(priority: i32, volume: i32) -> i32 {
    (priority + (MAX_VOLUME - volume)).min(MAX_PRIORITY)
}
