use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable numeric id of a sound descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoundId(pub u32);

/// Pitch randomization applied when a sound starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchProfile {
    #[default]
    None,
    Doom,
    DoomSaw,
    Heretic,
}

pub const DEFAULT_CLOSE_DIST: i32 = 200;
pub const DEFAULT_CLIPPING_DIST: i32 = 1200;
pub const NORM_PITCH: i32 = 128;

/// Static metadata for one sound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundDescriptor {
    pub id: SoundId,
    pub name: String,
    /// Name of the lump holding the raw sample data.
    pub lump: String,
    /// Lower is more important.
    pub priority: i32,
    /// 0 is the default class; every origin may hold one sound per class.
    #[serde(default)]
    pub singularity: i32,
    #[serde(default = "default_close")]
    pub close_dist: i32,
    #[serde(default = "default_clipping")]
    pub clipping_dist: i32,
    #[serde(default)]
    pub pitch_profile: PitchProfile,
    /// Play this descriptor instead, wholesale.
    #[serde(default)]
    pub alias: Option<SoundId>,
    /// Play this descriptor's data with `link_pitch` and `link_volume` applied.
    #[serde(default)]
    pub link: Option<SoundId>,
    #[serde(default = "default_pitch")]
    pub link_pitch: i32,
    #[serde(default)]
    pub link_volume: i32,
}

fn default_close() -> i32 {
    DEFAULT_CLOSE_DIST
}

fn default_clipping() -> i32 {
    DEFAULT_CLIPPING_DIST
}

fn default_pitch() -> i32 {
    NORM_PITCH
}

impl SoundDescriptor {
    pub fn new(id: u32, name: impl Into<String>, lump: impl Into<String>, priority: i32) -> Self {
        Self {
            id: SoundId(id),
            name: name.into(),
            lump: lump.into(),
            priority,
            singularity: 0,
            close_dist: DEFAULT_CLOSE_DIST,
            clipping_dist: DEFAULT_CLIPPING_DIST,
            pitch_profile: PitchProfile::None,
            alias: None,
            link: None,
            link_pitch: NORM_PITCH,
            link_volume: 0,
        }
    }

    pub fn with_singularity(mut self, class: i32) -> Self {
        self.singularity = class;
        self
    }

    pub fn with_distances(mut self, close_dist: i32, clipping_dist: i32) -> Self {
        self.close_dist = close_dist;
        self.clipping_dist = clipping_dist;
        self
    }

    pub fn with_pitch_profile(mut self, profile: PitchProfile) -> Self {
        self.pitch_profile = profile;
        self
    }

    pub fn with_alias(mut self, target: u32) -> Self {
        self.alias = Some(SoundId(target));
        self
    }

    pub fn with_link(mut self, target: u32, pitch: i32, volume: i32) -> Self {
        self.link = Some(SoundId(target));
        self.link_pitch = pitch;
        self.link_volume = volume;
        self
    }
}

/// A start request's descriptor after alias and link chains are flattened.
#[derive(Debug, Clone)]
pub struct ResolvedSound {
    /// Descriptor that supplies sample data and attenuation distances.
    pub data: Arc<SoundDescriptor>,
    pub priority: i32,
    pub singularity: i32,
    pub pitch_profile: PitchProfile,
    /// Fixed pitch imposed by a link; suppresses randomization.
    pub pitch: Option<i32>,
    pub volume_adjust: i32,
}
