use std::path::Path;

use asset_manager::util::{DEFAULT_OUTPUT_RATE, DEFAULT_SFX_MEMORY_BUDGET_BYTES};
use serde::Deserialize;
use thiserror::Error;

pub const MIN_CHANNELS: usize = 1;
pub const MAX_CHANNELS: usize = 128;
pub const MAX_VOLUME_SETTING: i32 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("invalid sound config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("output_rate must be non-zero")]
    ZeroOutputRate,
}

/// Sound settings owned by the host and consumed as plain values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    pub channels: usize,
    pub sfx_volume: i32,
    /// Carried for the music player; unused by the sfx core.
    pub music_volume: i32,
    pub pitched_sounds: bool,
    pub flip_pan: bool,
    pub output_rate: u32,
    pub cache_budget_bytes: usize,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            channels: 32,
            sfx_volume: MAX_VOLUME_SETTING,
            music_volume: MAX_VOLUME_SETTING,
            pitched_sounds: false,
            flip_pan: false,
            output_rate: DEFAULT_OUTPUT_RATE,
            cache_budget_bytes: DEFAULT_SFX_MEMORY_BUDGET_BYTES,
        }
    }
}

impl SoundConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SoundConfig = toml::from_str(text)?;
        config.validated()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        Self::from_toml_str(&text)
    }

    /// Clamp out-of-range values (with a warning) and reject unusable ones.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.output_rate == 0 {
            return Err(ConfigError::ZeroOutputRate);
        }
        let channels = self.channels.clamp(MIN_CHANNELS, MAX_CHANNELS);
        if channels != self.channels {
            tracing::warn!(requested = self.channels, channels, "channel count clamped");
            self.channels = channels;
        }
        self.sfx_volume = clamp_volume("sfx_volume", self.sfx_volume);
        self.music_volume = clamp_volume("music_volume", self.music_volume);
        Ok(self)
    }
}

fn clamp_volume(name: &str, value: i32) -> i32 {
    let clamped = value.clamp(0, MAX_VOLUME_SETTING);
    if clamped != value {
        tracing::warn!(setting = name, requested = value, clamped, "volume clamped");
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(SoundConfig::from_toml_str("").unwrap(), SoundConfig::default());
    }

    #[test]
    fn values_are_clamped() {
        let cfg = SoundConfig::from_toml_str("channels = 500\nsfx_volume = 40\nmusic_volume = -3").unwrap();
        assert_eq!(cfg.channels, MAX_CHANNELS);
        assert_eq!(cfg.sfx_volume, 15);
        assert_eq!(cfg.music_volume, 0);

        let cfg = SoundConfig::from_toml_str("channels = 0").unwrap();
        assert_eq!(cfg.channels, 1);
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(matches!(SoundConfig::from_toml_str("output_rate = 0"), Err(ConfigError::ZeroOutputRate)));
    }

    #[test]
    fn bad_types_are_parse_errors() {
        assert!(matches!(SoundConfig::from_toml_str("flip_pan = \"yes\""), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "channels = 8\npitched_sounds = true\nflip_pan = true\noutput_rate = 22050").unwrap();
        let cfg = SoundConfig::load(file.path()).unwrap();
        assert_eq!(cfg.channels, 8);
        assert!(cfg.pitched_sounds && cfg.flip_pan);
        assert_eq!(cfg.output_rate, 22050);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SoundConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
