//! Per-kind gain configuration and named presets.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::enums::TrackKind;

/// Gain multipliers applied after loudness normalization.
///
/// A gain of 1.0 keeps the calibrated level; values are relative to the
/// normalization target, not to the raw signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Narration gain.
    #[serde(default = "default_voice_gain")]
    pub voice_gain: f64,

    /// Sound effect gain.
    #[serde(default = "default_effect_gain")]
    pub effect_gain: f64,

    /// Background music gain.
    #[serde(default = "default_music_gain")]
    pub music_gain: f64,
}

fn default_voice_gain() -> f64 {
    1.0
}

fn default_effect_gain() -> f64 {
    0.8
}

fn default_music_gain() -> f64 {
    0.5
}

impl Default for VolumeConfig {
    fn default() -> Self {
        VolumePreset::Balanced.config()
    }
}

impl VolumeConfig {
    /// Create a volume configuration from explicit gains.
    pub fn new(voice_gain: f64, effect_gain: f64, music_gain: f64) -> Self {
        Self {
            voice_gain,
            effect_gain,
            music_gain,
        }
    }

    /// Gain for a given track kind. Mixed output is never re-scaled.
    pub fn gain_for(&self, kind: TrackKind) -> f64 {
        match kind {
            TrackKind::Voice => self.voice_gain,
            TrackKind::Music => self.music_gain,
            TrackKind::Effect => self.effect_gain,
            TrackKind::Mixed => 1.0,
        }
    }

    /// Check that all gains are finite and non-negative.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("voice_gain", self.voice_gain),
            ("effect_gain", self.effect_gain),
            ("music_gain", self.music_gain),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number, got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Named gain triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumePreset {
    /// Overlays kept well under the narration.
    VoiceFocused,
    /// General purpose mix.
    #[default]
    Balanced,
    /// Music and effects pushed forward.
    Cinematic,
}

impl VolumePreset {
    /// All presets, in display order.
    pub const ALL: [VolumePreset; 3] = [
        VolumePreset::VoiceFocused,
        VolumePreset::Balanced,
        VolumePreset::Cinematic,
    ];

    /// The gain triple behind this preset.
    pub fn config(&self) -> VolumeConfig {
        match self {
            VolumePreset::VoiceFocused => VolumeConfig::new(1.0, 0.5, 0.3),
            VolumePreset::Balanced => VolumeConfig::new(1.0, 0.8, 0.5),
            VolumePreset::Cinematic => VolumeConfig::new(0.9, 1.0, 0.8),
        }
    }

    /// Identifier used in config files and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            VolumePreset::VoiceFocused => "voice-focused",
            VolumePreset::Balanced => "balanced",
            VolumePreset::Cinematic => "cinematic",
        }
    }
}

impl std::fmt::Display for VolumePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VolumePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        VolumePreset::ALL
            .into_iter()
            .find(|preset| preset.name() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown volume preset '{}' (expected voice-focused, balanced or cinematic)",
                    s
                )
            })
    }
}
