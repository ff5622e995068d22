//! Audio track structure shared by the normalizer and the mixer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::enums::TrackKind;

/// An audio source on its way through the pipeline.
///
/// The same structure describes a raw source (before normalization), a
/// normalized source and the mixer output; only `path` and `duration_secs`
/// change between stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// What this track is.
    pub kind: TrackKind,
    /// Human-readable label for logs and reports (e.g. "effect #2").
    pub label: String,
    /// Audio file inside the job workspace.
    pub path: PathBuf,
    /// Where the content starts on the shared timeline.
    /// Always 0 for voice and music.
    pub start_offset_secs: f64,
    /// Integrated loudness target for normalization.
    pub target_lufs: f64,
    /// Gain applied after normalization.
    pub gain: f64,
    /// Content duration, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl AudioTrack {
    /// Create the narration track.
    pub fn voice(path: impl Into<PathBuf>, target_lufs: f64, gain: f64) -> Self {
        Self {
            kind: TrackKind::Voice,
            label: "voice".to_string(),
            path: path.into(),
            start_offset_secs: 0.0,
            target_lufs,
            gain,
            duration_secs: None,
        }
    }

    /// Create the background music track.
    pub fn music(path: impl Into<PathBuf>, target_lufs: f64, gain: f64) -> Self {
        Self {
            kind: TrackKind::Music,
            label: "music".to_string(),
            path: path.into(),
            start_offset_secs: 0.0,
            target_lufs,
            gain,
            duration_secs: None,
        }
    }

    /// Create a sound effect placed at `start_offset_secs`.
    pub fn effect(
        cue_index: usize,
        path: impl Into<PathBuf>,
        start_offset_secs: f64,
        target_lufs: f64,
        gain: f64,
    ) -> Self {
        Self {
            kind: TrackKind::Effect,
            label: format!("effect #{}", cue_index + 1),
            path: path.into(),
            start_offset_secs,
            target_lufs,
            gain,
            duration_secs: None,
        }
    }

    /// Same track, different file.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Same track, with a known content duration.
    pub fn with_duration(mut self, duration_secs: Option<f64>) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    /// Turn this track into the mixer's output descriptor.
    pub fn into_mixed(mut self, path: impl Into<PathBuf>) -> Self {
        self.kind = TrackKind::Mixed;
        self.label = "mix".to_string();
        self.path = path.into();
        self.start_offset_secs = 0.0;
        self.gain = 1.0;
        self
    }

    /// Whether this track may be dropped without failing the job.
    pub fn is_optional(&self) -> bool {
        self.kind.is_optional()
    }
}
