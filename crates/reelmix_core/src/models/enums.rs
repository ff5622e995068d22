//! Core enums used throughout the pipeline.

use serde::{Deserialize, Serialize};

/// Kind of audio track taking part in a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Narration. Exactly one per job; its duration anchors the output.
    Voice,
    /// Background music (zero or one per job).
    Music,
    /// Short sound effect placed at a timestamp (zero or many).
    Effect,
    /// Output of the mixer.
    Mixed,
}

impl TrackKind {
    /// Whether the job can still succeed without this track.
    pub fn is_optional(&self) -> bool {
        matches!(self, TrackKind::Music | TrackKind::Effect)
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Voice => write!(f, "voice"),
            TrackKind::Music => write!(f, "music"),
            TrackKind::Effect => write!(f, "effect"),
            TrackKind::Mixed => write!(f, "mixed"),
        }
    }
}
