//! Job results: the packaged video and the record of what was dropped.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::TrackKind;

/// The final packaged video. Only created after verification succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoArtifact {
    /// Job identifier, also the storage key of the file.
    pub id: Uuid,
    /// Where the file was persisted.
    pub path: PathBuf,
    /// Video width in pixels.
    pub width_px: u32,
    /// Video height in pixels.
    pub height_px: u32,
    /// Container duration in seconds.
    pub duration_secs: f64,
}

/// Why an optional track did not make it into the mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The asset could not be downloaded.
    AssetRetrieval,
    /// Normalization failed even with the gain-only pass.
    Normalization,
    /// The mix kept failing while this track was included.
    MixExclusion,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::AssetRetrieval => write!(f, "asset retrieval failed"),
            DropReason::Normalization => write!(f, "normalization failed"),
            DropReason::MixExclusion => write!(f, "excluded from mix"),
        }
    }
}

/// One dropped optional track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    /// Track label (e.g. "music", "effect #2").
    pub track: String,
    /// Track kind.
    pub kind: TrackKind,
    /// Why it was dropped.
    pub reason: DropReason,
    /// Underlying error message.
    pub detail: String,
}

/// Optional tracks lost during a job. Empty for a full-fidelity result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DegradationReport {
    pub dropped: Vec<Degradation>,
}

impl DegradationReport {
    /// Record a dropped track.
    pub fn record(
        &mut self,
        track: impl Into<String>,
        kind: TrackKind,
        reason: DropReason,
        detail: impl Into<String>,
    ) {
        self.dropped.push(Degradation {
            track: track.into(),
            kind,
            reason,
            detail: detail.into(),
        });
    }

    /// Whether every requested track made it into the output.
    pub fn is_empty(&self) -> bool {
        self.dropped.is_empty()
    }

    /// Whether a given track label was dropped.
    pub fn contains(&self, track: &str) -> bool {
        self.dropped.iter().any(|d| d.track == track)
    }
}

/// Successful result of an assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyOutcome {
    /// The verified video.
    pub artifact: VideoArtifact,
    /// Optional tracks that were dropped on the way.
    pub degradations: DegradationReport,
    /// Per-job log file.
    pub log_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_tracks_dropped_labels() {
        let mut report = DegradationReport::default();
        assert!(report.is_empty());

        report.record("music", TrackKind::Music, DropReason::AssetRetrieval, "HTTP 404");

        assert!(!report.is_empty());
        assert!(report.contains("music"));
        assert!(!report.contains("effect #1"));
    }

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&DropReason::MixExclusion).unwrap();
        assert_eq!(json, "\"mix_exclusion\"");
    }
}
