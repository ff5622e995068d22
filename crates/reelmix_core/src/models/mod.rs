//! Data models for ReelMix.
//!
//! This module contains the core data structures passed between pipeline
//! components:
//! - Enums for track kinds
//! - Visual structures (timed images, schedule entries)
//! - Audio tracks and volume configuration
//! - Job requests and results (artifacts, degradation reports)

mod artifact;
mod enums;
mod request;
mod tracks;
mod visuals;
mod volume;

// Re-export all public types
pub use artifact::{AssemblyOutcome, Degradation, DegradationReport, DropReason, VideoArtifact};
pub use enums::TrackKind;
pub use request::{AssemblyRequest, EffectCue, NarrationInput, VisualInput};
pub use tracks::AudioTrack;
pub use visuals::{ScheduleEntry, TimedVisual, MIN_DISPLAY_SECS};
pub use volume::{VolumeConfig, VolumePreset};
