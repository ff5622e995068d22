//! ReelMix Core - media assembly and timed audio mixing pipeline.
//!
//! Turns a voice narration, a set of timestamped still images and optional
//! audio overlays (background music, sound effects) into one synchronized
//! video file. All heavy lifting is delegated to `ffmpeg`/`ffprobe`; this
//! crate owns scheduling, mixing topology, the job workspace and the
//! failure/degradation policy.
//!
//! The entry point is [`orchestrator::Assembler`].

pub mod audio;
pub mod config;
pub mod encode;
pub mod fetch;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod probe;
pub mod process;
pub mod schedule;

pub use models::{AssemblyOutcome, AssemblyRequest, DegradationReport, VideoArtifact};
pub use orchestrator::{Assembler, CancelHandle, ErrorCategory, PipelineError};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
