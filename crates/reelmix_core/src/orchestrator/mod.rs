//! Pipeline orchestrator for coordinating assembly jobs.
//!
//! This module provides the infrastructure for running the assembly
//! pipeline. Each job consists of a sequence of steps that validate,
//! execute, and record their results in a write-once `JobState`.
//!
//! # Architecture
//!
//! ```text
//! Assembler (validation, log file, workspace)
//!     └── Pipeline
//!             ├── Step: Schedule
//!             ├── Step: Fetch
//!             ├── Step: Normalize
//!             ├── Step: Mix
//!             └── Step: Encode
//! ```
//!
//! Optional tracks that fail along the way are dropped and collected in the
//! job's `DegradationReport`; everything else ends the job with a
//! `PipelineError` carrying an `ErrorCategory`.

mod assembler;
mod errors;
mod pipeline;
mod step;
pub mod steps;
mod types;
mod workspace;

#[cfg(test)]
pub(crate) mod test_support;

pub use assembler::{Assembler, JobHooks};
pub use errors::{ErrorCategory, PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use step::PipelineStep;
pub use steps::{EncodeStep, FetchStep, MixStep, NormalizeStep, ScheduleStep};
pub use types::{
    Context, EncodeOutput, JobState, MixOutput, NormalizeOutput, ProgressCallback,
    ScheduleOutput, SourcesOutput, StepOutcome,
};
pub use workspace::JobWorkspace;

/// Create the standard pipeline with all steps in order.
///
/// 1. Schedule - order images, write frames and the concat manifest
/// 2. Fetch - stage the narration, download music and effects
/// 3. Normalize - loudness-normalize every audio source
/// 4. Mix - place and mix tracks, excluding overlays that break the mix
/// 5. Encode - encode, verify and store the video
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(ScheduleStep::new())
        .with_step(FetchStep::new())
        .with_step(NormalizeStep::new())
        .with_step(MixStep::new())
        .with_step(EncodeStep::new())
}
