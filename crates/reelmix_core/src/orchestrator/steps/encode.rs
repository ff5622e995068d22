//! Encode step - packages visuals and mixed audio, verifies, persists.

use crate::encode::{persist, Encoder};
use crate::models::VideoArtifact;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, EncodeOutput, JobState, StepOutcome};

/// Name of the encode inside the workspace, before verification.
const WORK_OUTPUT: &str = "encoded.mp4";

/// Runs the final encode. Nothing reaches the output folder unless the
/// probe of the encoded file passed.
pub struct EncodeStep;

impl EncodeStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EncodeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for EncodeStep {
    fn name(&self) -> &str {
        "Encode"
    }

    fn description(&self) -> &str {
        "Encode, verify and store the video"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        std::fs::create_dir_all(&ctx.output_dir)
            .map_err(|e| StepError::io_error("creating output directory", e))
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let manifest = state
            .schedule
            .as_ref()
            .map(|s| s.manifest.clone())
            .ok_or_else(|| StepError::precondition_failed("no visual schedule"))?;
        let audio = state
            .mix
            .as_ref()
            .map(|m| m.track.path.clone())
            .ok_or_else(|| StepError::precondition_failed("no mixed audio"))?;

        let settings = &ctx.settings;
        let work_output = ctx.work_path(WORK_OUTPUT);
        let encoder = Encoder::new(
            ctx.runner.as_ref(),
            &settings.paths,
            &settings.encode,
            &settings.audio,
        );
        let encoded = encoder.encode(
            &manifest,
            &audio,
            &work_output,
            ctx.narration_secs(),
            &ctx.cancel,
            &ctx.logger,
        )?;

        let path = persist(&encoded.path, &ctx.output_dir, &ctx.job_id.to_string())?;
        ctx.logger.info(&format!("Output: {}", path.display()));

        state.encode = Some(EncodeOutput {
            artifact: VideoArtifact {
                id: ctx.job_id,
                path,
                width_px: encoded.media.width_px,
                height_px: encoded.media.height_px,
                duration_secs: encoded.media.duration_secs,
            },
            command: encoded.command,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let artifact = state
            .artifact()
            .ok_or_else(|| StepError::invalid_output("Artifact not recorded"))?;
        if !artifact.path.is_file() {
            return Err(StepError::invalid_output(format!(
                "artifact missing: {}",
                artifact.path.display()
            )));
        }
        Ok(())
    }
}
