//! Schedule step - orders the images, writes them and the concat manifest.

use crate::models::{ScheduleEntry, VisualInput};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, ScheduleOutput, StepOutcome};
use crate::schedule::{
    build_schedule, check_images, estimated_duration, sniff_extension, synthesize_timestamps,
    write_frames, write_manifest, ScheduleError,
};

/// File name of the concat manifest inside the workspace.
pub const MANIFEST_NAME: &str = "visuals.ffconcat";

/// Builds the visual schedule.
pub struct ScheduleStep;

impl ScheduleStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScheduleStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn the request's visuals into schedule entries.
///
/// Untimed images are spaced over their own total duration. The terminal
/// image of either mode holds at least until the narration ends, so the
/// final mux (not the schedule) decides the visible length.
pub fn schedule_for(visuals: &VisualInput, narration_secs: f64) -> Result<Vec<ScheduleEntry>, ScheduleError> {
    let entries = match visuals {
        VisualInput::Timed(pairs) => build_schedule(pairs.clone(), narration_secs)?,
        VisualInput::Untimed {
            images,
            total_duration_secs,
        } => {
            let pairs = synthesize_timestamps(images.clone(), *total_duration_secs)?;
            build_schedule(pairs, total_duration_secs.max(narration_secs))?
        }
    };
    check_images(&entries)?;
    Ok(entries)
}

/// Cheap input checks, run before a workspace exists.
pub fn preflight_visuals(visuals: &VisualInput) -> Result<(), ScheduleError> {
    match visuals {
        VisualInput::Timed(pairs) => {
            if pairs.is_empty() {
                return Err(ScheduleError::NoVisuals);
            }
            for (index, (timestamp, bytes)) in pairs.iter().enumerate() {
                if !timestamp.is_finite() || *timestamp < 0.0 {
                    return Err(ScheduleError::InvalidTimestamp {
                        index,
                        value: *timestamp,
                    });
                }
                if sniff_extension(bytes).is_none() {
                    return Err(ScheduleError::UnrecognizedImage { index });
                }
            }
        }
        VisualInput::Untimed {
            images,
            total_duration_secs,
        } => {
            if images.is_empty() {
                return Err(ScheduleError::NoVisuals);
            }
            if !total_duration_secs.is_finite() || *total_duration_secs <= 0.0 {
                return Err(ScheduleError::InvalidDuration(*total_duration_secs));
            }
            if let Some(index) = images.iter().position(|b| sniff_extension(b).is_none()) {
                return Err(ScheduleError::UnrecognizedImage { index });
            }
        }
    }
    Ok(())
}

impl PipelineStep for ScheduleStep {
    fn name(&self) -> &str {
        "Schedule"
    }

    fn description(&self) -> &str {
        "Build the image display schedule"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        ctx.request.validate().map_err(StepError::invalid_input)?;
        preflight_visuals(&ctx.request.visuals)?;
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let entries = schedule_for(&ctx.request.visuals, ctx.narration_secs())?;

        for entry in &entries {
            ctx.logger.debug(&format!(
                "#{} at {:.3}s for {:.3}s{}",
                entry.visual.sequence_index,
                entry.visual.timestamp_secs,
                entry.display_secs,
                if entry.is_terminal { " (terminal)" } else { "" }
            ));
        }

        let frames = write_frames(&entries, &ctx.work_path("frames"))?;
        let manifest = ctx.work_path(MANIFEST_NAME);
        write_manifest(&frames, &manifest, ctx.settings.encode.terminal_hold_secs)?;

        let estimated_secs = estimated_duration(&entries);
        ctx.logger.info(&format!(
            "{} image(s), estimated {:.2}s against {:.2}s of narration",
            entries.len(),
            estimated_secs,
            ctx.narration_secs()
        ));

        state.schedule = Some(ScheduleOutput {
            manifest,
            display_secs: entries.iter().map(|e| e.display_secs).collect(),
            estimated_secs,
        });

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let schedule = state
            .schedule
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Schedule not recorded"))?;
        if !schedule.manifest.is_file() {
            return Err(StepError::invalid_output(format!(
                "manifest missing: {}",
                schedule.manifest.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_support::{png, test_context_with};
    use crate::models::{AssemblyRequest, NarrationInput};

    #[test]
    fn preflight_rejects_bad_inputs() {
        assert!(matches!(
            preflight_visuals(&VisualInput::Timed(Vec::new())),
            Err(ScheduleError::NoVisuals)
        ));
        assert!(matches!(
            preflight_visuals(&VisualInput::Timed(vec![(0.0, png(1)), (f64::NAN, png(2))])),
            Err(ScheduleError::InvalidTimestamp { index: 1, .. })
        ));
        assert!(matches!(
            preflight_visuals(&VisualInput::Timed(vec![(0.0, b"not an image".to_vec())])),
            Err(ScheduleError::UnrecognizedImage { index: 0 })
        ));
        assert!(preflight_visuals(&VisualInput::Timed(vec![(0.0, png(1))])).is_ok());
    }

    #[test]
    fn untimed_visuals_spread_evenly() {
        let visuals = VisualInput::Untimed {
            images: vec![png(1), png(2), png(3), png(4)],
            total_duration_secs: 8.0,
        };
        let entries = schedule_for(&visuals, 8.0).unwrap();
        let displays: Vec<f64> = entries.iter().map(|e| e.display_secs).collect();
        assert_eq!(displays, vec![2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn short_untimed_visuals_hold_until_narration_ends() {
        let visuals = VisualInput::Untimed {
            images: vec![png(1), png(2)],
            total_duration_secs: 4.0,
        };

        let entries = schedule_for(&visuals, 10.0).unwrap();

        let displays: Vec<f64> = entries.iter().map(|e| e.display_secs).collect();
        assert_eq!(displays, vec![2.0, 8.0]);
        assert!(estimated_duration(&entries) >= 10.0);
    }

    #[test]
    fn long_untimed_visuals_keep_their_spacing() {
        let visuals = VisualInput::Untimed {
            images: vec![png(1), png(2)],
            total_duration_secs: 12.0,
        };

        let entries = schedule_for(&visuals, 10.0).unwrap();

        let displays: Vec<f64> = entries.iter().map(|e| e.display_secs).collect();
        assert_eq!(displays, vec![6.0, 6.0]);
    }

    #[test]
    fn writes_frames_and_manifest() {
        let request = AssemblyRequest::new(
            NarrationInput::new(vec![1], 10.0),
            VisualInput::Timed(vec![(6.0, png(3)), (0.0, png(1)), (3.0, png(2))]),
        );
        let (_dir, ctx) = test_context_with(request);
        let mut state = JobState::new(ctx.job_id);
        let step = ScheduleStep::new();

        step.validate_input(&ctx).unwrap();
        assert_eq!(step.execute(&ctx, &mut state).unwrap(), StepOutcome::Success);
        step.validate_output(&ctx, &state).unwrap();

        let schedule = state.schedule.unwrap();
        assert_eq!(schedule.display_secs, vec![3.0, 3.0, 4.0]);
        let text = std::fs::read_to_string(&schedule.manifest).unwrap();
        assert!(text.starts_with("ffconcat version 1.0\n"));
        assert!(text.contains("file 'frames/frame_0000.png'"));
        assert!(ctx.work_path("frames/frame_0002.png").is_file());
    }
}
