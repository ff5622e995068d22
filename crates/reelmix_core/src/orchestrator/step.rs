//! The contract every assembly step fulfils.

use super::errors::StepResult;
use super::types::{Context, JobState, StepOutcome};

/// One phase of an assembly job.
///
/// The pipeline calls `validate_input`, then `execute`, then (only when
/// `execute` reported `Success`) `validate_output`. A step reads what
/// earlier steps left in `JobState`, fills in its own slot and never
/// touches another step's slot. Dropped optional tracks go into
/// `state.degradations` instead of failing the step.
///
/// ```ignore
/// impl PipelineStep for MixStep {
///     fn name(&self) -> &str { "Mix" }
///
///     fn validate_input(&self, _ctx: &Context) -> StepResult<()> { Ok(()) }
///
///     fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
///         let normalized = state.normalized.as_ref().ok_or_else(|| {
///             StepError::precondition_failed("tracks not normalized")
///         })?;
///         state.mix = Some(mix(ctx, normalized)?);
///         Ok(StepOutcome::Success)
///     }
///
///     fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
///         state.has_mix().then_some(()).ok_or_else(|| StepError::invalid_output("no mix"))
///     }
/// }
/// ```
pub trait PipelineStep: Send + Sync {
    /// Short name used in logs, progress reports and `PipelineError::StepFailed`.
    fn name(&self) -> &str;

    /// Check the request and settings this step depends on. Runs before any
    /// work is done, so failures here leave the workspace untouched.
    fn validate_input(&self, ctx: &Context) -> StepResult<()>;

    /// Do the work and record the result in `state`.
    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome>;

    /// Confirm the slot written by `execute` is present and consistent.
    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Line shown next to the step in progress reports.
    fn description(&self) -> &str {
        self.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::errors::StepError;
    use crate::orchestrator::test_support::test_context;
    use crate::orchestrator::types::ScheduleOutput;

    /// Writes a placeholder schedule so `validate_output` has something to check.
    struct StubSchedule {
        write: bool,
    }

    impl PipelineStep for StubSchedule {
        fn name(&self) -> &str {
            "StubSchedule"
        }

        fn validate_input(&self, ctx: &Context) -> StepResult<()> {
            if ctx.request.visuals.is_empty() {
                return Err(StepError::invalid_input("no images"));
            }
            Ok(())
        }

        fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
            if !self.write {
                return Ok(StepOutcome::Skipped("nothing to do".to_string()));
            }
            state.schedule = Some(ScheduleOutput {
                manifest: ctx.work_path("visuals.ffconcat"),
                display_secs: vec![4.0, 4.0],
                estimated_secs: 8.0,
            });
            Ok(StepOutcome::Success)
        }

        fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
            if !state.has_schedule() {
                return Err(StepError::invalid_output("schedule not recorded"));
            }
            Ok(())
        }
    }

    #[test]
    fn description_defaults_to_name() {
        let step: Box<dyn PipelineStep> = Box::new(StubSchedule { write: true });
        assert_eq!(step.description(), "StubSchedule");
    }

    #[test]
    fn step_fills_its_slot() {
        let (_dir, ctx) = test_context();
        let mut state = JobState::new(ctx.job_id);
        let step = StubSchedule { write: true };

        step.validate_input(&ctx).unwrap();
        assert_eq!(step.execute(&ctx, &mut state).unwrap(), StepOutcome::Success);
        step.validate_output(&ctx, &state).unwrap();
    }

    #[test]
    fn skipped_step_leaves_state_alone() {
        let (_dir, ctx) = test_context();
        let mut state = JobState::new(ctx.job_id);
        let step = StubSchedule { write: false };

        let outcome = step.execute(&ctx, &mut state).unwrap();

        assert!(matches!(outcome, StepOutcome::Skipped(_)));
        assert!(step.validate_output(&ctx, &state).is_err());
    }
}
