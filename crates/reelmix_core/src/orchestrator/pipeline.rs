//! Sequential step runner and the job cancellation flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::errors::{ErrorCategory, PipelineError, PipelineResult, StepError};
use super::step::PipelineStep;
use super::types::{Context, JobState, StepOutcome};

/// An ordered list of steps run one after another on a single thread.
///
/// There is no retry at this level: recoverable trouble (a missing music
/// file, a mix input ffmpeg rejects) is handled inside the step that owns
/// it, so any error reaching the pipeline ends the job.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Run every step against `state`.
    ///
    /// The cancel flag is checked before each step; a step that fails
    /// because the flag was raised mid-run (a killed ffmpeg, an aborted
    /// download) is reported as `PipelineError::Cancelled` rather than as a
    /// step failure.
    pub fn run(&self, ctx: &Context, state: &mut JobState) -> PipelineResult<PipelineRunResult> {
        let job_id = ctx.job_id.to_string();
        let started = Instant::now();
        let mut result = PipelineRunResult::default();

        for (index, step) in self.steps.iter().enumerate() {
            let name = step.name();
            if ctx.cancel.is_cancelled() {
                ctx.logger.warn(&format!("Cancelled before {}", name));
                return Err(PipelineError::cancelled(&job_id));
            }

            ctx.logger.stage(name);
            let percent = (index * 100 / self.steps.len()) as u32;
            ctx.report_progress(name, percent, step.description());

            let step_started = Instant::now();
            let outcome = run_step(step.as_ref(), ctx, state).map_err(|e| {
                if e.category() == ErrorCategory::Cancelled {
                    ctx.logger.warn(&format!("Cancelled during {}", name));
                    PipelineError::cancelled(&job_id)
                } else {
                    ctx.logger.error(&format!("{} failed: {}", name, e));
                    PipelineError::step_failed(&job_id, name, e)
                }
            })?;
            let elapsed = step_started.elapsed();

            match outcome {
                StepOutcome::Success => {
                    ctx.logger
                        .success(&format!("{} done in {:.1}s", name, elapsed.as_secs_f64()));
                }
                StepOutcome::Skipped(reason) => {
                    ctx.logger.info(&format!("{} skipped: {}", name, reason));
                    result.skipped.push(name.to_string());
                }
            }
            result.timings.push((name.to_string(), elapsed));
        }

        result.elapsed = started.elapsed();
        ctx.report_progress("Complete", 100, "Video assembled");
        Ok(result)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

fn run_step(
    step: &dyn PipelineStep,
    ctx: &Context,
    state: &mut JobState,
) -> Result<StepOutcome, StepError> {
    ctx.logger.debug(&format!("{}: checking inputs", step.name()));
    step.validate_input(ctx)?;
    let outcome = step.execute(ctx, state)?;
    if outcome == StepOutcome::Success {
        ctx.logger.debug(&format!("{}: checking outputs", step.name()));
        step.validate_output(ctx, state)?;
    }
    Ok(outcome)
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation flag shared between a job and whoever wants to stop it.
///
/// Clones share one flag. The pipeline stops at the next step boundary and
/// the process runner kills any running tool.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What a finished pipeline run did.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunResult {
    /// Wall-clock time per step, in run order (skipped steps included).
    pub timings: Vec<(String, Duration)>,
    /// Steps that reported `Skipped`.
    pub skipped: Vec<String>,
    /// Whole run.
    pub elapsed: Duration,
}

impl PipelineRunResult {
    /// The step that took longest, if any ran.
    pub fn slowest_step(&self) -> Option<(&str, Duration)> {
        self.timings
            .iter()
            .max_by_key(|(_, d)| *d)
            .map(|(name, d)| (name.as_str(), *d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_support::test_context;
    use crate::process::ProcessError;
    use std::sync::atomic::AtomicUsize;

    struct CountingStep {
        name: &'static str,
        runs: Arc<AtomicUsize>,
        skip: bool,
        bad_output: bool,
    }

    impl CountingStep {
        fn new(name: &'static str, runs: &Arc<AtomicUsize>) -> Self {
            Self {
                name,
                runs: Arc::clone(runs),
                skip: false,
                bad_output: false,
            }
        }
    }

    impl PipelineStep for CountingStep {
        fn name(&self) -> &str {
            self.name
        }

        fn validate_input(&self, _ctx: &Context) -> Result<(), StepError> {
            Ok(())
        }

        fn execute(&self, _ctx: &Context, _state: &mut JobState) -> Result<StepOutcome, StepError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.skip {
                Ok(StepOutcome::Skipped("nothing to do".to_string()))
            } else {
                Ok(StepOutcome::Success)
            }
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> Result<(), StepError> {
            if self.bad_output {
                return Err(StepError::invalid_output("nothing recorded"));
            }
            Ok(())
        }
    }

    /// Raises the cancel flag and fails the way a killed ffmpeg would.
    struct CancellingStep;

    impl PipelineStep for CancellingStep {
        fn name(&self) -> &str {
            "Cancelling"
        }

        fn validate_input(&self, _ctx: &Context) -> Result<(), StepError> {
            Ok(())
        }

        fn execute(&self, ctx: &Context, _state: &mut JobState) -> Result<StepOutcome, StepError> {
            ctx.cancel.cancel();
            Err(StepError::Process(ProcessError::Cancelled {
                program: "ffmpeg".into(),
            }))
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> Result<(), StepError> {
            Ok(())
        }
    }

    #[test]
    fn builder_keeps_order() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut pipeline = Pipeline::new().with_step(CountingStep::new("Schedule", &runs));
        pipeline.add_step(CountingStep::new("Encode", &runs));

        assert_eq!(pipeline.step_count(), 2);
        assert_eq!(pipeline.step_names(), vec!["Schedule", "Encode"]);
    }

    #[test]
    fn runs_every_step_and_times_it() {
        let (_dir, ctx) = test_context();
        let runs = Arc::new(AtomicUsize::new(0));
        let mut skipping = CountingStep::new("Mix", &runs);
        skipping.skip = true;
        let pipeline = Pipeline::new()
            .with_step(CountingStep::new("Normalize", &runs))
            .with_step(skipping);

        let mut state = JobState::new(ctx.job_id);
        let result = pipeline.run(&ctx, &mut state).unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(result.skipped, vec!["Mix"]);
        let names: Vec<&str> = result.timings.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Normalize", "Mix"]);
        assert!(result.slowest_step().is_some());
    }

    #[test]
    fn failed_output_check_names_the_step() {
        let (_dir, ctx) = test_context();
        let runs = Arc::new(AtomicUsize::new(0));
        let mut broken = CountingStep::new("Encode", &runs);
        broken.bad_output = true;
        let pipeline = Pipeline::new()
            .with_step(broken)
            .with_step(CountingStep::new("After", &runs));

        let mut state = JobState::new(ctx.job_id);
        let err = pipeline.run(&ctx, &mut state).unwrap_err();

        match err {
            PipelineError::StepFailed { step_name, .. } => assert_eq!(step_name, "Encode"),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stops_before_first_step_when_cancelled() {
        let (_dir, ctx) = test_context();
        let runs = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new().with_step(CountingStep::new("Schedule", &runs));

        ctx.cancel.cancel();
        let mut state = JobState::new(ctx.job_id);
        let err = pipeline.run(&ctx, &mut state).unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled { .. }));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelled_step_reports_cancellation() {
        let (_dir, ctx) = test_context();
        let runs = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(CancellingStep)
            .with_step(CountingStep::new("After", &runs));

        let mut state = JobState::new(ctx.job_id);
        let err = pipeline.run(&ctx, &mut state).unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Cancelled);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_handle_clones_share_flag() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_cancelled());

        handle.cancel();

        assert!(clone.is_cancelled());
    }
}
