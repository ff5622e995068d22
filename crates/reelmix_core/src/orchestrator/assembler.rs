//! Entry point for running one assembly job.
//!
//! The `Assembler` validates the request, prepares the job's log file and
//! workspace, runs the standard pipeline and turns its final state into an
//! [`AssemblyOutcome`].

use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::Settings;
use crate::fetch::AssetFetcher;
use crate::logging::{JobLogger, LogCallback, LogConfig};
use crate::models::{AssemblyOutcome, AssemblyRequest};
use crate::process::{MediaRunner, SystemRunner};

use super::errors::{PipelineError, PipelineResult, StepError};
use super::pipeline::CancelHandle;
use super::steps::preflight_visuals;
use super::types::{Context, JobState, ProgressCallback};
use super::workspace::JobWorkspace;
use super::create_standard_pipeline;

/// Per-job hooks for callers that want to watch or stop a job.
#[derive(Default)]
pub struct JobHooks {
    /// Stops the job at the next step boundary and kills running tools.
    pub cancel: CancelHandle,
    /// Receives every formatted log line.
    pub log_callback: Option<LogCallback>,
    /// Receives step progress.
    pub progress_callback: Option<ProgressCallback>,
}

/// Runs assembly jobs with one set of settings and tools.
///
/// # Example
///
/// ```ignore
/// let assembler = Assembler::new(settings);
/// let outcome = assembler.assemble(request)?;
/// println!("{}", outcome.artifact.path.display());
/// ```
pub struct Assembler {
    settings: Settings,
    runner: Arc<dyn MediaRunner>,
    fetcher: Option<Arc<dyn AssetFetcher>>,
}

impl Assembler {
    /// Assembler using real ffmpeg/ffprobe processes and HTTP downloads.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            runner: Arc::new(SystemRunner::new()),
            fetcher: None,
        }
    }

    /// Replace the process runner.
    pub fn with_runner(mut self, runner: Arc<dyn MediaRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replace the asset fetcher.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Assemble one video.
    pub fn assemble(&self, request: AssemblyRequest) -> PipelineResult<AssemblyOutcome> {
        self.assemble_with(request, JobHooks::default())
    }

    /// Assemble one video, cancellable through `cancel`.
    pub fn assemble_with_cancel(
        &self,
        request: AssemblyRequest,
        cancel: CancelHandle,
    ) -> PipelineResult<AssemblyOutcome> {
        self.assemble_with(
            request,
            JobHooks {
                cancel,
                ..JobHooks::default()
            },
        )
    }

    /// Assemble one video with callbacks and a cancellation handle.
    ///
    /// The request is rejected before anything touches the disk if it is
    /// invalid. The workspace is released on every exit path.
    pub fn assemble_with(
        &self,
        request: AssemblyRequest,
        hooks: JobHooks,
    ) -> PipelineResult<AssemblyOutcome> {
        let job_id = Uuid::new_v4();
        let job_name = job_id.to_string();

        self.settings
            .validate()
            .map_err(|e| PipelineError::setup_failed(&job_name, format!("invalid settings: {}", e)))?;
        request
            .validate()
            .map_err(|e| PipelineError::validation_failed(&job_name, e))?;
        preflight_visuals(&request.visuals)
            .map_err(|e| PipelineError::validation_failed(&job_name, e.to_string()))?;

        if hooks.cancel.is_cancelled() {
            return Err(PipelineError::cancelled(&job_name));
        }

        let paths = &self.settings.paths;
        let output_dir = PathBuf::from(&paths.output_folder);
        std::fs::create_dir_all(&output_dir).map_err(|e| {
            PipelineError::setup_failed(
                &job_name,
                format!("cannot create output folder {}: {}", output_dir.display(), e),
            )
        })?;

        let logger = JobLogger::new(
            &job_name,
            &paths.logs_folder,
            LogConfig::from(&self.settings.logging),
            hooks.log_callback,
        )
        .map(Arc::new)
        .map_err(|e| PipelineError::setup_failed(&job_name, format!("cannot create job log: {}", e)))?;

        let workspace = JobWorkspace::create(&paths.temp_root, job_id, paths.keep_workspace)
            .map_err(|e| {
                PipelineError::setup_failed(&job_name, format!("cannot create workspace: {}", e))
            })?;

        logger.info(&format!("Starting job {}", job_name));
        logger.info(&format!(
            "Narration {:.2}s, {} image(s), {} optional track(s)",
            request.narration.duration_secs,
            request.visuals.len(),
            request.optional_track_count()
        ));
        logger.debug(&format!("Workspace: {}", workspace.path().display()));

        let mut ctx = Context::new(
            request,
            self.settings.clone(),
            job_id,
            workspace.path().to_path_buf(),
            output_dir,
            Arc::clone(&logger),
        )
        .with_runner(Arc::clone(&self.runner))
        .with_cancel_handle(hooks.cancel);
        if let Some(fetcher) = &self.fetcher {
            ctx = ctx.with_fetcher(Arc::clone(fetcher));
        }
        if let Some(callback) = hooks.progress_callback {
            ctx = ctx.with_progress_callback(callback);
        }

        let mut state = JobState::new(job_id);
        let pipeline = create_standard_pipeline();

        let result = pipeline.run(&ctx, &mut state).and_then(|run| {
            if let Some((step, took)) = run.slowest_step() {
                logger.debug(&format!(
                    "Pipeline took {:.1}s (slowest: {} {:.1}s)",
                    run.elapsed.as_secs_f64(),
                    step,
                    took.as_secs_f64()
                ));
            }
            let artifact = state.artifact().cloned().ok_or_else(|| {
                PipelineError::step_failed(
                    &job_name,
                    "Encode",
                    StepError::invalid_output("no artifact recorded"),
                )
            })?;
            Ok(AssemblyOutcome {
                artifact,
                degradations: state.degradations.clone(),
                log_path: logger.log_path().to_path_buf(),
            })
        });

        match &result {
            Ok(outcome) => {
                for dropped in &outcome.degradations.dropped {
                    logger.warn(&format!(
                        "Delivered without {} ({})",
                        dropped.track, dropped.reason
                    ));
                }
                logger.success(&format!("Job completed: {}", outcome.artifact.path.display()));
            }
            Err(e) => logger.error(&format!("Job failed [{}]: {}", e.category(), e)),
        }

        if workspace.is_kept() {
            logger.info(&format!("Workspace kept at {}", workspace.path().display()));
        }
        drop(ctx);
        drop(workspace);
        logger.flush();
        result
    }
}
