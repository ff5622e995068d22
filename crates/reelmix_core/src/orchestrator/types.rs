//! Core types for the orchestrator pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Settings;
use crate::fetch::AssetFetcher;
use crate::logging::JobLogger;
use crate::models::{AssemblyRequest, AudioTrack, DegradationReport, VideoArtifact};
use crate::process::{MediaRunner, SystemRunner};

use super::pipeline::CancelHandle;

/// Progress callback type for reporting pipeline progress.
///
/// Arguments: (step_name, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// Read-only context passed to pipeline steps.
///
/// Contains the request and shared resources that steps can read
/// but not modify. Mutable state goes in `JobState`.
pub struct Context {
    /// What to assemble.
    pub request: AssemblyRequest,
    /// Application settings.
    pub settings: Settings,
    /// Job identifier; also the artifact id.
    pub job_id: Uuid,
    /// Job workspace (under temp_root), exclusive to this job.
    pub work_dir: PathBuf,
    /// Where the verified artifact is stored.
    pub output_dir: PathBuf,
    /// Per-job logger.
    pub logger: Arc<JobLogger>,
    /// Runs ffmpeg and ffprobe.
    pub runner: Arc<dyn MediaRunner>,
    /// Retrieves optional assets. `None` uses an HTTP fetcher built from
    /// the fetch settings.
    pub fetcher: Option<Arc<dyn AssetFetcher>>,
    /// Cancellation flag for this job.
    pub cancel: CancelHandle,
    /// Optional progress callback.
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    /// Create a new context for a job.
    pub fn new(
        request: AssemblyRequest,
        settings: Settings,
        job_id: Uuid,
        work_dir: PathBuf,
        output_dir: PathBuf,
        logger: Arc<JobLogger>,
    ) -> Self {
        Self {
            request,
            settings,
            job_id,
            work_dir,
            output_dir,
            logger,
            runner: Arc::new(SystemRunner::new()),
            fetcher: None,
            cancel: CancelHandle::new(),
            progress_callback: None,
        }
    }

    /// Use a different process runner.
    pub fn with_runner(mut self, runner: Arc<dyn MediaRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Use a different asset fetcher.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Share a cancellation handle with the caller.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set the progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Report progress to callback (if set).
    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }

    /// Narration length, the anchor of every duration in the job.
    pub fn narration_secs(&self) -> f64 {
        self.request.narration.duration_secs
    }

    /// Path of a file inside the workspace.
    pub fn work_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.work_dir.join(relative)
    }
}

/// Mutable job state that accumulates results from pipeline steps.
///
/// This is the "write-once manifest" - steps can add new data but
/// should not overwrite existing values. Each step's output is stored
/// in its own section. Degradations are the one exception: every step
/// appends to the same report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    /// Unique job identifier.
    pub job_id: Uuid,
    /// When the job started.
    pub started_at: Option<String>,
    /// Visual schedule (from Schedule step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleOutput>,
    /// Raw audio sources (from Fetch step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<SourcesOutput>,
    /// Normalized tracks (from Normalize step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<NormalizeOutput>,
    /// Mixed audio (from Mix step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mix: Option<MixOutput>,
    /// Verified and persisted video (from Encode step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encode: Option<EncodeOutput>,
    /// Optional tracks dropped so far.
    #[serde(default)]
    pub degradations: DegradationReport,
}

impl JobState {
    /// Create a new job state with the given ID.
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            started_at: Some(chrono::Local::now().to_rfc3339()),
            schedule: None,
            sources: None,
            normalized: None,
            mix: None,
            encode: None,
            degradations: DegradationReport::default(),
        }
    }

    pub fn has_schedule(&self) -> bool {
        self.schedule.is_some()
    }

    pub fn has_sources(&self) -> bool {
        self.sources.is_some()
    }

    pub fn has_normalized(&self) -> bool {
        self.normalized.is_some()
    }

    pub fn has_mix(&self) -> bool {
        self.mix.is_some()
    }

    /// The final artifact, once the Encode step has run.
    pub fn artifact(&self) -> Option<&VideoArtifact> {
        self.encode.as_ref().map(|e| &e.artifact)
    }
}

/// Output from the Schedule step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutput {
    /// Concat manifest for the encoder.
    pub manifest: PathBuf,
    /// Display durations in sequence order.
    pub display_secs: Vec<f64>,
    /// Sum of display durations (an estimate; the mux trims to the voice).
    pub estimated_secs: f64,
}

/// Output from the Fetch step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesOutput {
    /// Narration written into the workspace.
    pub voice: AudioTrack,
    /// Music and effects that were retrieved, in request order.
    pub overlays: Vec<AudioTrack>,
}

/// Output from the Normalize step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeOutput {
    pub voice: AudioTrack,
    /// Overlays that survived normalization.
    pub overlays: Vec<AudioTrack>,
    /// Labels of tracks that only got the gain-only pass.
    pub gain_only: Vec<String>,
}

/// Output from the Mix step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixOutput {
    /// The `Mixed` track.
    pub track: AudioTrack,
    /// Labels of overlays in the final mix.
    pub included: Vec<String>,
    /// ffmpeg runs performed.
    pub attempts: usize,
}

/// Output from the Encode step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeOutput {
    pub artifact: VideoArtifact,
    /// Encoder command line that produced it.
    pub command: String,
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step was skipped (preconditions not met, but not an error).
    Skipped(String),
}
