//! Error types for the orchestrator pipeline.
//!
//! Errors carry context that chains through layers:
//! Job → Step → Component → Detail

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::{MixError, NormalizeError};
use crate::encode::EncodeError;
use crate::fetch::FetchError;
use crate::probe::ProbeError;
use crate::process::ProcessError;
use crate::schedule::ScheduleError;

/// Failure taxonomy reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing visuals or voice, invalid timestamps, bad gains.
    InputValidation,
    /// An asset could not be fetched.
    AssetRetrieval,
    /// Normalization failed after the gain-only fallback.
    Normalization,
    /// The mix could not be produced.
    Mix,
    /// Encoder exit or verification failure.
    Encode,
    /// An external call exceeded its allotment.
    Timeout,
    /// Cancellation was requested.
    Cancelled,
    /// Workspace, log or output directory could not be prepared.
    Setup,
    /// Anything else.
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::InputValidation => "input validation",
            ErrorCategory::AssetRetrieval => "asset retrieval",
            ErrorCategory::Normalization => "normalization",
            ErrorCategory::Mix => "mix",
            ErrorCategory::Encode => "encode",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Setup => "setup",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Top-level pipeline error with job context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed during execution.
    #[error("Job '{job_id}' failed at step '{step_name}': {source}")]
    StepFailed {
        job_id: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// The request was rejected before any processing.
    #[error("Job '{job_id}' failed validation: {message}")]
    ValidationFailed { job_id: String, message: String },

    /// Pipeline was cancelled.
    #[error("Job '{job_id}' was cancelled")]
    Cancelled { job_id: String },

    /// Failed to set up the job (directories, log file, workspace).
    #[error("Job '{job_id}' setup failed: {message}")]
    SetupFailed { job_id: String, message: String },
}

impl PipelineError {
    /// Create a step failed error.
    pub fn step_failed(
        job_id: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            job_id: job_id.into(),
            step_name: step_name.into(),
            source,
        }
    }

    /// Create a validation failed error.
    pub fn validation_failed(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Create a setup failed error.
    pub fn setup_failed(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(job_id: impl Into<String>) -> Self {
        Self::Cancelled {
            job_id: job_id.into(),
        }
    }

    /// Which part of the taxonomy this failure belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::StepFailed { source, .. } => source.category(),
            PipelineError::ValidationFailed { .. } => ErrorCategory::InputValidation,
            PipelineError::Cancelled { .. } => ErrorCategory::Cancelled,
            PipelineError::SetupFailed { .. } => ErrorCategory::Setup,
        }
    }

    /// Job identifier the error belongs to.
    pub fn job_id(&self) -> &str {
        match self {
            PipelineError::StepFailed { job_id, .. }
            | PipelineError::ValidationFailed { job_id, .. }
            | PipelineError::Cancelled { job_id }
            | PipelineError::SetupFailed { job_id, .. } => job_id,
        }
    }
}

/// Error from a pipeline step with component context.
#[derive(Error, Debug)]
pub enum StepError {
    /// Input validation failed.
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// Output validation failed.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// Visual schedule could not be built or written.
    #[error("Schedule: {0}")]
    Schedule(#[from] ScheduleError),

    /// A fatal asset retrieval error (timeout, cancellation).
    #[error("Fetch: {0}")]
    Fetch(#[from] FetchError),

    /// Voice normalization failed, or any normalization was interrupted.
    #[error("Normalize: {0}")]
    Normalize(#[from] NormalizeError),

    /// Probing an intermediate file was interrupted.
    #[error("Probe: {0}")]
    Probe(#[from] ProbeError),

    /// The mixer was interrupted.
    #[error("Mix: {0}")]
    Mix(#[from] MixError),

    /// Encode or verification failed.
    #[error("Encode: {0}")]
    Encode(#[from] EncodeError),

    /// An external command failed outside a component.
    #[error("{0}")]
    Process(#[from] ProcessError),

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// A precondition was not met.
    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),
}

impl StepError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    /// Create an I/O error with context.
    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    /// Create a precondition failed error.
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    /// Which part of the taxonomy this failure belongs to.
    ///
    /// Timeouts and cancellation win over the component that saw them.
    pub fn category(&self) -> ErrorCategory {
        match self {
            StepError::InvalidInput(_) => ErrorCategory::InputValidation,
            StepError::Schedule(e) if e.is_input_error() => ErrorCategory::InputValidation,
            StepError::Schedule(_) | StepError::IoError { .. } => ErrorCategory::Setup,
            StepError::Fetch(FetchError::TimedOut { .. }) => ErrorCategory::Timeout,
            StepError::Fetch(FetchError::Cancelled { .. }) => ErrorCategory::Cancelled,
            StepError::Fetch(_) => ErrorCategory::AssetRetrieval,
            StepError::Normalize(e) => interrupted(e.is_timeout(), e.is_cancelled())
                .unwrap_or(ErrorCategory::Normalization),
            StepError::Mix(e) => {
                interrupted(e.is_timeout(), e.is_cancelled()).unwrap_or(ErrorCategory::Mix)
            }
            StepError::Encode(e) => {
                interrupted(e.is_timeout(), e.is_cancelled()).unwrap_or(ErrorCategory::Encode)
            }
            StepError::Probe(ProbeError::Process(e)) | StepError::Process(e) => {
                interrupted(e.is_timeout(), e.is_cancelled()).unwrap_or(ErrorCategory::Internal)
            }
            StepError::Probe(_)
            | StepError::InvalidOutput(_)
            | StepError::PreconditionFailed(_) => ErrorCategory::Internal,
        }
    }
}

fn interrupted(timeout: bool, cancelled: bool) -> Option<ErrorCategory> {
    if timeout {
        Some(ErrorCategory::Timeout)
    } else if cancelled {
        Some(ErrorCategory::Cancelled)
    } else {
        None
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
