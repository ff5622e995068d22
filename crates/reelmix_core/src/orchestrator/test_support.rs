//! Fixtures shared by the orchestrator unit tests.

use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::{tempdir, TempDir};
use uuid::Uuid;

use crate::config::Settings;
use crate::logging::{JobLogger, LogConfig};
use crate::models::{AssemblyRequest, NarrationInput, VisualInput};
use crate::process::{Invocation, MediaRunner, ProcessError, ProcessOutput};

use super::pipeline::CancelHandle;
use super::types::Context;

/// PNG signature followed by a tag byte; enough for format sniffing.
pub fn png(tag: u8) -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, tag]
}

/// Context for an 8s narration over images at 0s and 4s.
pub fn test_context() -> (TempDir, Context) {
    test_context_with(AssemblyRequest::new(
        NarrationInput::new(vec![1, 2, 3], 8.0),
        VisualInput::Timed(vec![(0.0, png(1)), (4.0, png(2))]),
    ))
}

pub fn test_context_with(request: AssemblyRequest) -> (TempDir, Context) {
    let dir = tempdir().unwrap();
    let work_dir = dir.path().join("work");
    fs::create_dir_all(work_dir.join("audio")).unwrap();

    let logger = JobLogger::new("test", dir.path().join("logs"), LogConfig::default(), None).unwrap();
    let ctx = Context::new(
        request,
        Settings::default(),
        Uuid::new_v4(),
        work_dir,
        dir.path().join("out"),
        Arc::new(logger),
    )
    .with_runner(Arc::new(FakeRunner::new()));
    (dir, ctx)
}

/// Stand-in for ffmpeg/ffprobe.
///
/// ffmpeg runs write a placeholder to their output path; ffprobe runs
/// answer with a 1920x1080 video + audio document. Any run with an argument
/// containing a `fail_when` pattern exits with code 1.
pub struct FakeRunner {
    fail_patterns: Vec<&'static str>,
    width: u32,
    height: u32,
    duration: f64,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            fail_patterns: Vec::new(),
            width: 1920,
            height: 1080,
            duration: 8.0,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_when(mut self, pattern: &'static str) -> Self {
        self.fail_patterns.push(pattern);
        self
    }

    pub fn with_probe_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_probe_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }
}

impl MediaRunner for FakeRunner {
    fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancelHandle,
        _logger: &JobLogger,
    ) -> Result<ProcessOutput, ProcessError> {
        self.calls.lock().push(invocation.clone());
        let tool = invocation.tool_name().to_string();

        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled { program: tool });
        }
        if invocation
            .args
            .iter()
            .any(|a| self.fail_patterns.iter().any(|p| a.contains(p)))
        {
            return Err(ProcessError::failed(tool, Some(1), "Invalid data found"));
        }

        if tool == "ffprobe" {
            let stdout = format!(
                r#"{{"streams": [
                    {{"index": 0, "codec_type": "video", "codec_name": "h264", "width": {}, "height": {}}},
                    {{"index": 1, "codec_type": "audio", "codec_name": "aac"}}
                ], "format": {{"duration": "{}"}}}}"#,
                self.width, self.height, self.duration
            );
            return Ok(ProcessOutput {
                stdout,
                ..ProcessOutput::default()
            });
        }

        if let Some(output) = invocation.output_arg() {
            fs::write(output, b"fake media").unwrap();
        }
        Ok(ProcessOutput::default())
    }
}
