//! Media inspection through `ffprobe -of json`.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::logging::JobLogger;
use crate::orchestrator::CancelHandle;
use crate::process::{Invocation, MediaRunner, ProcessError};

/// One stream as reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbeStream {
    pub index: usize,
    /// "video", "audio", ...
    pub codec_type: String,
    pub codec_name: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_secs: Option<f64>,
}

/// What ffprobe knows about a file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaProbe {
    pub streams: Vec<ProbeStream>,
    /// Container duration, falling back to the longest stream.
    pub duration_secs: Option<f64>,
}

impl MediaProbe {
    /// First video stream.
    pub fn video_stream(&self) -> Option<&ProbeStream> {
        self.streams.iter().find(|s| s.codec_type == "video")
    }

    pub fn has_audio(&self) -> bool {
        self.streams.iter().any(|s| s.codec_type == "audio")
    }
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("unreadable ffprobe output: {0}")]
    Parse(String),
}

impl ProbeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProbeError::Process(e) if e.is_fatal())
    }
}

/// `ffprobe -v error -show_streams -show_format -of json <path>`.
pub fn probe_invocation(ffprobe: &str, path: &Path, timeout: Duration) -> Invocation {
    Invocation::new(
        ffprobe,
        [
            "-v".to_string(),
            "error".to_string(),
            "-show_streams".to_string(),
            "-show_format".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.to_string_lossy().into_owned(),
        ],
    )
    .with_timeout(timeout)
}

/// Parse ffprobe's JSON document.
pub fn parse_probe_output(json: &str) -> Result<MediaProbe, ProbeError> {
    let root: Value = serde_json::from_str(json).map_err(|e| ProbeError::Parse(e.to_string()))?;

    let streams: Vec<ProbeStream> = root
        .get("streams")
        .and_then(|s| s.as_array())
        .map(|streams| {
            streams
                .iter()
                .map(|stream| ProbeStream {
                    index: stream.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
                    codec_type: str_field(stream, "codec_type"),
                    codec_name: str_field(stream, "codec_name"),
                    width: stream.get("width").and_then(|v| v.as_u64()).map(|w| w as u32),
                    height: stream.get("height").and_then(|v| v.as_u64()).map(|h| h as u32),
                    duration_secs: seconds_field(stream, "duration"),
                })
                .collect()
        })
        .unwrap_or_default();

    let duration_secs = root
        .get("format")
        .and_then(|f| seconds_field(f, "duration"))
        .or_else(|| {
            streams
                .iter()
                .filter_map(|s| s.duration_secs)
                .reduce(f64::max)
        });

    Ok(MediaProbe {
        streams,
        duration_secs,
    })
}

/// Run ffprobe on `path` and parse the result.
pub fn probe_media(
    runner: &dyn MediaRunner,
    ffprobe: &str,
    path: &Path,
    timeout: Duration,
    cancel: &CancelHandle,
    logger: &JobLogger,
) -> Result<MediaProbe, ProbeError> {
    let output = runner.run(&probe_invocation(ffprobe, path, timeout), cancel, logger)?;
    parse_probe_output(&output.stdout)
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// ffprobe prints durations as strings ("12.034000"); accept numbers too.
fn seconds_field(value: &Value, key: &str) -> Option<f64> {
    let field = value.get(key)?;
    field
        .as_f64()
        .or_else(|| field.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
}
