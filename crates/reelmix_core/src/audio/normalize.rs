//! Per-track loudness normalization.
//!
//! Every source is rendered to 48 kHz stereo PCM WAV with a two-stage chain
//! (`loudnorm` to the kind's integrated target, then a light
//! `acompressor`), followed by the configured gain. When that chain fails
//! the track is retried once with the gain alone.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::config::AudioSettings;
use crate::logging::JobLogger;
use crate::models::AudioTrack;
use crate::orchestrator::CancelHandle;
use crate::process::{Invocation, MediaRunner, ProcessError};

/// Normalization failure.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// Both passes failed.
    #[error("{track}: loudness pass failed ({first}); gain-only pass failed ({second})")]
    Failed {
        track: String,
        first: String,
        second: String,
    },

    /// Timed out or cancelled. Never retried.
    #[error("{track}: {source}")]
    Interrupted {
        track: String,
        #[source]
        source: ProcessError,
    },
}

impl NormalizeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, NormalizeError::Interrupted { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NormalizeError::Interrupted { source, .. } if source.is_timeout())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, NormalizeError::Interrupted { source, .. } if source.is_cancelled())
    }
}

/// `loudnorm` + `acompressor` + `volume`.
pub fn loudness_filter(track: &AudioTrack, audio: &AudioSettings) -> String {
    format!(
        "loudnorm=I={:.1}:TP={:.1}:LRA={:.1},acompressor=threshold={}dB:ratio={}:attack={}:release={},volume={:.3}",
        track.target_lufs,
        audio.true_peak_db,
        audio.loudness_range,
        audio.compressor_threshold_db,
        audio.compressor_ratio,
        audio.compressor_attack_ms,
        audio.compressor_release_ms,
        track.gain,
    )
}

/// Fallback chain: the gain alone.
pub fn gain_only_filter(track: &AudioTrack) -> String {
    format!("volume={:.3}", track.gain)
}

/// Render `input` through `filter` into a PCM WAV at `output`.
pub fn normalize_invocation(
    ffmpeg: &str,
    input: &Path,
    output: &Path,
    filter: &str,
    sample_rate: u32,
    timeout: Duration,
) -> Invocation {
    Invocation::new(
        ffmpeg,
        [
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-vn".to_string(),
            "-af".to_string(),
            filter.to_string(),
            "-ar".to_string(),
            sample_rate.to_string(),
            "-ac".to_string(),
            "2".to_string(),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            output.to_string_lossy().into_owned(),
        ],
    )
    .with_timeout(timeout)
}

/// Result of one normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Same kind, label and offset as the input; new path.
    pub track: AudioTrack,
    /// The loudness pass failed and only the gain was applied.
    pub gain_only: bool,
}

pub struct Normalizer<'a> {
    runner: &'a dyn MediaRunner,
    ffmpeg: &'a str,
    settings: &'a AudioSettings,
}

impl<'a> Normalizer<'a> {
    pub fn new(runner: &'a dyn MediaRunner, ffmpeg: &'a str, settings: &'a AudioSettings) -> Self {
        Self {
            runner,
            ffmpeg,
            settings,
        }
    }

    /// Normalize `track` into `output`.
    pub fn normalize(
        &self,
        track: &AudioTrack,
        output: &Path,
        cancel: &CancelHandle,
        logger: &JobLogger,
    ) -> Result<Normalized, NormalizeError> {
        logger.section(&format!(
            "{} -> {:.1} LUFS, gain {:.2}",
            track.label, track.target_lufs, track.gain
        ));

        let first = match self.run(track, output, &loudness_filter(track, self.settings), cancel, logger) {
            Ok(()) => {
                return Ok(Normalized {
                    track: track.clone().with_path(output),
                    gain_only: false,
                })
            }
            Err(e) if e.is_fatal() => return Err(interrupted(track, e)),
            Err(e) => e,
        };

        logger.warn(&format!(
            "Loudness pass failed for {} ({}); retrying with gain only",
            track.label, first
        ));

        match self.run(track, output, &gain_only_filter(track), cancel, logger) {
            Ok(()) => Ok(Normalized {
                track: track.clone().with_path(output),
                gain_only: true,
            }),
            Err(e) if e.is_fatal() => Err(interrupted(track, e)),
            Err(second) => Err(NormalizeError::Failed {
                track: track.label.clone(),
                first: first.to_string(),
                second: second.to_string(),
            }),
        }
    }

    fn run(
        &self,
        track: &AudioTrack,
        output: &Path,
        filter: &str,
        cancel: &CancelHandle,
        logger: &JobLogger,
    ) -> Result<(), ProcessError> {
        let invocation = normalize_invocation(
            self.ffmpeg,
            &track.path,
            output,
            filter,
            self.settings.sample_rate,
            self.settings.normalize_timeout(),
        );
        self.runner.run(&invocation, cancel, logger).map(|_| ())
    }
}

fn interrupted(track: &AudioTrack, source: ProcessError) -> NormalizeError {
    NormalizeError::Interrupted {
        track: track.label.clone(),
        source,
    }
}
