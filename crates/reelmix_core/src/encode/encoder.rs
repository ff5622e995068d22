//! Running the encode, verifying it and moving it to the output folder.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{AudioSettings, EncodeSettings, PathSettings};
use crate::logging::JobLogger;
use crate::orchestrator::CancelHandle;
use crate::probe::{probe_media, ProbeError};
use crate::process::{MediaRunner, ProcessError};

use super::command::EncodeCommandBuilder;
use super::verify::{verify_media, VerifiedMedia};

/// Encode failure. Always fatal for the job.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("encoder failed: {source} (command: {command})")]
    Encoder {
        command: String,
        #[source]
        source: ProcessError,
    },

    #[error("could not probe encoded file: {0}")]
    Probe(#[from] ProbeError),

    #[error("encoded file failed verification: {message} (command: {command})")]
    Verification { command: String, message: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EncodeError {
    fn process(&self) -> Option<&ProcessError> {
        match self {
            EncodeError::Encoder { source, .. } => Some(source),
            EncodeError::Probe(ProbeError::Process(source)) => Some(source),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.process().is_some_and(ProcessError::is_timeout)
    }

    pub fn is_cancelled(&self) -> bool {
        self.process().is_some_and(ProcessError::is_cancelled)
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A verified encode still inside the workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub media: VerifiedMedia,
    /// Encoder command line, for the job record.
    pub command: String,
}

pub struct Encoder<'a> {
    runner: &'a dyn MediaRunner,
    paths: &'a PathSettings,
    settings: &'a EncodeSettings,
    sample_rate: u32,
}

impl<'a> Encoder<'a> {
    pub fn new(
        runner: &'a dyn MediaRunner,
        paths: &'a PathSettings,
        settings: &'a EncodeSettings,
        audio: &AudioSettings,
    ) -> Self {
        Self {
            runner,
            paths,
            settings,
            sample_rate: audio.sample_rate,
        }
    }

    /// Encode `manifest` + `audio` into `output` and verify the result.
    pub fn encode(
        &self,
        manifest: &Path,
        audio: &Path,
        output: &Path,
        narration_secs: f64,
        cancel: &CancelHandle,
        logger: &JobLogger,
    ) -> Result<EncodedVideo, EncodeError> {
        let invocation = EncodeCommandBuilder::new(manifest, audio, output, self.settings)
            .sample_rate(self.sample_rate)
            .invocation(&self.paths.ffmpeg);
        let command = invocation.display();

        self.runner
            .run(&invocation, cancel, logger)
            .map_err(|source| EncodeError::Encoder {
                command: command.clone(),
                source,
            })?;

        logger.info("Verifying encoded file");
        let probe = probe_media(
            self.runner,
            &self.paths.ffprobe,
            output,
            self.settings.probe_timeout(),
            cancel,
            logger,
        )?;

        let media = verify_media(
            &probe,
            self.settings.width,
            self.settings.height,
            narration_secs,
            self.settings.duration_tolerance_secs,
        )
        .map_err(|message| EncodeError::Verification {
            command: command.clone(),
            message,
        })?;

        if let Some(drift) = media.drift_secs {
            logger.warn(&format!(
                "Output is {:.2}s against {:.2}s of narration ({:+.2}s)",
                media.duration_secs, narration_secs, drift
            ));
        }

        Ok(EncodedVideo {
            path: output.to_path_buf(),
            media,
            command,
        })
    }
}

/// Move a verified file to `<output_dir>/<stem>.mp4`.
///
/// A plain rename is tried first. Across filesystems the file is copied to
/// a `.partial` sibling and renamed, so the final name only ever points at
/// a complete file.
pub fn persist(src: &Path, output_dir: &Path, stem: &str) -> Result<PathBuf, EncodeError> {
    fs::create_dir_all(output_dir).map_err(|e| EncodeError::io(output_dir, e))?;
    let dest = output_dir.join(format!("{}.mp4", stem));

    if fs::rename(src, &dest).is_ok() {
        return Ok(dest);
    }

    let partial = output_dir.join(format!("{}.mp4.partial", stem));
    if let Err(e) = fs::copy(src, &partial) {
        let _ = fs::remove_file(&partial);
        return Err(EncodeError::io(&partial, e));
    }
    fs::rename(&partial, &dest).map_err(|e| EncodeError::io(&dest, e))?;
    Ok(dest)
}
