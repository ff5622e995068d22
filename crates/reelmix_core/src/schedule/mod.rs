//! Visual schedule: image ordering, display durations, frame files and the
//! concat manifest handed to the encoder.

mod builder;
mod frames;
mod manifest;

pub use builder::{build_schedule, estimated_duration, synthesize_timestamps};
pub use frames::{check_images, sniff_extension, write_frames, FrameFile};
pub use manifest::{render_manifest, write_manifest};

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from schedule construction and frame output.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("at least one image is required")]
    NoVisuals,

    #[error("image #{} has an invalid timestamp {value}", .index + 1)]
    InvalidTimestamp { index: usize, value: f64 },

    #[error("total duration must be positive and finite, got {0}")]
    InvalidDuration(f64),

    #[error("image #{} is not a recognized image format", .index + 1)]
    UnrecognizedImage { index: usize },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScheduleError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the caller's input was at fault (as opposed to the disk).
    pub fn is_input_error(&self) -> bool {
        !matches!(self, ScheduleError::Io { .. })
    }
}
