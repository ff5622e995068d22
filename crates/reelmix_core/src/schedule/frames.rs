//! Writing schedule images into the job workspace.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::ScheduleEntry;

use super::ScheduleError;

/// An image on disk, ready for the concat manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameFile {
    pub sequence_index: usize,
    pub path: PathBuf,
    pub display_secs: f64,
    pub is_terminal: bool,
}

/// File extension for an encoded image, from its magic bytes.
pub fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
}

/// Reject any entry whose bytes are not a known image format.
pub fn check_images(entries: &[ScheduleEntry]) -> Result<(), ScheduleError> {
    for entry in entries {
        if sniff_extension(&entry.visual.image_bytes).is_none() {
            return Err(ScheduleError::UnrecognizedImage {
                index: entry.visual.sequence_index,
            });
        }
    }
    Ok(())
}

/// Write every image to `dir` as `frame_NNNN.<ext>`, in schedule order.
pub fn write_frames(entries: &[ScheduleEntry], dir: &Path) -> Result<Vec<FrameFile>, ScheduleError> {
    fs::create_dir_all(dir).map_err(|e| ScheduleError::io(dir, e))?;

    entries
        .iter()
        .map(|entry| {
            let index = entry.visual.sequence_index;
            let ext = sniff_extension(&entry.visual.image_bytes)
                .ok_or(ScheduleError::UnrecognizedImage { index })?;
            let path = dir.join(format!("frame_{:04}.{}", index, ext));
            fs::write(&path, &entry.visual.image_bytes).map_err(|e| ScheduleError::io(&path, e))?;
            Ok(FrameFile {
                sequence_index: index,
                path,
                display_secs: entry.display_secs,
                is_terminal: entry.is_terminal,
            })
        })
        .collect()
}
