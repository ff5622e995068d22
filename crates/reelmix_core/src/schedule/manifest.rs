//! ffconcat manifest for the encoder.
//!
//! The concat demuxer ignores the `duration` of the last `file` line, so the
//! terminal image is listed twice: once with its duration and once more as a
//! zero-length closing frame.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use super::frames::FrameFile;
use super::ScheduleError;

/// Render the manifest text.
///
/// Frame paths under `base_dir` are written relative to it (the demuxer
/// resolves them against the manifest's directory); others stay absolute.
/// `terminal_hold_secs` is added to the terminal entry's duration.
pub fn render_manifest(frames: &[FrameFile], base_dir: &Path, terminal_hold_secs: f64) -> String {
    let mut out = String::from("ffconcat version 1.0\n");

    for frame in frames {
        let hold = if frame.is_terminal {
            terminal_hold_secs.max(0.0)
        } else {
            0.0
        };
        let _ = writeln!(out, "file {}", quote_path(&frame.path, base_dir));
        let _ = writeln!(out, "duration {:.6}", frame.display_secs + hold);
    }

    if let Some(last) = frames.last() {
        let _ = writeln!(out, "file {}", quote_path(&last.path, base_dir));
    }

    out
}

/// Render and write the manifest to `path`.
pub fn write_manifest(
    frames: &[FrameFile],
    path: &Path,
    terminal_hold_secs: f64,
) -> Result<(), ScheduleError> {
    if frames.is_empty() {
        return Err(ScheduleError::NoVisuals);
    }
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let text = render_manifest(frames, base_dir, terminal_hold_secs);
    fs::write(path, text).map_err(|e| ScheduleError::io(path, e))
}

/// Single-quote a path for the concat demuxer (`'` becomes `'\''`).
fn quote_path(path: &Path, base_dir: &Path) -> String {
    let shown = path.strip_prefix(base_dir).unwrap_or(path);
    let text = shown.to_string_lossy().replace('\\', "/");
    format!("'{}'", text.replace('\'', "'\\''"))
}
