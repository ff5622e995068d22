//! Per-job scratch directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Exclusive workspace of one job: `<temp_root>/job-<uuid>`.
///
/// Removed on drop, whatever way the job ended, unless `keep` is set.
#[derive(Debug)]
pub struct JobWorkspace {
    root: PathBuf,
    keep: bool,
}

impl JobWorkspace {
    /// Create the workspace directory and its `frames/` and `audio/`
    /// subdirectories.
    pub fn create(temp_root: impl AsRef<Path>, job_id: Uuid, keep: bool) -> io::Result<Self> {
        let root = temp_root.as_ref().join(format!("job-{}", job_id));
        fs::create_dir_all(&root)?;
        let workspace = Self { root, keep };
        fs::create_dir_all(workspace.frames_dir())?;
        fs::create_dir_all(workspace.audio_dir())?;
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Image files referenced by the concat manifest.
    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    /// Raw and normalized audio.
    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    /// Whether the directory survives the job.
    pub fn is_kept(&self) -> bool {
        self.keep
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if self.keep {
            tracing::info!(path = %self.root.display(), "keeping job workspace");
            return;
        }
        match fs::remove_dir_all(&self.root) {
            Ok(()) => tracing::debug!(path = %self.root.display(), "released job workspace"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.root.display(), "failed to remove job workspace: {}", e)
            }
        }
    }
}
