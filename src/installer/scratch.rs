//! Download scratch space and the manual-recovery folder.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{MANUAL_DIR_NAME, SCRATCH_DIR_NAME};

/// Per-run download directory.
///
/// Created on first use and removed by [`ScratchArea::purge`] at the end of
/// the run. Artifacts that could not be merged are copied into the manual
/// directory next to it, which is never purged.
#[derive(Debug)]
pub struct ScratchArea {
    dir: PathBuf,
    manual_dir: PathBuf,
}

impl ScratchArea {
    /// Creates a scratch area under `data_dir`. Nothing is created yet.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join(SCRATCH_DIR_NAME),
            manual_dir: data_dir.join(MANUAL_DIR_NAME),
        }
    }

    /// Scratch directory path.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Manual-recovery directory path.
    #[must_use]
    pub fn manual_dir(&self) -> &Path {
        &self.manual_dir
    }

    /// Returns the path an artifact named `file_name` is downloaded to,
    /// creating the scratch directory if needed.
    pub fn artifact_path(&self, file_name: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        Ok(self.dir.join(file_name))
    }

    /// Copies `artifact` verbatim into the manual directory.
    pub fn keep_for_manual(&self, artifact: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.manual_dir)?;
        let file_name = artifact
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "artifact has no file name"))?;
        let target = self.manual_dir.join(file_name);
        fs::copy(artifact, &target)?;
        Ok(target)
    }

    /// Removes the scratch directory and everything in it.
    pub fn purge(&self) -> io::Result<()> {
        if self.dir.exists() {
            debug!("[SCRATCH] Removing {}", self.dir.display());
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_created_lazily_and_purged() {
        let data = TempDir::new().unwrap();
        let scratch = ScratchArea::new(data.path());
        assert!(!scratch.dir().exists());

        let path = scratch.artifact_path("Pkg-1.0.0.zip").unwrap();
        assert!(scratch.dir().exists());
        fs::write(&path, b"zip").unwrap();

        scratch.purge().unwrap();
        assert!(!scratch.dir().exists());
        // Purging twice is fine
        scratch.purge().unwrap();
    }

    #[test]
    fn test_manual_dir_is_sibling_and_survives_purge() {
        let data = TempDir::new().unwrap();
        let scratch = ScratchArea::new(data.path());
        assert_eq!(scratch.manual_dir().parent(), scratch.dir().parent());

        let artifact = scratch.artifact_path("Pkg-1.0.0.zip").unwrap();
        fs::write(&artifact, b"bytes").unwrap();
        let kept = scratch.keep_for_manual(&artifact).unwrap();

        scratch.purge().unwrap();
        assert_eq!(kept, data.path().join(MANUAL_DIR_NAME).join("Pkg-1.0.0.zip"));
        assert_eq!(fs::read(kept).unwrap(), b"bytes");
    }
}
