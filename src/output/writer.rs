//! Output file guards and export

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{MonoShotError, MonoShotResult};

/// Removes a partially written output unless the producing operation commits it
#[derive(Debug)]
pub struct PartialOutput {
    path: PathBuf,
    committed: bool,
}

impl PartialOutput {
    /// Guard the file at `path`; a stale file from an earlier attempt is removed
    pub fn new(path: impl Into<PathBuf>) -> MonoShotResult<Self> {
        let path = path.into();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(Self {
            path,
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file; fails if nothing was written
    pub fn commit(mut self) -> MonoShotResult<PathBuf> {
        if !self.path.is_file() {
            return Err(MonoShotError::EncodeError {
                message: format!("output {} was not written", self.path.display()),
            });
        }
        self.committed = true;
        Ok(self.path.clone())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.committed || !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => warn!("Removed partial output {}", self.path.display()),
            Err(e) => warn!("Failed to remove partial output {}: {}", self.path.display(), e),
        }
    }
}

/// Copy an artifact out of its workspace.
///
/// The copy goes to a hidden `.tmp_` sibling first and is renamed into place.
/// A `destination` that is a directory, or ends in a path separator, receives
/// the artifact under its own name; missing directories are created.
pub fn export_artifact(artifact: &Path, destination: &Path) -> MonoShotResult<PathBuf> {
    let names_directory = destination
        .as_os_str()
        .to_string_lossy()
        .ends_with(std::path::is_separator);
    let destination = if names_directory || destination.is_dir() {
        std::fs::create_dir_all(destination)?;
        let name = artifact.file_name().ok_or_else(|| {
            MonoShotError::invalid_parameter("export", "artifact has no file name")
        })?;
        destination.join(name)
    } else {
        destination.to_path_buf()
    };

    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file_name = destination
        .file_name()
        .ok_or_else(|| MonoShotError::invalid_parameter("export", "destination has no file name"))?;
    let staging = destination.with_file_name(format!(".tmp_{}", file_name.to_string_lossy()));

    let guard = PartialOutput::new(&staging)?;
    std::fs::copy(artifact, guard.path())?;
    std::fs::rename(guard.path(), &destination)?;
    drop(guard);

    info!("Exported {} to {}", artifact.display(), destination.display());
    Ok(destination)
}
