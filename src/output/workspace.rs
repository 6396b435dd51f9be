//! Per-request working directories

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{MonoShotError, MonoShotResult};

/// Isolated temp and output directories owned by one request.
///
/// Everything under the workspace is deleted when it is dropped or closed.
#[derive(Debug)]
pub struct RequestWorkspace {
    root: TempDir,
    temp_dir: PathBuf,
    output_dir: PathBuf,
}

impl RequestWorkspace {
    /// Create a uniquely named workspace under `base`, or the system temp dir
    pub fn create(base: Option<&Path>) -> MonoShotResult<Self> {
        let root = match base {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                tempfile::Builder::new().prefix("monoshot-").tempdir_in(base)?
            }
            None => tempfile::Builder::new().prefix("monoshot-").tempdir()?,
        };

        let temp_dir = root.path().join("temp");
        let output_dir = root.path().join("output");
        std::fs::create_dir(&temp_dir)?;
        std::fs::create_dir(&output_dir)?;

        debug!("Created workspace {}", root.path().display());
        Ok(Self {
            root,
            temp_dir,
            output_dir,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path for a named artifact inside the output directory
    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Copy the uploaded file into the temp directory, keeping its file name
    pub fn stage_source(&self, source: &Path) -> MonoShotResult<PathBuf> {
        if !source.is_file() {
            return Err(MonoShotError::InputFileNotFound {
                path: source.display().to_string(),
            });
        }
        let name = source.file_name().ok_or_else(|| MonoShotError::InputFileNotFound {
            path: source.display().to_string(),
        })?;
        let staged = self.temp_dir.join(name);
        std::fs::copy(source, &staged)?;
        debug!("Staged {} as {}", source.display(), staged.display());
        Ok(staged)
    }

    /// The single file in the output directory
    pub fn collect_artifact(&self) -> MonoShotResult<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.output_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();

        match files.len() {
            0 => Err(MonoShotError::NoArtifact),
            1 => Ok(files.remove(0)),
            count => Err(MonoShotError::MultipleArtifacts { count }),
        }
    }

    /// Remove the workspace now, reporting any failure
    pub fn close(self) -> MonoShotResult<()> {
        let path = self.root.path().to_path_buf();
        self.root.close()?;
        info!("Cleaned up workspace {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_layout_and_cleanup() {
        let base = tempfile::tempdir().unwrap();
        let workspace = RequestWorkspace::create(Some(base.path())).unwrap();
        let root = workspace.root().to_path_buf();

        assert!(workspace.temp_dir().is_dir());
        assert!(workspace.output_dir().is_dir());
        assert_eq!(
            workspace.output_file("negative.png"),
            workspace.output_dir().join("negative.png")
        );

        workspace.close().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_two_workspaces_do_not_share_directories() {
        let a = RequestWorkspace::create(None).unwrap();
        let b = RequestWorkspace::create(None).unwrap();
        assert_ne!(a.output_dir(), b.output_dir());
    }

    #[test]
    fn test_collect_artifact_counts() {
        let workspace = RequestWorkspace::create(None).unwrap();
        assert!(matches!(
            workspace.collect_artifact(),
            Err(MonoShotError::NoArtifact)
        ));

        std::fs::write(workspace.output_file("a.png"), b"a").unwrap();
        assert_eq!(
            workspace.collect_artifact().unwrap(),
            workspace.output_file("a.png")
        );

        std::fs::write(workspace.output_file("b.png"), b"b").unwrap();
        assert!(matches!(
            workspace.collect_artifact(),
            Err(MonoShotError::MultipleArtifacts { count: 2 })
        ));
    }

    #[test]
    fn test_stage_missing_source() {
        let workspace = RequestWorkspace::create(None).unwrap();
        let err = workspace
            .stage_source(Path::new("/definitely/not/here.mp4"))
            .unwrap_err();
        assert!(matches!(err, MonoShotError::InputFileNotFound { .. }));
    }
}
