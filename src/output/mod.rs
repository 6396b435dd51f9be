//! Request workspaces, output guards and artifact reports

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MonoShotError, MonoShotResult};

pub mod workspace;
pub mod writer;

pub use workspace::RequestWorkspace;
pub use writer::{export_artifact, PartialOutput};

/// Details shown to the user for a produced artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactReport {
    /// File name of the artifact
    pub file_name: String,
    /// File type, taken from the extension
    pub file_type: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Size in megabytes, rounded to 2 decimals
    pub size_mb: f64,
    pub generated_at: DateTime<Utc>,
}

impl ArtifactReport {
    /// Describe the file at `path`
    pub fn from_path(path: &Path) -> MonoShotResult<Self> {
        let metadata = std::fs::metadata(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or(MonoShotError::NoArtifact)?;
        let file_type = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "unknown".to_string());
        let size_bytes = metadata.len();

        Ok(Self {
            file_name,
            file_type,
            size_bytes,
            size_mb: crate::utils::Utils::megabytes(size_bytes),
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.gif");
        std::fs::write(&path, vec![0u8; 1_572_864]).unwrap();

        let report = ArtifactReport::from_path(&path).unwrap();
        assert_eq!(report.file_name, "sample.gif");
        assert_eq!(report.file_type, "gif");
        assert_eq!(report.size_bytes, 1_572_864);
        assert_eq!(report.size_mb, 1.57);
    }

    #[test]
    fn test_partial_output_removed_unless_committed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timelapse.mp4");

        {
            let guard = PartialOutput::new(&path).unwrap();
            std::fs::write(guard.path(), b"partial").unwrap();
        }
        assert!(!path.exists());

        let guard = PartialOutput::new(&path).unwrap();
        std::fs::write(guard.path(), b"complete").unwrap();
        let kept = guard.commit().unwrap();
        assert!(kept.exists());
    }

    #[test]
    fn test_commit_without_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PartialOutput::new(dir.path().join("missing.png")).unwrap();
        assert!(guard.commit().is_err());
    }

    #[test]
    fn test_export_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("negative.png");
        std::fs::write(&artifact, b"png").unwrap();
        let target = dir.path().join("exports");
        std::fs::create_dir(&target).unwrap();

        let exported = export_artifact(&artifact, &target).unwrap();
        assert_eq!(exported, target.join("negative.png"));
        assert_eq!(std::fs::read(&exported).unwrap(), b"png");
    }
}
