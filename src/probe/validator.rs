//! Upload gate: type allow-list, then duration and resolution for videos

use std::path::Path;

use tracing::{info, warn};

use crate::domain::model::{MediaFormat, MediaKind, SourceMedia};
use crate::domain::rules::InputPolicy;
use crate::error::{MonoShotError, MonoShotResult};
use crate::probe::{MediaInfo, MediaInspector};

/// Admits or rejects a staged upload before any transformation is offered
pub struct InputGate {
    policy: InputPolicy,
    inspector: MediaInspector,
}

impl InputGate {
    pub fn new(policy: InputPolicy) -> Self {
        Self {
            policy,
            inspector: MediaInspector::new(),
        }
    }

    /// Detect the format from `mime` when given, else from the extension
    pub fn detect_format(path: &Path, mime: Option<&str>) -> MonoShotResult<MediaFormat> {
        let detected = match mime {
            Some(mime) => MediaFormat::from_mime(mime),
            None => MediaFormat::from_path(path),
        };
        detected.ok_or_else(|| MonoShotError::InputRejected {
            reason: format!(
                "unsupported file type '{}'; allowed: mp4, avi, mov, jpeg, jpg, png",
                mime.map(str::to_string)
                    .unwrap_or_else(|| path.display().to_string())
            ),
        })
    }

    /// Inspect `path` and apply the policy; returns the admitted source and its info
    pub fn admit(&self, path: &Path, mime: Option<&str>) -> MonoShotResult<(SourceMedia, MediaInfo)> {
        let format = Self::detect_format(path, mime)?;
        let info = self.inspector.inspect(path, format)?;

        if info.kind == MediaKind::Video {
            let duration = info.duration_secs.unwrap_or_default();
            if let Err(e) = self.policy.check_video(duration, info.resolution) {
                warn!("Rejected {}: {}", path.display(), e);
                return Err(e);
            }
        }

        info!("Admitted {} as {}", path.display(), format.kind());
        Ok((
            SourceMedia {
                path: path.to_path_buf(),
                format,
            },
            info,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format_prefers_mime() {
        let format = InputGate::detect_format(Path::new("upload.bin"), Some("video/quicktime")).unwrap();
        assert_eq!(format, MediaFormat::Mov);

        let format = InputGate::detect_format(Path::new("Holiday.JPG"), None).unwrap();
        assert_eq!(format, MediaFormat::Jpg);
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let err = InputGate::detect_format(Path::new("clip.mkv"), None).unwrap_err();
        assert!(err.is_rejection());

        let err = InputGate::detect_format(Path::new("clip.mp4"), Some("video/webm")).unwrap_err();
        assert!(matches!(err, MonoShotError::InputRejected { .. }));
    }

    #[test]
    fn test_images_skip_video_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        image::RgbImage::new(10, 10).save(&path).unwrap();

        let gate = InputGate::new(InputPolicy::default());
        let (source, info) = gate.admit(&path, None).unwrap();
        assert_eq!(source.kind(), MediaKind::Image);
        assert!(!info.in_resolution_band);
    }
}
