//! Media inspection implementation

use std::path::Path;

use tracing::info;

use crate::domain::model::{MediaFormat, MediaKind, Resolution};
use crate::domain::rules::{DurationRules, ResolutionBand};
use crate::engine::decode::{image_dimensions, FrameReader};
use crate::error::{MonoShotError, MonoShotResult};
use crate::probe::MediaInfo;

/// Reads container and image headers without decoding frames
pub struct MediaInspector;

impl MediaInspector {
    pub fn new() -> Self {
        Self
    }

    /// Inspect a file whose format is already known
    pub fn inspect(&self, path: &Path, format: MediaFormat) -> MonoShotResult<MediaInfo> {
        info!("Inspecting {} file: {}", format.kind(), path.display());

        if !path.is_file() {
            return Err(MonoShotError::InputFileNotFound {
                path: path.display().to_string(),
            });
        }
        let file_size = std::fs::metadata(path)?.len();

        let info = match format.kind() {
            MediaKind::Video => {
                let reader = FrameReader::open(path)?;
                let properties = reader.properties().clone();
                let duration = DurationRules::from_frames(properties.frame_count, properties.frame_rate)?;
                MediaInfo {
                    path: path.display().to_string(),
                    format,
                    kind: MediaKind::Video,
                    file_size,
                    resolution: properties.resolution,
                    duration_secs: Some(duration),
                    frame_rate: Some(properties.frame_rate),
                    frame_count: Some(properties.frame_count),
                    codec: Some(properties.codec),
                    in_resolution_band: ResolutionBand::accepts(properties.resolution),
                }
            }
            MediaKind::Image => {
                let resolution = image_resolution(path)?;
                MediaInfo {
                    path: path.display().to_string(),
                    format,
                    kind: MediaKind::Image,
                    file_size,
                    resolution,
                    duration_secs: None,
                    frame_rate: None,
                    frame_count: None,
                    codec: None,
                    in_resolution_band: ResolutionBand::accepts(resolution),
                }
            }
        };

        info!("Inspection completed: {}", info.resolution);
        Ok(info)
    }

    /// Whole seconds: floor(frame_count / trunc(fps))
    pub fn probe_duration(&self, path: &Path) -> MonoShotResult<u64> {
        let reader = FrameReader::open(path)?;
        let properties = reader.properties();
        DurationRules::from_frames(properties.frame_count, properties.frame_rate)
    }

    /// True iff the video's resolution lies in the accepted band
    pub fn probe_dimensions(&self, path: &Path) -> MonoShotResult<bool> {
        let reader = FrameReader::open(path)?;
        Ok(ResolutionBand::accepts(reader.resolution()))
    }
}

impl Default for MediaInspector {
    fn default() -> Self {
        Self::new()
    }
}

fn image_resolution(path: &Path) -> MonoShotResult<Resolution> {
    image_dimensions(path).map_err(|e| MonoShotError::ProbeError {
        message: format!("failed to read image header of {}: {}", path.display(), e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_inspect_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        RgbImage::from_pixel(900, 500, Rgb([1, 2, 3])).save(&path).unwrap();

        let info = MediaInspector::new().inspect(&path, MediaFormat::Png).unwrap();
        assert_eq!(info.kind, MediaKind::Image);
        assert_eq!(info.resolution, Resolution::new(900, 500));
        assert!(info.in_resolution_band);
        assert!(info.duration_secs.is_none());
        assert!(info.file_size > 0);
    }

    #[test]
    fn test_inspect_missing_file() {
        let err = MediaInspector::new()
            .inspect(Path::new("/nope/clip.mp4"), MediaFormat::Mp4)
            .unwrap_err();
        assert!(matches!(err, MonoShotError::InputFileNotFound { .. }));
    }
}
