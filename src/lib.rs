//! MonoShot Library
//!
//! Single-shot media transformations: slow-motion, time-lapse, GIF and boomerang
//! shots and enhanced stills from short videos, plus filters, 4x super-resolution
//! and text extraction for photos.

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod output;
pub mod probe;
pub mod utils;

// Re-export commonly used types
pub use config::MonoShotConfig;
pub use domain::model::{MediaFormat, MediaKind, OcrOutcome, SourceMedia, TransformationRequest};
pub use engine::{Artifact, EngineConfig, TransformationEngine};
pub use error::{MonoShotError, MonoShotResult};
pub use probe::MediaInfo;

/// Initialize MonoShot library
pub fn init() -> MonoShotResult<()> {
    ffmpeg_next::init().map_err(|e| MonoShotError::FFmpegInitError {
        message: e.to_string(),
    })?;

    Ok(())
}
