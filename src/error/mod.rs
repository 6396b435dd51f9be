//! Error handling module for MonoShot

use thiserror::Error;

/// Main error type for MonoShot operations
#[derive(Error, Debug)]
pub enum MonoShotError {
    /// Input file not found or inaccessible
    #[error("Input file not found: {path}")]
    InputFileNotFound { path: String },

    /// Input refused by the upload gate (type, duration or resolution)
    #[error("Input rejected: {reason}")]
    InputRejected { reason: String },

    /// Operation requested on the wrong kind of media
    #[error("{operation} requires {expected} input")]
    WrongMediaKind { operation: String, expected: String },

    /// Parameter outside its documented range
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    /// Time range validation error
    #[error("Invalid time range: start ({start}s) must be before end ({end}s) within 0..{duration}s")]
    InvalidTimeRange { start: f64, end: f64, duration: f64 },

    /// Crop or frame geometry outside the decoded frame
    #[error("Geometry error: {message}")]
    Geometry { message: String },

    /// FFmpeg initialization error
    #[error("Failed to initialize FFmpeg: {message}")]
    FFmpegInitError { message: String },

    /// Media probe error
    #[error("Failed to probe media file: {message}")]
    ProbeError { message: String },

    /// Source could not be decoded
    #[error("Failed to decode source: {message}")]
    DecodeError { message: String },

    /// Output could not be encoded
    #[error("Failed to encode output: {message}")]
    EncodeError { message: String },

    /// Super-resolution model missing or unloadable
    #[error("Super-resolution model unavailable at {path}: {message}")]
    ModelUnavailable { path: String, message: String },

    /// OCR engine failure (distinct from "no text found")
    #[error("OCR engine failed: {message}")]
    OcrError { message: String },

    /// More than one file present in the output directory
    #[error("You can only process and download a single file at a time ({count} files found)")]
    MultipleArtifacts { count: usize },

    /// Nothing was produced in the output directory
    #[error("No files processed yet")]
    NoArtifact,

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// FFmpeg error
    #[error("FFmpeg error: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),

    /// Image codec error
    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),
}

impl MonoShotError {
    /// Shorthand for a parameter range violation
    pub fn invalid_parameter(name: &str, message: impl Into<String>) -> Self {
        MonoShotError::InvalidParameter {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// True for errors raised before any transformation ran
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            MonoShotError::InputRejected { .. }
                | MonoShotError::InputFileNotFound { .. }
                | MonoShotError::WrongMediaKind { .. }
        )
    }
}

/// Result type alias for MonoShot operations
pub type MonoShotResult<T> = std::result::Result<T, MonoShotError>;
