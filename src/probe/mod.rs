//! Media inspection and the upload gate

use serde::{Deserialize, Serialize};

use crate::domain::model::{MediaFormat, MediaKind, Resolution};

pub mod inspector;
pub mod validator;

pub use inspector::MediaInspector;
pub use validator::InputGate;

/// Media file information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// File path
    pub path: String,
    pub format: MediaFormat,
    pub kind: MediaKind,
    /// File size in bytes
    pub file_size: u64,
    pub resolution: Resolution,
    /// Whole-second duration, videos only
    pub duration_secs: Option<u64>,
    /// Average frame rate, videos only
    pub frame_rate: Option<f64>,
    pub frame_count: Option<u64>,
    /// Video codec name
    pub codec: Option<String>,
    /// Whether the resolution falls in the accepted 480p-1080p band
    pub in_resolution_band: bool,
}
