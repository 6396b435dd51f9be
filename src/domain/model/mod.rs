// Domain models - Core types and data structures

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MonoShotError, MonoShotResult};

/// Broad media category, decides which transformations are offered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Operations offered for this kind of upload
    pub fn offered_operations(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Video => &["Enhance Image", "Generate Shot"],
            MediaKind::Image => &["Enhance Resolution", "Apply Filter", "Extract Text"],
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Image => write!(f, "image"),
        }
    }
}

/// Allow-listed upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaFormat {
    Mp4,
    Avi,
    Mov,
    Jpeg,
    Jpg,
    Png,
}

impl MediaFormat {
    /// Detect format from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "mp4" => Some(MediaFormat::Mp4),
            "avi" => Some(MediaFormat::Avi),
            "mov" => Some(MediaFormat::Mov),
            "jpeg" => Some(MediaFormat::Jpeg),
            "jpg" => Some(MediaFormat::Jpg),
            "png" => Some(MediaFormat::Png),
            _ => None,
        }
    }

    /// Detect format from a MIME type
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "video/mp4" => Some(MediaFormat::Mp4),
            "video/avi" | "video/x-msvideo" => Some(MediaFormat::Avi),
            "video/mov" | "video/quicktime" => Some(MediaFormat::Mov),
            "image/jpeg" => Some(MediaFormat::Jpeg),
            "image/jpg" => Some(MediaFormat::Jpg),
            "image/png" => Some(MediaFormat::Png),
            _ => None,
        }
    }

    /// Detect format from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaFormat::Mp4 | MediaFormat::Avi | MediaFormat::Mov => MediaKind::Video,
            MediaFormat::Jpeg | MediaFormat::Jpg | MediaFormat::Png => MediaKind::Image,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Avi => "avi",
            MediaFormat::Mov => "mov",
            MediaFormat::Jpeg => "jpeg",
            MediaFormat::Jpg => "jpg",
            MediaFormat::Png => "png",
        }
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Swap width and height
    pub fn transposed(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A staged source file owned by exactly one request
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMedia {
    pub path: PathBuf,
    pub format: MediaFormat,
}

impl SourceMedia {
    /// Build a handle, detecting the format from the path
    pub fn from_path(path: impl Into<PathBuf>) -> MonoShotResult<Self> {
        let path = path.into();
        let format = MediaFormat::from_path(&path).ok_or_else(|| MonoShotError::InputRejected {
            reason: format!(
                "unsupported file type '{}'; allowed: mp4, avi, mov, jpeg, jpg, png",
                path.display()
            ),
        })?;
        Ok(Self { path, format })
    }

    pub fn kind(&self) -> MediaKind {
        self.format.kind()
    }
}

/// Enhancement levels, each a multiplier where 1.0 is a no-op
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhancementLevels {
    pub brightness: f32,
    pub sharpness: f32,
    pub contrast: f32,
    pub color: f32,
}

impl Default for EnhancementLevels {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            sharpness: 1.0,
            contrast: 1.0,
            color: 1.0,
        }
    }
}

impl EnhancementLevels {
    /// Create validated levels
    pub fn new(brightness: f32, sharpness: f32, contrast: f32, color: f32) -> MonoShotResult<Self> {
        let levels = Self {
            brightness,
            sharpness,
            contrast,
            color,
        };
        crate::domain::rules::EnhancementRules::validate(&levels)?;
        Ok(levels)
    }

    /// Levels in application priority order
    pub fn ordered(&self) -> [(EnhancementKind, f32); 4] {
        [
            (EnhancementKind::Brightness, self.brightness),
            (EnhancementKind::Sharpness, self.sharpness),
            (EnhancementKind::Contrast, self.contrast),
            (EnhancementKind::Color, self.color),
        ]
    }

    /// True when every level is the no-op value
    pub fn is_identity(&self) -> bool {
        self.ordered().iter().all(|(_, level)| *level == 1.0)
    }
}

/// Individual enhancement adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnhancementKind {
    Brightness,
    Sharpness,
    Contrast,
    Color,
}

impl fmt::Display for EnhancementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnhancementKind::Brightness => write!(f, "brightness"),
            EnhancementKind::Sharpness => write!(f, "sharpness"),
            EnhancementKind::Contrast => write!(f, "contrast"),
            EnhancementKind::Color => write!(f, "color"),
        }
    }
}

/// How multiple non-default levels combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnhancementMode {
    /// Only the first non-default level applies (brightness > sharpness > contrast > color)
    #[default]
    Exclusive,
    /// Every non-default level applies, in the same priority order
    Composed,
}

/// Parameters for extracting and enhancing a still from a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhanceImageParams {
    pub timestamp_ms: u64,
    pub levels: EnhancementLevels,
    pub mode: EnhancementMode,
}

/// Boomerang sub-clip bounds in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoomerangRange {
    pub start: f64,
    pub end: f64,
}

impl BoomerangRange {
    /// Create a range; `end` must be strictly greater than `start`
    pub fn new(start: f64, end: f64) -> MonoShotResult<Self> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            return Err(MonoShotError::InvalidTimeRange {
                start,
                end,
                duration: end.max(start),
            });
        }
        Ok(Self { start, end })
    }

    /// Length of the sub-clip in seconds
    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

/// Video shot kinds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ShotKind {
    SlowMotion,
    TimeLapse,
    Gif,
    Boomerang(BoomerangRange),
}

impl ShotKind {
    /// Parse a shot name; boomerang needs its range supplied separately
    pub fn parse(name: &str, range: Option<BoomerangRange>) -> MonoShotResult<Self> {
        match normalize_name(name).as_str() {
            "slowmo" | "slowmotion" => Ok(ShotKind::SlowMotion),
            "timelapse" => Ok(ShotKind::TimeLapse),
            "gif" => Ok(ShotKind::Gif),
            "boomerang" => range.map(ShotKind::Boomerang).ok_or_else(|| {
                MonoShotError::invalid_parameter("kind", "boomerang requires --start and --end")
            }),
            _ => Err(MonoShotError::invalid_parameter(
                "kind",
                format!("unknown shot '{}'; expected slowmo, timelapse, gif or boomerang", name),
            )),
        }
    }

    /// Deterministic output file name
    /// True when `name` selects the boomerang, the only shot with a range
    pub fn takes_range(name: &str) -> bool {
        normalize_name(name) == "boomerang"
    }

    pub fn output_file_name(&self) -> &'static str {
        match self {
            ShotKind::SlowMotion => "slow_motion.mp4",
            ShotKind::TimeLapse => "timelapse.mp4",
            ShotKind::Gif => "sample.gif",
            ShotKind::Boomerang(_) => "boomerang.gif",
        }
    }
}

impl fmt::Display for ShotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShotKind::SlowMotion => write!(f, "SlowMo"),
            ShotKind::TimeLapse => write!(f, "TimeLapse"),
            ShotKind::Gif => write!(f, "GIF"),
            ShotKind::Boomerang(range) => write!(f, "Boomerang({}s-{}s)", range.start, range.end),
        }
    }
}

/// Stylistic image filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    PencilSketch,
    WaterColored,
    Faded,
    Document,
    Cartoonify,
    Vignette,
    Phantom,
    Negative,
}

impl FilterKind {
    pub const ALL: [FilterKind; 8] = [
        FilterKind::PencilSketch,
        FilterKind::WaterColored,
        FilterKind::Faded,
        FilterKind::Document,
        FilterKind::Cartoonify,
        FilterKind::Vignette,
        FilterKind::Phantom,
        FilterKind::Negative,
    ];

    /// Parse a filter name such as "Pencil Sketch", "pencil-sketch" or "negative"
    pub fn parse(name: &str) -> MonoShotResult<Self> {
        match normalize_name(name).as_str() {
            "pencilsketch" => Ok(FilterKind::PencilSketch),
            "watercolored" | "watercolor" => Ok(FilterKind::WaterColored),
            "faded" => Ok(FilterKind::Faded),
            "document" => Ok(FilterKind::Document),
            "cartoonify" => Ok(FilterKind::Cartoonify),
            "vignette" | "vigenette" => Ok(FilterKind::Vignette),
            "phantom" => Ok(FilterKind::Phantom),
            "negative" => Ok(FilterKind::Negative),
            _ => Err(MonoShotError::invalid_parameter(
                "filter",
                format!("unknown filter '{}'", name),
            )),
        }
    }

    /// Deterministic output file name
    pub fn output_file_name(&self) -> &'static str {
        match self {
            FilterKind::PencilSketch => "pencil_sketch.png",
            FilterKind::WaterColored => "water_colored.png",
            FilterKind::Faded => "faded.png",
            FilterKind::Document => "document.png",
            FilterKind::Cartoonify => "cartoonified.png",
            FilterKind::Vignette => "vignette.png",
            FilterKind::Phantom => "phantom.png",
            FilterKind::Negative => "negative.png",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FilterKind::PencilSketch => "Pencil Sketch",
            FilterKind::WaterColored => "Water Colored",
            FilterKind::Faded => "Faded",
            FilterKind::Document => "Document",
            FilterKind::Cartoonify => "Cartoonify",
            FilterKind::Vignette => "Vignette",
            FilterKind::Phantom => "Phantom",
            FilterKind::Negative => "Negative",
        };
        write!(f, "{}", label)
    }
}

/// One transformation with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformationRequest {
    Shot(ShotKind),
    EnhanceImage(EnhanceImageParams),
    EnhanceResolution,
    ApplyFilter(FilterKind),
    ExtractText,
}

impl TransformationRequest {
    /// Media kind the transformation operates on
    pub fn required_media(&self) -> MediaKind {
        match self {
            TransformationRequest::Shot(_) | TransformationRequest::EnhanceImage(_) => {
                MediaKind::Video
            }
            TransformationRequest::EnhanceResolution
            | TransformationRequest::ApplyFilter(_)
            | TransformationRequest::ExtractText => MediaKind::Image,
        }
    }

    /// Human-readable label used in logs and reports
    pub fn label(&self) -> String {
        match self {
            TransformationRequest::Shot(kind) => format!("Generate Shot ({})", kind),
            TransformationRequest::EnhanceImage(_) => "Enhance Image".to_string(),
            TransformationRequest::EnhanceResolution => "Enhance Resolution".to_string(),
            TransformationRequest::ApplyFilter(kind) => format!("Apply Filter ({})", kind),
            TransformationRequest::ExtractText => "Extract Text".to_string(),
        }
    }
}

/// Structured OCR result: "nothing found" is not the same as "found an empty string"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OcrOutcome {
    NoText,
    Text(String),
}

impl OcrOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            OcrOutcome::NoText => None,
            OcrOutcome::Text(text) => Some(text),
        }
    }

    /// Fold a block result into an accumulated outcome
    pub fn merge(self, other: OcrOutcome) -> OcrOutcome {
        match (self, other) {
            (OcrOutcome::NoText, other) => other,
            (this, OcrOutcome::NoText) => this,
            (OcrOutcome::Text(mut a), OcrOutcome::Text(b)) => {
                a.push_str(&b);
                OcrOutcome::Text(a)
            }
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}
