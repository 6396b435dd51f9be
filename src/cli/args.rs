//! Command-line argument definitions

use clap::Args;
use clap_num::number_range;

/// Whole seconds, at least 1
pub(crate) fn seconds(s: &str) -> Result<u64, String> {
    number_range(s, 1, 86_400)
}

/// Enhancement level in [0.0, 2.0]; the 0.2 grid is checked when the request is built
fn level(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{}", e))?;
    if !(0.0..=2.0).contains(&value) {
        return Err(format!("{} is not in 0.0..=2.0", value));
    }
    Ok(value)
}

/// Input file selection shared by every command
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Input file path
    #[arg(short, long)]
    pub input: String,

    /// MIME type of the input, overriding extension-based detection
    #[arg(long)]
    pub mime: Option<String>,
}

/// Artifact handling shared by file-producing commands
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Copy the produced file to this path or directory
    #[arg(short, long)]
    pub export: Option<String>,

    /// Print the artifact report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the shot command
#[derive(Args, Debug)]
pub struct ShotArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Shot kind: slowmo, timelapse, gif or boomerang
    #[arg(short, long)]
    pub kind: String,

    /// Boomerang start in seconds
    #[arg(long, value_parser = seconds)]
    pub start: Option<u64>,

    /// Boomerang end in seconds, at least 2s after start
    #[arg(long, value_parser = seconds)]
    pub end: Option<u64>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the enhance-image command
#[derive(Args, Debug)]
pub struct EnhanceImageArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Timestamp of the frame to extract, in seconds
    #[arg(short, long, value_parser = seconds)]
    pub timestamp: u64,

    /// Brightness level (0.0-2.0, step 0.2)
    #[arg(long, default_value_t = 1.0, value_parser = level)]
    pub brightness: f32,

    /// Sharpness level (0.0-2.0, step 0.2)
    #[arg(long, default_value_t = 1.0, value_parser = level)]
    pub sharpness: f32,

    /// Contrast level (0.0-2.0, step 0.2)
    #[arg(long, default_value_t = 1.0, value_parser = level)]
    pub contrast: f32,

    /// Color level (0.0-2.0, step 0.2)
    #[arg(long, default_value_t = 1.0, value_parser = level)]
    pub color: f32,

    /// Apply every non-default level instead of only the first
    #[arg(long)]
    pub compose: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the enhance-resolution command
#[derive(Args, Debug)]
pub struct EnhanceResolutionArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Super-resolution model (ONNX)
    #[arg(long)]
    pub model: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the filter command
#[derive(Args, Debug)]
pub struct FilterArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Filter name, e.g. "pencil-sketch", "cartoonify" or "negative"
    #[arg(short, long)]
    pub filter: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the extract-text command
#[derive(Args, Debug)]
pub struct ExtractTextArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Tesseract language code
    #[arg(short, long)]
    pub language: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_parser() {
        assert_eq!(seconds("5"), Ok(5));
        assert!(seconds("0").is_err());
        assert!(seconds("abc").is_err());
    }

    #[test]
    fn test_level_parser() {
        assert_eq!(level("1.4"), Ok(1.4));
        assert!(level("2.2").is_err());
        assert!(level("-0.2").is_err());
    }
}
