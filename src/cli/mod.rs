//! CLI module for MonoShot
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ConfigOverrides;
use crate::utils::logging::LogFormat;

pub mod args;
pub mod commands;

pub use args::*;

/// MonoShot
///
/// Turns a short video into a slow-motion, time-lapse, GIF or boomerang shot or an
/// enhanced still, and a photo into a filtered, upscaled or transcribed image.
#[derive(Parser, Debug)]
#[command(name = "monoshot")]
#[command(about = "MonoShot - One clip or photo in, one enhanced shot out")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level or filter directives (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory under which per-request workspaces are created
    #[arg(long, global = true)]
    pub workspace_root: Option<PathBuf>,

    /// Longest accepted video, in seconds
    #[arg(long, global = true, value_parser = args::seconds)]
    pub max_duration: Option<u64>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show media information and whether the file would be accepted
    Inspect(InspectArgs),
    /// Generate a slow-motion, time-lapse, GIF or boomerang shot from a video
    Shot(ShotArgs),
    /// Extract a frame from a video and enhance it
    EnhanceImage(EnhanceImageArgs),
    /// Upscale an image 4x with a super-resolution model
    EnhanceResolution(EnhanceResolutionArgs),
    /// Apply a stylistic filter to an image
    Filter(FilterArgs),
    /// Extract text from an image
    ExtractText(ExtractTextArgs),
}

impl Cli {
    /// Configuration values given as flags
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            log_level: self.log_level.clone(),
            log_format: self.log_format,
            workspace_root: self.workspace_root.clone(),
            max_duration_secs: self.max_duration,
            ..ConfigOverrides::default()
        };
        match &self.command {
            Commands::EnhanceResolution(args) => {
                overrides.model_path = args.model.as_ref().map(PathBuf::from);
            }
            Commands::ExtractText(args) => {
                overrides.ocr_language = args.language.clone();
            }
            _ => {}
        }
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_boomerang_shot() {
        let cli = Cli::try_parse_from([
            "monoshot", "shot", "-i", "clip.mp4", "--kind", "boomerang", "--start", "2", "--end",
            "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Shot(args) => {
                assert_eq!(args.kind, "boomerang");
                assert_eq!((args.start, args.end), (Some(2), Some(5)));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "monoshot",
            "extract-text",
            "--input",
            "scan.png",
            "--language",
            "fra",
            "--log-format",
            "json",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.ocr_language.as_deref(), Some("fra"));
        assert_eq!(overrides.log_format, Some(LogFormat::Json));
        assert!(overrides.model_path.is_none());
        assert!(overrides.max_duration_secs.is_none());
    }

    #[test]
    fn test_max_duration_flag() {
        let cli = Cli::try_parse_from([
            "monoshot", "shot", "-i", "clip.mp4", "--kind", "gif", "--max-duration", "45",
        ])
        .unwrap();
        assert_eq!(cli.overrides().max_duration_secs, Some(45));

        assert!(Cli::try_parse_from([
            "monoshot", "inspect", "-i", "clip.mp4", "--max-duration", "0",
        ])
        .is_err());
    }

    #[test]
    fn test_enhance_image_defaults() {
        let cli = Cli::try_parse_from(["monoshot", "enhance-image", "-i", "a.mp4", "-t", "3"]).unwrap();
        match cli.command {
            Commands::EnhanceImage(args) => {
                assert_eq!(args.timestamp, 3);
                assert_eq!(args.brightness, 1.0);
                assert!(!args.compose);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
