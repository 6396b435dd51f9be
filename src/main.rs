//! MonoShot CLI
//!
//! One clip or photo in, one enhanced shot out.
//!
//! # Usage
//!
//! ```bash
//! monoshot inspect -i clip.mp4
//! monoshot shot -i clip.mp4 --kind boomerang --start 2 --end 5 --export out/
//! monoshot enhance-image -i clip.mp4 -t 3 --contrast 1.4
//! monoshot filter -i photo.png -f "pencil sketch" --export sketch.png
//! monoshot extract-text -i scan.png
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use monoshot::cli::commands;
use monoshot::cli::{Cli, Commands};
use monoshot::config::MonoShotConfig;
use monoshot::utils::logging::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        MonoShotConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_overrides(cli.overrides());

    init_logging(&config.log_level, config.log_format);

    info!("Starting MonoShot");
    monoshot::init().context("Failed to initialize media libraries")?;

    match cli.command {
        Commands::Inspect(args) => {
            info!("Executing inspect command");
            commands::inspect(args, &config)?;
        }
        Commands::Shot(args) => {
            info!("Executing shot command");
            commands::shot(args, &config)?;
        }
        Commands::EnhanceImage(args) => {
            info!("Executing enhance-image command");
            commands::enhance_image(args, &config)?;
        }
        Commands::EnhanceResolution(args) => {
            info!("Executing enhance-resolution command");
            commands::enhance_resolution(args, &config)?;
        }
        Commands::Filter(args) => {
            info!("Executing filter command");
            commands::filter(args, &config)?;
        }
        Commands::ExtractText(args) => {
            info!("Executing extract-text command");
            commands::extract_text(args, &config)?;
        }
    }

    info!("MonoShot completed successfully");
    Ok(())
}
