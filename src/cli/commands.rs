//! Command implementations
//!
//! Every processing command runs the same flow: stage the upload in a fresh
//! workspace, pass it through the input gate, build the request, execute it,
//! collect and report the single artifact, export it, then clean up.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::args::{
    EnhanceImageArgs, EnhanceResolutionArgs, ExtractTextArgs, FilterArgs, InspectArgs, OutputArgs,
    ShotArgs, SourceArgs,
};
use crate::config::MonoShotConfig;
use crate::domain::model::{
    EnhanceImageParams, EnhancementLevels, EnhancementMode, FilterKind, MediaKind, OcrOutcome,
    TransformationRequest,
};
use crate::domain::rules::ParameterBounds;
use crate::engine::{Artifact, TransformationEngine};
use crate::error::{MonoShotError, MonoShotResult};
use crate::output::{export_artifact, ArtifactReport, RequestWorkspace};
use crate::probe::{InputGate, MediaInfo, MediaInspector};
use crate::utils::Utils;

/// Execute the inspect command
pub fn inspect(args: InspectArgs, config: &MonoShotConfig) -> Result<()> {
    info!("Starting inspect operation");
    info!("Input: {}", args.source.input);

    let path = Path::new(&args.source.input);
    if !path.exists() {
        return Err(anyhow::anyhow!("Input file does not exist: {}", args.source.input));
    }

    let format = InputGate::detect_format(path, args.source.mime.as_deref())?;
    let media_info = MediaInspector::new()
        .inspect(path, format)
        .context("Failed to inspect input file")?;

    let gate = InputGate::new(config.input_policy());
    let verdict = match gate.admit(path, args.source.mime.as_deref()) {
        Ok(_) => None,
        Err(e) if e.is_rejection() => Some(e.to_string()),
        Err(e) => return Err(e).context("Failed to evaluate input gate"),
    };

    if args.json {
        #[derive(Serialize)]
        struct InspectReport<'a> {
            #[serde(flatten)]
            info: &'a MediaInfo,
            accepted: bool,
            rejection: Option<&'a str>,
            operations: &'static [&'static str],
        }
        let report = InspectReport {
            info: &media_info,
            accepted: verdict.is_none(),
            rejection: verdict.as_deref(),
            operations: media_info.kind.offered_operations(),
        };
        let json = serde_json::to_string_pretty(&report)
            .context("Failed to serialize media info to JSON")?;
        println!("{}", json);
    } else {
        display_media_info(&media_info, verdict.as_deref());
    }

    info!("Inspect operation completed successfully");
    Ok(())
}

/// Execute the shot command
pub fn shot(args: ShotArgs, config: &MonoShotConfig) -> Result<()> {
    let ShotArgs {
        source,
        kind,
        start,
        end,
        output,
    } = args;

    run_request(config, "Generate Shot", MediaKind::Video, &source, &output, |info| {
        let range = match (start, end) {
            (Some(start), Some(end)) => Some((start, end)),
            (None, None) => None,
            _ => {
                return Err(MonoShotError::invalid_parameter(
                    "start/end",
                    "boomerang needs both --start and --end",
                ))
            }
        };
        let duration = info.duration_secs.unwrap_or_default();
        ParameterBounds::check_shot(&kind, range, duration).map(TransformationRequest::Shot)
    })
}

/// Execute the enhance-image command
pub fn enhance_image(args: EnhanceImageArgs, config: &MonoShotConfig) -> Result<()> {
    let levels = EnhancementLevels::new(args.brightness, args.sharpness, args.contrast, args.color)
        .context("Invalid enhancement levels")?;
    let mode = if args.compose {
        EnhancementMode::Composed
    } else {
        EnhancementMode::Exclusive
    };
    let timestamp = args.timestamp;

    run_request(config, "Enhance Image", MediaKind::Video, &args.source, &args.output, |info| {
        ParameterBounds::check_timestamp(timestamp, info.duration_secs.unwrap_or_default())?;
        Ok(TransformationRequest::EnhanceImage(EnhanceImageParams {
            timestamp_ms: timestamp * 1000,
            levels,
            mode,
        }))
    })
}

/// Execute the enhance-resolution command
pub fn enhance_resolution(args: EnhanceResolutionArgs, config: &MonoShotConfig) -> Result<()> {
    run_request(config, "Enhance Resolution", MediaKind::Image, &args.source, &args.output, |_| {
        Ok(TransformationRequest::EnhanceResolution)
    })
}

/// Execute the filter command
pub fn filter(args: FilterArgs, config: &MonoShotConfig) -> Result<()> {
    let kind = FilterKind::parse(&args.filter)?;
    run_request(config, "Apply Filter", MediaKind::Image, &args.source, &args.output, |_| {
        Ok(TransformationRequest::ApplyFilter(kind))
    })
}

/// Execute the extract-text command
pub fn extract_text(args: ExtractTextArgs, config: &MonoShotConfig) -> Result<()> {
    let output = OutputArgs {
        export: None,
        json: args.json,
    };
    run_request(config, "Extract Text", MediaKind::Image, &args.source, &output, |_| {
        Ok(TransformationRequest::ExtractText)
    })
}

/// Stage, gate, execute, report and clean up one request
fn run_request<F>(
    config: &MonoShotConfig,
    operation: &str,
    required: MediaKind,
    source: &SourceArgs,
    output: &OutputArgs,
    build_request: F,
) -> Result<()>
where
    F: FnOnce(&MediaInfo) -> MonoShotResult<TransformationRequest>,
{
    info!("Input: {}", source.input);

    let workspace = RequestWorkspace::create(config.workspace_root.as_deref())
        .context("Failed to create request workspace")?;
    let staged = workspace
        .stage_source(Path::new(&source.input))
        .context("Failed to stage input file")?;

    let gate = InputGate::new(config.input_policy());
    let (media, media_info) = gate.admit(&staged, source.mime.as_deref())?;

    if media.kind() != required {
        return Err(MonoShotError::WrongMediaKind {
            operation: operation.to_string(),
            expected: required.to_string(),
        }
        .into());
    }

    let request = build_request(&media_info)?;
    info!("Request: {}", request.label());

    let engine = TransformationEngine::new(config.engine_config());
    let artifact = engine
        .execute(&request, &media, &workspace)
        .with_context(|| format!("{} failed", request.label()))?;

    match artifact {
        Artifact::File(_) => {
            let path = workspace.collect_artifact()?;
            let report = ArtifactReport::from_path(&path)?;
            print_report(&report, output.json)?;
            if let Some(destination) = &output.export {
                let exported = export_artifact(&path, Path::new(destination))
                    .context("Failed to export artifact")?;
                println!("Saved to {}", exported.display());
            }
        }
        Artifact::Text(outcome) => print_text(&outcome, output.json)?,
    }

    if let Err(e) = workspace.close() {
        warn!("Failed to clean up workspace: {}", e);
    }
    Ok(())
}

fn print_report(report: &ArtifactReport, json: bool) -> Result<()> {
    if json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        println!("File Details");
        println!("============");
        println!("File Name: {}", report.file_name);
        println!("File Type: {}", report.file_type);
        println!("File Size: {}", Utils::format_file_size(report.size_bytes));
    }
    Ok(())
}

fn print_text(outcome: &OcrOutcome, json: bool) -> Result<()> {
    if json {
        let json = serde_json::json!({ "text": outcome.text() });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }
    match outcome {
        OcrOutcome::Text(text) => println!("{}", text.trim_end()),
        OcrOutcome::NoText => println!("No text found in the image"),
    }
    Ok(())
}

/// Display media information in human-readable format
fn display_media_info(media_info: &MediaInfo, rejection: Option<&str>) {
    println!("Media Information");
    println!("=================");
    println!("File: {}", media_info.path);
    println!("Type: {} ({})", media_info.kind, media_info.format.extension());
    println!("Size: {}", Utils::format_file_size(media_info.file_size));
    println!("Resolution: {}", media_info.resolution);
    if let Some(codec) = &media_info.codec {
        println!("Codec: {}", codec);
    }
    if let Some(rate) = media_info.frame_rate {
        println!("Frame rate: {:.2} fps", rate);
    }
    if let Some(frames) = media_info.frame_count {
        println!("Frames: {}", frames);
    }
    if let Some(duration) = media_info.duration_secs {
        println!(
            "Duration: {}",
            Utils::format_duration(std::time::Duration::from_secs(duration))
        );
    }
    println!(
        "Within 480p-1080p band: {}",
        if media_info.in_resolution_band { "yes" } else { "no" }
    );
    match rejection {
        None => println!("Accepted: yes"),
        Some(reason) => println!("Accepted: no ({})", reason),
    }
    println!("Operations: {}", media_info.kind.offered_operations().join(", "));
}
