//! Video shots: slow motion, time-lapse, GIF and boomerang

use std::path::{Path, PathBuf};

use ffmpeg_next::Rational;
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::{debug, info};

use crate::domain::model::{BoomerangRange, MediaKind, Resolution, ShotKind, SourceMedia};
use crate::domain::rules::{
    BoomerangPlan, FrameSelection, GeometryRules, BOOMERANG_CROP, BOOMERANG_FPS, BOOMERANG_SPEED,
    GIF_SCALE, SLOW_MOTION_RATE, TIME_LAPSE_FPS, TIME_LAPSE_STRIDE,
};
use crate::engine::decode::FrameReader;
use crate::engine::encode::{GifWriter, Mp4Writer};
use crate::engine::{Artifact, Transformation};
use crate::error::{MonoShotError, MonoShotResult};
use crate::output::{PartialOutput, RequestWorkspace};

/// Render `kind` from the video at `source` into `output_dir`
pub fn generate_shot(source: &Path, kind: ShotKind, output_dir: &Path) -> MonoShotResult<PathBuf> {
    let guard = PartialOutput::new(output_dir.join(kind.output_file_name()))?;

    let frames = match kind {
        ShotKind::SlowMotion => {
            let rate = Rational::new(SLOW_MOTION_RATE.0, SLOW_MOTION_RATE.1);
            write_mp4(source, guard.path(), rate, 1)?
        }
        ShotKind::TimeLapse => {
            let rate = Rational::new(TIME_LAPSE_FPS, 1);
            write_mp4(source, guard.path(), rate, TIME_LAPSE_STRIDE)?
        }
        ShotKind::Gif => write_gif(source, guard.path())?,
        ShotKind::Boomerang(range) => write_boomerang(source, guard.path(), range)?,
    };

    let path = guard.commit()?;
    info!("{} shot written to {} ({} frames)", kind, path.display(), frames);
    Ok(path)
}

fn no_frames(source: &Path) -> MonoShotError {
    MonoShotError::DecodeError {
        message: format!("no frames could be decoded from {}", source.display()),
    }
}

/// Re-encode every `stride`-th frame at a fixed output rate
fn write_mp4(source: &Path, target: &Path, rate: Rational, stride: u64) -> MonoShotResult<u64> {
    let mut reader = FrameReader::open(source)?;
    let mut writer: Option<Mp4Writer> = None;

    while let Some(frame) = reader.next_frame()? {
        if !FrameSelection::keeps(frame.index, stride) {
            continue;
        }
        if writer.is_none() {
            let resolution = Resolution::new(frame.image.width(), frame.image.height());
            writer = Some(Mp4Writer::create(target, resolution, rate)?);
        }
        if let Some(encoder) = writer.as_mut() {
            encoder.write(&frame.image)?;
        }
    }

    match writer {
        Some(encoder) => encoder.finish(),
        None => Err(no_frames(source)),
    }
}

/// Downscale every frame and loop it at the source frame rate
fn write_gif(source: &Path, target: &Path) -> MonoShotResult<u64> {
    let mut reader = FrameReader::open(source)?;
    let scaled = GeometryRules::scaled(reader.resolution(), GIF_SCALE);
    let mut writer = GifWriter::create(target, reader.frame_rate())?;
    let mut frames = 0u64;

    while let Some(frame) = reader.next_frame()? {
        let resized = resize(&frame.image, scaled);
        writer.write(&resized)?;
        frames += 1;
    }

    if frames == 0 {
        return Err(no_frames(source));
    }
    writer.finish()
}

/// Sped-up sub-clip followed by its reverse, cropped and looped
fn write_boomerang(source: &Path, target: &Path, range: BoomerangRange) -> MonoShotResult<u64> {
    let mut reader = FrameReader::open(source)?;

    BoomerangPlan::validate(&range, reader.duration_secs())?;
    let scaled = GeometryRules::scaled(reader.resolution(), GIF_SCALE);
    BOOMERANG_CROP.check_fits(scaled)?;

    let clip = collect_subclip(&mut reader, range, scaled)?;
    if clip.is_empty() {
        return Err(no_frames(source));
    }
    debug!("Boomerang sub-clip holds {} frames", clip.len());

    let plan = BoomerangPlan::new(range, BOOMERANG_SPEED, BOOMERANG_FPS);
    let mut writer = GifWriter::create(target, f64::from(BOOMERANG_FPS))?;
    for t in plan.timeline() {
        writer.write(sample_at(&clip, t))?;
    }

    info!(
        "Boomerang {:.2}s-{:.2}s: {} frames, {:.2}s",
        range.start,
        range.end,
        plan.frame_count(),
        plan.duration_secs()
    );
    writer.finish()
}

/// Decode `[start, end)` resized and cropped; the last frame shown at `start` is kept as anchor
fn collect_subclip(
    reader: &mut FrameReader,
    range: BoomerangRange,
    scaled: Resolution,
) -> MonoShotResult<Vec<(f64, RgbImage)>> {
    reader.seek_ms((range.start * 1000.0) as u64)?;

    let mut clip: Vec<(f64, RgbImage)> = Vec::new();
    let mut anchor: Option<(f64, RgbImage)> = None;

    while let Some(frame) = reader.next_frame()? {
        if frame.timestamp >= range.end {
            break;
        }
        if frame.timestamp < range.start {
            anchor = Some((frame.timestamp, frame.image));
            continue;
        }
        if clip.is_empty() {
            if let Some((ts, image)) = anchor.take() {
                if frame.timestamp > range.start {
                    clip.push((ts, crop_boomerang(&resize(&image, scaled))));
                }
            }
        }
        clip.push((frame.timestamp, crop_boomerang(&resize(&frame.image, scaled))));
    }

    if clip.is_empty() {
        if let Some((ts, image)) = anchor {
            clip.push((ts, crop_boomerang(&resize(&image, scaled))));
        }
    }
    Ok(clip)
}

/// Last frame presented at or before `t`, else the first frame
fn sample_at(clip: &[(f64, RgbImage)], t: f64) -> &RgbImage {
    let shown = clip.partition_point(|(ts, _)| *ts <= t + 1e-6);
    &clip[shown.saturating_sub(1)].1
}

fn resize(image: &RgbImage, target: Resolution) -> RgbImage {
    if image.width() == target.width && image.height() == target.height {
        return image.clone();
    }
    imageops::resize(image, target.width, target.height, FilterType::Triangle)
}

fn crop_boomerang(image: &RgbImage) -> RgbImage {
    imageops::crop_imm(
        image,
        BOOMERANG_CROP.x1,
        BOOMERANG_CROP.y1,
        BOOMERANG_CROP.width(),
        BOOMERANG_CROP.height(),
    )
    .to_image()
}

/// Shot transformation
pub struct ShotTransformation {
    kind: ShotKind,
}

impl ShotTransformation {
    pub fn new(kind: ShotKind) -> Self {
        Self { kind }
    }
}

impl Transformation for ShotTransformation {
    fn name(&self) -> String {
        format!("Generate Shot ({})", self.kind)
    }

    fn accepts(&self) -> MediaKind {
        MediaKind::Video
    }

    fn apply(&self, source: &SourceMedia, workspace: &RequestWorkspace) -> MonoShotResult<Artifact> {
        generate_shot(&source.path, self.kind, workspace.output_dir()).map(Artifact::File)
    }
}
