//! Still extraction and ImageEnhance-style adjustments

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use tracing::{debug, info};

use crate::domain::model::{EnhanceImageParams, EnhancementKind, MediaKind, SourceMedia};
use crate::domain::rules::EnhancementRules;
use crate::engine::decode::FrameReader;
use crate::engine::{Artifact, Transformation};
use crate::error::MonoShotResult;
use crate::output::{PartialOutput, RequestWorkspace};

pub const ENHANCED_IMAGE_FILE: &str = "enhanced_img.png";

/// Grab the frame at the requested timestamp, normalize it and apply the enhancement plan
pub fn enhance_image(
    source: &Path,
    output_dir: &Path,
    params: &EnhanceImageParams,
) -> MonoShotResult<PathBuf> {
    let mut reader = FrameReader::open(source)?;
    let frame = reader.frame_at_ms(params.timestamp_ms)?;
    debug!(
        "Extracted frame {} at {:.3}s for enhancement",
        frame.index, frame.timestamp
    );

    let mut image = normalize_min_max(&frame.image);
    for (kind, factor) in EnhancementRules::plan(&params.levels, params.mode) {
        info!("Applying {} x{:.1}", kind, factor);
        image = adjust(&image, kind, factor);
    }

    let guard = PartialOutput::new(output_dir.join(ENHANCED_IMAGE_FILE))?;
    image.save(guard.path())?;
    guard.commit()
}

/// Stretch intensities so the joint min/max over all channels maps to 0..255
pub fn normalize_min_max(image: &RgbImage) -> RgbImage {
    let raw = image.as_raw();
    let (min, max) = raw
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if raw.is_empty() || max == min {
        return RgbImage::new(image.width(), image.height());
    }

    let scale = 255.0 / f64::from(max - min);
    let data = raw
        .iter()
        .map(|&v| (f64::from(v - min) * scale).round().clamp(0.0, 255.0) as u8)
        .collect();
    RgbImage::from_raw(image.width(), image.height(), data)
        .unwrap_or_else(|| RgbImage::new(image.width(), image.height()))
}

/// Apply one adjustment by blending against its degenerate image
pub fn adjust(image: &RgbImage, kind: EnhancementKind, factor: f32) -> RgbImage {
    let degenerate = match kind {
        EnhancementKind::Brightness => RgbImage::new(image.width(), image.height()),
        EnhancementKind::Contrast => {
            let mean = mean_luma(image);
            RgbImage::from_pixel(image.width(), image.height(), Rgb([mean, mean, mean]))
        }
        EnhancementKind::Color => grayscale_rgb(image),
        EnhancementKind::Sharpness => smooth(image),
    };
    blend(&degenerate, image, factor)
}

/// `degenerate + factor * (image - degenerate)`, truncated into 0..255
fn blend(degenerate: &RgbImage, image: &RgbImage, factor: f32) -> RgbImage {
    let data = degenerate
        .as_raw()
        .iter()
        .zip(image.as_raw())
        .map(|(&d, &v)| {
            let out = f32::from(d) + factor * (f32::from(v) - f32::from(d));
            if out <= 0.0 {
                0
            } else if out >= 255.0 {
                255
            } else {
                out as u8
            }
        })
        .collect();
    RgbImage::from_raw(image.width(), image.height(), data)
        .unwrap_or_else(|| image.clone())
}

/// ITU-R 601 luma in 16.16 fixed point
pub(crate) fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000) >> 16) as u8
}

fn mean_luma(image: &RgbImage) -> u8 {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return 0;
    }
    let total: u64 = image.pixels().map(|p| u64::from(luma(p))).sum();
    (total as f64 / count as f64 + 0.5) as u8
}

fn grayscale_rgb(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let l = luma(pixel);
        *pixel = Rgb([l, l, l]);
    }
    out
}

/// 3x3 smoothing kernel (centre weight 5, total 13); the one-pixel border is kept
fn smooth(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0u32; 3];
            for dy in 0..3 {
                for dx in 0..3 {
                    let weight = if dx == 1 && dy == 1 { 5 } else { 1 };
                    let p = image.get_pixel(x + dx - 1, y + dy - 1);
                    for c in 0..3 {
                        acc[c] += weight * u32::from(p[c]);
                    }
                }
            }
            let px = acc.map(|sum| ((sum as f32 / 13.0) + 0.5).min(255.0) as u8);
            out.put_pixel(x, y, Rgb(px));
        }
    }
    out
}

/// Enhance Image transformation
pub struct FrameEnhancer {
    params: EnhanceImageParams,
}

impl FrameEnhancer {
    pub fn new(params: EnhanceImageParams) -> Self {
        Self { params }
    }
}

impl Transformation for FrameEnhancer {
    fn name(&self) -> String {
        "Enhance Image".to_string()
    }

    fn accepts(&self) -> MediaKind {
        MediaKind::Video
    }

    fn apply(&self, source: &SourceMedia, workspace: &RequestWorkspace) -> MonoShotResult<Artifact> {
        enhance_image(&source.path, workspace.output_dir(), &self.params).map(Artifact::File)
    }
}
