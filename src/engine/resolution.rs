//! Super-resolution: FSRCNN on luma, bicubic chroma, then non-local-means denoising

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::model::{MediaKind, SourceMedia};
use crate::engine::decode::load_image;
use crate::engine::{Artifact, Transformation};
use crate::error::{MonoShotError, MonoShotResult};
use crate::output::{PartialOutput, RequestWorkspace};

pub const ENHANCED_RESOLUTION_FILE: &str = "enhanced_resolution.png";
/// Upscaling factor of the FSRCNN x4 model
pub const MODEL_SCALE: u32 = 4;

/// A single-channel super-resolution network.
///
/// Input and output are `[1, 1, H, W]` tensors with values in `0.0..=1.0`.
pub trait LumaModel {
    /// Spatial scale between input and output
    fn factor(&self) -> u32;

    fn infer(&mut self, luma: Array4<f32>) -> MonoShotResult<Array4<f32>>;
}

/// FSRCNN exported to ONNX, run with onnxruntime
pub struct OnnxLumaModel {
    session: Session,
    path: PathBuf,
}

impl OnnxLumaModel {
    pub fn load(path: &Path, threads: usize) -> MonoShotResult<Self> {
        let unavailable = |message: String| MonoShotError::ModelUnavailable {
            path: path.display().to_string(),
            message,
        };

        if !path.is_file() {
            return Err(unavailable("model file not found".to_string()));
        }

        info!("Loading super-resolution model from {}", path.display());
        let session = Session::builder()
            .map_err(|e| unavailable(e.to_string()))?
            .with_intra_threads(threads.max(1))
            .map_err(|e| unavailable(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| unavailable(e.to_string()))?;

        Ok(Self {
            session,
            path: path.to_path_buf(),
        })
    }
}

impl LumaModel for OnnxLumaModel {
    fn factor(&self) -> u32 {
        MODEL_SCALE
    }

    fn infer(&mut self, luma: Array4<f32>) -> MonoShotResult<Array4<f32>> {
        let path = self.path.display().to_string();
        let inference = |e: ort::Error| MonoShotError::ModelUnavailable {
            path: path.clone(),
            message: format!("inference failed: {}", e),
        };

        let input = Value::from_array(luma).map_err(inference)?;
        let outputs = self.session.run(ort::inputs![input]).map_err(inference)?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(inference)?;

        if shape.len() != 4 {
            return Err(MonoShotError::ModelUnavailable {
                path,
                message: format!("unexpected output shape {:?}", shape.to_vec()),
            });
        }
        let dims = (
            shape[0] as usize,
            shape[1] as usize,
            shape[2] as usize,
            shape[3] as usize,
        );
        Array4::from_shape_vec(dims, data.to_vec()).map_err(|e| MonoShotError::ModelUnavailable {
            path: path.clone(),
            message: format!("malformed output tensor: {}", e),
        })
    }
}

/// Non-local-means parameters; radii are in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseSettings {
    /// Filter strength for the luma plane
    pub luma_strength: f32,
    /// Filter strength for the chroma planes
    pub chroma_strength: f32,
    pub template_radius: u32,
    pub search_radius: u32,
}

impl Default for DenoiseSettings {
    fn default() -> Self {
        Self {
            luma_strength: 10.0,
            chroma_strength: 10.0,
            template_radius: 1,
            search_radius: 3,
        }
    }
}

/// Planar YCrCb image with f32 samples in 0..255
struct YCrCbPlanes {
    width: u32,
    height: u32,
    y: Vec<f32>,
    cr: Vec<f32>,
    cb: Vec<f32>,
}

impl YCrCbPlanes {
    fn from_rgb(image: &RgbImage) -> Self {
        let capacity = image.as_raw().len() / 3;
        let (mut y, mut cr, mut cb) = (
            Vec::with_capacity(capacity),
            Vec::with_capacity(capacity),
            Vec::with_capacity(capacity),
        );
        for pixel in image.pixels() {
            let [r, g, b] = pixel.0.map(f32::from);
            let luma = 0.299 * r + 0.587 * g + 0.114 * b;
            y.push(luma);
            cr.push((r - luma) * 0.713 + 128.0);
            cb.push((b - luma) * 0.564 + 128.0);
        }
        Self {
            width: image.width(),
            height: image.height(),
            y,
            cr,
            cb,
        }
    }

    fn to_rgb(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let i = (y * self.width + x) as usize;
            let (l, cr, cb) = (self.y[i], self.cr[i] - 128.0, self.cb[i] - 128.0);
            let r = l + 1.403 * cr;
            let g = l - 0.714 * cr - 0.344 * cb;
            let b = l + 1.773 * cb;
            Rgb([r, g, b].map(|v| v.round().clamp(0.0, 255.0) as u8))
        })
    }
}

/// Upscale an RGB image: luma through `model`, chroma bicubically
pub fn upscale_rgb(image: &RgbImage, model: &mut dyn LumaModel) -> MonoShotResult<RgbImage> {
    let factor = model.factor();
    let (w, h) = image.dimensions();
    let planes = YCrCbPlanes::from_rgb(image);

    let input = Array4::from_shape_vec(
        (1, 1, h as usize, w as usize),
        planes.y.iter().map(|v| v / 255.0).collect(),
    )
    .map_err(|e| MonoShotError::Geometry {
        message: format!("luma tensor does not match {}x{}: {}", w, h, e),
    })?;

    let output = model.infer(input)?;
    let (target_w, target_h) = (w * factor, h * factor);
    let shape = output.shape();
    if shape[2] != target_h as usize || shape[3] != target_w as usize {
        return Err(MonoShotError::Geometry {
            message: format!(
                "model produced {}x{}, expected {}x{}",
                shape[3], shape[2], target_w, target_h
            ),
        });
    }
    debug!("Upscaled luma {}x{} -> {}x{}", w, h, target_w, target_h);

    let upscale_plane = |plane: &[f32]| -> Vec<f32> {
        let gray = GrayImage::from_fn(w, h, |x, y| {
            Luma([plane[(y * w + x) as usize].round().clamp(0.0, 255.0) as u8])
        });
        imageops::resize(&gray, target_w, target_h, FilterType::CatmullRom)
            .into_raw()
            .into_iter()
            .map(f32::from)
            .collect()
    };

    let upscaled = YCrCbPlanes {
        width: target_w,
        height: target_h,
        y: output.iter().map(|v| (v * 255.0).clamp(0.0, 255.0)).collect(),
        cr: upscale_plane(&planes.cr),
        cb: upscale_plane(&planes.cb),
    };
    Ok(upscaled.to_rgb())
}

/// Colour-aware non-local-means: luma and chroma are denoised with their own strengths
pub fn denoise_colored(image: &RgbImage, settings: &DenoiseSettings) -> RgbImage {
    let mut planes = YCrCbPlanes::from_rgb(image);
    let (w, h) = (planes.width as usize, planes.height as usize);

    let luma = nl_means(&[&planes.y], w, h, settings.luma_strength, settings);
    let chroma = nl_means(&[&planes.cr, &planes.cb], w, h, settings.chroma_strength, settings);

    let mut luma = luma.into_iter();
    let mut chroma = chroma.into_iter();
    if let Some(y) = luma.next() {
        planes.y = y;
    }
    if let (Some(cr), Some(cb)) = (chroma.next(), chroma.next()) {
        planes.cr = cr;
        planes.cb = cb;
    }
    planes.to_rgb()
}

/// Weighted average over the search window; weights come from mean squared patch distance
fn nl_means(
    planes: &[&Vec<f32>],
    w: usize,
    h: usize,
    strength: f32,
    settings: &DenoiseSettings,
) -> Vec<Vec<f32>> {
    let t = settings.template_radius as i64;
    let s = settings.search_radius as i64;
    let h2 = (strength * strength).max(f32::EPSILON);
    let patch_len = ((2 * t + 1) * (2 * t + 1)) as f32 * planes.len() as f32;
    let clamp = |v: i64, len: usize| v.clamp(0, len as i64 - 1) as usize;

    let mut out: Vec<Vec<f32>> = planes.iter().map(|p| vec![0f32; p.len()]).collect();
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let mut sums = vec![0f32; planes.len()];
            let mut total = 0f32;

            for sy in (y - s)..=(y + s) {
                for sx in (x - s)..=(x + s) {
                    let (cy, cx) = (clamp(sy, h), clamp(sx, w));

                    let mut distance = 0f32;
                    for ty in -t..=t {
                        for tx in -t..=t {
                            let a = clamp(y + ty, h) * w + clamp(x + tx, w);
                            let b = clamp(sy + ty, h) * w + clamp(sx + tx, w);
                            for plane in planes {
                                let d = plane[a] - plane[b];
                                distance += d * d;
                            }
                        }
                    }

                    let weight = (-(distance / patch_len) / h2).exp();
                    for (sum, plane) in sums.iter_mut().zip(planes) {
                        *sum += weight * plane[cy * w + cx];
                    }
                    total += weight;
                }
            }

            let i = y as usize * w + x as usize;
            for (dst, sum) in out.iter_mut().zip(&sums) {
                dst[i] = sum / total;
            }
        }
    }
    out
}

/// Enhance Resolution transformation
pub struct SuperResolution {
    model_path: PathBuf,
    threads: usize,
    denoise: DenoiseSettings,
}

impl SuperResolution {
    pub fn new(model_path: PathBuf, threads: usize, denoise: DenoiseSettings) -> Self {
        Self {
            model_path,
            threads,
            denoise,
        }
    }
}

impl Transformation for SuperResolution {
    fn name(&self) -> String {
        "Enhance Resolution".to_string()
    }

    fn accepts(&self) -> MediaKind {
        MediaKind::Image
    }

    fn apply(&self, source: &SourceMedia, workspace: &RequestWorkspace) -> MonoShotResult<Artifact> {
        let mut model = OnnxLumaModel::load(&self.model_path, self.threads)?;
        enhance_resolution(&source.path, workspace.output_dir(), &mut model, &self.denoise)
            .map(Artifact::File)
    }
}

/// Upscale the image at `source` with `model`, denoise it and write `enhanced_resolution.png`
pub fn enhance_resolution(
    source: &Path,
    output_dir: &Path,
    model: &mut dyn LumaModel,
    denoise: &DenoiseSettings,
) -> MonoShotResult<PathBuf> {
    let image = load_image(source)?;
    let upscaled = upscale_rgb(&image, model)?;
    let cleaned = denoise_colored(&upscaled, denoise);

    let guard = PartialOutput::new(output_dir.join(ENHANCED_RESOLUTION_FILE))?;
    cleaned.save(guard.path())?;
    let path = guard.commit()?;
    info!(
        "Enhanced resolution {}x{} -> {}x{}",
        image.width(),
        image.height(),
        cleaned.width(),
        cleaned.height()
    );
    Ok(path)
}
