//! Stylistic image filters

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::{box_filter, gaussian_blur_f32, median_filter};
use tracing::{debug, info};

use crate::domain::model::{FilterKind, MediaKind, SourceMedia};
use crate::engine::decode::load_image;
use crate::engine::enhance::luma;
use crate::engine::{Artifact, Transformation};
use crate::error::MonoShotResult;
use crate::output::{PartialOutput, RequestWorkspace};

/// Gaussian sigma OpenCV derives for a 21x21 kernel
const SKETCH_SIGMA: f32 = 3.5;
/// Gaussian sigma OpenCV derives for a 151x151 kernel
const DOCUMENT_SIGMA: f32 = 23.0;
const DOCUMENT_C: i32 = 10;
const CARTOON_BLOCK: u32 = 7;
const CARTOON_C: i32 = 2;
const BILATERAL_RADIUS: i32 = 5;
const BILATERAL_SIGMA_COLOR: f32 = 250.0;
const BILATERAL_SIGMA_SPACE: f32 = 250.0;
const STYLIZE_SIGMA_S: f32 = 60.0;
const STYLIZE_SIGMA_R: f32 = 0.07;
const VIGNETTE_SIGMA: f64 = 450.0;

/// Load the image at `source`, apply `filter` and save it into `output_dir`
pub fn apply_filter(source: &Path, output_dir: &Path, filter: FilterKind) -> MonoShotResult<PathBuf> {
    let image = load_image(source)?;
    debug!(
        "Loaded {} ({}x{})",
        source.display(),
        image.width(),
        image.height()
    );

    let filtered = render(&image, filter);

    let guard = PartialOutput::new(output_dir.join(filter.output_file_name()))?;
    filtered.save(guard.path())?;
    let path = guard.commit()?;
    info!("Applied {} filter: {}", filter, path.display());
    Ok(path)
}

/// Apply a filter in memory
pub fn render(image: &RgbImage, filter: FilterKind) -> DynamicImage {
    match filter {
        FilterKind::PencilSketch => DynamicImage::ImageLuma8(pencil_sketch(image)),
        FilterKind::Faded => DynamicImage::ImageLuma8(grayscale(image)),
        FilterKind::WaterColored => DynamicImage::ImageRgb8(stylize(image)),
        FilterKind::Cartoonify => DynamicImage::ImageRgb8(cartoonify(image)),
        FilterKind::Document => DynamicImage::ImageLuma8(document(image)),
        FilterKind::Vignette => DynamicImage::ImageRgb8(vignette(image)),
        FilterKind::Phantom => DynamicImage::ImageRgb8(phantom(image)),
        FilterKind::Negative => DynamicImage::ImageRgb8(negative(image)),
    }
}

pub fn grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([luma(image.get_pixel(x, y))])
    })
}

pub fn negative(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0 = pixel.0.map(|v| 255 - v);
    }
    out
}

/// Grayscale divided by its blurred inverse ("colour dodge")
pub fn pencil_sketch(image: &RgbImage) -> GrayImage {
    let gray = grayscale(image);
    let mut inverted = gray.clone();
    for pixel in inverted.pixels_mut() {
        pixel.0[0] = 255 - pixel.0[0];
    }
    let blurred = gaussian_blur_f32(&inverted, SKETCH_SIGMA);

    let mut out = gray.clone();
    for (dst, (g, b)) in out.pixels_mut().zip(gray.pixels().zip(blurred.pixels())) {
        let denom = 255 - u32::from(b.0[0]);
        dst.0[0] = if denom == 0 {
            0
        } else {
            ((f64::from(g.0[0]) * 256.0 / f64::from(denom)).round()).min(255.0) as u8
        };
    }
    out
}

/// Binarize against a large Gaussian-weighted neighbourhood, then despeckle
pub fn document(image: &RgbImage) -> GrayImage {
    let gray = grayscale(image);
    let local = gaussian_blur_f32(&gray, DOCUMENT_SIGMA);
    let binary = threshold_against(&gray, &local, DOCUMENT_C);
    median_filter(&binary, 1, 1)
}

/// Smooth colours and keep them only where the edge mask is set
pub fn cartoonify(image: &RgbImage) -> RgbImage {
    let smooth = bilateral(image, BILATERAL_RADIUS, BILATERAL_SIGMA_COLOR, BILATERAL_SIGMA_SPACE);
    let gray = median_filter(&grayscale(&smooth), 2, 2);
    let local = box_filter(&gray, CARTOON_BLOCK / 2, CARTOON_BLOCK / 2);
    let mask = threshold_against(&gray, &local, CARTOON_C);

    let mut out = smooth;
    for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
        if m.0[0] == 0 {
            *pixel = Rgb([0, 0, 0]);
        }
    }
    out
}

/// Darken towards the corners with a separable Gaussian mask
pub fn vignette(image: &RgbImage) -> RgbImage {
    let (w, h) = image.dimensions();
    let kx = gaussian_profile(w);
    let ky = gaussian_profile(h);

    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let weight = kx[x as usize] * ky[y as usize];
        pixel.0 = pixel.0.map(|v| (f64::from(v) * weight) as u8);
    }
    out
}

/// Laplacian-style edge kernel; flat regions turn black.
///
/// Borders are mirrored without repeating the edge pixel (OpenCV's
/// `BORDER_REFLECT_101`), which `imageproc::filter::filter3x3` does not offer.
pub fn phantom(image: &RgbImage) -> RgbImage {
    const KERNEL: [[i32; 3]; 3] = [[1, 1, 1], [1, -8, 1], [1, 1, 1]];
    let (w, h) = image.dimensions();

    RgbImage::from_fn(w, h, |x, y| {
        let mut acc = [0i32; 3];
        for (ky, row) in KERNEL.iter().enumerate() {
            for (kx, weight) in row.iter().enumerate() {
                let sx = reflect101(x as i64 + kx as i64 - 1, w);
                let sy = reflect101(y as i64 + ky as i64 - 1, h);
                let p = image.get_pixel(sx, sy);
                for (sum, v) in acc.iter_mut().zip(p.0) {
                    *sum += weight * i32::from(v);
                }
            }
        }
        Rgb(acc.map(|v| v.clamp(0, 255) as u8))
    })
}

/// Edge-preserving "watercolour" stylization.
///
/// Recursive domain-transform smoothing followed by darkening along the
/// gradient magnitude of the smoothed image.
pub fn stylize(image: &RgbImage) -> RgbImage {
    let (w, h) = (image.width() as usize, image.height() as usize);
    if w == 0 || h == 0 {
        return image.clone();
    }

    let mut planes: Vec<Vec<f32>> = (0..3)
        .map(|c| image.pixels().map(|p| f32::from(p.0[c]) / 255.0).collect())
        .collect();
    domain_transform(&mut planes, w, h, STYLIZE_SIGMA_S, STYLIZE_SIGMA_R);

    let mut magnitude = vec![0f32; w * h];
    for plane in &planes {
        for y in 0..h {
            for x in 0..w {
                let (gx, gy) = sobel_at(plane, w, h, x, y);
                magnitude[y * w + x] += gx * gx + gy * gy;
            }
        }
    }

    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let i = y as usize * w + x as usize;
        let shade = (1.0 - magnitude[i].sqrt()).clamp(0.0, 1.0);
        Rgb([0, 1, 2].map(|c| (planes[c][i] * shade * 255.0).round().clamp(0.0, 255.0) as u8))
    })
}

/// Three-iteration recursive filter over the domain transform of `planes`
fn domain_transform(planes: &mut [Vec<f32>], w: usize, h: usize, sigma_s: f32, sigma_r: f32) {
    const ITERATIONS: i32 = 3;
    let ratio = sigma_s / sigma_r;

    // Horizontal and vertical derivatives of the domain transform, from the source
    let mut dx = vec![1f32; w * h];
    let mut dy = vec![1f32; w * h];
    for plane in planes.iter() {
        for y in 0..h {
            for x in 1..w {
                dx[y * w + x] += ratio * (plane[y * w + x] - plane[y * w + x - 1]).abs();
            }
        }
        for y in 1..h {
            for x in 0..w {
                dy[y * w + x] += ratio * (plane[y * w + x] - plane[(y - 1) * w + x]).abs();
            }
        }
    }

    let norm = (4f32.powi(ITERATIONS) - 1.0).sqrt();
    for i in 0..ITERATIONS {
        let sigma_h = sigma_s * 3f32.sqrt() * 2f32.powi(ITERATIONS - (i + 1)) / norm;
        let a = (-(2f32.sqrt()) / sigma_h).exp();
        let vx: Vec<f32> = dx.iter().map(|d| a.powf(*d)).collect();
        let vy: Vec<f32> = dy.iter().map(|d| a.powf(*d)).collect();

        for plane in planes.iter_mut() {
            for y in 0..h {
                let row = y * w;
                for x in 1..w {
                    let i = row + x;
                    plane[i] += vx[i] * (plane[i - 1] - plane[i]);
                }
                for x in (0..w.saturating_sub(1)).rev() {
                    let i = row + x;
                    plane[i] += vx[i + 1] * (plane[i + 1] - plane[i]);
                }
            }
            for x in 0..w {
                for y in 1..h {
                    let i = y * w + x;
                    plane[i] += vy[i] * (plane[i - w] - plane[i]);
                }
                for y in (0..h.saturating_sub(1)).rev() {
                    let i = y * w + x;
                    plane[i] += vy[i + w] * (plane[i + w] - plane[i]);
                }
            }
        }
    }
}

fn sobel_at(plane: &[f32], w: usize, h: usize, x: usize, y: usize) -> (f32, f32) {
    let at = |dx: i64, dy: i64| {
        let sx = reflect101(x as i64 + dx, w as u32) as usize;
        let sy = reflect101(y as i64 + dy, h as u32) as usize;
        plane[sy * w + sx]
    };
    let gx = (at(1, -1) + 2.0 * at(1, 0) + at(1, 1)) - (at(-1, -1) + 2.0 * at(-1, 0) + at(-1, 1));
    let gy = (at(-1, 1) + 2.0 * at(0, 1) + at(1, 1)) - (at(-1, -1) + 2.0 * at(0, -1) + at(1, -1));
    (gx, gy)
}

/// Edge-preserving smoothing over a disc of `radius` pixels
fn bilateral(image: &RgbImage, radius: i32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let (w, h) = image.dimensions();
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let offsets: Vec<(i32, i32, f32)> = (-radius..=radius)
        .flat_map(|dy| (-radius..=radius).map(move |dx| (dx, dy)))
        .filter(|(dx, dy)| dx * dx + dy * dy <= radius * radius)
        .map(|(dx, dy)| (dx, dy, ((dx * dx + dy * dy) as f32 * space_coeff).exp()))
        .collect();
    let color_weight: Vec<f32> = (0..=255 * 3)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    RgbImage::from_fn(w, h, |x, y| {
        let centre = image.get_pixel(x, y).0;
        let mut sum = [0f32; 3];
        let mut total = 0f32;
        for &(dx, dy, space) in &offsets {
            let sx = reflect101(i64::from(x as i32 + dx), w);
            let sy = reflect101(i64::from(y as i32 + dy), h);
            let p = image.get_pixel(sx, sy).0;
            let distance: usize = p
                .iter()
                .zip(centre)
                .map(|(a, b)| (i32::from(*a) - i32::from(b)).unsigned_abs() as usize)
                .sum();
            let weight = space * color_weight[distance];
            for (s, v) in sum.iter_mut().zip(p) {
                *s += weight * f32::from(v);
            }
            total += weight;
        }
        Rgb(sum.map(|s| (s / total).round().clamp(0.0, 255.0) as u8))
    })
}

/// 255 where `src > local - c`, else 0
fn threshold_against(src: &GrayImage, local: &GrayImage, c: i32) -> GrayImage {
    let mut out = src.clone();
    for (dst, (s, m)) in out.pixels_mut().zip(src.pixels().zip(local.pixels())) {
        dst.0[0] = if i32::from(s.0[0]) > i32::from(m.0[0]) - c { 255 } else { 0 };
    }
    out
}

/// Centred Gaussian profile of length `n`, normalized so its peak is 1
fn gaussian_profile(n: u32) -> Vec<f64> {
    let centre = (f64::from(n) - 1.0) / 2.0;
    let profile: Vec<f64> = (0..n)
        .map(|i| (-(f64::from(i) - centre).powi(2) / (2.0 * VIGNETTE_SIGMA * VIGNETTE_SIGMA)).exp())
        .collect();
    let peak = profile.iter().copied().fold(0.0, f64::max);
    if peak > 0.0 {
        profile.into_iter().map(|v| v / peak).collect()
    } else {
        profile
    }
}

/// Mirror an out-of-range coordinate without repeating the edge pixel
fn reflect101(i: i64, len: u32) -> u32 {
    let n = i64::from(len);
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as u32
}

/// Apply Filter transformation
pub struct StyleFilter {
    kind: FilterKind,
}

impl StyleFilter {
    pub fn new(kind: FilterKind) -> Self {
        Self { kind }
    }
}

impl Transformation for StyleFilter {
    fn name(&self) -> String {
        format!("Apply Filter ({})", self.kind)
    }

    fn accepts(&self) -> MediaKind {
        MediaKind::Image
    }

    fn apply(&self, source: &SourceMedia, workspace: &RequestWorkspace) -> MonoShotResult<Artifact> {
        apply_filter(&source.path, workspace.output_dir(), self.kind).map(Artifact::File)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RgbImage {
        RgbImage::from_fn(160, 144, |x, y| {
            Rgb([(x % 256) as u8, ((y * 3) % 256) as u8, ((x * y) % 256) as u8])
        })
    }

    #[test]
    fn test_negative_inverts_each_channel() {
        let image = sample();
        let inverted = negative(&image);
        for (out, src) in inverted.pixels().zip(image.pixels()) {
            assert_eq!(out.0, src.0.map(|v| 255 - v));
        }
    }

    #[test]
    fn test_faded_is_single_channel() {
        let faded = render(&sample(), FilterKind::Faded);
        assert!(matches!(faded, DynamicImage::ImageLuma8(_)));
        assert_eq!((faded.width(), faded.height()), (160, 144));
    }

    #[test]
    fn test_every_filter_keeps_dimensions() {
        let image = sample();
        for kind in FilterKind::ALL {
            let out = render(&image, kind);
            assert_eq!((out.width(), out.height()), (160, 144), "{}", kind);
        }
    }

    #[test]
    fn test_phantom_flat_image_is_black() {
        let flat = RgbImage::from_pixel(9, 9, Rgb([120, 60, 200]));
        assert!(phantom(&flat).as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_vignette_centre_brighter_than_corners() {
        let white = RgbImage::from_pixel(101, 61, Rgb([255, 255, 255]));
        let out = vignette(&white);
        let centre = out.get_pixel(50, 30).0[0];
        assert!(centre >= 254);
        assert!(out.get_pixel(0, 0).0[0] <= centre);
        assert!(out.get_pixel(100, 60).0[0] <= centre);
    }

    #[test]
    fn test_pencil_sketch_of_white_is_white() {
        let white = RgbImage::from_pixel(30, 30, Rgb([255, 255, 255]));
        let sketch = pencil_sketch(&white);
        assert!(sketch.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_document_is_binary() {
        let doc = document(&sample());
        assert!(doc.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_cartoonify_flat_image_keeps_colour() {
        let flat = RgbImage::from_pixel(12, 12, Rgb([90, 140, 60]));
        let cartoon = cartoonify(&flat);
        assert!(cartoon.pixels().all(|p| *p == Rgb([90, 140, 60])));
    }

    #[test]
    fn test_stylize_flat_image_keeps_colour() {
        let flat = RgbImage::from_pixel(12, 12, Rgb([200, 100, 50]));
        let out = stylize(&flat);
        assert_eq!(out.get_pixel(6, 6).0, [200, 100, 50]);
    }

    #[test]
    fn test_reflect101() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(2, 5), 2);
        assert_eq!(reflect101(-3, 1), 0);
    }
}
