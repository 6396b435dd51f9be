//! Text extraction: locate text blocks, then OCR each block

use std::cell::RefCell;
use std::io::Cursor;
use std::path::Path;

use image::{GrayImage, ImageFormat, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use leptess::LepTess;
use tracing::{debug, info};

use crate::domain::model::{MediaKind, OcrOutcome, SourceMedia};
use crate::engine::decode::load_image;
use crate::engine::filters::grayscale;
use crate::engine::{Artifact, Transformation};
use crate::error::{MonoShotError, MonoShotResult};
use crate::output::RequestWorkspace;

/// Chebyshev radius of the dilation; a 19x19 square joining characters into blocks
const BLOCK_DILATION_RADIUS: u8 = 9;

/// Recognizes text in an image region
pub trait OcrEngine {
    /// `NoText` when nothing legible is found; errors are engine failures only
    fn recognize(&mut self, image: &RgbImage) -> MonoShotResult<OcrOutcome>;
}

/// Tesseract through leptonica
pub struct TesseractEngine {
    tess: LepTess,
}

impl TesseractEngine {
    pub fn new(language: &str) -> MonoShotResult<Self> {
        let tess = LepTess::new(None, language).map_err(|e| MonoShotError::OcrError {
            message: format!(
                "failed to initialize Tesseract with language '{}': {}",
                language, e
            ),
        })?;
        Ok(Self { tess })
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&mut self, image: &RgbImage) -> MonoShotResult<OcrOutcome> {
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| MonoShotError::OcrError {
                message: format!("failed to encode block: {}", e),
            })?;

        self.tess
            .set_image_from_mem(png.get_ref())
            .map_err(|e| MonoShotError::OcrError {
                message: format!("failed to load block: {}", e),
            })?;

        if self
            .tess
            .get_component_boxes(leptess::capi::TessPageIteratorLevel_RIL_WORD, true)
            .is_none()
        {
            return Ok(OcrOutcome::NoText);
        }

        let text = self.tess.get_utf8_text().map_err(|e| MonoShotError::OcrError {
            message: format!("recognized text is not valid UTF-8: {}", e),
        })?;

        if text.trim().is_empty() {
            Ok(OcrOutcome::NoText)
        } else {
            Ok(OcrOutcome::Text(text))
        }
    }
}

/// Axis-aligned bounding box of a text block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBlock {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Bounding boxes of the outermost blobs after thresholding and dilation, in reading order
pub fn locate_text_blocks(gray: &GrayImage) -> Vec<TextBlock> {
    let mut binary = gray.clone();
    for pixel in binary.pixels_mut() {
        *pixel = Luma([if pixel.0[0] > 0 { 255 } else { 0 }]);
    }
    let dilated = dilate(&binary, Norm::LInf, BLOCK_DILATION_RADIUS);

    let mut blocks: Vec<TextBlock> = find_contours::<u32>(&dilated)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(|contour| {
            let xs = contour.points.iter().map(|p| p.x);
            let ys = contour.points.iter().map(|p| p.y);
            let (x0, x1) = (xs.clone().min()?, xs.max()?);
            let (y0, y1) = (ys.clone().min()?, ys.max()?);
            Some(TextBlock {
                x: x0,
                y: y0,
                width: x1 - x0 + 1,
                height: y1 - y0 + 1,
            })
        })
        .collect();

    blocks.sort_by_key(|block| (block.y, block.x));
    blocks
}

/// Run `engine` on every text block of `image` and concatenate the results
pub fn extract_text(image: &RgbImage, engine: &mut dyn OcrEngine) -> MonoShotResult<OcrOutcome> {
    let blocks = locate_text_blocks(&grayscale(image));
    info!("Found {} candidate text blocks", blocks.len());

    let mut outcome = OcrOutcome::NoText;
    for block in blocks {
        let region =
            image::imageops::crop_imm(image, block.x, block.y, block.width, block.height).to_image();
        let result = engine.recognize(&region)?;
        debug!(
            "Block at ({}, {}) {}x{}: {}",
            block.x,
            block.y,
            block.width,
            block.height,
            if result.text().is_some() { "text" } else { "no text" }
        );
        outcome = outcome.merge(result);
    }
    Ok(outcome)
}

/// OCR the image file at `source`
pub fn extract_text_from_file(source: &Path, engine: &mut dyn OcrEngine) -> MonoShotResult<OcrOutcome> {
    let image = load_image(source)?;
    extract_text(&image, engine)
}

/// Extract Text transformation; the engine is created on first use
pub struct TextExtractor {
    language: String,
    engine: RefCell<Option<Box<dyn OcrEngine>>>,
}

impl TextExtractor {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            engine: RefCell::new(None),
        }
    }

    /// Use a specific engine instead of Tesseract
    pub fn with_engine(engine: Box<dyn OcrEngine>) -> Self {
        Self {
            language: String::new(),
            engine: RefCell::new(Some(engine)),
        }
    }
}

impl Transformation for TextExtractor {
    fn name(&self) -> String {
        "Extract Text".to_string()
    }

    fn accepts(&self) -> MediaKind {
        MediaKind::Image
    }

    fn apply(&self, source: &SourceMedia, _workspace: &RequestWorkspace) -> MonoShotResult<Artifact> {
        let mut slot = self.engine.borrow_mut();
        if slot.is_none() {
            *slot = Some(Box::new(TesseractEngine::new(&self.language)?));
        }
        let engine = slot.as_mut().ok_or_else(|| MonoShotError::OcrError {
            message: "OCR engine unavailable".to_string(),
        })?;
        extract_text_from_file(&source.path, engine.as_mut()).map(Artifact::Text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::cell::Cell;
    use std::rc::Rc;

    struct ScriptedEngine {
        calls: Rc<Cell<usize>>,
        reply: OcrOutcome,
    }

    impl OcrEngine for ScriptedEngine {
        fn recognize(&mut self, _image: &RgbImage) -> MonoShotResult<OcrOutcome> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.reply.clone())
        }
    }

    fn scripted(reply: OcrOutcome) -> (ScriptedEngine, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (
            ScriptedEngine {
                calls: Rc::clone(&calls),
                reply,
            },
            calls,
        )
    }

    fn two_patches() -> RgbImage {
        let mut image = RgbImage::new(200, 80);
        for y in 30..40 {
            for x in 10..30 {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
            for x in 150..170 {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        image
    }

    #[test]
    fn test_black_image_has_no_blocks() {
        let (mut engine, calls) = scripted(OcrOutcome::Text("never".to_string()));
        let outcome = extract_text(&RgbImage::new(64, 64), &mut engine).unwrap();
        assert_eq!(outcome, OcrOutcome::NoText);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_blank_white_image_yields_no_text() {
        let white = RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]));
        let blocks = locate_text_blocks(&grayscale(&white));
        assert_eq!(blocks.len(), 1);
        assert_eq!((blocks[0].width, blocks[0].height), (64, 48));

        let (mut engine, calls) = scripted(OcrOutcome::NoText);
        assert_eq!(extract_text(&white, &mut engine).unwrap(), OcrOutcome::NoText);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_separate_patches_become_separate_blocks() {
        let blocks = locate_text_blocks(&grayscale(&two_patches()));
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].x < blocks[1].x);
        // Dilation grows each patch by the radius on every side
        assert_eq!(blocks[0].width, 20 + 2 * BLOCK_DILATION_RADIUS as u32);
    }

    #[test]
    fn test_block_text_is_concatenated() {
        let (mut engine, calls) = scripted(OcrOutcome::Text("word ".to_string()));
        let outcome = extract_text(&two_patches(), &mut engine).unwrap();
        assert_eq!(outcome, OcrOutcome::Text("word word ".to_string()));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_extractor_uses_injected_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        two_patches().save(&path).unwrap();

        let (engine, _) = scripted(OcrOutcome::Text("x".to_string()));
        let extractor = TextExtractor::with_engine(Box::new(engine));
        let workspace = RequestWorkspace::create(None).unwrap();
        let source = SourceMedia::from_path(&path).unwrap();

        match extractor.apply(&source, &workspace).unwrap() {
            Artifact::Text(outcome) => assert_eq!(outcome.text(), Some("xx")),
            other => panic!("unexpected artifact {:?}", other),
        }
    }
}
