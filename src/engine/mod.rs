//! Transformation engine: one stateless transformation per request

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domain::model::{MediaKind, OcrOutcome, SourceMedia, TransformationRequest};
use crate::error::{MonoShotError, MonoShotResult};
use crate::output::RequestWorkspace;

pub mod decode;
pub mod encode;
pub mod enhance;
pub mod filters;
pub mod ocr;
pub mod resolution;
pub mod shot;

pub use enhance::FrameEnhancer;
pub use filters::StyleFilter;
pub use ocr::{OcrEngine, TesseractEngine, TextExtractor};
pub use resolution::{DenoiseSettings, SuperResolution};
pub use shot::ShotTransformation;

/// What a transformation produced
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// A file in the request's output directory
    File(PathBuf),
    /// Recognized text, reported directly
    Text(OcrOutcome),
}

/// A transformation applied to one source inside one workspace
pub trait Transformation {
    fn name(&self) -> String;

    /// Media kind this transformation operates on
    fn accepts(&self) -> MediaKind;

    fn apply(&self, source: &SourceMedia, workspace: &RequestWorkspace) -> MonoShotResult<Artifact>;
}

/// Settings the engine needs to construct transformations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// FSRCNN x4 ONNX model
    pub model_path: PathBuf,
    /// Tesseract language code
    pub ocr_language: String,
    /// Intra-op threads for model inference
    pub onnx_threads: usize,
    pub denoise: DenoiseSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets/FSRCNN_x4.onnx"),
            ocr_language: "eng".to_string(),
            onnx_threads: num_cpus::get(),
            denoise: DenoiseSettings::default(),
        }
    }
}

/// Builds and runs transformations
pub struct TransformationEngine {
    config: EngineConfig,
}

impl TransformationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The transformation that serves `request`
    pub fn build(&self, request: &TransformationRequest) -> Box<dyn Transformation> {
        match request {
            TransformationRequest::Shot(kind) => Box::new(ShotTransformation::new(*kind)),
            TransformationRequest::EnhanceImage(params) => Box::new(FrameEnhancer::new(params.clone())),
            TransformationRequest::EnhanceResolution => Box::new(SuperResolution::new(
                self.config.model_path.clone(),
                self.config.onnx_threads,
                self.config.denoise,
            )),
            TransformationRequest::ApplyFilter(kind) => Box::new(StyleFilter::new(*kind)),
            TransformationRequest::ExtractText => {
                Box::new(TextExtractor::new(self.config.ocr_language.clone()))
            }
        }
    }

    /// Run `request` against `source`
    pub fn execute(
        &self,
        request: &TransformationRequest,
        source: &SourceMedia,
        workspace: &RequestWorkspace,
    ) -> MonoShotResult<Artifact> {
        let transformation = self.build(request);
        self.run(transformation.as_ref(), source, workspace)
    }

    /// Run an already built transformation, refusing the wrong media kind
    pub fn run(
        &self,
        transformation: &dyn Transformation,
        source: &SourceMedia,
        workspace: &RequestWorkspace,
    ) -> MonoShotResult<Artifact> {
        let name = transformation.name();
        if source.kind() != transformation.accepts() {
            return Err(MonoShotError::WrongMediaKind {
                operation: name,
                expected: transformation.accepts().to_string(),
            });
        }

        let start_time = Instant::now();
        info!("Starting {}", name);
        info!("Input: {}", source.path.display());

        match transformation.apply(source, workspace) {
            Ok(artifact) => {
                info!(
                    "{} completed in {:.2}s",
                    name,
                    start_time.elapsed().as_secs_f64()
                );
                Ok(artifact)
            }
            Err(e) => {
                error!(
                    "{} failed after {:.2}s: {}",
                    name,
                    start_time.elapsed().as_secs_f64(),
                    e
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{FilterKind, ShotKind};

    #[test]
    fn test_build_names_follow_request() {
        let engine = TransformationEngine::new(EngineConfig::default());
        let request = TransformationRequest::ApplyFilter(FilterKind::Negative);
        let transformation = engine.build(&request);
        assert_eq!(transformation.name(), request.label());
        assert_eq!(transformation.accepts(), MediaKind::Image);

        let shot = engine.build(&TransformationRequest::Shot(ShotKind::Gif));
        assert_eq!(shot.accepts(), MediaKind::Video);
    }

    #[test]
    fn test_wrong_media_kind_is_refused() {
        let engine = TransformationEngine::new(EngineConfig::default());
        let workspace = RequestWorkspace::create(None).unwrap();
        let image = SourceMedia::from_path("photo.png").unwrap();

        let err = engine
            .execute(&TransformationRequest::Shot(ShotKind::TimeLapse), &image, &workspace)
            .unwrap_err();
        assert!(matches!(err, MonoShotError::WrongMediaKind { .. }));
    }

    #[test]
    fn test_missing_model_reports_unavailable() {
        let config = EngineConfig {
            model_path: PathBuf::from("/missing/FSRCNN_x4.onnx"),
            ..EngineConfig::default()
        };
        let engine = TransformationEngine::new(config);
        let workspace = RequestWorkspace::create(None).unwrap();
        let image = SourceMedia::from_path("photo.png").unwrap();

        let err = engine
            .execute(&TransformationRequest::EnhanceResolution, &image, &workspace)
            .unwrap_err();
        assert!(matches!(err, MonoShotError::ModelUnavailable { .. }));
    }
}
