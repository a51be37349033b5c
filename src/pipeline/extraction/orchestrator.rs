//! Extraction entry point: runs the strategy chain over an input frame
//! and always comes back with a 64x64 tissue sample plus the method tag.

use std::sync::Arc;

use image::imageops;
use image::{GrayImage, Luma, RgbImage};
use tracing::{info, warn};

use super::detect::{EyeRegionDetector, FaceLandmarkDetector};
use super::mask::ON;
use super::normalize::{is_already_cropped, resize_and_pad, resize_to_canvas};
use super::strategies::{
    CascadeCrescent, EdgeContour, ExtractionStrategy, IrisCrescent, LowerLidCrescent,
    PrePaddedRetry,
};
use super::types::{Eye, ExtractionConfig, ExtractionMethod, ExtractionResult, TISSUE_SIZE};
use super::validate::validate;

/// Cascading lower-conjunctiva extractor.
///
/// Strategies are tried in order until one produces a validated crop.
/// A deterministic lower-center crop closes the chain, so `extract`
/// always returns a sample; callers check the method tag to learn how
/// trustworthy it is.
pub struct ConjunctivaExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    config: ExtractionConfig,
}

impl ConjunctivaExtractor {
    /// Build the standard chain: cascade detector, iris crescent,
    /// lower-lid polygon, pre-padded landmark retry, edge contour.
    pub fn new(
        eye_detector: Box<dyn EyeRegionDetector>,
        landmark_detector: Arc<dyn FaceLandmarkDetector>,
        config: ExtractionConfig,
    ) -> Self {
        let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
            Box::new(CascadeCrescent::new(eye_detector)),
            Box::new(IrisCrescent::new(Arc::clone(&landmark_detector))),
            Box::new(LowerLidCrescent::new(Arc::clone(&landmark_detector))),
            Box::new(PrePaddedRetry::new(landmark_detector)),
            Box::new(EdgeContour),
        ];
        Self { strategies, config }
    }

    /// Custom chain, mainly for tests and reduced deployments.
    pub fn with_strategies(
        strategies: Vec<Box<dyn ExtractionStrategy>>,
        config: ExtractionConfig,
    ) -> Self {
        Self { strategies, config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract the lower conjunctiva from `image`. Never fails outright;
    /// when every strategy declines, the lower-center crop is returned
    /// tagged either `CenterCropFallback` (validated) or
    /// `ExtractionFailed` (unvalidated, caller must not trust it).
    pub fn extract(&self, image: &RgbImage, eye: Eye) -> ExtractionResult {
        if is_already_cropped(image, &self.config) {
            info!("input already cropped, skipping extraction");
            return ExtractionResult {
                tissue: resize_to_canvas(image),
                method: ExtractionMethod::PreCropped,
            };
        }

        for strategy in &self.strategies {
            let method = strategy.method();
            if let Some(tissue) = strategy.attempt(image, eye, &self.config.validation) {
                info!(method = method.as_str(), "conjunctiva extracted");
                return ExtractionResult { tissue, method };
            }
        }

        warn!("all extraction strategies declined, using lower-center crop");
        self.center_crop_terminus(image)
    }

    /// Square crop from the lower center of the frame. The conjunctiva
    /// photo protocol puts the eye in the lower half, so this is the
    /// best guess when nothing else worked.
    fn center_crop_terminus(&self, image: &RgbImage) -> ExtractionResult {
        let (w, h) = image.dimensions();
        let size = (h / 2).min(w);
        if size == 0 {
            return ExtractionResult {
                tissue: RgbImage::new(TISSUE_SIZE, TISSUE_SIZE),
                method: ExtractionMethod::ExtractionFailed,
            };
        }

        let x = (w - size) / 2;
        let y = h / 2;
        let crop = imageops::crop_imm(image, x, y, size, size).to_image();

        let full = GrayImage::from_pixel(size, size, Luma([ON]));
        let method = if validate(&crop, &full, &self.config.validation) {
            ExtractionMethod::CenterCropFallback
        } else {
            warn!("center-crop fallback failed validation");
            ExtractionMethod::ExtractionFailed
        };

        let tissue = resize_and_pad(&crop)
            .unwrap_or_else(|| RgbImage::new(TISSUE_SIZE, TISSUE_SIZE));
        ExtractionResult { tissue, method }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::detect::{
        NoEyeDetector, NoLandmarkDetector, Rect, StaticEyeDetector, StaticLandmarkDetector,
    };
    use image::Rgb;

    const TISSUE: Rgb<u8> = Rgb([200, 120, 130]);

    fn extractor_without_models() -> ConjunctivaExtractor {
        ConjunctivaExtractor::new(
            Box::new(NoEyeDetector),
            Arc::new(NoLandmarkDetector),
            ExtractionConfig::default(),
        )
    }

    #[test]
    fn pre_cropped_input_short_circuits() {
        let image = RgbImage::from_pixel(64, 64, TISSUE);
        let result = extractor_without_models().extract(&image, Eye::Left);
        assert_eq!(result.method, ExtractionMethod::PreCropped);
        assert_eq!(result.tissue.dimensions(), (TISSUE_SIZE, TISSUE_SIZE));
        assert!(!result.is_failed());
    }

    #[test]
    fn cascade_detection_wins_over_fallbacks() {
        let image = RgbImage::from_pixel(400, 400, TISSUE);
        let extractor = ConjunctivaExtractor::new(
            Box::new(StaticEyeDetector {
                detections: vec![Rect { x: 100, y: 100, width: 200, height: 160 }],
            }),
            Arc::new(NoLandmarkDetector),
            ExtractionConfig::default(),
        );
        let result = extractor.extract(&image, Eye::Left);
        assert_eq!(result.method, ExtractionMethod::Haar);
    }

    #[test]
    fn flat_tissue_frame_ends_in_validated_center_crop() {
        // No detections, no landmarks, no edges: the chain falls through
        // to the center crop, which is pure tissue and validates
        let image = RgbImage::from_pixel(200, 400, TISSUE);
        let result = extractor_without_models().extract(&image, Eye::Left);
        assert_eq!(result.method, ExtractionMethod::CenterCropFallback);
        assert_eq!(result.tissue.dimensions(), (TISSUE_SIZE, TISSUE_SIZE));
    }

    #[test]
    fn black_frame_is_reported_as_failed() {
        let image = RgbImage::new(400, 400);
        let result = extractor_without_models().extract(&image, Eye::Left);
        assert_eq!(result.method, ExtractionMethod::ExtractionFailed);
        assert!(result.is_failed());
        // a sample is still returned for inspection
        assert_eq!(result.tissue.dimensions(), (TISSUE_SIZE, TISSUE_SIZE));
    }

    #[test]
    fn landmark_strategy_used_when_cascade_finds_nothing() {
        let image = RgbImage::from_pixel(200, 200, TISSUE);
        let lm = super::super::detect::EyeLandmarks {
            lower_lid: vec![
                super::super::detect::Point::new(60, 100),
                super::super::detect::Point::new(80, 120),
                super::super::detect::Point::new(100, 128),
                super::super::detect::Point::new(120, 120),
                super::super::detect::Point::new(140, 100),
            ],
            iris_center: Some(super::super::detect::Point::new(100, 80)),
        };
        let extractor = ConjunctivaExtractor::new(
            Box::new(NoEyeDetector),
            Arc::new(StaticLandmarkDetector { result: Some(lm) }),
            ExtractionConfig::default(),
        );
        let result = extractor.extract(&image, Eye::Left);
        assert_eq!(result.method, ExtractionMethod::Iris);
    }

    #[test]
    fn degenerate_frame_never_panics() {
        let image = RgbImage::new(1, 1);
        let result = extractor_without_models().extract(&image, Eye::Right);
        // 1x1 is below the size threshold and near-square: pre-cropped path
        assert_eq!(result.method, ExtractionMethod::PreCropped);
    }
}
