use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::validate::ValidationThresholds;

/// Side length of the classifier input canvas.
pub const TISSUE_SIZE: u32 = 64;

/// Which eye the caller photographed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub fn as_str(&self) -> &'static str {
        match self {
            Eye::Left => "left",
            Eye::Right => "right",
        }
    }
}

/// How the tissue sample was obtained. Always set, even on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Input was already an isolated tissue sample; resized as-is.
    PreCropped,
    /// Cascade eye detector + lower-band crescent mask.
    Haar,
    /// Landmark iris center as the top boundary of the crescent.
    Iris,
    /// Landmark lower-lid polygon (no iris points available).
    LowerLidPolygon,
    /// Landmark strategy succeeded only after re-embedding the image
    /// on an oversized canvas.
    PrePaddedRetry,
    /// Edge-contour bounding box, lower band.
    Edges,
    /// Deterministic lower-center crop, validated.
    CenterCropFallback,
    /// Every strategy failed validation; the center crop is returned anyway.
    ExtractionFailed,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::PreCropped => "pre_cropped",
            ExtractionMethod::Haar => "haar",
            ExtractionMethod::Iris => "iris",
            ExtractionMethod::LowerLidPolygon => "lower_lid_polygon",
            ExtractionMethod::PrePaddedRetry => "pre_padded_retry",
            ExtractionMethod::Edges => "edges",
            ExtractionMethod::CenterCropFallback => "center_crop_fallback",
            ExtractionMethod::ExtractionFailed => "extraction_failed",
        }
    }
}

/// Result of one extraction attempt.
///
/// `tissue` is always exactly 64x64 RGB with non-tissue pixels pure black,
/// including on failure (the caller can still inspect what was cropped).
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub tissue: RgbImage,
    pub method: ExtractionMethod,
}

impl ExtractionResult {
    pub fn is_failed(&self) -> bool {
        self.method == ExtractionMethod::ExtractionFailed
    }
}

/// Extraction tuning. Defaults match the values the classifier was
/// calibrated against; change them only together with the model.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Images at or below this size on both edges are treated as
    /// pre-extracted tissue samples (curated dataset images).
    pub size_threshold: u32,
    /// Maximum aspect ratio for the pre-cropped short-circuit.
    pub max_precropped_aspect: f32,
    /// Disable the short-circuit entirely (forces re-extraction).
    pub auto_skip_extraction: bool,
    /// Clinical safeguards applied to every candidate crop.
    pub validation: ValidationThresholds,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            size_threshold: 300,
            max_precropped_aspect: 1.5,
            auto_skip_extraction: true,
            validation: ValidationThresholds::default(),
        }
    }
}
