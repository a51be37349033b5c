//! Tissue validation: decide whether a candidate crop is clinically usable.
//!
//! Thresholds are fixed safeguards, not learned parameters. A crop that
//! fails any check is rejected and the strategy chain moves on.

use image::{GrayImage, RgbImage};
use tracing::debug;

use super::color::luma;
use super::mask::label_components;

/// Fixed clinical safeguards for candidate crops.
#[derive(Debug, Clone)]
pub struct ValidationThresholds {
    /// Minimum masked bounding-box width in pixels.
    pub min_roi_width: u32,
    /// Minimum masked bounding-box height in pixels.
    pub min_roi_height: u32,
    /// Pixel value at or below which a pixel counts as dark (iris, shadow).
    pub dark_pixel_threshold: u8,
    /// Reject when the dark fraction of masked pixels exceeds this.
    pub max_dark_ratio: f64,
    /// Pixel value at or above which a pixel counts as overexposed.
    pub overexposed_threshold: u8,
    /// Reject when the overexposed fraction exceeds this.
    pub max_overexposed_ratio: f64,
    /// Minimum number of masked pixels (tissue area).
    pub min_tissue_pixels: usize,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            min_roi_width: 40,
            min_roi_height: 20,
            dark_pixel_threshold: 30,
            max_dark_ratio: 0.70,
            overexposed_threshold: 245,
            max_overexposed_ratio: 0.30,
            min_tissue_pixels: 200,
        }
    }
}

/// Validate a segmented ROI against its mask.
///
/// Rejects on: resolution below the feature minimum, iris/shadow
/// contamination (too dark), glare saturation (too bright), or
/// insufficient tissue area. Pure function; logs the failing check.
pub fn validate(segmented: &RgbImage, mask: &GrayImage, t: &ValidationThresholds) -> bool {
    debug_assert_eq!(segmented.dimensions(), mask.dimensions());

    let mut tissue_pixels = 0usize;
    let mut dark = 0usize;
    let mut overexposed = 0usize;

    for (p, m) in segmented.pixels().zip(mask.pixels()) {
        if m.0[0] == 0 {
            continue;
        }
        tissue_pixels += 1;
        let l = luma(p);
        if l < t.dark_pixel_threshold {
            dark += 1;
        }
        if l > t.overexposed_threshold {
            overexposed += 1;
        }
    }

    if tissue_pixels == 0 {
        return false;
    }

    // Resolution check on the masked bounding box.
    let map = label_components(mask);
    if let Some(bounds) = masked_bounds(&map) {
        let (w, h) = bounds;
        if w < t.min_roi_width || h < t.min_roi_height {
            debug!(width = w, height = h, "candidate rejected: resolution too low");
            return false;
        }
    }

    let dark_ratio = dark as f64 / tissue_pixels as f64;
    if dark_ratio > t.max_dark_ratio {
        debug!(dark_ratio, "candidate rejected: dark-pixel contamination");
        return false;
    }

    let over_ratio = overexposed as f64 / tissue_pixels as f64;
    if over_ratio > t.max_overexposed_ratio {
        debug!(over_ratio, "candidate rejected: overexposure");
        return false;
    }

    if tissue_pixels < t.min_tissue_pixels {
        debug!(tissue_pixels, "candidate rejected: tissue area too small");
        return false;
    }

    true
}

/// Width/height of the union bounding box over all mask components.
fn masked_bounds(map: &super::mask::ComponentMap) -> Option<(u32, u32)> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    for c in &map.components {
        min_x = min_x.min(c.bbox.x);
        min_y = min_y.min(c.bbox.y);
        max_x = max_x.max(c.bbox.x + c.bbox.width - 1);
        max_y = max_y.max(c.bbox.y + c.bbox.height - 1);
    }
    if map.components.is_empty() {
        None
    } else {
        Some((max_x - min_x + 1, max_y - min_y + 1))
    }
}
