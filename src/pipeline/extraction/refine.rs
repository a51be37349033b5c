//! Mask refinement: narrow a coarse geometric mask down to the single best
//! tissue-colored blob.
//!
//! Three independent pixel classifiers are ANDed together, the intersection
//! is opened to drop speckle, and connected-component analysis keeps only
//! the blob that looks most like a conjunctival crescent (wide and large).

use image::{GrayImage, Luma, RgbImage};

use super::color::{hsv, lab_a, luma};
use super::mask::{self, label_components, open};

/// Hue bands (degrees) covering pink/red tissue. Red wraps around zero,
/// hence two bands.
const HUE_LOW_MAX: f32 = 30.0;
const HUE_HIGH_MIN: f32 = 320.0;

/// Minimum saturation for tissue color; skin and sclera fall below.
const MIN_SATURATION: f32 = 50.0 / 255.0;

/// Minimum HSV value; excludes shadowed pixels from the hue test.
const MIN_VALUE: u8 = 60;

/// Lab a* floor. Tissue is clearly red-of-neutral; skin hovers near zero.
const MIN_LAB_A: f32 = 2.0;

/// Blobs below this pixel count are noise, never tissue.
const MIN_BLOB_AREA: u32 = 100;

/// Aspect-ratio reward cap: crescents are wide, but beyond this width
/// elongation says nothing more about tissue-ness.
const ASPECT_CAP: f32 = 5.0;

/// Pink/red hue test with saturation and value floors.
fn is_tissue_hue(h: f32, s: f32, v: u8) -> bool {
    if s < MIN_SATURATION || v < MIN_VALUE {
        return false;
    }
    h <= HUE_LOW_MAX || h >= HUE_HIGH_MIN
}

/// Refine a coarse region mask against the ROI pixels.
///
/// Returns a mask restricted to the single best tissue blob, or an all-zero
/// mask when nothing tissue-like large enough survives (the caller treats
/// that as extraction failure for the strategy).
pub fn refine(roi: &RgbImage, coarse_mask: &GrayImage, dark_pixel_threshold: u8) -> GrayImage {
    debug_assert_eq!(roi.dimensions(), coarse_mask.dimensions());

    let (w, h) = roi.dimensions();
    let brightness_floor = dark_pixel_threshold.saturating_add(5);
    let mut combined = GrayImage::new(w, h);

    for y in 0..h {
        for x in 0..w {
            if coarse_mask.get_pixel(x, y).0[0] == 0 {
                continue;
            }
            let p = roi.get_pixel(x, y);
            let (hue, sat, val) = hsv(p);
            if !is_tissue_hue(hue, sat, val) {
                continue;
            }
            if lab_a(p) <= MIN_LAB_A {
                continue;
            }
            if luma(p) <= brightness_floor {
                continue;
            }
            combined.put_pixel(x, y, Luma([mask::ON]));
        }
    }

    let cleaned = open(&combined, 1);

    // Keep only the component scoring best on area x capped-aspect.
    let map = label_components(&cleaned);
    let mut best: Option<(usize, f32)> = None;
    for (i, c) in map.components.iter().enumerate() {
        if c.area <= MIN_BLOB_AREA {
            continue;
        }
        let score = c.area as f32 * c.aspect().min(ASPECT_CAP);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }

    match best {
        Some((i, _)) => map.mask_of(i),
        None => GrayImage::new(w, h),
    }
}
