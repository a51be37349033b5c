//! Canvas normalization: every extracted tissue patch becomes a 64x64 RGB
//! image on a black background, with the tissue occupying roughly the same
//! pixel area the classifier saw during training.

use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage};

use super::color::luma;
use super::types::{ExtractionConfig, TISSUE_SIZE};

/// Target tissue pixel area on the 64x64 canvas (~44% coverage),
/// empirically matched to the training-data distribution.
pub const TARGET_TISSUE_AREA: f64 = 1800.0;

/// Pixels at or below this luma count as background for tight cropping.
const BACKGROUND_LUMA: u8 = 5;

/// Is this image already an isolated tissue sample (curated dataset crop)?
/// Small on both edges and near-square.
pub fn is_already_cropped(image: &RgbImage, cfg: &ExtractionConfig) -> bool {
    if !cfg.auto_skip_extraction {
        return false;
    }
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || w > cfg.size_threshold || h > cfg.size_threshold {
        return false;
    }
    let aspect = w.max(h) as f32 / w.min(h) as f32;
    aspect < cfg.max_precropped_aspect
}

/// Direct resize to the canvas size, used for pre-cropped samples where
/// re-extraction would be destructive. Aspect distortion is acceptable
/// here because the short-circuit only admits near-square images.
pub fn resize_to_canvas(image: &RgbImage) -> RgbImage {
    imageops::resize(image, TISSUE_SIZE, TISSUE_SIZE, FilterType::Lanczos3)
}

/// Zero out all pixels outside the mask.
pub fn apply_mask(roi: &RgbImage, mask: &GrayImage) -> RgbImage {
    debug_assert_eq!(roi.dimensions(), mask.dimensions());
    let mut out = RgbImage::new(roi.width(), roi.height());
    for ((x, y, p), m) in roi.enumerate_pixels().zip(mask.pixels()) {
        if m.0[0] != 0 {
            out.put_pixel(x, y, *p);
        }
    }
    out
}

/// Crop tightly to non-background pixels. `None` when nothing remains.
pub fn tight_crop(segmented: &RgbImage) -> Option<RgbImage> {
    let (w, h) = segmented.dimensions();
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut found = false;

    for (x, y, p) in segmented.enumerate_pixels() {
        if luma(p) > BACKGROUND_LUMA {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if !found || w == 0 || h == 0 {
        return None;
    }

    let cropped = imageops::crop_imm(
        segmented,
        min_x,
        min_y,
        max_x - min_x + 1,
        max_y - min_y + 1,
    )
    .to_image();
    Some(cropped)
}

/// Scale the tissue crop isotropically so its area matches
/// [`TARGET_TISSUE_AREA`], cap the longer edge at the canvas size, then
/// center it on a black 64x64 canvas. Never distorts aspect ratio.
pub fn resize_and_pad(tissue: &RgbImage) -> Option<RgbImage> {
    let (w, h) = tissue.dimensions();
    if w == 0 || h == 0 {
        return None;
    }

    let scale = (TARGET_TISSUE_AREA / (w as f64 * h as f64)).sqrt();
    let mut new_w = ((w as f64 * scale) as u32).max(1);
    let mut new_h = ((h as f64 * scale) as u32).max(1);

    if new_w > TISSUE_SIZE {
        let ratio = TISSUE_SIZE as f64 / new_w as f64;
        new_w = TISSUE_SIZE;
        new_h = ((new_h as f64 * ratio) as u32).max(1);
    }
    if new_h > TISSUE_SIZE {
        let ratio = TISSUE_SIZE as f64 / new_h as f64;
        new_h = TISSUE_SIZE;
        new_w = ((new_w as f64 * ratio) as u32).max(1);
    }

    let resized = imageops::resize(tissue, new_w, new_h, FilterType::Lanczos3);
    let mut canvas = RgbImage::from_pixel(TISSUE_SIZE, TISSUE_SIZE, Rgb([0, 0, 0]));
    let offset_x = ((TISSUE_SIZE - new_w) / 2) as i64;
    let offset_y = ((TISSUE_SIZE - new_h) / 2) as i64;
    imageops::overlay(&mut canvas, &resized, offset_x, offset_y);
    Some(canvas)
}
