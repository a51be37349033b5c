//! The extraction strategies, in chain order.
//!
//! Each strategy either produces a normalized 64x64 tissue sample or
//! declines with `None`, letting the chain move on. All strategies share
//! the same tail: coarse geometric mask, color refinement, validation,
//! tight crop, canvas normalization.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use tracing::debug;

use super::color::to_gray;
use super::detect::{EyeRegionDetector, FaceLandmarkDetector, Point};
use super::edges::dominant_edge_region;
use super::mask::{fill_lower_half_ellipse, fill_polygon, ON};
use super::normalize::{apply_mask, resize_and_pad, tight_crop};
use super::refine::refine;
use super::types::{Eye, ExtractionMethod};
use super::validate::{validate, ValidationThresholds};

/// One link of the extraction chain. `attempt` returns the normalized
/// 64x64 tissue sample, or `None` when the strategy cannot produce a
/// valid crop from this image.
pub trait ExtractionStrategy: Send + Sync {
    fn method(&self) -> ExtractionMethod;
    fn attempt(
        &self,
        image: &RgbImage,
        eye: Eye,
        thresholds: &ValidationThresholds,
    ) -> Option<RgbImage>;
}

/// Crop `image` to the given bounds, clamped to the frame.
/// Returns the crop and its clamped top-left origin.
fn crop_region(
    image: &RgbImage,
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
) -> Option<(RgbImage, i64, i64)> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let left = left.clamp(0, w);
    let top = top.clamp(0, h);
    let right = right.clamp(0, w);
    let bottom = bottom.clamp(0, h);
    if right <= left || bottom <= top {
        return None;
    }
    let crop = imageops::crop_imm(
        image,
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    )
    .to_image();
    Some((crop, left, top))
}

/// Translate polygon vertices into ROI-local coordinates.
fn shift_polygon(vertices: &[Point], origin_x: i64, origin_y: i64) -> Vec<Point> {
    vertices
        .iter()
        .map(|p| Point::new(p.x - origin_x as i32, p.y - origin_y as i32))
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Cascade detector + elliptical crescent
// ═══════════════════════════════════════════════════════════

/// First automatic strategy: a cascade eye detector gives the eye box,
/// the lower band of that box is cropped and masked with a half-ellipse
/// approximating the crescent. Fast, and the best option for extreme
/// close-ups where no full face is visible.
pub struct CascadeCrescent {
    detector: Box<dyn EyeRegionDetector>,
}

impl CascadeCrescent {
    pub fn new(detector: Box<dyn EyeRegionDetector>) -> Self {
        Self { detector }
    }
}

impl ExtractionStrategy for CascadeCrescent {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Haar
    }

    fn attempt(
        &self,
        image: &RgbImage,
        _eye: Eye,
        thresholds: &ValidationThresholds,
    ) -> Option<RgbImage> {
        let gray = to_gray(image);
        let detections = self.detector.detect(&gray);
        let best = detections.iter().max_by_key(|r| r.area())?;

        // Lower band of the detection, slightly widened so tissue at the
        // edges is not cut off.
        let (x, y) = (best.x as i64, best.y as i64);
        let (bw, bh) = (best.width as i64, best.height as i64);
        let top = y + (bh as f64 * 0.55) as i64;
        let bottom = y + bh + (bh as f64 * 0.10) as i64;
        let left = x - (bw as f64 * 0.05) as i64;
        let right = x + bw + (bw as f64 * 0.05) as i64;

        let (roi, _, _) = crop_region(image, left, top, right, bottom)?;
        let (rw, rh) = roi.dimensions();

        // No landmarks here, so approximate the crescent with the lower
        // half of an ellipse centered near the top of the band.
        let coarse = fill_lower_half_ellipse(
            rw,
            rh,
            Point::new(rw as i32 / 2, (rh as f32 * 0.2) as i32),
            rw as f32 * 0.45,
            rh as f32 * 0.7,
        );
        let mask = refine(&roi, &coarse, thresholds.dark_pixel_threshold);
        let segmented = apply_mask(&roi, &mask);
        if !validate(&segmented, &mask, thresholds) {
            return None;
        }

        let tissue = tight_crop(&segmented).unwrap_or(segmented);
        resize_and_pad(&tissue)
    }
}

// ═══════════════════════════════════════════════════════════
// Iris-anchored crescent
// ═══════════════════════════════════════════════════════════

/// Landmark strategy anchored on the iris center: the crescent spans from
/// the iris row down to the lower-lid curve, which isolates exactly the
/// inferior palpebral conjunctiva. Requires refined iris landmarks.
pub struct IrisCrescent {
    detector: Arc<dyn FaceLandmarkDetector>,
}

impl IrisCrescent {
    pub fn new(detector: Arc<dyn FaceLandmarkDetector>) -> Self {
        Self { detector }
    }
}

impl ExtractionStrategy for IrisCrescent {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Iris
    }

    fn attempt(
        &self,
        image: &RgbImage,
        eye: Eye,
        thresholds: &ValidationThresholds,
    ) -> Option<RgbImage> {
        let lm = self.detector.landmarks(image, eye)?;
        let iris = lm.iris_center?;
        let inner = lm.inner_corner()?;
        let outer = lm.outer_corner()?;
        if lm.lower_lid.len() < 3 {
            return None;
        }

        let lower_y_max = lm.lower_lid.iter().map(|p| p.y).max()? as i64;
        let lower_x_min = lm.lower_lid.iter().map(|p| p.x).min()? as i64;
        let lower_x_max = lm.lower_lid.iter().map(|p| p.x).max()? as i64;

        let iris_y = iris.y as i64;
        let span = lower_y_max - iris_y;
        let bottom = lower_y_max + (span as f64 * 0.4) as i64;
        let pad_x = ((lower_x_max - lower_x_min) as f64 * 0.1) as i64;
        let left = lower_x_min - pad_x;
        let right = lower_x_max + pad_x;

        if bottom - iris_y < thresholds.min_roi_height as i64 {
            debug!(height = bottom - iris_y, "iris crescent too shallow");
            return None;
        }

        // Crescent polygon: straight line at iris level, closed by the
        // lower-lid curve traced back outer-to-inner.
        let mut polygon = vec![
            Point::new(inner.x, iris_y as i32),
            Point::new(outer.x, iris_y as i32),
        ];
        polygon.extend(lm.lower_lid.iter().rev().copied());

        let (roi, ox, oy) = crop_region(image, left, iris_y, right, bottom)?;
        let local = shift_polygon(&polygon, ox, oy);
        let coarse = fill_polygon(roi.width(), roi.height(), &local);
        let mask = refine(&roi, &coarse, thresholds.dark_pixel_threshold);
        let mut segmented = apply_mask(&roi, &mask);

        if !validate(&segmented, &mask, thresholds) {
            // Iris leaked into the crescent. Push the top boundary down
            // past the limbus and take the raw polygon without refinement.
            debug!("iris contamination detected, lowering top boundary");
            let adjusted_top = iris_y + (span as f64 * 0.3) as i64;
            let (roi, ox, oy) = crop_region(image, left, adjusted_top, right, bottom)?;
            let local = shift_polygon(&polygon, ox, oy);
            let mask = fill_polygon(roi.width(), roi.height(), &local);
            segmented = apply_mask(&roi, &mask);
        }

        let tissue = tight_crop(&segmented)?;
        resize_and_pad(&tissue)
    }
}

// ═══════════════════════════════════════════════════════════
// Lower-lid polygon (no iris landmarks)
// ═══════════════════════════════════════════════════════════

/// Landmark fallback when iris points are unavailable: the top boundary
/// is the eye-corner midline instead of the iris row.
pub struct LowerLidCrescent {
    detector: Arc<dyn FaceLandmarkDetector>,
}

impl LowerLidCrescent {
    pub fn new(detector: Arc<dyn FaceLandmarkDetector>) -> Self {
        Self { detector }
    }
}

impl ExtractionStrategy for LowerLidCrescent {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::LowerLidPolygon
    }

    fn attempt(
        &self,
        image: &RgbImage,
        eye: Eye,
        thresholds: &ValidationThresholds,
    ) -> Option<RgbImage> {
        let lm = self.detector.landmarks(image, eye)?;
        let inner = lm.inner_corner()?;
        let outer = lm.outer_corner()?;
        if lm.lower_lid.len() < 3 {
            return None;
        }

        let x_min = lm.lower_lid.iter().map(|p| p.x).min()? as i64;
        let x_max = lm.lower_lid.iter().map(|p| p.x).max()? as i64;
        let y_min = lm.lower_lid.iter().map(|p| p.y).min()? as i64;
        let y_max = lm.lower_lid.iter().map(|p| p.y).max()? as i64;
        let (bw, bh) = (x_max - x_min + 1, y_max - y_min + 1);

        // The conjunctiva occupies the lower half of the eye opening.
        let mid_y = (inner.y as i64 + outer.y as i64) / 2;
        let bottom = y_max + 1 + (bh as f64 * 0.5) as i64;
        let pad_x = (bw as f64 * 0.1) as i64;
        let left = x_min - pad_x;
        let right = x_max + 1 + pad_x;

        let mut polygon = vec![
            Point::new(inner.x, mid_y as i32),
            Point::new(outer.x, mid_y as i32),
        ];
        polygon.extend(lm.lower_lid.iter().rev().copied());

        let (roi, ox, oy) = crop_region(image, left, mid_y, right, bottom)?;
        let local = shift_polygon(&polygon, ox, oy);
        let coarse = fill_polygon(roi.width(), roi.height(), &local);
        let mask = refine(&roi, &coarse, thresholds.dark_pixel_threshold);
        let segmented = apply_mask(&roi, &mask);

        if !validate(&segmented, &mask, thresholds) {
            return None;
        }

        let tissue = tight_crop(&segmented)?;
        resize_and_pad(&tissue)
    }
}

// ═══════════════════════════════════════════════════════════
// Pre-padded retry
// ═══════════════════════════════════════════════════════════

/// Landmark models are trained on faces, not eye close-ups. Re-embedding
/// a tight crop on a 4x black canvas (downscaling very large inputs
/// first) makes the eye look like a small part of a larger scene, which
/// often rescues landmark detection.
pub struct PrePaddedRetry {
    iris: IrisCrescent,
    polygon: LowerLidCrescent,
}

impl PrePaddedRetry {
    pub fn new(detector: Arc<dyn FaceLandmarkDetector>) -> Self {
        Self {
            iris: IrisCrescent::new(Arc::clone(&detector)),
            polygon: LowerLidCrescent::new(detector),
        }
    }

    fn pre_pad(image: &RgbImage) -> RgbImage {
        let (w, h) = image.dimensions();
        let source = if w.max(h) > 1000 {
            let scale = 500.0 / w.max(h) as f64;
            let sw = ((w as f64 * scale) as u32).max(1);
            let sh = ((h as f64 * scale) as u32).max(1);
            imageops::resize(image, sw, sh, FilterType::Triangle)
        } else {
            image.clone()
        };

        let (w, h) = source.dimensions();
        let size = w.max(h) * 4;
        let mut canvas = RgbImage::new(size, size);
        imageops::overlay(
            &mut canvas,
            &source,
            ((size - w) / 2) as i64,
            ((size - h) / 2) as i64,
        );
        canvas
    }
}

impl ExtractionStrategy for PrePaddedRetry {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::PrePaddedRetry
    }

    fn attempt(
        &self,
        image: &RgbImage,
        eye: Eye,
        thresholds: &ValidationThresholds,
    ) -> Option<RgbImage> {
        let padded = Self::pre_pad(image);
        self.iris
            .attempt(&padded, eye, thresholds)
            .or_else(|| self.polygon.attempt(&padded, eye, thresholds))
    }
}

// ═══════════════════════════════════════════════════════════
// Edge-contour lower band
// ═══════════════════════════════════════════════════════════

/// Last automatic strategy: bound the dominant edge structure and take
/// its lower band. No mask is available, so validation runs over the
/// whole crop.
pub struct EdgeContour;

impl ExtractionStrategy for EdgeContour {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Edges
    }

    fn attempt(
        &self,
        image: &RgbImage,
        _eye: Eye,
        thresholds: &ValidationThresholds,
    ) -> Option<RgbImage> {
        let rect = dominant_edge_region(image)?;
        let (x, y) = (rect.x as i64, rect.y as i64);
        let (bw, bh) = (rect.width as i64, rect.height as i64);

        let conj_y = y + (bh as f64 * 0.55) as i64;
        let conj_h = (bh as f64 * 0.35) as i64;
        let (tissue, _, _) = crop_region(image, x, conj_y, x + bw, conj_y + conj_h)?;

        let full = GrayImage::from_pixel(tissue.width(), tissue.height(), Luma([ON]));
        if !validate(&tissue, &full, thresholds) {
            return None;
        }

        resize_and_pad(&tissue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::detect::{
        EyeLandmarks, NoEyeDetector, NoLandmarkDetector, Rect, StaticEyeDetector,
        StaticLandmarkDetector,
    };
    use super::super::types::TISSUE_SIZE;
    use image::Rgb;

    const TISSUE: Rgb<u8> = Rgb([200, 120, 130]);

    fn thresholds() -> ValidationThresholds {
        ValidationThresholds::default()
    }

    fn landmarks_with_iris() -> EyeLandmarks {
        EyeLandmarks {
            lower_lid: vec![
                Point::new(60, 100),
                Point::new(80, 120),
                Point::new(100, 128),
                Point::new(120, 120),
                Point::new(140, 100),
            ],
            iris_center: Some(Point::new(100, 80)),
        }
    }

    #[test]
    fn cascade_crescent_extracts_from_detection() {
        let image = RgbImage::from_pixel(200, 200, TISSUE);
        let strategy = CascadeCrescent::new(Box::new(StaticEyeDetector {
            detections: vec![Rect { x: 40, y: 40, width: 120, height: 100 }],
        }));
        let out = strategy.attempt(&image, Eye::Left, &thresholds()).unwrap();
        assert_eq!(out.dimensions(), (TISSUE_SIZE, TISSUE_SIZE));
    }

    #[test]
    fn cascade_crescent_declines_without_detection() {
        let image = RgbImage::from_pixel(200, 200, TISSUE);
        let strategy = CascadeCrescent::new(Box::new(NoEyeDetector));
        assert!(strategy.attempt(&image, Eye::Left, &thresholds()).is_none());
    }

    #[test]
    fn cascade_crescent_picks_largest_detection() {
        // Only the large box covers the tissue band; the small box sits on
        // a black region and would fail validation if picked
        let mut image = RgbImage::new(200, 200);
        for y in 40..160 {
            for x in 30..170 {
                image.put_pixel(x, y, TISSUE);
            }
        }
        let strategy = CascadeCrescent::new(Box::new(StaticEyeDetector {
            detections: vec![
                Rect { x: 0, y: 0, width: 20, height: 20 },
                Rect { x: 40, y: 40, width: 120, height: 100 },
            ],
        }));
        assert!(strategy.attempt(&image, Eye::Left, &thresholds()).is_some());
    }

    #[test]
    fn iris_crescent_extracts_below_iris() {
        let image = RgbImage::from_pixel(200, 200, TISSUE);
        let strategy = IrisCrescent::new(Arc::new(StaticLandmarkDetector {
            result: Some(landmarks_with_iris()),
        }));
        let out = strategy.attempt(&image, Eye::Left, &thresholds()).unwrap();
        assert_eq!(out.dimensions(), (TISSUE_SIZE, TISSUE_SIZE));
    }

    #[test]
    fn iris_crescent_requires_iris_point() {
        let image = RgbImage::from_pixel(200, 200, TISSUE);
        let mut lm = landmarks_with_iris();
        lm.iris_center = None;
        let strategy = IrisCrescent::new(Arc::new(StaticLandmarkDetector { result: Some(lm) }));
        assert!(strategy.attempt(&image, Eye::Left, &thresholds()).is_none());
    }

    #[test]
    fn iris_crescent_falls_back_to_raw_polygon_on_dark_tissue() {
        // Dark red tissue: fails the color refinement entirely, so the
        // first validation fails and the lowered raw-polygon path runs.
        // Luma ~20 still clears the tight-crop background threshold.
        let image = RgbImage::from_pixel(200, 200, Rgb([40, 10, 15]));
        let strategy = IrisCrescent::new(Arc::new(StaticLandmarkDetector {
            result: Some(landmarks_with_iris()),
        }));
        let out = strategy.attempt(&image, Eye::Left, &thresholds()).unwrap();
        assert_eq!(out.dimensions(), (TISSUE_SIZE, TISSUE_SIZE));
    }

    #[test]
    fn lower_lid_crescent_works_without_iris() {
        let image = RgbImage::from_pixel(200, 200, TISSUE);
        let mut lm = landmarks_with_iris();
        lm.iris_center = None;
        let strategy = LowerLidCrescent::new(Arc::new(StaticLandmarkDetector { result: Some(lm) }));
        let out = strategy.attempt(&image, Eye::Left, &thresholds()).unwrap();
        assert_eq!(out.dimensions(), (TISSUE_SIZE, TISSUE_SIZE));
    }

    #[test]
    fn landmark_strategies_decline_without_face() {
        let image = RgbImage::from_pixel(200, 200, TISSUE);
        let detector: Arc<dyn FaceLandmarkDetector> = Arc::new(NoLandmarkDetector);
        assert!(IrisCrescent::new(Arc::clone(&detector))
            .attempt(&image, Eye::Left, &thresholds())
            .is_none());
        assert!(LowerLidCrescent::new(detector)
            .attempt(&image, Eye::Left, &thresholds())
            .is_none());
    }

    #[test]
    fn pre_pad_embeds_on_quadruple_canvas() {
        let image = RgbImage::from_pixel(100, 60, TISSUE);
        let padded = PrePaddedRetry::pre_pad(&image);
        assert_eq!(padded.dimensions(), (400, 400));
        // content centered, corners black
        assert_eq!(padded.get_pixel(200, 200).0, TISSUE.0);
        assert_eq!(padded.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn pre_pad_downscales_very_large_inputs() {
        let image = RgbImage::from_pixel(2000, 1000, TISSUE);
        let padded = PrePaddedRetry::pre_pad(&image);
        // long edge shrunk to 500, canvas is 4x that
        assert_eq!(padded.dimensions(), (2000, 2000));
    }

    #[test]
    fn pre_padded_retry_rescues_landmarks_on_padded_canvas() {
        // Landmarks expressed in padded coordinates: a 200x200 input lands
        // centered on an 800x800 canvas at offset 300
        let image = RgbImage::from_pixel(200, 200, TISSUE);
        let lm = EyeLandmarks {
            lower_lid: vec![
                Point::new(360, 400),
                Point::new(400, 412),
                Point::new(440, 400),
            ],
            iris_center: Some(Point::new(400, 380)),
        };
        let strategy = PrePaddedRetry::new(Arc::new(StaticLandmarkDetector { result: Some(lm) }));
        let out = strategy.attempt(&image, Eye::Left, &thresholds()).unwrap();
        assert_eq!(out.dimensions(), (TISSUE_SIZE, TISSUE_SIZE));
    }

    #[test]
    fn edge_contour_extracts_lower_band() {
        let mut image = RgbImage::new(200, 200);
        for y in 60..140 {
            for x in 40..160 {
                image.put_pixel(x, y, TISSUE);
            }
        }
        let out = EdgeContour.attempt(&image, Eye::Left, &thresholds()).unwrap();
        assert_eq!(out.dimensions(), (TISSUE_SIZE, TISSUE_SIZE));
    }

    #[test]
    fn edge_contour_declines_on_flat_frame() {
        let image = RgbImage::from_pixel(200, 200, Rgb([128, 128, 128]));
        assert!(EdgeContour.attempt(&image, Eye::Left, &thresholds()).is_none());
    }
}
