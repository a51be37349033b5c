//! Explainability side-channel: occlusion saliency over the tissue sample.
//!
//! The classifier is a black box here, so saliency is measured by sliding
//! a neutral-gray patch over the canvas and recording how much each
//! occlusion moves the output probability. Regions whose occlusion shifts
//! the prediction most are the regions the model relied on.

use image::{Rgb, RgbImage};

use super::classify::{ClassifierError, TissueClassifier};

/// Occlusion patch fill. Mid-gray is the least informative value for a
/// model trained on [0, 1]-scaled inputs.
const OCCLUSION_FILL: Rgb<u8> = Rgb([127, 127, 127]);

/// Heatmap blend weight over the original tissue pixels.
const OVERLAY_ALPHA: f32 = 0.4;

/// Occlusion-saliency explainer.
pub struct SaliencyExplainer {
    /// Side length of the square occlusion patch.
    pub patch: u32,
    /// Step between patch positions. Equal to `patch` tiles the canvas.
    pub stride: u32,
}

impl Default for SaliencyExplainer {
    fn default() -> Self {
        Self { patch: 8, stride: 8 }
    }
}

impl SaliencyExplainer {
    /// Per-pixel saliency over the 64x64 canvas, normalized to [0, 1].
    ///
    /// One classifier call per patch position (64 for the default 8/8
    /// configuration) plus one baseline call.
    pub fn saliency(
        &self,
        tissue: &RgbImage,
        classifier: &dyn TissueClassifier,
    ) -> Result<Vec<f64>, ClassifierError> {
        let (w, h) = tissue.dimensions();
        let baseline = classifier.predict(tissue)?;

        let mut map = vec![0.0f64; (w * h) as usize];
        let mut y = 0;
        while y < h {
            let mut x = 0;
            while x < w {
                let mut occluded = tissue.clone();
                for py in y..(y + self.patch).min(h) {
                    for px in x..(x + self.patch).min(w) {
                        occluded.put_pixel(px, py, OCCLUSION_FILL);
                    }
                }
                let shifted = classifier.predict(&occluded)?;
                let importance = (baseline - shifted).abs();

                for py in y..(y + self.patch).min(h) {
                    for px in x..(x + self.patch).min(w) {
                        let idx = (py * w + px) as usize;
                        map[idx] = map[idx].max(importance);
                    }
                }
                x += self.stride;
            }
            y += self.stride;
        }

        let peak = map.iter().cloned().fold(0.0f64, f64::max);
        if peak > 0.0 {
            for v in &mut map {
                *v /= peak;
            }
        }
        Ok(map)
    }

    /// Saliency heatmap blended over the tissue sample, ready to save.
    pub fn overlay(
        &self,
        tissue: &RgbImage,
        classifier: &dyn TissueClassifier,
    ) -> Result<RgbImage, ClassifierError> {
        let map = self.saliency(tissue, classifier)?;
        let (w, h) = tissue.dimensions();

        let mut out = RgbImage::new(w, h);
        for (x, y, p) in tissue.enumerate_pixels() {
            let t = map[(y * w + x) as usize] as f32;
            let heat = jet(t);
            let mut blended = [0u8; 3];
            for c in 0..3 {
                blended[c] = ((1.0 - OVERLAY_ALPHA) * p.0[c] as f32
                    + OVERLAY_ALPHA * heat[c] as f32)
                    .round() as u8;
            }
            out.put_pixel(x, y, Rgb(blended));
        }
        Ok(out)
    }
}

/// Jet colormap: blue through green to red over [0, 1].
fn jet(t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [
        channel(1.5 - (4.0 * t - 3.0).abs()),
        channel(1.5 - (4.0 * t - 2.0).abs()),
        channel(1.5 - (4.0 * t - 1.0).abs()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::FixedClassifier;
    use crate::pipeline::extraction::TISSUE_SIZE;
    use image::Rgb;

    /// Probability driven by mean red intensity of the top-left quadrant.
    struct QuadrantClassifier;

    impl TissueClassifier for QuadrantClassifier {
        fn predict(&self, tissue: &RgbImage) -> Result<f64, ClassifierError> {
            let mut sum = 0u64;
            let mut count = 0u64;
            for (x, y, p) in tissue.enumerate_pixels() {
                if x < TISSUE_SIZE / 2 && y < TISSUE_SIZE / 2 {
                    sum += p.0[0] as u64;
                    count += 1;
                }
            }
            Ok(sum as f64 / count as f64 / 255.0)
        }
    }

    fn canvas(color: Rgb<u8>) -> RgbImage {
        RgbImage::from_pixel(TISSUE_SIZE, TISSUE_SIZE, color)
    }

    #[test]
    fn constant_classifier_gives_flat_map() {
        let explainer = SaliencyExplainer::default();
        let clf = FixedClassifier::new(0.7);
        let map = explainer.saliency(&canvas(Rgb([200, 120, 130])), &clf).unwrap();
        assert!(map.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn saliency_concentrates_on_decisive_region() {
        let explainer = SaliencyExplainer::default();
        let map = explainer
            .saliency(&canvas(Rgb([220, 80, 90])), &QuadrantClassifier)
            .unwrap();

        let idx = |x: u32, y: u32| (y * TISSUE_SIZE + x) as usize;
        // Top-left quadrant drives the prediction, so occluding it matters
        assert!(map[idx(10, 10)] > 0.5, "decisive region {}", map[idx(10, 10)]);
        // The other quadrants never influence the output
        assert_eq!(map[idx(50, 50)], 0.0);
        assert_eq!(map[idx(50, 10)], 0.0);
    }

    #[test]
    fn saliency_is_normalized() {
        let explainer = SaliencyExplainer::default();
        let map = explainer
            .saliency(&canvas(Rgb([220, 80, 90])), &QuadrantClassifier)
            .unwrap();
        let peak = map.iter().cloned().fold(0.0f64, f64::max);
        assert!((peak - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overlay_keeps_canvas_dimensions() {
        let explainer = SaliencyExplainer::default();
        let clf = FixedClassifier::new(0.5);
        let out = explainer.overlay(&canvas(Rgb([200, 120, 130])), &clf).unwrap();
        assert_eq!(out.dimensions(), (TISSUE_SIZE, TISSUE_SIZE));
    }

    #[test]
    fn jet_endpoints() {
        assert_eq!(jet(0.0), [0, 0, 128]);
        assert_eq!(jet(1.0), [128, 0, 0]);
        // mid-range is green-dominant
        let mid = jet(0.5);
        assert!(mid[1] > mid[0] && mid[1] > mid[2]);
    }
}
