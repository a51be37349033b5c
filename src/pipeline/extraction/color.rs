//! Per-pixel color conversions used by the mask refiner and validator.
//!
//! Tissue segmentation relies on three independent views of the same pixel:
//! HSV hue/saturation (pink/red bands), the Lab a* axis (green-red
//! chrominance, robust to lighting shifts), and plain luma (dark/overexposed
//! checks). Implemented directly rather than through a color-science crate:
//! only three conversions are needed and all run in tight per-pixel loops.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Rec. 601 luma of an RGB pixel.
pub fn luma(p: &Rgb<u8>) -> u8 {
    let [r, g, b] = p.0;
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8
}

/// Grayscale conversion of a whole image (Rec. 601 weights).
pub fn to_gray(image: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(gray.pixels_mut()) {
        *dst = Luma([luma(src)]);
    }
    gray
}

/// HSV of an RGB pixel: hue in degrees [0, 360), saturation in [0, 1],
/// value as the max channel in [0, 255].
pub fn hsv(p: &Rgb<u8>) -> (f32, f32, u8) {
    let [r, g, b] = p.0;
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (((gf - bf) / delta).rem_euclid(6.0))
    } else if max == gf {
        60.0 * ((bf - rf) / delta + 2.0)
    } else {
        60.0 * ((rf - gf) / delta + 4.0)
    };

    let sat = if max == 0.0 { 0.0 } else { delta / max };
    (hue, sat, max as u8)
}

/// CIE Lab a* (green-red axis, D65 white) of an sRGB pixel.
/// Pink conjunctival tissue sits well above zero; skin hovers near it.
pub fn lab_a(p: &Rgb<u8>) -> f32 {
    fn srgb_to_linear(c: u8) -> f32 {
        let c = c as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }
    fn lab_f(t: f32) -> f32 {
        const DELTA: f32 = 6.0 / 29.0;
        if t > DELTA * DELTA * DELTA {
            t.cbrt()
        } else {
            t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
        }
    }

    let r = srgb_to_linear(p.0[0]);
    let g = srgb_to_linear(p.0[1]);
    let b = srgb_to_linear(p.0[2]);

    // sRGB -> XYZ (D65), normalized by the white point
    let x = (0.4124 * r + 0.3576 * g + 0.1805 * b) / 0.95047;
    let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;

    500.0 * (lab_f(x) - lab_f(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_weights() {
        assert_eq!(luma(&Rgb([255, 255, 255])), 255);
        assert_eq!(luma(&Rgb([0, 0, 0])), 0);
        // Green dominates perceived brightness
        assert!(luma(&Rgb([0, 255, 0])) > luma(&Rgb([255, 0, 0])));
    }

    #[test]
    fn hsv_primary_hues() {
        let (h, s, v) = hsv(&Rgb([255, 0, 0]));
        assert!((h - 0.0).abs() < 0.5);
        assert!((s - 1.0).abs() < f32::EPSILON);
        assert_eq!(v, 255);

        let (h, _, _) = hsv(&Rgb([0, 255, 0]));
        assert!((h - 120.0).abs() < 0.5);

        let (h, _, _) = hsv(&Rgb([0, 0, 255]));
        assert!((h - 240.0).abs() < 0.5);
    }

    #[test]
    fn hsv_pink_wraps_high() {
        // Pink tissue tone: red with a blue lean wraps past 320 degrees
        let (h, s, v) = hsv(&Rgb([200, 120, 130]));
        assert!(h > 320.0, "hue {h}");
        assert!(s > 0.19, "saturation {s}");
        assert!(v >= 60);
    }

    #[test]
    fn lab_a_separates_red_from_green() {
        assert!(lab_a(&Rgb([200, 60, 80])) > 30.0);
        assert!(lab_a(&Rgb([60, 200, 80])) < -30.0);
        // Neutral gray sits at zero
        assert!(lab_a(&Rgb([128, 128, 128])).abs() < 1.0);
    }

    #[test]
    fn gray_image_dimensions_preserved() {
        let img = RgbImage::from_pixel(7, 3, Rgb([10, 20, 30]));
        let gray = to_gray(&img);
        assert_eq!((gray.width(), gray.height()), (7, 3));
    }
}
