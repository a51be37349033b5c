//! Edge-based eye localization, the last automatic strategy in the chain.
//!
//! When no detector and no landmarks produced a usable region, the eye
//! outline itself is usually still the strongest edge structure in the
//! frame. Blur, Sobel magnitude, dilation to close the contour, then the
//! largest connected component gives a candidate eye bounding box.

use image::imageops;
use image::{GrayImage, Luma, RgbImage};

use super::color::to_gray;
use super::detect::Rect;
use super::mask::{self, dilate, label_components};

/// Gradient magnitude above this counts as an edge pixel.
const EDGE_THRESHOLD: u32 = 100;

/// Sobel gradient magnitude, saturating, as a binary edge mask.
fn sobel_edges(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut edges = GrayImage::new(w, h);
    if w < 3 || h < 3 {
        return edges;
    }

    let px = |x: u32, y: u32| gray.get_pixel(x, y).0[0] as i32;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = -px(x - 1, y - 1) + px(x + 1, y - 1) - 2 * px(x - 1, y)
                + 2 * px(x + 1, y)
                - px(x - 1, y + 1)
                + px(x + 1, y + 1);
            let gy = -px(x - 1, y - 1) - 2 * px(x, y - 1) - px(x + 1, y - 1)
                + px(x - 1, y + 1)
                + 2 * px(x, y + 1)
                + px(x + 1, y + 1);
            let mag = ((gx * gx + gy * gy) as f32).sqrt() as u32;
            if mag > EDGE_THRESHOLD {
                edges.put_pixel(x, y, Luma([mask::ON]));
            }
        }
    }
    edges
}

/// Bounding box of the dominant edge structure, or `None` when the frame
/// has no edges worth speaking of.
pub fn dominant_edge_region(image: &RgbImage) -> Option<Rect> {
    let gray = to_gray(image);
    let blurred = imageops::blur(&gray, 1.0);
    let edges = sobel_edges(&blurred);
    let closed = dilate(&edges, 2, 2);

    let map = label_components(&closed);
    let largest = map.largest()?;
    Some(largest.bbox)
}
