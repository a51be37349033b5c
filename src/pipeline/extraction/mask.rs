//! Binary mask primitives: morphology, region fills, connected components.
//!
//! Masks are single-channel images whose pixels are exactly 0 or 255.
//! Everything here operates on that invariant and preserves it.

use image::{GrayImage, Luma};

use super::detect::{Point, Rect};

pub const ON: u8 = 255;
pub const OFF: u8 = 0;

#[inline]
fn is_on(mask: &GrayImage, x: i64, y: i64) -> bool {
    if x < 0 || y < 0 || x >= mask.width() as i64 || y >= mask.height() as i64 {
        return false;
    }
    mask.get_pixel(x as u32, y as u32).0[0] != 0
}

/// Offsets of a discrete disc with the given radius (radius 1 = cross,
/// radius 2 = the 5x5 elliptical element minus corners).
fn disc_offsets(radius: u32) -> Vec<(i64, i64)> {
    let r = radius as i64;
    let mut offs = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                offs.push((dx, dy));
            }
        }
    }
    offs
}

/// Morphological dilation with a disc element.
pub fn dilate(mask: &GrayImage, radius: u32, iterations: u32) -> GrayImage {
    let offs = disc_offsets(radius);
    let mut current = mask.clone();
    for _ in 0..iterations {
        let mut next = GrayImage::new(current.width(), current.height());
        for y in 0..current.height() {
            for x in 0..current.width() {
                let hit = offs
                    .iter()
                    .any(|&(dx, dy)| is_on(&current, x as i64 + dx, y as i64 + dy));
                if hit {
                    next.put_pixel(x, y, Luma([ON]));
                }
            }
        }
        current = next;
    }
    current
}

/// Morphological erosion with a disc element.
pub fn erode(mask: &GrayImage, radius: u32, iterations: u32) -> GrayImage {
    let offs = disc_offsets(radius);
    let mut current = mask.clone();
    for _ in 0..iterations {
        let mut next = GrayImage::new(current.width(), current.height());
        for y in 0..current.height() {
            for x in 0..current.width() {
                let all = offs
                    .iter()
                    .all(|&(dx, dy)| is_on(&current, x as i64 + dx, y as i64 + dy));
                if all {
                    next.put_pixel(x, y, Luma([ON]));
                }
            }
        }
        current = next;
    }
    current
}

/// Morphological opening (erode then dilate). Removes speckle smaller
/// than the element without shrinking surviving regions.
pub fn open(mask: &GrayImage, radius: u32) -> GrayImage {
    dilate(&erode(mask, radius, 1), radius, 1)
}

// ═══════════════════════════════════════════════════════════
// Region fills
// ═══════════════════════════════════════════════════════════

/// Fill a closed polygon (even-odd rule) into a fresh mask of the given
/// size. Vertices may lie outside the canvas; scanlines clip naturally.
pub fn fill_polygon(width: u32, height: u32, vertices: &[Point]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    if vertices.len() < 3 {
        return mask;
    }

    for y in 0..height {
        let scan_y = y as f64 + 0.5;
        let mut crossings: Vec<f64> = Vec::new();

        for i in 0..vertices.len() {
            let a = vertices[i];
            let b = vertices[(i + 1) % vertices.len()];
            let (ay, by) = (a.y as f64, b.y as f64);
            if (ay <= scan_y && by > scan_y) || (by <= scan_y && ay > scan_y) {
                let t = (scan_y - ay) / (by - ay);
                crossings.push(a.x as f64 + t * (b.x as f64 - a.x as f64));
            }
        }

        crossings.sort_by(|p, q| p.partial_cmp(q).unwrap());
        for pair in crossings.chunks_exact(2) {
            let x0 = pair[0].ceil().max(0.0) as i64;
            let x1 = (pair[1].floor() as i64).min(width as i64 - 1);
            for x in x0..=x1 {
                mask.put_pixel(x as u32, y, Luma([ON]));
            }
        }
    }
    mask
}

/// Fill the lower half of an ellipse (the half-disc below the center row,
/// closed by the straight chord through the center) into a fresh mask.
pub fn fill_lower_half_ellipse(
    width: u32,
    height: u32,
    center: Point,
    semi_axis_x: f32,
    semi_axis_y: f32,
) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    if semi_axis_x <= 0.0 || semi_axis_y <= 0.0 {
        return mask;
    }
    for y in 0..height {
        if (y as i32) < center.y {
            continue;
        }
        for x in 0..width {
            let nx = (x as f32 - center.x as f32) / semi_axis_x;
            let ny = (y as f32 - center.y as f32) / semi_axis_y;
            if nx * nx + ny * ny <= 1.0 {
                mask.put_pixel(x, y, Luma([ON]));
            }
        }
    }
    mask
}

// ═══════════════════════════════════════════════════════════
// Connected components (8-connectivity)
// ═══════════════════════════════════════════════════════════

/// One connected blob of ON pixels.
#[derive(Debug, Clone, Copy)]
pub struct Component {
    pub area: u32,
    pub bbox: Rect,
}

impl Component {
    /// Width-over-height aspect ratio of the bounding box.
    pub fn aspect(&self) -> f32 {
        if self.bbox.height == 0 {
            1.0
        } else {
            self.bbox.width as f32 / self.bbox.height as f32
        }
    }
}

/// Label map from [`label_components`]: `labels[y * width + x]` is 0 for
/// background, otherwise `1 + index` into `components`.
pub struct ComponentMap {
    pub width: u32,
    pub height: u32,
    pub labels: Vec<u32>,
    pub components: Vec<Component>,
}

impl ComponentMap {
    /// Mask containing only the component at `index`.
    pub fn mask_of(&self, index: usize) -> GrayImage {
        let wanted = index as u32 + 1;
        let mut mask = GrayImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                if self.labels[(y * self.width + x) as usize] == wanted {
                    mask.put_pixel(x, y, Luma([ON]));
                }
            }
        }
        mask
    }

    pub fn largest(&self) -> Option<&Component> {
        self.components.iter().max_by_key(|c| c.area)
    }
}

/// Label all 8-connected components of ON pixels.
pub fn label_components(mask: &GrayImage) -> ComponentMap {
    let (w, h) = (mask.width(), mask.height());
    let mut labels = vec![0u32; (w * h) as usize];
    let mut components = Vec::new();
    let mut stack = Vec::new();

    for sy in 0..h {
        for sx in 0..w {
            let idx = (sy * w + sx) as usize;
            if labels[idx] != 0 || mask.get_pixel(sx, sy).0[0] == 0 {
                continue;
            }

            let label = components.len() as u32 + 1;
            let (mut min_x, mut max_x, mut min_y, mut max_y) = (sx, sx, sy, sy);
            let mut area = 0u32;

            labels[idx] = label;
            stack.push((sx, sy));
            while let Some((x, y)) = stack.pop() {
                area += 1;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);

                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                        if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                            continue;
                        }
                        let nidx = (ny as u32 * w + nx as u32) as usize;
                        if labels[nidx] == 0 && mask.get_pixel(nx as u32, ny as u32).0[0] != 0 {
                            labels[nidx] = label;
                            stack.push((nx as u32, ny as u32));
                        }
                    }
                }
            }

            components.push(Component {
                area,
                bbox: Rect {
                    x: min_x,
                    y: min_y,
                    width: max_x - min_x + 1,
                    height: max_y - min_y + 1,
                },
            });
        }
    }

    ComponentMap { width: w, height: h, labels, components }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from_rows(rows: &[&[u8]]) -> GrayImage {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        let mut m = GrayImage::new(w, h);
        for (y, row) in rows.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                if v != 0 {
                    m.put_pixel(x as u32, y as u32, Luma([ON]));
                }
            }
        }
        m
    }

    #[test]
    fn open_removes_single_pixel_speckle() {
        let m = mask_from_rows(&[
            &[0, 0, 0, 0, 0],
            &[0, 1, 0, 0, 0],
            &[0, 0, 0, 0, 0],
        ]);
        let opened = open(&m, 1);
        assert!(opened.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn open_keeps_solid_block() {
        let m = mask_from_rows(&[
            &[0, 0, 0, 0, 0, 0],
            &[0, 1, 1, 1, 1, 0],
            &[0, 1, 1, 1, 1, 0],
            &[0, 1, 1, 1, 1, 0],
            &[0, 1, 1, 1, 1, 0],
            &[0, 0, 0, 0, 0, 0],
        ]);
        let opened = open(&m, 1);
        // interior survives
        assert_eq!(opened.get_pixel(2, 2).0[0], ON);
        assert_eq!(opened.get_pixel(3, 3).0[0], ON);
    }

    #[test]
    fn polygon_fill_square() {
        let square = [
            Point::new(1, 1),
            Point::new(4, 1),
            Point::new(4, 4),
            Point::new(1, 4),
        ];
        let m = fill_polygon(6, 6, &square);
        assert_eq!(m.get_pixel(2, 2).0[0], ON);
        assert_eq!(m.get_pixel(0, 0).0[0], OFF);
        assert_eq!(m.get_pixel(5, 5).0[0], OFF);
    }

    #[test]
    fn polygon_with_offscreen_vertices_clips() {
        let tri = [Point::new(-5, 0), Point::new(10, 0), Point::new(2, 6)];
        let m = fill_polygon(4, 4, &tri);
        assert!(m.pixels().any(|p| p.0[0] == ON));
    }

    #[test]
    fn half_ellipse_only_below_center() {
        let m = fill_lower_half_ellipse(10, 10, Point::new(5, 3), 4.0, 4.0);
        assert_eq!(m.get_pixel(5, 5).0[0], ON);
        assert_eq!(m.get_pixel(5, 1).0[0], OFF, "above center must stay empty");
    }

    #[test]
    fn components_labeled_with_bboxes() {
        let m = mask_from_rows(&[
            &[1, 1, 0, 0, 0],
            &[1, 1, 0, 0, 1],
            &[0, 0, 0, 1, 1],
        ]);
        let map = label_components(&m);
        assert_eq!(map.components.len(), 2);
        let largest = map.largest().unwrap();
        assert_eq!(largest.area, 4);
        assert_eq!(largest.bbox.width, 2);
        assert_eq!(largest.bbox.height, 2);
    }

    #[test]
    fn diagonal_pixels_are_one_component() {
        let m = mask_from_rows(&[
            &[1, 0, 0],
            &[0, 1, 0],
            &[0, 0, 1],
        ]);
        let map = label_components(&m);
        assert_eq!(map.components.len(), 1);
        assert_eq!(map.components[0].area, 3);
    }

    #[test]
    fn mask_of_isolates_component() {
        let m = mask_from_rows(&[
            &[1, 0, 1],
        ]);
        let map = label_components(&m);
        let first = map.mask_of(0);
        assert_eq!(first.get_pixel(0, 0).0[0], ON);
        assert_eq!(first.get_pixel(2, 0).0[0], OFF);
    }
}
