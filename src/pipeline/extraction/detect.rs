//! Detector seams: geometry types plus the traits the landmark- and
//! cascade-based strategies are injected with.
//!
//! The actual models (a cascade eye detector, a facial landmark network with
//! refined iris points) live outside this crate. Trait objects keep the
//! strategy chain testable and let deployments swap detector backends.

use image::{GrayImage, RgbImage};

use super::types::Eye;

// ═══════════════════════════════════════════════════════════
// Geometry
// ═══════════════════════════════════════════════════════════

/// Integer pixel coordinate. May fall outside the image on purpose
/// (landmark models extrapolate); consumers clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned detection rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Landmarks for a single eye.
#[derive(Debug, Clone)]
pub struct EyeLandmarks {
    /// Lower-lid point chain, inner corner first, outer corner last.
    pub lower_lid: Vec<Point>,
    /// Iris center, present only when the model refines iris points.
    pub iris_center: Option<Point>,
}

impl EyeLandmarks {
    pub fn inner_corner(&self) -> Option<Point> {
        self.lower_lid.first().copied()
    }

    pub fn outer_corner(&self) -> Option<Point> {
        self.lower_lid.last().copied()
    }
}

// ═══════════════════════════════════════════════════════════
// Detector traits
// ═══════════════════════════════════════════════════════════

/// Sliding-window eye-region detector (cascade style).
/// Returns zero or more candidate rectangles; callers pick the largest.
pub trait EyeRegionDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> Vec<Rect>;
}

/// Facial landmark model. Returns landmarks for the requested eye,
/// or `None` when no face is found in the image.
pub trait FaceLandmarkDetector: Send + Sync {
    fn landmarks(&self, image: &RgbImage, eye: Eye) -> Option<EyeLandmarks>;
}

// ═══════════════════════════════════════════════════════════
// Test doubles (also useful for wiring a pipeline without models)
// ═══════════════════════════════════════════════════════════

/// Detector that never finds anything. Forces the chain past the
/// cascade strategy.
pub struct NoEyeDetector;

impl EyeRegionDetector for NoEyeDetector {
    fn detect(&self, _gray: &GrayImage) -> Vec<Rect> {
        Vec::new()
    }
}

/// Detector returning a fixed set of rectangles.
pub struct StaticEyeDetector {
    pub detections: Vec<Rect>,
}

impl EyeRegionDetector for StaticEyeDetector {
    fn detect(&self, _gray: &GrayImage) -> Vec<Rect> {
        self.detections.clone()
    }
}

/// Landmark model that never finds a face.
pub struct NoLandmarkDetector;

impl FaceLandmarkDetector for NoLandmarkDetector {
    fn landmarks(&self, _image: &RgbImage, _eye: Eye) -> Option<EyeLandmarks> {
        None
    }
}

/// Landmark model returning fixed landmarks regardless of input.
pub struct StaticLandmarkDetector {
    pub result: Option<EyeLandmarks>,
}

impl FaceLandmarkDetector for StaticLandmarkDetector {
    fn landmarks(&self, _image: &RgbImage, _eye: Eye) -> Option<EyeLandmarks> {
        self.result.clone()
    }
}
