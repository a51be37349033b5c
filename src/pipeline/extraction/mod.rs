//! Lower-conjunctiva extraction.
//!
//! Isolates the inferior palpebral conjunctiva (the tissue below the
//! iris) from an arbitrary photograph and normalizes it onto the 64x64
//! black canvas the classifier expects. A chain of strategies covers the
//! realistic capture range, from full-face photos with usable landmarks
//! down to extreme close-ups where only edges remain.

pub mod color;
pub mod detect;
pub mod edges;
pub mod mask;
pub mod normalize;
pub mod orchestrator;
pub mod refine;
pub mod strategies;
pub mod types;
pub mod validate;

pub use detect::{
    EyeLandmarks, EyeRegionDetector, FaceLandmarkDetector, NoEyeDetector, NoLandmarkDetector,
    Point, Rect, StaticEyeDetector, StaticLandmarkDetector,
};
pub use orchestrator::ConjunctivaExtractor;
pub use strategies::ExtractionStrategy;
pub use types::{Eye, ExtractionConfig, ExtractionMethod, ExtractionResult, TISSUE_SIZE};
pub use validate::ValidationThresholds;
