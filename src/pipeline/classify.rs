use std::path::PathBuf;

use image::RgbImage;
use thiserror::Error;

use super::extraction::TISSUE_SIZE;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Model not found at {0}")]
    ModelNotFound(PathBuf),

    #[error("Model initialization failed: {0}")]
    ModelInit(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Bad classifier input: {0}")]
    BadInput(String),
}

/// Binary anemia classifier over a normalized tissue sample.
///
/// `predict` returns the anemia probability in [0, 1]. Implementations
/// must accept exactly the 64x64 canvas the extractor produces.
pub trait TissueClassifier: Send + Sync {
    fn predict(&self, tissue: &RgbImage) -> Result<f64, ClassifierError>;
}

/// Reject inputs that are not the normalized canvas.
pub(crate) fn ensure_canvas(tissue: &RgbImage) -> Result<(), ClassifierError> {
    let (w, h) = tissue.dimensions();
    if w != TISSUE_SIZE || h != TISSUE_SIZE {
        return Err(ClassifierError::BadInput(format!(
            "expected {TISSUE_SIZE}x{TISSUE_SIZE} input, got {w}x{h}"
        )));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// ONNX classifier — behind `onnx-model` feature
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-model")]
mod onnx {
    use super::{ensure_canvas, ClassifierError, TissueClassifier, TISSUE_SIZE};
    use image::RgbImage;
    use std::path::Path;
    use std::sync::Mutex;

    use ort::session::Session;

    /// Real classifier backed by ONNX Runtime.
    ///
    /// Expects a model taking one float32 tensor of shape [1, 64, 64, 3]
    /// with channel values in [0, 1], producing a single sigmoid output.
    ///
    /// Uses interior mutability (Mutex) because ort::Session::run requires
    /// `&mut self` while the TissueClassifier trait exposes `&self`.
    pub struct OnnxClassifier {
        session: Mutex<Session>,
    }

    impl OnnxClassifier {
        pub fn load(model_path: &Path) -> Result<Self, ClassifierError> {
            if !model_path.exists() {
                return Err(ClassifierError::ModelNotFound(model_path.to_path_buf()));
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| ClassifierError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| ClassifierError::ModelInit(e.to_string()))?
                .commit_from_file(model_path)
                .map_err(|e: ort::Error| {
                    ClassifierError::ModelInit(format!("ONNX load failed: {e}"))
                })?;

            tracing::info!("ONNX classifier loaded from {}", model_path.display());

            Ok(Self {
                session: Mutex::new(session),
            })
        }
    }

    impl TissueClassifier for OnnxClassifier {
        fn predict(&self, tissue: &RgbImage) -> Result<f64, ClassifierError> {
            use ort::value::TensorRef;

            ensure_canvas(tissue)?;

            let side = TISSUE_SIZE as usize;
            let mut input = ndarray::Array4::<f32>::zeros((1, side, side, 3));
            for (x, y, p) in tissue.enumerate_pixels() {
                for c in 0..3 {
                    input[[0, y as usize, x as usize, c]] = p.0[c] as f32 / 255.0;
                }
            }

            let tensor = TensorRef::from_array_view(&input)
                .map_err(|e| ClassifierError::Inference(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| ClassifierError::Inference("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| ClassifierError::Inference(format!("ONNX inference failed: {e}")))?;

            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| ClassifierError::Inference(format!("Output extraction: {e}")))?;

            let prob = *data.first().ok_or_else(|| {
                ClassifierError::Inference(format!("Empty output, shape {shape:?}"))
            })?;

            Ok((prob as f64).clamp(0.0, 1.0))
        }
    }
}

#[cfg(feature = "onnx-model")]
pub use onnx::OnnxClassifier;

/// Classifier returning a fixed probability, for tests and for wiring a
/// pipeline without model weights.
pub struct FixedClassifier {
    pub probability: f64,
}

impl FixedClassifier {
    pub fn new(probability: f64) -> Self {
        Self { probability }
    }
}

impl TissueClassifier for FixedClassifier {
    fn predict(&self, tissue: &RgbImage) -> Result<f64, ClassifierError> {
        ensure_canvas(tissue)?;
        Ok(self.probability)
    }
}
