//! The screening pipeline and its stages.

use thiserror::Error;

pub mod classify;
pub mod decision;
pub mod explain;
pub mod extraction;
pub mod orchestrator;

pub use classify::{ClassifierError, FixedClassifier, TissueClassifier};
pub use decision::{decide, Diagnosis, Prediction, Severity};
pub use explain::SaliencyExplainer;
pub use orchestrator::{ScreeningOutcome, ScreeningPipeline};

#[cfg(feature = "onnx-model")]
pub use classify::OnnxClassifier;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Rate limit exceeded, retry in {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    #[error(transparent)]
    Classifier(#[from] classify::ClassifierError),

    #[error(transparent)]
    Audit(#[from] crate::audit::AuditError),
}
