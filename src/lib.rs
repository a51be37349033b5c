//! Non-invasive anemia screening from conjunctiva photographs.
//!
//! The pipeline isolates the lower conjunctiva from an input photo,
//! classifies the tissue sample, applies a clinical decision layer with
//! a confidence guardrail, and records every inference in an append-only
//! audit trail. Detector and classifier backends are injected as trait
//! objects; the crate itself carries no model weights.
//!
//! This is a screening aid, not a diagnostic device. Every outcome
//! carries [`config::MEDICAL_DISCLAIMER`].

pub mod audit;
pub mod config;
pub mod pipeline;
pub mod storage;

pub use audit::{AuditRecorder, SubjectMetadata};
pub use config::{ScreeningConfig, MEDICAL_DISCLAIMER};
pub use pipeline::extraction::{ConjunctivaExtractor, Eye, ExtractionConfig, ExtractionMethod};
pub use pipeline::{
    Diagnosis, PipelineError, Prediction, ScreeningOutcome, ScreeningPipeline, Severity,
    TissueClassifier,
};
pub use storage::{ArtifactStore, Bucket, FsArtifactStore};
