//! Screening pipeline: extraction, classification, decision, audit.
//!
//! Failure policy:
//! - artifact saving is best effort and only warns
//! - extraction failure still produces an outcome (INCONCLUSIVE) and an
//!   audit row
//! - classifier failure is an error, recorded in the audit trail first
//! - audit failure is always fatal; an inference that cannot be recorded
//!   must not be reported

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use image::RgbImage;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::audit::{AuditRecorder, InferenceRecord, SubjectMetadata};
use crate::config::{ScreeningConfig, MEDICAL_DISCLAIMER};
use crate::storage::{ArtifactStore, Bucket};

use super::classify::TissueClassifier;
use super::decision::{decide, Prediction};
use super::explain::SaliencyExplainer;
use super::extraction::{ConjunctivaExtractor, Eye, ExtractionMethod};
use super::PipelineError;

/// Everything a caller gets back from one screening request.
#[derive(Debug, Clone, Serialize)]
pub struct ScreeningOutcome {
    pub prediction: Prediction,
    pub extraction_method: ExtractionMethod,
    pub original_path: Option<PathBuf>,
    pub cropped_path: Option<PathBuf>,
    pub heatmap_path: Option<PathBuf>,
    pub disclaimer: &'static str,
}

pub struct ScreeningPipeline {
    extractor: ConjunctivaExtractor,
    classifier: Arc<dyn TissueClassifier>,
    explainer: Option<SaliencyExplainer>,
    audit: AuditRecorder,
    store: Arc<dyn ArtifactStore>,
    config: ScreeningConfig,
    last_accepted: Mutex<Option<Instant>>,
}

impl ScreeningPipeline {
    pub fn new(
        extractor: ConjunctivaExtractor,
        classifier: Arc<dyn TissueClassifier>,
        audit: AuditRecorder,
        store: Arc<dyn ArtifactStore>,
        config: ScreeningConfig,
    ) -> Self {
        info!(
            environment = %config.environment,
            model_version = %config.model_version,
            "screening pipeline initialized"
        );
        Self {
            extractor,
            classifier,
            explainer: Some(SaliencyExplainer::default()),
            audit,
            store,
            config,
            last_accepted: Mutex::new(None),
        }
    }

    /// Replace or remove the explainability side-channel.
    pub fn with_explainer(mut self, explainer: Option<SaliencyExplainer>) -> Self {
        self.explainer = explainer;
        self
    }

    /// Run one screening request end to end.
    ///
    /// Returns `Err(RateLimited)` without side effects when requests
    /// arrive faster than the configured interval. Every accepted
    /// request produces exactly one audit row.
    pub fn screen(
        &self,
        image: &RgbImage,
        eye: Eye,
        metadata: &SubjectMetadata,
    ) -> Result<ScreeningOutcome, PipelineError> {
        self.check_rate_limit()?;

        let original_path = if self.config.save_original {
            self.save_artifact(Bucket::Originals, &format!("original_{}", eye.as_str()), image)
        } else {
            None
        };

        let extraction = self.extractor.extract(image, eye);
        if extraction.is_failed() {
            warn!("extraction failed, reporting inconclusive");
            let prediction = Prediction::inconclusive_failure();
            self.record(image, &prediction, ExtractionMethod::ExtractionFailed, metadata)?;
            return Ok(ScreeningOutcome {
                prediction,
                extraction_method: ExtractionMethod::ExtractionFailed,
                original_path,
                cropped_path: None,
                heatmap_path: None,
                disclaimer: MEDICAL_DISCLAIMER,
            });
        }

        let cropped_path = if self.config.save_cropped {
            self.save_artifact(
                Bucket::Cropped,
                &format!("cropped_{}", eye.as_str()),
                &extraction.tissue,
            )
        } else {
            None
        };

        let probability = match self.classifier.predict(&extraction.tissue) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "classifier failed");
                // Record the failed attempt before surfacing the error.
                let prediction = Prediction::inconclusive_failure();
                if let Err(audit_err) =
                    self.record(image, &prediction, extraction.method, metadata)
                {
                    error!(error = %audit_err, "audit of failed inference also failed");
                }
                return Err(e.into());
            }
        };

        let prediction = decide(probability);
        info!(
            probability,
            diagnosis = prediction.diagnosis.as_str(),
            method = extraction.method.as_str(),
            "inference complete"
        );

        let heatmap_path = if self.config.save_heatmap {
            self.save_heatmap(&extraction.tissue, eye, &prediction)
        } else {
            None
        };

        self.record(image, &prediction, extraction.method, metadata)?;

        Ok(ScreeningOutcome {
            prediction,
            extraction_method: extraction.method,
            original_path,
            cropped_path,
            heatmap_path,
            disclaimer: MEDICAL_DISCLAIMER,
        })
    }

    fn check_rate_limit(&self) -> Result<(), PipelineError> {
        let mut last = self.last_accepted.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(accepted_at) = *last {
            let elapsed = accepted_at.elapsed();
            if elapsed < self.config.min_request_interval {
                let retry_after_ms =
                    (self.config.min_request_interval - elapsed).as_millis() as u64;
                warn!(retry_after_ms, "request rejected by rate limiter");
                return Err(PipelineError::RateLimited { retry_after_ms });
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }

    /// Best-effort artifact save; failures are logged, never fatal.
    fn save_artifact(&self, bucket: Bucket, prefix: &str, image: &RgbImage) -> Option<PathBuf> {
        match self.store.save(bucket, prefix, image) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, bucket = bucket.as_str(), "artifact save failed");
                None
            }
        }
    }

    fn save_heatmap(
        &self,
        tissue: &RgbImage,
        eye: Eye,
        prediction: &Prediction,
    ) -> Option<PathBuf> {
        let explainer = self.explainer.as_ref()?;
        let overlay = match explainer.overlay(tissue, self.classifier.as_ref()) {
            Ok(img) => img,
            Err(e) => {
                warn!(error = %e, "saliency generation failed");
                return None;
            }
        };
        let prefix = format!(
            "heatmap_{}_{}",
            eye.as_str(),
            prediction.diagnosis.as_str().to_lowercase()
        );
        self.save_artifact(Bucket::Heatmaps, &prefix, &overlay)
    }

    fn record(
        &self,
        image: &RgbImage,
        prediction: &Prediction,
        method: ExtractionMethod,
        metadata: &SubjectMetadata,
    ) -> Result<(), PipelineError> {
        self.audit.record(&InferenceRecord {
            image,
            model_version: &self.config.model_version,
            probability: prediction.probability,
            classification: prediction.diagnosis.as_str(),
            is_low_confidence: prediction.is_low_confidence,
            extraction_method: method.as_str(),
            environment: &self.config.environment,
            metadata,
        })?;
        Ok(())
    }
}
