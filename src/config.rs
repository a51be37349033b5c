//! Pipeline-level configuration. Extraction tuning lives in
//! [`crate::pipeline::extraction::ExtractionConfig`]; this covers the
//! surrounding concerns.

use std::time::Duration;

/// Attached verbatim to every screening outcome.
pub const MEDICAL_DISCLAIMER: &str = "DISCLAIMER: This software is for research purposes only \
     and has not received FDA/ICMR/CE validation. Do not use for definitive clinical diagnosis.";

#[derive(Debug, Clone)]
pub struct ScreeningConfig {
    /// Deployment stage tag recorded in the audit trail
    /// ("PRODUCTION" or "STAGING").
    pub environment: String,
    /// Model version tag recorded in the audit trail.
    pub model_version: String,
    /// Minimum spacing between accepted screening requests.
    pub min_request_interval: Duration,
    /// Persist a copy of the input image.
    pub save_original: bool,
    /// Persist the 64x64 cropped tissue sample.
    pub save_cropped: bool,
    /// Generate and persist the saliency heatmap.
    pub save_heatmap: bool,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            environment: "STAGING".to_string(),
            model_version: "v1.0.0".to_string(),
            min_request_interval: Duration::from_millis(500),
            save_original: true,
            save_cropped: true,
            save_heatmap: true,
        }
    }
}

impl ScreeningConfig {
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    /// Disable all artifact persistence (audit trail still runs).
    pub fn without_artifacts(mut self) -> Self {
        self.save_original = false;
        self.save_cropped = false;
        self.save_heatmap = false;
        self
    }
}
