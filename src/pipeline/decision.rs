//! Decision engine: turns a raw model probability into the clinical
//! screening verdict.
//!
//! Pure functions over the probability only. The guardrail takes
//! precedence over everything else: a borderline probability yields
//! INCONCLUSIVE with no severity and no hemoglobin estimate, regardless
//! of which side of the threshold it falls on.

use serde::{Deserialize, Serialize};

/// Decision boundary between normal and anemic.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Probabilities inside this closed band are too close to the boundary
/// to act on.
pub const LOW_CONFIDENCE_MIN: f64 = 0.45;
pub const LOW_CONFIDENCE_MAX: f64 = 0.55;

/// Severity bands over the model confidence (anemic cases only).
pub const SEVERITY_MILD_BELOW: f64 = 0.70;
pub const SEVERITY_MODERATE_BELOW: f64 = 0.85;

/// Representative hemoglobin estimates per band, g/dL.
pub const HB_NORMAL: f64 = 13.5;
pub const HB_MILD: f64 = 11.5;
pub const HB_MODERATE: f64 = 9.5;
pub const HB_SEVERE: f64 = 7.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Diagnosis {
    Normal,
    Anemic,
    Inconclusive,
}

impl Diagnosis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Diagnosis::Normal => "NORMAL",
            Diagnosis::Anemic => "ANEMIC",
            Diagnosis::Inconclusive => "INCONCLUSIVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    Mild,
    Moderate,
    Severe,
    /// Guardrail triggered; no severity can be assigned.
    Unknown,
}

/// Full screening verdict for one inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Raw model output in [0, 1].
    pub probability: f64,
    /// `None` when the guardrail withheld the call.
    pub is_anemic: Option<bool>,
    pub diagnosis: Diagnosis,
    pub is_low_confidence: bool,
    /// Distance-from-boundary confidence: p for anemic, 1-p for normal.
    pub confidence: f64,
    pub severity: Severity,
    /// Representative estimate only, never a measurement.
    pub hemoglobin_estimate: Option<f64>,
}

impl Prediction {
    /// Verdict recorded when no tissue could be extracted at all.
    /// Probability is pinned to zero (nothing was inferred) and
    /// confidence to maximum uncertainty.
    pub fn inconclusive_failure() -> Self {
        Self {
            probability: 0.0,
            is_anemic: None,
            diagnosis: Diagnosis::Inconclusive,
            is_low_confidence: true,
            confidence: 0.5,
            severity: Severity::Unknown,
            hemoglobin_estimate: None,
        }
    }
}

/// Map a model probability to the clinical verdict.
pub fn decide(probability: f64) -> Prediction {
    let anemic = probability > DECISION_THRESHOLD;
    let confidence = if anemic { probability } else { 1.0 - probability };

    let (severity, hb) = if !anemic {
        (Severity::Normal, HB_NORMAL)
    } else if confidence < SEVERITY_MILD_BELOW {
        (Severity::Mild, HB_MILD)
    } else if confidence < SEVERITY_MODERATE_BELOW {
        (Severity::Moderate, HB_MODERATE)
    } else {
        (Severity::Severe, HB_SEVERE)
    };

    let is_low_confidence =
        (LOW_CONFIDENCE_MIN..=LOW_CONFIDENCE_MAX).contains(&probability);

    if is_low_confidence {
        Prediction {
            probability,
            is_anemic: None,
            diagnosis: Diagnosis::Inconclusive,
            is_low_confidence: true,
            confidence,
            severity: Severity::Unknown,
            hemoglobin_estimate: None,
        }
    } else {
        Prediction {
            probability,
            is_anemic: Some(anemic),
            diagnosis: if anemic {
                Diagnosis::Anemic
            } else {
                Diagnosis::Normal
            },
            is_low_confidence: false,
            confidence,
            severity,
            hemoglobin_estimate: Some(hb),
        }
    }
}
