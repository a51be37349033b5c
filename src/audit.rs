//! Append-only audit trail.
//!
//! Every inference, successful or not, becomes exactly one CSV row keyed
//! by a SHA-256 hash of the input pixels. The file is opened in append
//! mode, written under a lock, flushed, and synced before the call
//! returns, so a crash can lose at most the row being written.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use image::RgbImage;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audit CSV failure: {0}")]
    Csv(#[from] csv::Error),
}

/// Column order is part of the audit contract; never reorder.
const COLUMNS: [&str; 19] = [
    "timestamp",
    "image_hash_sha256",
    "model_version",
    "probability",
    "classification",
    "is_low_confidence",
    "extraction_method",
    "environment",
    "device_type",
    "resolution",
    "mean_luminance",
    "subject_age",
    "subject_sex",
    "capture_environment",
    "hb_lab_value",
    "hb_confirmed_anemia",
    "time_delta_seconds",
    "clinician_decision",
    "override_reason",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Female => "FEMALE",
            Sex::Male => "MALE",
        }
    }
}

/// Ground truth says anemic when hemoglobin falls below the sex-specific
/// WHO threshold: 12.0 g/dL for females, 13.0 g/dL for males.
pub fn lab_confirmed_anemic(hb_g_dl: f64, sex: Sex) -> bool {
    match sex {
        Sex::Female => hb_g_dl < 12.0,
        Sex::Male => hb_g_dl < 13.0,
    }
}

/// Optional clinical context supplied by the operator. Everything absent
/// is recorded as `N/A` (or `unknown` for capture fields).
#[derive(Debug, Clone, Default)]
pub struct SubjectMetadata {
    pub device_type: Option<String>,
    pub subject_age: Option<u32>,
    pub subject_sex: Option<Sex>,
    pub capture_environment: Option<String>,
    /// Laboratory hemoglobin, g/dL, when a ground-truth draw exists.
    pub hb_lab_value: Option<f64>,
    /// Seconds between lab draw and photo capture.
    pub time_delta_seconds: Option<f64>,
    pub clinician_decision: Option<String>,
    pub override_reason: Option<String>,
}

/// One inference to be recorded.
pub struct InferenceRecord<'a> {
    pub image: &'a RgbImage,
    pub model_version: &'a str,
    pub probability: f64,
    pub classification: &'a str,
    pub is_low_confidence: bool,
    pub extraction_method: &'a str,
    pub environment: &'a str,
    pub metadata: &'a SubjectMetadata,
}

/// Append-only CSV audit recorder. Rows are serialized under an internal
/// lock, so one recorder can be shared across threads.
pub struct AuditRecorder {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, creating the file and header on first use.
    /// Flushes and syncs before returning.
    pub fn record(&self, rec: &InferenceRecord<'_>) -> Result<(), AuditError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let fresh = !self.path.exists();
        let mut file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        {
            let mut writer = csv::Writer::from_writer(&mut file);
            if fresh {
                writer.write_record(COLUMNS)?;
            }
            writer.write_record(Self::row(rec))?;
            writer.flush()?;
        }
        file.sync_data()?;

        debug!(path = %self.path.display(), "audit row appended");
        Ok(())
    }

    fn row(rec: &InferenceRecord<'_>) -> Vec<String> {
        let (w, h) = rec.image.dimensions();
        let meta = rec.metadata;

        let hb_confirmed = meta
            .hb_lab_value
            .zip(meta.subject_sex)
            .map(|(hb, sex)| lab_confirmed_anemic(hb, sex));

        let or_na = |v: Option<String>| v.unwrap_or_else(|| "N/A".to_string());

        vec![
            Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            image_hash(rec.image),
            rec.model_version.to_string(),
            format!("{:.4}", rec.probability),
            rec.classification.to_string(),
            rec.is_low_confidence.to_string(),
            rec.extraction_method.to_string(),
            rec.environment.to_string(),
            meta.device_type.clone().unwrap_or_else(|| "unknown".to_string()),
            format!("{w}x{h}"),
            format!("{:.2}", mean_luminance(rec.image)),
            or_na(meta.subject_age.map(|a| a.to_string())),
            or_na(meta.subject_sex.map(|s| s.as_str().to_string())),
            meta.capture_environment
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            or_na(meta.hb_lab_value.map(|v| v.to_string())),
            or_na(hb_confirmed.map(|v| v.to_string())),
            or_na(meta.time_delta_seconds.map(|v| v.to_string())),
            or_na(meta.clinician_decision.clone()),
            or_na(meta.override_reason.clone()),
        ]
    }
}

/// SHA-256 over the raw pixel bytes, hex encoded.
pub fn image_hash(image: &RgbImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.as_raw());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn mean_luminance(image: &RgbImage) -> f64 {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return 0.0;
    }
    let sum: f64 = image
        .pixels()
        .map(|p| 0.299 * p.0[0] as f64 + 0.587 * p.0[1] as f64 + 0.114 * p.0[2] as f64)
        .sum();
    sum / count as f64
}
