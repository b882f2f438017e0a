//! Error and warning types for the scoring engine

use crate::bands::Band;
use crate::metrics::MetricKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal scoring error
#[derive(Error, Debug)]
pub enum ScoreError {
    /// No usable reference data for the requested genre
    #[error("Reference resolution failed for genre '{genre}': {reason}")]
    ReferenceResolution {
        /// Normalized genre key
        genre: String,
        /// What was wrong with the payload
        reason: String,
    },

    /// Payload could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for scoring operations
pub type ScoreResult<T> = Result<T, ScoreError>;

/// Non-fatal condition recorded on the scoring result.
///
/// The computation continues with a reduced metric set; renderers show
/// "N/A" for whatever a warning excluded.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreWarning {
    /// Reference target without a usable tolerance; metric excluded
    #[error("invalid tolerance for {metric}: {reason}")]
    InvalidTolerance { metric: MetricKey, reason: String },

    /// Reference expects a metric the track does not provide; metric excluded
    #[error("{metric} expected by the reference but not measured")]
    MissingMetric { metric: MetricKey },

    /// Band data could not be mapped without estimation; band excluded
    #[error("band '{band}' not mapped: {reason}")]
    BandMapping { band: String, reason: String },

    /// Reference band had a target but no tolerance; default applied
    #[error("band {band} has no tolerance in the reference, using {tolerance_db} dB")]
    DefaultToleranceApplied { band: Band, tolerance_db: f64 },

    /// Reported true peak contradicted the sample peak and was corrected
    #[error("true peak corrected from {reported_dbtp:.2} to {corrected_dbtp:.2} dBTP: {reason}")]
    PeakCorrected {
        reported_dbtp: f64,
        corrected_dbtp: f64,
        reason: String,
    },
}

impl ScoreWarning {
    /// Metric the warning excludes, if it names one
    pub fn metric(&self) -> Option<MetricKey> {
        match self {
            ScoreWarning::InvalidTolerance { metric, .. }
            | ScoreWarning::MissingMetric { metric } => Some(*metric),
            ScoreWarning::DefaultToleranceApplied { band, .. } => Some(MetricKey::Band(*band)),
            ScoreWarning::PeakCorrected { .. } => Some(MetricKey::TruePeak),
            ScoreWarning::BandMapping { band, .. } => Band::from_alias(band).map(MetricKey::Band),
        }
    }
}
