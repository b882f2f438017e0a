//! Peak precedence and safety gates
//!
//! Sample peak and true peak are reconciled before anything is scored: a
//! clipped sample peak forces the clipped state, and a true peak can never
//! be reported below the sample peak or below 0 dBTP while clipped. When the
//! track clips, the loudness, technical and dynamics sub-scores are capped
//! no matter how close their raw metrics sit to target.

use crate::error::ScoreWarning;
use crate::metrics::{Category, MetricsVector, finite};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sub-score ceilings applied in the clipped state
pub const CLIPPED_CAPS: [(Category, f64); 3] = [
    (Category::Loudness, 70.0),
    (Category::Technical, 60.0),
    (Category::Dynamics, 50.0),
];

/// Overall clipping state of the track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClippingState {
    /// Peaks known and at or below full scale
    Clean,
    /// Sample peak or true peak above full scale
    Clipped,
    /// No peak reading available
    Unknown,
}

/// Reconciled peak readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakAssessment {
    /// Loudest sample peak (dBFS)
    pub sample_peak_dbfs: Option<f64>,
    /// True peak as measured (dBTP)
    pub true_peak_raw_dbtp: Option<f64>,
    /// True peak as reported and scored (dBTP)
    pub true_peak_dbtp: Option<f64>,
    pub state: ClippingState,
}

impl PeakAssessment {
    pub fn is_clipped(&self) -> bool {
        self.state == ClippingState::Clipped
    }
}

/// Reconcile sample peak and true peak
pub fn assess_peaks(metrics: &MetricsVector) -> (PeakAssessment, Option<ScoreWarning>) {
    let sample_peak = metrics.sample_peak_dbfs();
    let raw_true_peak = finite(metrics.true_peak_dbtp);

    let over = |v: Option<f64>| v.is_some_and(|db| db > 0.0);
    let state = if over(sample_peak) || over(raw_true_peak) {
        ClippingState::Clipped
    } else if sample_peak.is_some() || raw_true_peak.is_some() {
        ClippingState::Clean
    } else {
        ClippingState::Unknown
    };

    let mut warning = None;
    let true_peak = raw_true_peak.map(|reported| {
        let mut floor = sample_peak.unwrap_or(f64::NEG_INFINITY);
        let mut reason = "true peak cannot sit below the sample peak";
        if state == ClippingState::Clipped && floor < 0.0 {
            floor = 0.0;
            reason = "sample peak is clipped, true peak cannot read below 0 dBTP";
        }

        if reported < floor {
            log::warn!(
                "[SafetyGate] true peak {:.2} dBTP raised to {:.2} dBTP: {}",
                reported,
                floor,
                reason
            );
            warning = Some(ScoreWarning::PeakCorrected {
                reported_dbtp: reported,
                corrected_dbtp: floor,
                reason: reason.to_string(),
            });
            floor
        } else {
            reported
        }
    });

    let assessment = PeakAssessment {
        sample_peak_dbfs: sample_peak,
        true_peak_raw_dbtp: raw_true_peak,
        true_peak_dbtp: true_peak,
        state,
    };
    (assessment, warning)
}

/// One cap that changed a sub-score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateAction {
    pub category: Category,
    pub cap: f64,
    pub original: f64,
    pub capped: f64,
}

/// Apply the clipped-state caps; returns every cap that fired
pub fn apply_safety_gates(
    sub_scores: &mut BTreeMap<Category, f64>,
    peaks: &PeakAssessment,
) -> Vec<GateAction> {
    if !peaks.is_clipped() {
        return Vec::new();
    }

    let mut actions = Vec::new();
    for (category, cap) in CLIPPED_CAPS {
        let Some(score) = sub_scores.get_mut(&category) else {
            log::debug!("[SafetyGate] {} not scored, cap {} not applicable", category, cap);
            continue;
        };
        if *score > cap {
            log::warn!(
                "[SafetyGate] clipped: {} capped {:.1} -> {:.1}",
                category,
                *score,
                cap
            );
            actions.push(GateAction {
                category,
                cap,
                original: *score,
                capped: cap,
            });
            *score = cap;
        }
    }
    actions
}
