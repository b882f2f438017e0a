//! Tolerance classification
//!
//! The IDEAL / ADJUST / FIX decision is made here and nowhere else. Scorers,
//! the suggestion generator and report renderers all consume
//! [`ToleranceClassification`] instead of comparing values themselves.

use crate::metrics::MetricKey;
use serde::{Deserialize, Serialize};

/// Slack applied to ratio comparisons so `target + tolerance` stays IDEAL
pub const RATIO_EPSILON: f64 = 1e-9;

/// Three-tier status, plus N/A for metrics that cannot be classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Within tolerance
    Ideal,
    /// Between one and two tolerances
    Adjust,
    /// More than two tolerances away
    Fix,
    /// Value missing or tolerance unusable
    #[serde(rename = "NA")]
    NotAvailable,
}

impl Status {
    /// Status for a tolerance ratio
    pub fn from_ratio(ratio: f64) -> Self {
        if !ratio.is_finite() || ratio < 0.0 {
            Status::NotAvailable
        } else if ratio <= 1.0 + RATIO_EPSILON {
            Status::Ideal
        } else if ratio <= 2.0 + RATIO_EPSILON {
            Status::Adjust
        } else {
            Status::Fix
        }
    }

    /// Whether this status asks for a corrective action
    pub fn needs_action(&self) -> bool {
        matches!(self, Status::Adjust | Status::Fix)
    }

    pub fn is_available(&self) -> bool {
        *self != Status::NotAvailable
    }
}

/// Allowed deviation around a target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tolerance {
    /// Same allowance on both sides
    Symmetric(f64),
    /// Separate allowance below and above the target
    Asymmetric { below: f64, above: f64 },
}

impl Tolerance {
    /// Both sides finite and strictly positive
    pub fn is_valid(&self) -> bool {
        let ok = |t: f64| t.is_finite() && t > 0.0;
        match *self {
            Tolerance::Symmetric(t) => ok(t),
            Tolerance::Asymmetric { below, above } => ok(below) && ok(above),
        }
    }

    /// Allowance on the side of the deviation
    pub fn for_deviation(&self, deviation: f64) -> f64 {
        match *self {
            Tolerance::Symmetric(t) => t,
            Tolerance::Asymmetric { below, above } => {
                if deviation < 0.0 {
                    below
                } else {
                    above
                }
            }
        }
    }
}

/// Classification of one metric against its reference entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceClassification {
    pub metric: MetricKey,
    pub value: Option<f64>,
    pub target: f64,
    /// Allowance actually applied (side of the deviation for asymmetric)
    pub tolerance: Option<f64>,
    /// `value - target`
    pub deviation: Option<f64>,
    pub abs_deviation: Option<f64>,
    /// `abs_deviation / tolerance`
    pub ratio: Option<f64>,
    pub status: Status,
}

impl ToleranceClassification {
    fn not_available(metric: MetricKey, value: Option<f64>, target: f64) -> Self {
        Self {
            metric,
            value,
            target,
            tolerance: None,
            deviation: None,
            abs_deviation: None,
            ratio: None,
            status: Status::NotAvailable,
        }
    }

    /// Classification for a metric that has no measurement
    pub fn missing(metric: MetricKey, target: f64) -> Self {
        Self::not_available(metric, None, target)
    }
}

/// Classify `value` against `target` with `tolerance`
pub fn classify(
    metric: MetricKey,
    value: Option<f64>,
    target: f64,
    tolerance: Tolerance,
) -> ToleranceClassification {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return ToleranceClassification::not_available(metric, None, target);
    };
    if !target.is_finite() || !tolerance.is_valid() {
        return ToleranceClassification::not_available(metric, Some(value), target);
    }

    let deviation = value - target;
    let allowance = tolerance.for_deviation(deviation);
    let abs_deviation = deviation.abs();
    let ratio = abs_deviation / allowance;

    ToleranceClassification {
        metric,
        value: Some(value),
        target,
        tolerance: Some(allowance),
        deviation: Some(deviation),
        abs_deviation: Some(abs_deviation),
        ratio: Some(ratio),
        status: Status::from_ratio(ratio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lufs(value: f64, target: f64, tol: f64) -> ToleranceClassification {
        classify(MetricKey::Lufs, Some(value), target, Tolerance::Symmetric(tol))
    }

    #[test]
    fn test_boundaries() {
        for (target, tol) in [(-14.0, 1.0), (0.1, 0.2), (-9.3, 0.7), (0.85, 0.15)] {
            assert_eq!(lufs(target + tol, target, tol).status, Status::Ideal);
            assert_eq!(lufs(target - tol, target, tol).status, Status::Ideal);
            assert_eq!(lufs(target + 1.0001 * tol, target, tol).status, Status::Adjust);
            assert_eq!(lufs(target + 2.0 * tol, target, tol).status, Status::Adjust);
            assert_eq!(lufs(target + 2.0001 * tol, target, tol).status, Status::Fix);
        }
    }

    #[test]
    fn test_deviation_fields() {
        let c = lufs(-15.5, -14.0, 1.0);
        assert_eq!(c.deviation, Some(-1.5));
        assert_eq!(c.abs_deviation, Some(1.5));
        assert_eq!(c.ratio, Some(1.5));
        assert_eq!(c.tolerance, Some(1.0));
        assert_eq!(c.status, Status::Adjust);
    }

    #[test]
    fn test_missing_value_is_not_available() {
        let c = classify(MetricKey::Lra, None, 8.0, Tolerance::Symmetric(2.0));
        assert_eq!(c.status, Status::NotAvailable);
        let c = classify(MetricKey::Lra, Some(f64::NAN), 8.0, Tolerance::Symmetric(2.0));
        assert_eq!(c.status, Status::NotAvailable);
        assert_eq!(c.value, None);
    }

    #[test]
    fn test_non_positive_tolerance_is_not_available() {
        for tol in [0.0, -1.0, f64::INFINITY] {
            let c = lufs(-14.0, -14.0, tol);
            assert_eq!(c.status, Status::NotAvailable);
            assert_eq!(c.ratio, None);
        }
        let c = classify(
            MetricKey::Lufs,
            Some(-14.0),
            -14.0,
            Tolerance::Asymmetric { below: 1.0, above: 0.0 },
        );
        assert_eq!(c.status, Status::NotAvailable);
    }

    #[test]
    fn test_asymmetric_tolerance_picks_side() {
        let tol = Tolerance::Asymmetric { below: 1.0, above: 3.0 };
        let low = classify(MetricKey::Lufs, Some(-1.5), 0.0, tol);
        let high = classify(MetricKey::Lufs, Some(2.5), 0.0, tol);
        assert_eq!(low.tolerance, Some(1.0));
        assert_eq!(low.status, Status::Adjust);
        assert_eq!(high.tolerance, Some(3.0));
        assert_eq!(high.status, Status::Ideal);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&Status::Ideal).unwrap(), "\"IDEAL\"");
        assert_eq!(serde_json::to_string(&Status::NotAvailable).unwrap(), "\"NA\"");
    }
}
