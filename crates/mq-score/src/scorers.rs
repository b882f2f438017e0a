//! Metric scorers
//!
//! Each scorer turns one measured value and its reference entry into a
//! classification plus a 0-100 sub-score on the configured [`ScoreCurve`].

use crate::bands::{BandStatus, NormalizedBands};
use crate::classify::{Status, Tolerance, ToleranceClassification, classify};
use crate::config::{DynamicRangePolicy, ScoreCurve, TechnicalLimits};
use crate::error::ScoreWarning;
use crate::metrics::{MetricKey, MetricsVector, finite};
use crate::reference::{MetricTarget, ReferenceDocument};
use serde::{Deserialize, Serialize};

/// Classification plus sub-score for one metric
#[derive(Debug, Clone, PartialEq)]
pub struct MetricScore {
    /// `None` when the metric could not be classified
    pub sub_score: Option<f64>,
    pub classification: ToleranceClassification,
}

impl MetricScore {
    fn from_classification(classification: ToleranceClassification, curve: &ScoreCurve) -> Self {
        let sub_score = match classification.status {
            Status::NotAvailable => None,
            _ => classification.ratio.map(|r| curve.score(r)),
        };
        Self {
            sub_score,
            classification,
        }
    }
}

/// Score a measured value against a target
pub fn score_metric(
    metric: MetricKey,
    value: Option<f64>,
    target: &MetricTarget,
    curve: &ScoreCurve,
) -> MetricScore {
    let classification = classify(metric, value, target.target, target.tolerance);
    MetricScore::from_classification(classification, curve)
}

/// Dynamic-range estimator actually used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicRangeSource {
    TtDr,
    DrStat,
    CrestFactor,
}

/// Pick the dynamic-range reading according to the policy
pub fn select_dynamic_range(
    metrics: &MetricsVector,
    policy: DynamicRangePolicy,
) -> Option<(f64, DynamicRangeSource)> {
    let tt_dr = finite(metrics.tt_dr).map(|v| (v, DynamicRangeSource::TtDr));
    let dr_stat = finite(metrics.dynamic_range).map(|v| (v, DynamicRangeSource::DrStat));
    let crest = finite(metrics.crest_factor).map(|v| (v, DynamicRangeSource::CrestFactor));

    let selected = match policy {
        DynamicRangePolicy::Auto => tt_dr.or(dr_stat).or(crest),
        DynamicRangePolicy::TtDr => tt_dr,
        DynamicRangePolicy::DrStat => dr_stat,
        DynamicRangePolicy::CrestFactor => crest,
    };

    if let Some((value, source)) = selected {
        log::debug!("dynamic range {:.2} dB from {:?} ({:?} policy)", value, source, policy);
    }
    selected
}

/// Scores for every reference band, plus warnings for bands that were skipped
pub fn score_bands(
    bands: &NormalizedBands,
    reference: &ReferenceDocument,
    curve: &ScoreCurve,
) -> (Vec<MetricScore>, Vec<ScoreWarning>) {
    let mut scores = Vec::with_capacity(reference.bands.len());
    let mut warnings = Vec::new();

    for (band, target) in &reference.bands {
        let metric = MetricKey::Band(*band);
        let reading = bands.get(*band);

        let value = match reading.status {
            BandStatus::Measured => {
                let value = reading.value_on(target.scale);
                if value.is_none() {
                    warnings.push(ScoreWarning::BandMapping {
                        band: band.as_str().to_string(),
                        reason: format!(
                            "measured as {:?} but reference is {:?}",
                            reading.scales(),
                            target.scale
                        ),
                    });
                }
                value
            }
            // normalizer already warned about the coarse estimate
            BandStatus::Estimated => None,
            BandStatus::Missing => {
                warnings.push(ScoreWarning::MissingMetric { metric });
                None
            }
        };

        let classification = classify(metric, value, target.target_db, target.tolerance);
        scores.push(MetricScore::from_classification(classification, curve));
    }

    (scores, warnings)
}

/// Technical metrics against fixed zero targets
pub fn score_technical(
    metrics: &MetricsVector,
    limits: &TechnicalLimits,
    curve: &ScoreCurve,
) -> Vec<MetricScore> {
    let checks = [
        (
            MetricKey::ClippingPct,
            finite(metrics.clipping_pct).map(|v| v.max(0.0)),
            limits.clipping_pct_tolerance,
        ),
        (
            MetricKey::DcOffset,
            finite(metrics.dc_offset).map(f64::abs),
            limits.dc_offset_tolerance,
        ),
    ];

    checks
        .into_iter()
        .filter(|(_, value, _)| value.is_some())
        .map(|(metric, value, tolerance)| {
            let classification = classify(metric, value, 0.0, Tolerance::Symmetric(tolerance));
            MetricScore::from_classification(classification, curve)
        })
        .collect()
}

/// Mean of the available sub-scores
pub fn mean_score(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::{Band, BandScale, normalize_bands};
    use crate::classify::Status;
    use crate::metrics::EnergyShare;
    use crate::metrics::SpectralBalance;

    #[test]
    fn test_score_metric_curve() {
        let curve = ScoreCurve::default();
        let target = MetricTarget::new(-14.0, 1.0);

        let ideal = score_metric(MetricKey::Lufs, Some(-14.0), &target, &curve);
        assert_eq!(ideal.sub_score, Some(100.0));
        assert_eq!(ideal.classification.status, Status::Ideal);

        let adjust = score_metric(MetricKey::Lufs, Some(-15.5), &target, &curve);
        assert_eq!(adjust.sub_score, Some(25.0));

        let fix = score_metric(MetricKey::Lufs, Some(-17.0), &target, &curve);
        assert_eq!(fix.sub_score, Some(0.0));
        assert_eq!(fix.classification.status, Status::Fix);

        let missing = score_metric(MetricKey::Lufs, None, &target, &curve);
        assert_eq!(missing.sub_score, None);
    }

    #[test]
    fn test_score_never_increases_with_deviation() {
        let curve = ScoreCurve::default();
        let target = MetricTarget::new(8.0, 2.0);
        let mut previous = f64::INFINITY;
        for step in 0..100 {
            let value = 8.0 + step as f64 * 0.1;
            let score = score_metric(MetricKey::DynamicRange, Some(value), &target, &curve)
                .sub_score
                .unwrap();
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn test_dynamic_range_auto_priority() {
        let mut metrics = MetricsVector {
            tt_dr: Some(7.0),
            dynamic_range: Some(9.0),
            crest_factor: Some(12.0),
            ..Default::default()
        };
        assert_eq!(
            select_dynamic_range(&metrics, DynamicRangePolicy::Auto),
            Some((7.0, DynamicRangeSource::TtDr))
        );

        metrics.tt_dr = Some(f64::NAN);
        assert_eq!(
            select_dynamic_range(&metrics, DynamicRangePolicy::Auto),
            Some((9.0, DynamicRangeSource::DrStat))
        );

        metrics.dynamic_range = None;
        assert_eq!(
            select_dynamic_range(&metrics, DynamicRangePolicy::Auto),
            Some((12.0, DynamicRangeSource::CrestFactor))
        );
    }

    #[test]
    fn test_dynamic_range_pinned_policy_never_falls_back() {
        let metrics = MetricsVector {
            crest_factor: Some(12.0),
            ..Default::default()
        };
        assert_eq!(select_dynamic_range(&metrics, DynamicRangePolicy::TtDr), None);
        assert_eq!(select_dynamic_range(&metrics, DynamicRangePolicy::DrStat), None);
        assert_eq!(
            select_dynamic_range(&metrics, DynamicRangePolicy::CrestFactor),
            Some((12.0, DynamicRangeSource::CrestFactor))
        );
    }

    #[test]
    fn test_score_bands() {
        let reference = ReferenceDocument::new("pop")
            .with_band(Band::Sub, -20.0, 2.0)
            .with_band(Band::Mid, -15.0, 2.0)
            .with_band(Band::HighMid, -24.0, 2.0);
        let metrics = MetricsVector::default()
            .with_band("sub", -20.0)
            .with_band("mid", -21.0);
        let bands = normalize_bands(&metrics);

        let (scores, warnings) = score_bands(&bands, &reference, &ScoreCurve::default());
        assert_eq!(scores.len(), 3);
        assert_eq!(scores[0].sub_score, Some(100.0));
        assert_eq!(scores[1].classification.status, Status::Fix);
        assert_eq!(scores[2].sub_score, None);
        assert_eq!(
            warnings,
            vec![ScoreWarning::MissingMetric {
                metric: MetricKey::Band(Band::HighMid)
            }]
        );
    }

    #[test]
    fn test_band_scale_mismatch_is_excluded() {
        let reference = ReferenceDocument::new("pop").with_band(Band::Mid, -15.0, 2.0);
        let mut balance = SpectralBalance::default();
        balance.bands.insert("mid".into(), EnergyShare::Percent(3.0));
        let metrics = MetricsVector {
            spectral_balance: Some(balance),
            ..Default::default()
        };

        let (scores, warnings) =
            score_bands(&normalize_bands(&metrics), &reference, &ScoreCurve::default());
        assert_eq!(scores[0].classification.status, Status::NotAvailable);
        assert!(matches!(warnings[0], ScoreWarning::BandMapping { .. }));
    }

    #[test]
    fn test_band_reading_matching_reference_scale_is_used() {
        let mut reference = ReferenceDocument::new("pop")
            .with_band(Band::Sub, -10.0, 2.0)
            .with_band(Band::Mid, -5.23, 1.0);
        for target in reference.bands.values_mut() {
            target.scale = BandScale::EnergyShare;
        }
        let mut balance = SpectralBalance::default();
        balance.bands.insert("sub".into(), EnergyShare::Percent(10.0));
        balance.bands.insert("mid".into(), EnergyShare::Percent(30.0));
        let mut metrics = MetricsVector::default()
            .with_band("sub", -22.0)
            .with_band("mid", -16.0);
        metrics.spectral_balance = Some(balance);

        let (scores, warnings) =
            score_bands(&normalize_bands(&metrics), &reference, &ScoreCurve::default());
        assert!(warnings.is_empty());
        assert_eq!(scores.len(), 2);
        for score in &scores {
            assert_eq!(score.classification.status, Status::Ideal);
            assert_eq!(score.sub_score, Some(100.0));
        }
    }

    #[test]
    fn test_score_technical() {
        let metrics = MetricsVector {
            clipping_pct: Some(0.25),
            dc_offset: Some(-0.001),
            ..Default::default()
        };
        let scores = score_technical(&metrics, &TechnicalLimits::default(), &ScoreCurve::default());
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].classification.status, Status::Fix);
        assert_eq!(scores[1].classification.status, Status::Ideal);
        assert_eq!(scores[1].classification.value, Some(0.001));

        let none = score_technical(&MetricsVector::default(), &TechnicalLimits::default(), &ScoreCurve::default());
        assert!(none.is_empty());
    }

    #[test]
    fn test_mean_score() {
        assert_eq!(mean_score(&[]), None);
        assert_eq!(mean_score(&[100.0, 50.0]), Some(75.0));
    }
}
