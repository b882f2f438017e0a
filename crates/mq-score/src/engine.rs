//! Scoring orchestrator
//!
//! Resolve reference, normalize bands, score every metric both sides know
//! about, reconcile peaks, apply safety gates, aggregate, suggest. The whole
//! pipeline is a function of the metrics, the reference and the
//! [`ScoringConfig`] handed in.

use crate::aggregate::{QualityLabel, aggregate, round1};
use crate::bands::{Band, BandStatus, normalize_bands};
use crate::classify::{ToleranceClassification, classify};
use crate::config::{DynamicRangePolicy, ScoringConfig, WeightingStrategy};
use crate::error::{ScoreResult, ScoreWarning};
use crate::metrics::{Category, MetricKey, MetricsVector, finite};
use crate::reference::{ReferenceDocument, ReferenceResolver};
use crate::safety::{GateAction, PeakAssessment, apply_safety_gates, assess_peaks};
use crate::scorers::{
    DynamicRangeSource, MetricScore, mean_score, score_bands, score_metric, score_technical,
    select_dynamic_range,
};
use crate::suggest::{Suggestion, generate_suggestions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Reference given either resolved or as a raw payload
#[derive(Debug, Clone, Copy)]
pub enum ReferenceInput<'a> {
    /// Already-resolved document
    Document(&'a ReferenceDocument),
    /// Raw reference JSON of any supported shape
    Raw { genre: &'a str, payload: &'a Value },
}

impl<'a> From<&'a ReferenceDocument> for ReferenceInput<'a> {
    fn from(doc: &'a ReferenceDocument) -> Self {
        ReferenceInput::Document(doc)
    }
}

/// How a result was computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringMethod {
    pub weighting: WeightingStrategy,
    pub dynamic_range_policy: DynamicRangePolicy,
    /// Estimator actually scored, `None` when no dynamic range was scored
    pub dynamic_range_source: Option<DynamicRangeSource>,
    pub safety_gates: bool,
    pub curve_edge_score: f64,
}

/// Full scoring output for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub genre: String,
    pub reference_version: Option<String>,

    /// Weighted overall score (0-100, one decimal)
    pub overall_score_pct: Option<f64>,
    pub classification: QualityLabel,

    /// Per-category scores after safety gates (one decimal)
    pub sub_scores: BTreeMap<Category, f64>,
    /// Effective category weights
    pub weights: BTreeMap<Category, f64>,

    pub per_metric: BTreeMap<MetricKey, ToleranceClassification>,
    pub suggestions: Vec<Suggestion>,

    pub method: ScoringMethod,
    pub peaks: PeakAssessment,
    pub gate_actions: Vec<GateAction>,
    pub band_status: BTreeMap<Band, BandStatus>,
    pub warnings: Vec<ScoreWarning>,
}

impl ScoringResult {
    /// Serialize to pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Classifications that need action, in metric order
    pub fn actionable(&self) -> impl Iterator<Item = &ToleranceClassification> {
        self.per_metric.values().filter(|c| c.status.needs_action())
    }
}

/// Scorer bound to one configuration
#[derive(Debug, Clone, Default)]
pub struct MixScorer {
    config: ScoringConfig,
}

impl MixScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score against an already-resolved reference
    pub fn score(&self, metrics: &MetricsVector, reference: &ReferenceDocument) -> ScoringResult {
        score_document(metrics, reference, &self.config)
    }

    /// Resolve a raw reference payload, then score
    pub fn score_raw(
        &self,
        metrics: &MetricsVector,
        genre: &str,
        payload: &Value,
    ) -> ScoreResult<ScoringResult> {
        self.score_input(metrics, ReferenceInput::Raw { genre, payload })
    }

    pub fn score_input(
        &self,
        metrics: &MetricsVector,
        reference: ReferenceInput<'_>,
    ) -> ScoreResult<ScoringResult> {
        compute_mix_score(metrics, reference, &self.config)
    }
}

/// Score a track against a genre reference
pub fn compute_mix_score(
    metrics: &MetricsVector,
    reference: ReferenceInput<'_>,
    config: &ScoringConfig,
) -> ScoreResult<ScoringResult> {
    let doc = match reference {
        ReferenceInput::Document(doc) => Cow::Borrowed(doc),
        ReferenceInput::Raw { genre, payload } => {
            Cow::Owned(ReferenceResolver::from_config(config).resolve(genre, payload)?)
        }
    };
    Ok(score_document(metrics, &doc, config))
}

fn score_document(
    metrics: &MetricsVector,
    doc: &ReferenceDocument,
    config: &ScoringConfig,
) -> ScoringResult {
    let curve = &config.curve;
    let mut warnings = doc.warnings.clone();
    let mut scored: Vec<MetricScore> = Vec::new();

    let bands = normalize_bands(metrics);
    warnings.extend(bands.warnings.iter().cloned());

    let (peaks, peak_warning) = assess_peaks(metrics);
    warnings.extend(peak_warning);

    let dynamic_range = select_dynamic_range(metrics, config.dynamic_range);
    let scalars = [
        (MetricKey::Lufs, finite(metrics.lufs_integrated)),
        (MetricKey::TruePeak, peaks.true_peak_dbtp),
        (MetricKey::DynamicRange, dynamic_range.map(|(v, _)| v)),
        (MetricKey::Lra, finite(metrics.lra)),
        (MetricKey::StereoCorrelation, finite(metrics.stereo_correlation)),
    ];

    for (metric, value) in scalars {
        let Some(target) = doc.scalar_target(metric) else {
            if value.is_some() {
                log::debug!("[Score] {} measured but {} has no target", metric, doc.genre);
            }
            continue;
        };
        if value.is_none() {
            log::warn!("[Score] {}: {} missing from metrics", doc.genre, metric);
            warnings.push(ScoreWarning::MissingMetric { metric });
        }
        scored.push(score_metric(metric, value, target, curve));
    }

    let (band_scores, band_warnings) = score_bands(&bands, doc, curve);
    scored.extend(band_scores);
    warnings.extend(band_warnings);

    scored.extend(score_technical(metrics, &config.technical, curve));

    let mut by_category: BTreeMap<Category, Vec<f64>> = BTreeMap::new();
    for entry in &scored {
        if let Some(score) = entry.sub_score {
            by_category
                .entry(entry.classification.metric.category())
                .or_default()
                .push(score);
        }
    }
    let mut sub_scores: BTreeMap<Category, f64> = by_category
        .into_iter()
        .filter_map(|(category, scores)| mean_score(&scores).map(|s| (category, s)))
        .collect();

    let gate_actions = if config.enable_safety_gates {
        apply_safety_gates(&mut sub_scores, &peaks)
    } else {
        Vec::new()
    };

    let totals = aggregate(&sub_scores, config.weighting);

    let classifications: Vec<ToleranceClassification> =
        scored.into_iter().map(|s| s.classification).collect();
    let suggestions = generate_suggestions(&classifications);

    let dynamic_range_source = classifications
        .iter()
        .any(|c| c.metric == MetricKey::DynamicRange && c.status.is_available())
        .then_some(dynamic_range.map(|(_, source)| source))
        .flatten();

    log::debug!(
        "[Score] {}: overall {:?} from {} categories, {} suggestions, {} warnings",
        doc.genre,
        totals.overall_pct,
        sub_scores.len(),
        suggestions.len(),
        warnings.len()
    );

    ScoringResult {
        genre: doc.genre.clone(),
        reference_version: doc.version.clone(),
        overall_score_pct: totals.overall_pct,
        classification: QualityLabel::from_score(totals.overall_pct),
        sub_scores: sub_scores
            .into_iter()
            .map(|(category, score)| (category, round1(score)))
            .collect(),
        weights: totals.weights,
        per_metric: classifications
            .into_iter()
            .map(|c| (c.metric, c))
            .collect(),
        suggestions,
        method: ScoringMethod {
            weighting: config.weighting,
            dynamic_range_policy: config.dynamic_range,
            dynamic_range_source,
            safety_gates: config.enable_safety_gates,
            curve_edge_score: curve.edge_score,
        },
        peaks,
        gate_actions,
        band_status: bands.statuses(),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Status;
    use serde_json::json;

    fn pop_reference() -> ReferenceDocument {
        ReferenceDocument::new("pop")
            .with_lufs(-14.0, 1.0)
            .with_true_peak(-1.0, 0.5)
            .with_dynamic_range(8.0, 2.0)
            .with_stereo(0.8, 0.1)
            .with_band(Band::Mid, -15.0, 2.0)
    }

    fn on_target() -> MetricsVector {
        MetricsVector {
            tt_dr: Some(8.0),
            ..Default::default()
        }
        .with_lufs(-14.0)
        .with_true_peak(-1.0)
        .with_sample_peaks(-1.2, -1.4)
        .with_stereo_correlation(0.8)
        .with_band("mid", -15.0)
    }

    #[test]
    fn test_on_target_scores_full_marks() {
        let result = MixScorer::default().score(&on_target(), &pop_reference());
        assert_eq!(result.overall_score_pct, Some(100.0));
        assert_eq!(result.classification, QualityLabel::Reference);
        assert!(result.suggestions.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(result.method.dynamic_range_source, Some(DynamicRangeSource::TtDr));
        assert_eq!(result.sub_scores.len(), 5);
    }

    #[test]
    fn test_missing_stereo_is_reweighted() {
        let mut metrics = on_target();
        metrics.stereo_correlation = None;
        metrics.lufs_integrated = Some(-15.5);

        let result = MixScorer::default().score(&metrics, &pop_reference());
        assert!(result.warnings.contains(&ScoreWarning::MissingMetric {
            metric: MetricKey::StereoCorrelation
        }));
        assert_eq!(
            result.per_metric[&MetricKey::StereoCorrelation].status,
            Status::NotAvailable
        );
        assert!(!result.sub_scores.contains_key(&Category::Stereo));
        let sum: f64 = result.weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        // (25 + 100 + 100 + 100) / 4
        assert_eq!(result.overall_score_pct, Some(81.3));
    }

    #[test]
    fn test_pinned_policy_reports_missing_dynamic_range() {
        let config = ScoringConfig::default().with_dynamic_range(DynamicRangePolicy::CrestFactor);
        let result = MixScorer::new(config).score(&on_target(), &pop_reference());
        assert!(result.warnings.contains(&ScoreWarning::MissingMetric {
            metric: MetricKey::DynamicRange
        }));
        assert_eq!(result.method.dynamic_range_source, None);
        assert!(!result.sub_scores.contains_key(&Category::Dynamics));
    }

    #[test]
    fn test_clipped_track_is_capped() {
        let metrics = on_target().with_sample_peaks(2.1, 0.3).with_true_peak(3.2);
        let result = MixScorer::default().score(&metrics, &pop_reference());
        assert!(result.peaks.is_clipped());
        assert_eq!(result.sub_scores[&Category::Loudness], 70.0);
        assert_eq!(result.sub_scores[&Category::Dynamics], 50.0);
        assert_eq!(result.sub_scores[&Category::TruePeak], 0.0);
        assert_eq!(result.gate_actions.len(), 2);

        let ungated = MixScorer::new(ScoringConfig::default().with_safety_gates(false))
            .score(&metrics, &pop_reference());
        assert!(ungated.gate_actions.is_empty());
        assert_eq!(ungated.sub_scores[&Category::Loudness], 100.0);
    }

    #[test]
    fn test_score_raw_resolves_payload() {
        let payload = json!({ "pop": { "lufs_target": -14.0, "tol_lufs": 1.0, "version": "v1" } });
        let result = MixScorer::default()
            .score_raw(&on_target(), "pop", &payload)
            .unwrap();
        assert_eq!(result.reference_version.as_deref(), Some("v1"));
        assert_eq!(result.sub_scores.keys().copied().collect::<Vec<_>>(), vec![Category::Loudness]);

        let err = MixScorer::default().score_raw(&on_target(), "pop", &json!({}));
        assert!(err.is_err());
    }

    #[test]
    fn test_nothing_scored_is_unrated() {
        let result = MixScorer::default().score(&MetricsVector::default(), &pop_reference());
        assert_eq!(result.overall_score_pct, None);
        assert_eq!(result.classification, QualityLabel::Unrated);
        assert!(result.suggestions.is_empty());
    }
}
