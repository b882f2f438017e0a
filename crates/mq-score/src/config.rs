//! Scoring configuration
//!
//! Every behavior switch lives here and is passed explicitly into the
//! scorer. Nothing in the engine reads ambient state.

use crate::classify::RATIO_EPSILON;
use serde::{Deserialize, Serialize};

/// How category sub-scores are weighted into the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingStrategy {
    /// Historical unequal weights (loudness and dynamics dominate)
    Legacy,
    /// Every scored category counts the same
    #[serde(alias = "equalWeight", alias = "equal")]
    EqualWeight,
}

impl Default for WeightingStrategy {
    fn default() -> Self {
        Self::EqualWeight
    }
}

/// Which dynamic-range estimator to score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicRangePolicy {
    /// First finite of tt_dr, dr_stat, crest factor
    Auto,
    /// Percentile-based DR only
    #[serde(alias = "ttdr", alias = "ttDr")]
    TtDr,
    /// Statistical DR only
    #[serde(alias = "drStat")]
    DrStat,
    /// Peak minus RMS only
    #[serde(alias = "crestFactor")]
    CrestFactor,
}

impl Default for DynamicRangePolicy {
    fn default() -> Self {
        Self::Auto
    }
}

/// Deviation-to-score curve.
///
/// Two linear segments: 100 down to `edge_score` while the deviation is
/// within tolerance, `edge_score` down to 0 between one and two tolerances,
/// 0 beyond.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCurve {
    /// Score at exactly one tolerance of deviation (0-100)
    pub edge_score: f64,
}

impl Default for ScoreCurve {
    fn default() -> Self {
        Self { edge_score: 50.0 }
    }
}

impl ScoreCurve {
    pub fn new(edge_score: f64) -> Self {
        Self { edge_score }
    }

    /// Sub-score for a tolerance ratio (`|deviation| / tolerance`)
    pub fn score(&self, ratio: f64) -> f64 {
        if !ratio.is_finite() || ratio < 0.0 {
            return 0.0;
        }
        let edge = self.edge_score.clamp(0.0, 100.0);

        if ratio <= 1.0 + RATIO_EPSILON {
            100.0 - (100.0 - edge) * ratio.min(1.0)
        } else if ratio <= 2.0 + RATIO_EPSILON {
            edge * (2.0 - ratio).max(0.0)
        } else {
            0.0
        }
    }
}

/// Fixed engineering limits for the technical category (target is zero)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalLimits {
    /// Clipped-sample percentage treated as one tolerance
    pub clipping_pct_tolerance: f64,
    /// Absolute DC offset treated as one tolerance
    pub dc_offset_tolerance: f64,
}

impl Default for TechnicalLimits {
    fn default() -> Self {
        Self {
            clipping_pct_tolerance: 0.1,
            dc_offset_tolerance: 0.01,
        }
    }
}

/// Scoring engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Category weighting
    pub weighting: WeightingStrategy,

    /// Dynamic-range estimator selection
    pub dynamic_range: DynamicRangePolicy,

    /// Cap related sub-scores when the track clips
    pub enable_safety_gates: bool,

    /// Deviation-to-score curve
    pub curve: ScoreCurve,

    /// Tolerance given to reference bands that declare none (dB)
    pub default_band_tolerance_db: f64,

    /// Technical category limits
    pub technical: TechnicalLimits,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weighting: WeightingStrategy::EqualWeight,
            dynamic_range: DynamicRangePolicy::Auto,
            enable_safety_gates: true,
            curve: ScoreCurve::default(),
            default_band_tolerance_db: 2.0,
            technical: TechnicalLimits::default(),
        }
    }
}

impl ScoringConfig {
    /// Historical behavior: unequal weights, crest-factor dynamics
    pub fn legacy() -> Self {
        Self {
            weighting: WeightingStrategy::Legacy,
            dynamic_range: DynamicRangePolicy::CrestFactor,
            ..Default::default()
        }
    }

    /// Harsher curve and tighter default band tolerance
    pub fn strict() -> Self {
        Self {
            curve: ScoreCurve::new(25.0),
            default_band_tolerance_db: 1.0,
            technical: TechnicalLimits {
                clipping_pct_tolerance: 0.01,
                dc_offset_tolerance: 0.001,
            },
            ..Default::default()
        }
    }

    /// Load from JSON text; missing fields take defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Builder pattern: set weighting strategy
    pub fn with_weighting(mut self, weighting: WeightingStrategy) -> Self {
        self.weighting = weighting;
        self
    }

    /// Builder pattern: set dynamic-range policy
    pub fn with_dynamic_range(mut self, policy: DynamicRangePolicy) -> Self {
        self.dynamic_range = policy;
        self
    }

    /// Builder pattern: enable or disable safety gates
    pub fn with_safety_gates(mut self, enabled: bool) -> Self {
        self.enable_safety_gates = enabled;
        self
    }

    /// Builder pattern: set curve edge score
    pub fn with_edge_score(mut self, edge_score: f64) -> Self {
        self.curve = ScoreCurve::new(edge_score);
        self
    }

    /// Builder pattern: set default band tolerance
    pub fn with_default_band_tolerance(mut self, db: f64) -> Self {
        self.default_band_tolerance_db = db;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScoringConfig::default();
        assert_eq!(config.weighting, WeightingStrategy::EqualWeight);
        assert_eq!(config.dynamic_range, DynamicRangePolicy::Auto);
        assert!(config.enable_safety_gates);
        assert_eq!(config.default_band_tolerance_db, 2.0);
    }

    #[test]
    fn test_builder_pattern() {
        let config = ScoringConfig::default()
            .with_weighting(WeightingStrategy::Legacy)
            .with_dynamic_range(DynamicRangePolicy::TtDr)
            .with_safety_gates(false)
            .with_edge_score(60.0);

        assert_eq!(config.weighting, WeightingStrategy::Legacy);
        assert_eq!(config.dynamic_range, DynamicRangePolicy::TtDr);
        assert!(!config.enable_safety_gates);
        assert_eq!(config.curve.edge_score, 60.0);
    }

    #[test]
    fn test_from_json_with_aliases() {
        let config = ScoringConfig::from_json(
            r#"{ "weighting": "equalWeight", "dynamic_range": "crestFactor" }"#,
        )
        .unwrap();
        assert_eq!(config.weighting, WeightingStrategy::EqualWeight);
        assert_eq!(config.dynamic_range, DynamicRangePolicy::CrestFactor);
        assert!(config.enable_safety_gates);
    }

    #[test]
    fn test_curve_breakpoints() {
        let curve = ScoreCurve::default();
        assert_eq!(curve.score(0.0), 100.0);
        assert_eq!(curve.score(0.5), 75.0);
        assert_eq!(curve.score(1.0), 50.0);
        assert_eq!(curve.score(1.5), 25.0);
        assert_eq!(curve.score(2.0), 0.0);
        assert_eq!(curve.score(3.0), 0.0);
        assert_eq!(curve.score(f64::NAN), 0.0);
    }

    #[test]
    fn test_curve_is_monotonic() {
        for edge in [0.0, 25.0, 50.0, 95.0] {
            let curve = ScoreCurve::new(edge);
            let mut previous = f64::INFINITY;
            for step in 0..=300 {
                let score = curve.score(step as f64 * 0.01);
                assert!(score <= previous, "edge {} step {}", edge, step);
                previous = score;
            }
        }
    }
}
