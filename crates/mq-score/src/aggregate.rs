//! Weighted aggregation of category sub-scores

use crate::config::WeightingStrategy;
use crate::metrics::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

impl WeightingStrategy {
    /// Weight before renormalization over the scored categories
    pub fn base_weight(&self, category: Category) -> f64 {
        match self {
            WeightingStrategy::EqualWeight => 1.0,
            WeightingStrategy::Legacy => match category {
                Category::Loudness => 0.25,
                Category::Dynamics => 0.25,
                Category::TruePeak => 0.20,
                Category::Stereo => 0.15,
                Category::Frequency => 0.15,
                Category::Technical => 0.10,
            },
        }
    }
}

/// Overall score and the weights that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Weighted score rounded to one decimal, `None` when nothing was scored
    pub overall_pct: Option<f64>,
    /// Effective weights, summing to 1 over the scored categories
    pub weights: BTreeMap<Category, f64>,
}

/// Combine sub-scores; weights are renormalized over the categories present
pub fn aggregate(sub_scores: &BTreeMap<Category, f64>, strategy: WeightingStrategy) -> Aggregate {
    let total: f64 = sub_scores
        .keys()
        .map(|category| strategy.base_weight(*category))
        .sum();

    if sub_scores.is_empty() || total <= 0.0 {
        return Aggregate {
            overall_pct: None,
            weights: BTreeMap::new(),
        };
    }

    let weights: BTreeMap<Category, f64> = sub_scores
        .keys()
        .map(|category| (*category, strategy.base_weight(*category) / total))
        .collect();

    let overall: f64 = sub_scores
        .iter()
        .map(|(category, score)| score * weights[category])
        .sum();

    Aggregate {
        overall_pct: Some(round1(overall.clamp(0.0, 100.0))),
        weights,
    }
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Overall quality label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    Reference,
    Advanced,
    Intermediate,
    Basic,
    /// Nothing could be scored
    Unrated,
}

impl QualityLabel {
    pub fn from_score(overall_pct: Option<f64>) -> Self {
        match overall_pct {
            None => QualityLabel::Unrated,
            Some(s) if s >= 85.0 => QualityLabel::Reference,
            Some(s) if s >= 70.0 => QualityLabel::Advanced,
            Some(s) if s >= 55.0 => QualityLabel::Intermediate,
            Some(_) => QualityLabel::Basic,
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityLabel::Reference => "Reference quality",
            QualityLabel::Advanced => "Advanced",
            QualityLabel::Intermediate => "Intermediate",
            QualityLabel::Basic => "Basic",
            QualityLabel::Unrated => "Unrated",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn scores(entries: &[(Category, f64)]) -> BTreeMap<Category, f64> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_equal_weight() {
        let subs = scores(&[
            (Category::Loudness, 100.0),
            (Category::Dynamics, 50.0),
            (Category::Frequency, 0.0),
        ]);
        let result = aggregate(&subs, WeightingStrategy::EqualWeight);
        assert_eq!(result.overall_pct, Some(50.0));
        assert_abs_diff_eq!(result.weights[&Category::Dynamics], 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_legacy_weights_full_set() {
        let subs = scores(&[
            (Category::Loudness, 80.0),
            (Category::Dynamics, 60.0),
            (Category::TruePeak, 100.0),
            (Category::Stereo, 40.0),
            (Category::Frequency, 20.0),
        ]);
        let result = aggregate(&subs, WeightingStrategy::Legacy);
        // 0.25*80 + 0.25*60 + 0.2*100 + 0.15*40 + 0.15*20
        assert_eq!(result.overall_pct, Some(64.0));
        let sum: f64 = result.weights.values().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_weights_renormalize_over_present_categories() {
        let subs = scores(&[(Category::Loudness, 100.0), (Category::TruePeak, 50.0)]);
        let result = aggregate(&subs, WeightingStrategy::Legacy);
        assert_abs_diff_eq!(result.weights[&Category::Loudness], 0.25 / 0.45, epsilon = 1e-12);
        assert_eq!(result.overall_pct, Some(77.8));
    }

    #[test]
    fn test_empty_is_unrated() {
        let result = aggregate(&BTreeMap::new(), WeightingStrategy::EqualWeight);
        assert_eq!(result.overall_pct, None);
        assert_eq!(QualityLabel::from_score(result.overall_pct), QualityLabel::Unrated);
    }

    #[test]
    fn test_labels() {
        assert_eq!(QualityLabel::from_score(Some(92.0)), QualityLabel::Reference);
        assert_eq!(QualityLabel::from_score(Some(70.0)), QualityLabel::Advanced);
        assert_eq!(QualityLabel::from_score(Some(54.9)), QualityLabel::Basic);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(77.777), 77.8);
        assert_eq!(round1(64.04), 64.0);
    }
}
