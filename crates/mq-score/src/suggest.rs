//! Corrective suggestions
//!
//! One suggestion per metric that is out of tolerance. Band suggestions carry
//! an EQ hint taken from the static band table.

use crate::aggregate::round1;
use crate::classify::{Status, ToleranceClassification};
use crate::metrics::MetricKey;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Direction to move the metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Increase,
    Decrease,
}

/// How pressing the fix is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    /// Reserved; suggestions are only made for ADJUST (`Medium`) and FIX (`High`)
    Low,
    Medium,
    High,
}

/// Bell EQ move for a band suggestion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqHint {
    pub center_hz: f64,
    pub q: f64,
    pub low_hz: f64,
    pub high_hz: f64,
}

/// Actionable suggestion for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub metric: MetricKey,
    pub direction: Direction,
    /// `|deviation|`, one decimal
    pub magnitude: f64,
    pub unit: String,
    pub urgency: Urgency,
    pub text: String,
    pub eq: Option<EqHint>,
}

/// Suggestion for a single classification; `None` unless ADJUST or FIX
pub fn suggest(classification: &ToleranceClassification) -> Option<Suggestion> {
    let urgency = match classification.status {
        Status::Adjust => Urgency::Medium,
        Status::Fix => Urgency::High,
        Status::Ideal | Status::NotAvailable => return None,
    };
    let deviation = classification.deviation?;
    debug_assert!(
        classification.ratio.is_some_and(|r| r > 1.0),
        "suggestion requested for an in-tolerance metric"
    );

    let metric = classification.metric;
    let direction = if deviation < 0.0 {
        Direction::Increase
    } else {
        Direction::Decrease
    };
    let magnitude = round1(deviation.abs());
    let eq = match metric {
        MetricKey::Band(band) => {
            let info = band.info();
            Some(EqHint {
                center_hz: info.center_hz,
                q: info.q,
                low_hz: info.low_hz,
                high_hz: info.high_hz,
            })
        }
        _ => None,
    };

    Some(Suggestion {
        metric,
        direction,
        magnitude,
        unit: metric.deviation_unit().to_string(),
        urgency,
        text: suggestion_text(classification, direction, magnitude, eq.as_ref()),
        eq,
    })
}

/// Suggestions for every actionable classification, most urgent first
pub fn generate_suggestions(classifications: &[ToleranceClassification]) -> Vec<Suggestion> {
    let mut ranked: Vec<(f64, Suggestion)> = classifications
        .iter()
        .filter_map(|c| suggest(c).map(|s| (c.ratio.unwrap_or(0.0), s)))
        .collect();

    ranked.sort_by(|(ratio_a, a), (ratio_b, b)| {
        b.urgency
            .cmp(&a.urgency)
            .then_with(|| ratio_b.partial_cmp(ratio_a).unwrap_or(Ordering::Equal))
            .then_with(|| a.metric.cmp(&b.metric))
    });

    ranked.into_iter().map(|(_, s)| s).collect()
}

fn suggestion_text(
    c: &ToleranceClassification,
    direction: Direction,
    magnitude: f64,
    eq: Option<&EqHint>,
) -> String {
    let up = direction == Direction::Increase;
    let target = c.target;

    match c.metric {
        MetricKey::Lufs => format!(
            "{} integrated loudness by ~{:.1} LU toward {:.1} LUFS",
            if up { "Raise" } else { "Lower" },
            magnitude,
            target
        ),
        MetricKey::TruePeak if up => format!(
            "True peak sits {:.1} dB under the {:.1} dBTP target; the limiter ceiling can come up",
            magnitude, target
        ),
        MetricKey::TruePeak => format!(
            "Pull the limiter ceiling down ~{:.1} dB to reach {:.1} dBTP",
            magnitude, target
        ),
        MetricKey::DynamicRange if up => format!(
            "Recover ~{:.1} dB of dynamic range by easing compression and limiting",
            magnitude
        ),
        MetricKey::DynamicRange => format!(
            "Tighten dynamics by ~{:.1} dB with more bus compression",
            magnitude
        ),
        MetricKey::Lra if up => format!(
            "Widen the loudness range by ~{:.1} LU; let quiet sections breathe",
            magnitude
        ),
        MetricKey::Lra => format!(
            "Narrow the loudness range by ~{:.1} LU with level automation",
            magnitude
        ),
        MetricKey::StereoCorrelation if up => format!(
            "Stereo correlation is {:.2} below {:.2}; check phase and narrow wide elements",
            c.abs_deviation.unwrap_or(magnitude),
            target
        ),
        MetricKey::StereoCorrelation => format!(
            "Stereo image is {:.2} narrower than the {:.2} reference; widen supporting elements",
            c.abs_deviation.unwrap_or(magnitude),
            target
        ),
        MetricKey::ClippingPct => format!(
            "{:.2}% of samples clip (limit {:.2}%); lower the gain into the limiter",
            c.value.unwrap_or(0.0),
            c.tolerance.unwrap_or(0.0)
        ),
        MetricKey::DcOffset => format!(
            "DC offset of {:.4} exceeds {:.4}; apply a high-pass filter around 20 Hz",
            c.value.unwrap_or(0.0),
            c.tolerance.unwrap_or(0.0)
        ),
        MetricKey::Band(_) => match eq {
            Some(eq) => format!(
                "{} ~{:.1} dB around {} (Q≈{:.1})",
                if up { "Boost" } else { "Cut" },
                magnitude,
                hz_range(eq.low_hz, eq.high_hz),
                eq.q
            ),
            None => format!("{} {} by ~{:.1} dB", if up { "Boost" } else { "Cut" }, c.metric.label(), magnitude),
        },
    }
}

/// `250-500 Hz`, `2-4 kHz`, `500 Hz-2 kHz`
fn hz_range(low_hz: f64, high_hz: f64) -> String {
    let khz = |hz: f64| hz / 1000.0;
    match (low_hz >= 1000.0, high_hz >= 1000.0) {
        (true, true) => format!("{}-{} kHz", khz(low_hz), khz(high_hz)),
        (false, true) => format!("{} Hz-{} kHz", low_hz, khz(high_hz)),
        _ => format!("{}-{} Hz", low_hz, high_hz),
    }
}
