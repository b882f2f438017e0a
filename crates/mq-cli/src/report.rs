//! Report rendering for scoring results

use clap::ValueEnum;
use mq_score::{
    GateAction, ReferenceDocument, ScoringResult, Status, Tolerance, ToleranceClassification,
};
use serde::Serialize;
use std::path::Path;

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Plain text report
    Text,
    /// JSON report
    Json,
    /// Markdown report
    Markdown,
}

/// Serde name of a unit enum value (`equal_weight`, `tt_dr`, ...)
fn tag<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => "unknown".into(),
    }
}

fn status_tag(status: Status) -> &'static str {
    match status {
        Status::Ideal => "IDEAL",
        Status::Adjust => "ADJUST",
        Status::Fix => "FIX",
        Status::NotAvailable => "N/A",
    }
}

fn pct(score: Option<f64>) -> String {
    score.map_or_else(|| "N/A".into(), |s| format!("{:.1}%", s))
}

fn value_text(c: &ToleranceClassification) -> String {
    match c.value {
        Some(v) => format!("{:.2} {}", v, c.metric.value_unit()).trim_end().to_string(),
        None => "N/A".into(),
    }
}

fn tolerance_text(c: &ToleranceClassification) -> String {
    match c.tolerance {
        Some(t) => format!("{:.2} ±{:.2}", c.target, t),
        None => format!("{:.2}", c.target),
    }
}

fn gate_text(action: &GateAction) -> String {
    format!(
        "{} capped {:.1} -> {:.1} (clipped, cap {:.0})",
        action.category, action.original, action.capped, action.cap
    )
}

fn method_text(result: &ScoringResult) -> String {
    let method = &result.method;
    format!(
        "{} weighting, dynamic range from {}, safety gates {}, curve edge {:.0}",
        tag(&method.weighting),
        method
            .dynamic_range_source
            .map_or_else(|| "none".to_string(), |s| tag(&s)),
        if method.safety_gates { "on" } else { "off" },
        method.curve_edge_score
    )
}

/// Render one scoring result
pub fn render(result: &ScoringResult, format: ReportFormat) -> String {
    match format {
        ReportFormat::Text => to_text(result),
        ReportFormat::Json => to_json(result),
        ReportFormat::Markdown => to_markdown(result),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".into())
}

fn to_text(result: &ScoringResult) -> String {
    let mut output = String::new();

    let title = match &result.reference_version {
        Some(v) => format!("MixScore: {} (reference {})", result.genre, v),
        None => format!("MixScore: {}", result.genre),
    };
    output.push_str(&format!("{}\n", title));
    output.push_str(&format!("{}\n\n", "=".repeat(title.chars().count())));

    output.push_str(&format!(
        "Overall: {} ({})\n",
        pct(result.overall_score_pct),
        result.classification
    ));
    output.push_str(&format!("Method: {}\n", method_text(result)));
    output.push_str(&format!("Peaks: {}\n\n", tag(&result.peaks.state)));

    output.push_str("Categories:\n");
    for (category, score) in &result.sub_scores {
        let weight = result.weights.get(category).copied().unwrap_or(0.0);
        output.push_str(&format!(
            "  {:<10} {:>5.1}  (weight {:.2})\n",
            category.as_str(),
            score,
            weight
        ));
    }
    output.push('\n');

    output.push_str("Metrics:\n");
    output.push_str(&"-".repeat(80));
    output.push('\n');
    for c in result.per_metric.values() {
        let ratio = c.ratio.map_or_else(|| "-".into(), |r| format!("{:.2}", r));
        output.push_str(&format!(
            "[{:<6}] {:<22} {:>14}  target {:<16} ratio {}\n",
            status_tag(c.status),
            c.metric.label(),
            value_text(c),
            tolerance_text(c),
            ratio
        ));
    }
    output.push_str(&"-".repeat(80));
    output.push('\n');

    if !result.suggestions.is_empty() {
        output.push_str("\nSuggestions:\n");
        for s in &result.suggestions {
            output.push_str(&format!("  [{}] {}\n", tag(&s.urgency), s.text));
        }
    }

    if !result.gate_actions.is_empty() {
        output.push_str("\nSafety gates:\n");
        for action in &result.gate_actions {
            output.push_str(&format!("  {}\n", gate_text(action)));
        }
    }

    if !result.warnings.is_empty() {
        output.push_str("\nWarnings:\n");
        for warning in &result.warnings {
            output.push_str(&format!("  - {}\n", warning));
        }
    }

    output
}

fn to_markdown(result: &ScoringResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("# MixScore: {}\n\n", result.genre));
    if let Some(version) = &result.reference_version {
        output.push_str(&format!("**Reference:** {}\n\n", version));
    }

    output.push_str("## Summary\n\n");
    output.push_str("| Metric | Value |\n");
    output.push_str("|--------|-------|\n");
    output.push_str(&format!("| Overall | {} |\n", pct(result.overall_score_pct)));
    output.push_str(&format!("| Classification | {} |\n", result.classification));
    output.push_str(&format!("| Method | {} |\n", method_text(result)));
    for (category, score) in &result.sub_scores {
        output.push_str(&format!("| {} | {:.1} |\n", category, score));
    }
    output.push('\n');

    output.push_str("## Metrics\n\n");
    output.push_str("| Metric | Status | Value | Target | Ratio |\n");
    output.push_str("|--------|--------|-------|--------|-------|\n");
    for c in result.per_metric.values() {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            c.metric.label(),
            status_tag(c.status),
            value_text(c),
            tolerance_text(c),
            c.ratio.map_or_else(|| "-".into(), |r| format!("{:.2}", r))
        ));
    }
    output.push('\n');

    if !result.suggestions.is_empty() {
        output.push_str("## Suggestions\n\n");
        for s in &result.suggestions {
            output.push_str(&format!("- **{}** {}\n", tag(&s.urgency), s.text));
        }
        output.push('\n');
    }

    if !result.gate_actions.is_empty() || !result.warnings.is_empty() {
        output.push_str("## Notes\n\n");
        for action in &result.gate_actions {
            output.push_str(&format!("- {}\n", gate_text(action)));
        }
        for warning in &result.warnings {
            output.push_str(&format!("- {}\n", warning));
        }
    }

    output
}

/// One file of a batch run
#[derive(Debug, Serialize)]
pub struct BatchRow {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScoringResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchRow {
    pub fn scored(path: &Path, result: ScoringResult) -> Self {
        Self {
            file: path.display().to_string(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(path: &Path, error: &anyhow::Error) -> Self {
        Self {
            file: path.display().to_string(),
            result: None,
            error: Some(format!("{:#}", error)),
        }
    }

    fn overall(&self) -> Option<f64> {
        self.result.as_ref().and_then(|r| r.overall_score_pct)
    }
}

/// Batch summary
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub genre: String,
    pub total: usize,
    pub scored: usize,
    pub failed: usize,
    /// Mean overall score over rated files
    pub mean_score_pct: Option<f64>,
    pub rows: Vec<BatchRow>,
}

impl BatchReport {
    pub fn new(genre: impl Into<String>, rows: Vec<BatchRow>) -> Self {
        let failed = rows.iter().filter(|r| r.error.is_some()).count();
        let rated: Vec<f64> = rows.iter().filter_map(BatchRow::overall).collect();
        let mean_score_pct = (!rated.is_empty())
            .then(|| (rated.iter().sum::<f64>() / rated.len() as f64 * 10.0).round() / 10.0);

        Self {
            genre: genre.into(),
            total: rows.len(),
            scored: rows.len() - failed,
            failed,
            mean_score_pct,
            rows,
        }
    }

    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Json => to_json(self),
            ReportFormat::Text => self.to_text(),
            ReportFormat::Markdown => self.to_markdown(),
        }
    }

    fn to_text(&self) -> String {
        let mut output = String::new();
        let title = format!("MixScore batch: {}", self.genre);
        output.push_str(&format!("{}\n{}\n\n", title, "=".repeat(title.chars().count())));
        output.push_str(&format!(
            "Total: {} | Scored: {} | Failed: {} | Mean: {}\n\n",
            self.total,
            self.scored,
            self.failed,
            pct(self.mean_score_pct)
        ));

        for row in &self.rows {
            match (&row.result, &row.error) {
                (Some(result), _) => output.push_str(&format!(
                    "{:>7}  {:<18} {} ({} suggestions)\n",
                    pct(result.overall_score_pct),
                    result.classification.to_string(),
                    row.file,
                    result.suggestions.len()
                )),
                (None, error) => output.push_str(&format!(
                    "{:>7}  {:<18} {}: {}\n",
                    "ERR",
                    "",
                    row.file,
                    error.as_deref().unwrap_or("unknown error")
                )),
            }
        }
        output
    }

    fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("# MixScore batch: {}\n\n", self.genre));
        output.push_str(&format!(
            "**Total:** {} | **Scored:** {} | **Failed:** {} | **Mean:** {}\n\n",
            self.total,
            self.scored,
            self.failed,
            pct(self.mean_score_pct)
        ));
        output.push_str("| File | Overall | Classification | Suggestions |\n");
        output.push_str("|------|---------|----------------|-------------|\n");
        for row in &self.rows {
            match &row.result {
                Some(result) => output.push_str(&format!(
                    "| `{}` | {} | {} | {} |\n",
                    row.file,
                    pct(result.overall_score_pct),
                    result.classification,
                    result.suggestions.len()
                )),
                None => output.push_str(&format!(
                    "| `{}` | error | {} | - |\n",
                    row.file,
                    row.error.as_deref().unwrap_or("unknown error")
                )),
            }
        }
        output
    }
}

/// Render a resolved reference document
pub fn render_reference(doc: &ReferenceDocument, format: ReportFormat) -> String {
    if format == ReportFormat::Json {
        return to_json(doc);
    }

    let markdown = format == ReportFormat::Markdown;
    let mut output = String::new();
    let title = format!(
        "Reference: {} ({})",
        doc.genre,
        doc.version.as_deref().unwrap_or("unversioned")
    );
    if markdown {
        output.push_str(&format!("# {}\n\n| Metric | Target | Tolerance |\n|--------|--------|-----------|\n", title));
    } else {
        output.push_str(&format!("{}\n{}\n", title, "=".repeat(title.chars().count())));
        let schemas: Vec<String> = doc.schemas.iter().map(tag).collect();
        output.push_str(&format!("Schemas: {}\n\n", schemas.join(", ")));
    }

    let scalars = [
        mq_score::MetricKey::Lufs,
        mq_score::MetricKey::TruePeak,
        mq_score::MetricKey::DynamicRange,
        mq_score::MetricKey::Lra,
        mq_score::MetricKey::StereoCorrelation,
    ];
    let mut rows: Vec<(String, f64, Tolerance)> = scalars
        .into_iter()
        .filter_map(|m| doc.scalar_target(m).map(|t| (m.label(), t.target, t.tolerance)))
        .collect();
    rows.extend(doc.bands.iter().map(|(band, t)| {
        let label = format!("{} ({})", mq_score::MetricKey::Band(*band).label(), tag(&t.scale));
        (label, t.target_db, t.tolerance)
    }));

    for (label, target, tolerance) in rows {
        let tolerance = match tolerance {
            Tolerance::Symmetric(t) => format!("±{:.2}", t),
            Tolerance::Asymmetric { below, above } => format!("-{:.2} / +{:.2}", below, above),
        };
        if markdown {
            output.push_str(&format!("| {} | {:.2} | {} |\n", label, target, tolerance));
        } else {
            output.push_str(&format!("  {:<36} {:>8.2}  {}\n", label, target, tolerance));
        }
    }

    if !doc.warnings.is_empty() {
        output.push_str(if markdown { "\n## Warnings\n\n" } else { "\nWarnings:\n" });
        for warning in &doc.warnings {
            output.push_str(&format!("  - {}\n", warning));
        }
    }
    output
}
