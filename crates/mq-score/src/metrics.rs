//! Measured-track metrics and metric identifiers
//!
//! The `MetricsVector` is produced by an upstream analysis pipeline (LUFS
//! meter, true-peak oversampler, FFT band analysis). Every field is optional:
//! a metric the pipeline did not produce is skipped by the scorers, never
//! treated as zero.

use crate::bands::Band;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Score category a metric contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Integrated loudness
    Loudness,
    /// Dynamic range and loudness range
    Dynamics,
    /// True peak level
    TruePeak,
    /// Stereo correlation
    Stereo,
    /// Spectral band balance
    Frequency,
    /// Clipping and DC offset
    Technical,
}

impl Category {
    /// All categories in display order
    pub const ALL: [Category; 6] = [
        Category::Loudness,
        Category::Dynamics,
        Category::TruePeak,
        Category::Stereo,
        Category::Frequency,
        Category::Technical,
    ];

    /// Stable identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Loudness => "loudness",
            Category::Dynamics => "dynamics",
            Category::TruePeak => "true_peak",
            Category::Stereo => "stereo",
            Category::Frequency => "frequency",
            Category::Technical => "technical",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one scored metric.
///
/// Serialized as a flat string (`"lufs"`, `"band.low_mid"`) so results stay
/// readable for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MetricKey {
    Lufs,
    TruePeak,
    DynamicRange,
    Lra,
    StereoCorrelation,
    Band(Band),
    ClippingPct,
    DcOffset,
}

impl MetricKey {
    /// Category this metric feeds
    pub fn category(&self) -> Category {
        match self {
            MetricKey::Lufs => Category::Loudness,
            MetricKey::TruePeak => Category::TruePeak,
            MetricKey::DynamicRange | MetricKey::Lra => Category::Dynamics,
            MetricKey::StereoCorrelation => Category::Stereo,
            MetricKey::Band(_) => Category::Frequency,
            MetricKey::ClippingPct | MetricKey::DcOffset => Category::Technical,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> String {
        match self {
            MetricKey::Lufs => "Integrated loudness".into(),
            MetricKey::TruePeak => "True peak".into(),
            MetricKey::DynamicRange => "Dynamic range".into(),
            MetricKey::Lra => "Loudness range".into(),
            MetricKey::StereoCorrelation => "Stereo correlation".into(),
            MetricKey::Band(band) => format!("{} band", band.info().label),
            MetricKey::ClippingPct => "Clipping".into(),
            MetricKey::DcOffset => "DC offset".into(),
        }
    }

    /// Unit of the measured value
    pub fn value_unit(&self) -> &'static str {
        match self {
            MetricKey::Lufs => "LUFS",
            MetricKey::TruePeak => "dBTP",
            MetricKey::DynamicRange | MetricKey::Band(_) => "dB",
            MetricKey::Lra => "LU",
            MetricKey::ClippingPct => "%",
            MetricKey::StereoCorrelation | MetricKey::DcOffset => "",
        }
    }

    /// Unit of a difference between two values of this metric
    pub fn deviation_unit(&self) -> &'static str {
        match self {
            MetricKey::Lufs | MetricKey::Lra => "LU",
            MetricKey::TruePeak | MetricKey::DynamicRange | MetricKey::Band(_) => "dB",
            MetricKey::ClippingPct => "%",
            MetricKey::StereoCorrelation | MetricKey::DcOffset => "",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKey::Lufs => f.write_str("lufs"),
            MetricKey::TruePeak => f.write_str("true_peak"),
            MetricKey::DynamicRange => f.write_str("dynamic_range"),
            MetricKey::Lra => f.write_str("lra"),
            MetricKey::StereoCorrelation => f.write_str("stereo_correlation"),
            MetricKey::Band(band) => write!(f, "band.{}", band.as_str()),
            MetricKey::ClippingPct => f.write_str("clipping_pct"),
            MetricKey::DcOffset => f.write_str("dc_offset"),
        }
    }
}

impl FromStr for MetricKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(band) = s.strip_prefix("band.") {
            return Band::from_alias(band)
                .map(MetricKey::Band)
                .ok_or_else(|| format!("unknown band '{}'", band));
        }
        match s {
            "lufs" => Ok(MetricKey::Lufs),
            "true_peak" => Ok(MetricKey::TruePeak),
            "dynamic_range" => Ok(MetricKey::DynamicRange),
            "lra" => Ok(MetricKey::Lra),
            "stereo_correlation" => Ok(MetricKey::StereoCorrelation),
            "clipping_pct" => Ok(MetricKey::ClippingPct),
            "dc_offset" => Ok(MetricKey::DcOffset),
            other => Err(format!("unknown metric '{}'", other)),
        }
    }
}

impl From<MetricKey> for String {
    fn from(key: MetricKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for MetricKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Per-band energy as reported by the analysis pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BandEnergy {
    /// Band RMS level (dB)
    #[serde(default, alias = "rmsDb", alias = "energy_db")]
    pub rms_db: Option<f64>,
}

impl BandEnergy {
    pub fn db(rms_db: f64) -> Self {
        Self { rms_db: Some(rms_db) }
    }
}

/// A band's share of total spectral energy, either a bare number or an object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnergyShare {
    /// Percent given directly
    Percent(f64),
    /// Percent wrapped in an object
    Entry {
        #[serde(default, alias = "percentage", alias = "pct", alias = "energy_pct")]
        percent: Option<f64>,
    },
}

impl EnergyShare {
    /// Percent of total energy, if present
    pub fn percent(&self) -> Option<f64> {
        match self {
            EnergyShare::Percent(p) => Some(*p),
            EnergyShare::Entry { percent } => *percent,
        }
    }
}

/// Percent-of-energy band analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralBalance {
    #[serde(default)]
    pub bands: BTreeMap<String, EnergyShare>,
}

/// Measured metrics for one track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsVector {
    /// Integrated loudness (LUFS)
    #[serde(alias = "lufs_integrated", alias = "lufs")]
    pub lufs_integrated: Option<f64>,

    /// True peak (dBTP)
    #[serde(alias = "true_peak_dbtp", alias = "truePeak")]
    pub true_peak_dbtp: Option<f64>,

    /// Left channel sample peak (dBFS)
    #[serde(alias = "sample_peak_left_db")]
    pub sample_peak_left_db: Option<f64>,

    /// Right channel sample peak (dBFS)
    #[serde(alias = "sample_peak_right_db")]
    pub sample_peak_right_db: Option<f64>,

    /// Combined sample peak (dBFS)
    #[serde(alias = "sample_peak_db", alias = "samplePeak")]
    pub sample_peak_db: Option<f64>,

    /// Statistical dynamic range (dB)
    #[serde(alias = "dynamic_range", alias = "dr_stat", alias = "drStat")]
    pub dynamic_range: Option<f64>,

    /// Percentile-based dynamic range (dB)
    #[serde(alias = "tt_dr", alias = "ttdr")]
    pub tt_dr: Option<f64>,

    /// Peak minus RMS (dB)
    #[serde(alias = "crest_factor")]
    pub crest_factor: Option<f64>,

    /// Loudness range (LU)
    pub lra: Option<f64>,

    /// Stereo correlation (-1..1)
    #[serde(alias = "stereo_correlation")]
    pub stereo_correlation: Option<f64>,

    /// Per-band energies keyed by analysis band name
    #[serde(alias = "band_energies")]
    pub band_energies: BTreeMap<String, BandEnergy>,

    /// Percent-of-energy band analysis
    #[serde(alias = "spectral_balance")]
    pub spectral_balance: Option<SpectralBalance>,

    /// Coarse four-band balance (`sub`, `low`, `mid`, `high`)
    #[serde(alias = "tonal_balance")]
    pub tonal_balance: BTreeMap<String, BandEnergy>,

    /// Percentage of clipped samples (0..100)
    #[serde(alias = "clipping_pct")]
    pub clipping_pct: Option<f64>,

    /// DC offset (linear)
    #[serde(alias = "dc_offset")]
    pub dc_offset: Option<f64>,
}

impl MetricsVector {
    /// Parse from JSON text
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Highest finite sample peak across the per-channel and combined readings
    pub fn sample_peak_dbfs(&self) -> Option<f64> {
        [
            self.sample_peak_left_db,
            self.sample_peak_right_db,
            self.sample_peak_db,
        ]
        .into_iter()
        .filter_map(finite)
        .reduce(f64::max)
    }

    /// Set integrated loudness
    pub fn with_lufs(mut self, lufs: f64) -> Self {
        self.lufs_integrated = Some(lufs);
        self
    }

    /// Set true peak
    pub fn with_true_peak(mut self, dbtp: f64) -> Self {
        self.true_peak_dbtp = Some(dbtp);
        self
    }

    /// Set both channel sample peaks
    pub fn with_sample_peaks(mut self, left_db: f64, right_db: f64) -> Self {
        self.sample_peak_left_db = Some(left_db);
        self.sample_peak_right_db = Some(right_db);
        self
    }

    /// Set stereo correlation
    pub fn with_stereo_correlation(mut self, correlation: f64) -> Self {
        self.stereo_correlation = Some(correlation);
        self
    }

    /// Add a band energy reading
    pub fn with_band(mut self, name: &str, rms_db: f64) -> Self {
        self.band_energies
            .insert(name.to_string(), BandEnergy::db(rms_db));
        self
    }
}

/// Keep only finite values
pub(crate) fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camel_case_payload() {
        let json = r#"{
            "lufsIntegrated": -14.2,
            "truePeakDbtp": -1.1,
            "samplePeakLeftDb": -1.5,
            "samplePeakRightDb": -1.3,
            "ttDr": 8.5,
            "stereoCorrelation": 0.82,
            "bandEnergies": { "sub": { "rms_db": -22.0 }, "mid": { "rms_db": null } },
            "spectralBalance": { "bands": { "sub": 12.5, "mid": { "percentage": 30.0 } } }
        }"#;

        let metrics = MetricsVector::from_json(json).unwrap();
        assert_eq!(metrics.lufs_integrated, Some(-14.2));
        assert_eq!(metrics.tt_dr, Some(8.5));
        assert_eq!(metrics.band_energies["sub"].rms_db, Some(-22.0));
        assert_eq!(metrics.band_energies["mid"].rms_db, None);

        let balance = metrics.spectral_balance.unwrap();
        assert_eq!(balance.bands["sub"].percent(), Some(12.5));
        assert_eq!(balance.bands["mid"].percent(), Some(30.0));
        assert!(metrics.crest_factor.is_none());
    }

    #[test]
    fn test_parse_snake_case_aliases() {
        let json = r#"{ "lufs_integrated": -9.0, "dr_stat": 6.0, "crest_factor": 11.0 }"#;
        let metrics = MetricsVector::from_json(json).unwrap();
        assert_eq!(metrics.lufs_integrated, Some(-9.0));
        assert_eq!(metrics.dynamic_range, Some(6.0));
        assert_eq!(metrics.crest_factor, Some(11.0));
    }

    #[test]
    fn test_sample_peak_takes_loudest_channel() {
        let metrics = MetricsVector::default().with_sample_peaks(-3.0, 0.4);
        assert_eq!(metrics.sample_peak_dbfs(), Some(0.4));

        let mut metrics = MetricsVector::default();
        metrics.sample_peak_left_db = Some(f64::NAN);
        assert_eq!(metrics.sample_peak_dbfs(), None);
    }

    #[test]
    fn test_metric_key_string_form() {
        let key = MetricKey::Band(Band::LowMid);
        assert_eq!(key.to_string(), "band.low_mid");
        assert_eq!("band.low_mid".parse::<MetricKey>(), Ok(key));
        assert_eq!("lufs".parse::<MetricKey>(), Ok(MetricKey::Lufs));
        assert!("loudness".parse::<MetricKey>().is_err());

        let json = serde_json::to_string(&MetricKey::TruePeak).unwrap();
        assert_eq!(json, "\"true_peak\"");
    }

    #[test]
    fn test_metric_categories() {
        assert_eq!(MetricKey::Lra.category(), Category::Dynamics);
        assert_eq!(MetricKey::Band(Band::Sub).category(), Category::Frequency);
        assert_eq!(MetricKey::DcOffset.category(), Category::Technical);
    }
}
