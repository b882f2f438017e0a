//! Canonical band schema and band energy normalization
//!
//! Upstream spectral analysis and the reference documents evolved
//! independently, so band readings arrive under several names and shapes:
//!
//! - `bandEnergies.{name}.rms_db` - absolute band level, mapped 1:1
//! - `spectralBalance.bands.{name}` - percent of total energy, mapped 1:1
//!   into energy-share dB
//! - `tonalBalance.{sub,low,mid,high}` - coarse bands; only `sub` lines up
//!   with a canonical band, the rest span several and are marked estimated
//!
//! No offset is ever added to stretch a coarse reading over a finer band.
//! A band without a direct reading is `Estimated` or `Missing` and is not
//! scored.

use crate::error::ScoreWarning;
use crate::metrics::{MetricsVector, finite};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical analysis band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Sub,
    LowBass,
    UpperBass,
    LowMid,
    Mid,
    HighMid,
    Brilho,
    Presenca,
}

/// Static per-band data used for EQ suggestions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandInfo {
    pub label: &'static str,
    pub low_hz: f64,
    pub high_hz: f64,
    pub center_hz: f64,
    /// Typical bell Q for a corrective move in this band
    pub q: f64,
}

const BAND_TABLE: [(Band, BandInfo); 8] = [
    (Band::Sub, BandInfo { label: "Sub", low_hz: 20.0, high_hz: 60.0, center_hz: 35.0, q: 0.9 }),
    (Band::LowBass, BandInfo { label: "Low bass", low_hz: 60.0, high_hz: 120.0, center_hz: 85.0, q: 1.4 }),
    (Band::UpperBass, BandInfo { label: "Upper bass", low_hz: 120.0, high_hz: 250.0, center_hz: 175.0, q: 1.3 }),
    (Band::LowMid, BandInfo { label: "Low mid", low_hz: 250.0, high_hz: 500.0, center_hz: 355.0, q: 1.4 }),
    (Band::Mid, BandInfo { label: "Mid", low_hz: 500.0, high_hz: 2000.0, center_hz: 1000.0, q: 0.7 }),
    (Band::HighMid, BandInfo { label: "High mid", low_hz: 2000.0, high_hz: 4000.0, center_hz: 2830.0, q: 1.4 }),
    (Band::Brilho, BandInfo { label: "Brilliance", low_hz: 4000.0, high_hz: 8000.0, center_hz: 5660.0, q: 1.4 }),
    (Band::Presenca, BandInfo { label: "Presence/air", low_hz: 8000.0, high_hz: 16000.0, center_hz: 11300.0, q: 1.4 }),
];

impl Band {
    /// All canonical bands, low to high
    pub const ALL: [Band; 8] = [
        Band::Sub,
        Band::LowBass,
        Band::UpperBass,
        Band::LowMid,
        Band::Mid,
        Band::HighMid,
        Band::Brilho,
        Band::Presenca,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Sub => "sub",
            Band::LowBass => "low_bass",
            Band::UpperBass => "upper_bass",
            Band::LowMid => "low_mid",
            Band::Mid => "mid",
            Band::HighMid => "high_mid",
            Band::Brilho => "brilho",
            Band::Presenca => "presenca",
        }
    }

    /// Frequency range, centre and Q
    pub fn info(&self) -> BandInfo {
        BAND_TABLE[*self as usize].1
    }

    /// Map a band name as found in analysis output or reference documents
    pub fn from_alias(name: &str) -> Option<Band> {
        match canonical_name(name).as_str() {
            "sub" | "sub_bass" | "subbass" => Some(Band::Sub),
            "low_bass" | "bass" | "lowbass" => Some(Band::LowBass),
            "upper_bass" | "upperbass" | "high_bass" => Some(Band::UpperBass),
            "low_mid" | "lowmid" | "low_mids" => Some(Band::LowMid),
            "mid" | "mids" | "midrange" => Some(Band::Mid),
            "high_mid" | "highmid" | "high_mids" | "upper_mid" => Some(Band::HighMid),
            "brilho" | "high_mid2" | "brilliance" => Some(Band::Brilho),
            "presenca" | "presença" | "presence" | "air" => Some(Band::Presenca),
            _ => None,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase snake_case form of a band name (`lowMid` / `Low-Mid` -> `low_mid`)
fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.trim().chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else if ch == '-' || ch == ' ' {
            out.push('_');
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// How a band level is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandScale {
    /// Absolute band level (dBFS RMS)
    Absolute,
    /// Share of total energy, `10 * log10(share)`
    EnergyShare,
}

/// Whether a band has a usable measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BandStatus {
    Measured,
    Estimated,
    Missing,
}

/// Where a band reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandSource {
    BandEnergies,
    SpectralBalance,
    TonalBalance,
}

/// Normalized reading for one canonical band
///
/// A band can carry one level per scale when the analysis emitted both
/// absolute band energies and a spectral-balance percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandReading {
    pub status: BandStatus,
    /// Absolute level (dBFS RMS), present only when `Measured`
    pub absolute_db: Option<f64>,
    /// Energy-share level, present only when `Measured`
    pub energy_share_db: Option<f64>,
    pub sources: Vec<BandSource>,
}

impl BandReading {
    fn missing() -> Self {
        Self {
            status: BandStatus::Missing,
            absolute_db: None,
            energy_share_db: None,
            sources: Vec::new(),
        }
    }

    /// Level on the given scale, if one was measured
    pub fn value_on(&self, scale: BandScale) -> Option<f64> {
        match scale {
            BandScale::Absolute => self.absolute_db,
            BandScale::EnergyShare => self.energy_share_db,
        }
    }

    /// Scales this band was measured on
    pub fn scales(&self) -> Vec<BandScale> {
        let mut scales = Vec::with_capacity(2);
        if self.absolute_db.is_some() {
            scales.push(BandScale::Absolute);
        }
        if self.energy_share_db.is_some() {
            scales.push(BandScale::EnergyShare);
        }
        scales
    }

    /// Record a level unless this scale already has one
    fn record(&mut self, value_db: f64, scale: BandScale, source: BandSource) {
        let slot = match scale {
            BandScale::Absolute => &mut self.absolute_db,
            BandScale::EnergyShare => &mut self.energy_share_db,
        };
        if slot.is_some() {
            return;
        }
        *slot = Some(value_db);
        self.status = BandStatus::Measured;
        self.sources.push(source);
    }
}

/// Canonical band readings for one track
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBands {
    pub readings: BTreeMap<Band, BandReading>,
    pub warnings: Vec<ScoreWarning>,
}

impl NormalizedBands {
    pub fn get(&self, band: Band) -> &BandReading {
        // every canonical band is always present
        &self.readings[&band]
    }

    pub fn measured_count(&self) -> usize {
        self.readings
            .values()
            .filter(|r| r.status == BandStatus::Measured)
            .count()
    }

    pub fn statuses(&self) -> BTreeMap<Band, BandStatus> {
        self.readings.iter().map(|(b, r)| (*b, r.status)).collect()
    }
}

/// Convert a percent-of-energy figure into energy-share dB
pub fn percent_to_share_db(percent: f64) -> Option<f64> {
    if percent.is_finite() && percent > 0.0 && percent <= 100.0 {
        Some(10.0 * (percent / 100.0).log10())
    } else {
        None
    }
}

/// Canonical bands covered by a coarse tonal-balance band
fn coarse_span(name: &str) -> Option<&'static [Band]> {
    match canonical_name(name).as_str() {
        "sub" => Some(&[Band::Sub]),
        "low" | "bass" => Some(&[Band::LowBass, Band::UpperBass]),
        "mid" | "mids" => Some(&[Band::LowMid, Band::Mid]),
        "high" | "highs" | "treble" => Some(&[Band::HighMid, Band::Brilho, Band::Presenca]),
        _ => None,
    }
}

/// Map whatever band data the analysis produced onto the canonical schema
pub fn normalize_bands(metrics: &MetricsVector) -> NormalizedBands {
    let mut readings: BTreeMap<Band, BandReading> =
        Band::ALL.iter().map(|b| (*b, BandReading::missing())).collect();
    let mut warnings = Vec::new();

    // Each scale keeps its first direct reading; band energies come first
    for (name, energy) in &metrics.band_energies {
        let Some(band) = Band::from_alias(name) else {
            warnings.push(ScoreWarning::BandMapping {
                band: name.clone(),
                reason: "no canonical band with this name".into(),
            });
            continue;
        };
        match finite(energy.rms_db) {
            Some(db) => {
                if let Some(reading) = readings.get_mut(&band) {
                    reading.record(db, BandScale::Absolute, BandSource::BandEnergies);
                }
            }
            None => warnings.push(ScoreWarning::BandMapping {
                band: name.clone(),
                reason: "band energy has no finite rms_db".into(),
            }),
        }
    }

    if let Some(balance) = &metrics.spectral_balance {
        for (name, share) in &balance.bands {
            let Some(band) = Band::from_alias(name) else {
                warnings.push(ScoreWarning::BandMapping {
                    band: name.clone(),
                    reason: "no canonical band with this name".into(),
                });
                continue;
            };
            match share.percent().and_then(percent_to_share_db) {
                Some(db) => {
                    if let Some(reading) = readings.get_mut(&band) {
                        reading.record(db, BandScale::EnergyShare, BandSource::SpectralBalance);
                    }
                }
                None => warnings.push(ScoreWarning::BandMapping {
                    band: name.clone(),
                    reason: "energy share is not a percentage in (0, 100]".into(),
                }),
            }
        }
    }

    for (name, energy) in &metrics.tonal_balance {
        let Some(span) = coarse_span(name) else {
            warnings.push(ScoreWarning::BandMapping {
                band: name.clone(),
                reason: "unknown tonal balance band".into(),
            });
            continue;
        };
        let Some(db) = finite(energy.rms_db) else {
            continue;
        };

        if let [band] = span {
            if let Some(reading) = readings.get_mut(band) {
                reading.record(db, BandScale::Absolute, BandSource::TonalBalance);
            }
            continue;
        }

        for band in span {
            let Some(reading) = readings.get_mut(band) else {
                continue;
            };
            if reading.status == BandStatus::Missing {
                reading.status = BandStatus::Estimated;
                reading.sources.push(BandSource::TonalBalance);
                warnings.push(ScoreWarning::BandMapping {
                    band: band.as_str().to_string(),
                    reason: format!("only the coarse '{}' tonal band covers it; not scored", name),
                });
            }
        }
    }

    NormalizedBands { readings, warnings }
}
