//! Reference document resolution
//!
//! Genre reference documents have been written in several shapes over time.
//! The resolver detects each shape and folds it into one canonical
//! [`ReferenceDocument`]:
//!
//! - **Genre-wrapped**: `{ "<genre>": { ... } }`
//! - **Embedded bundle**: `{ "genres": { "<genre>": { ... }, ... } }`
//! - **Flat**: top-level `lufs_target` / `tol_lufs` / ... plus `bands`
//! - **Legacy compatibility**: the same fields inside `legacy_compatibility`,
//!   which wins over the flat top level
//! - **Flex tonal curve**: `flex.tonalCurve.bands` as an array of
//!   `{ name, target_db, tol_db }`
//! - **Spectral balance percent**: `spectralBalance.bands` as percent of
//!   total energy, converted to energy-share dB
//!
//! Resolution is pure. It never substitutes defaults for a document that has
//! no usable targets; that is a [`ScoreError::ReferenceResolution`].

use crate::bands::{Band, BandScale, percent_to_share_db};
use crate::classify::Tolerance;
use crate::config::ScoringConfig;
use crate::error::{ScoreError, ScoreResult, ScoreWarning};
use crate::metrics::MetricKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Lowest energy share a percent tolerance can reach below target (percent)
const ENERGY_SHARE_FLOOR_PCT: f64 = 0.01;

/// Schema shapes found while resolving
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    GenreWrapped,
    EmbeddedBundle,
    Flat,
    LegacyCompatibility,
    FlexTonalCurve,
    SpectralBalancePercent,
}

/// Target value with its tolerance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricTarget {
    pub target: f64,
    pub tolerance: Tolerance,
}

impl MetricTarget {
    pub fn new(target: f64, tolerance: f64) -> Self {
        Self {
            target,
            tolerance: Tolerance::Symmetric(tolerance),
        }
    }
}

/// Band target with its tolerance and the scale it is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandTarget {
    pub target_db: f64,
    pub tolerance: Tolerance,
    pub scale: BandScale,
}

impl BandTarget {
    pub fn new(target_db: f64, tolerance_db: f64) -> Self {
        Self {
            target_db,
            tolerance: Tolerance::Symmetric(tolerance_db),
            scale: BandScale::Absolute,
        }
    }
}

/// Canonical per-genre reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDocument {
    /// Normalized genre key
    pub genre: String,
    pub version: Option<String>,
    /// Number of tracks the statistics were computed from
    pub num_tracks: Option<u64>,
    /// Shapes detected in the source payload
    pub schemas: Vec<SchemaVariant>,

    pub lufs: Option<MetricTarget>,
    pub true_peak: Option<MetricTarget>,
    pub dynamic_range: Option<MetricTarget>,
    pub lra: Option<MetricTarget>,
    pub stereo: Option<MetricTarget>,
    pub bands: BTreeMap<Band, BandTarget>,

    /// Non-fatal issues found during resolution
    pub warnings: Vec<ScoreWarning>,
}

impl ReferenceDocument {
    /// Empty document for a genre; add targets with the `with_*` builders
    pub fn new(genre: &str) -> Self {
        Self {
            genre: normalize_genre_key(genre),
            version: None,
            num_tracks: None,
            schemas: Vec::new(),
            lufs: None,
            true_peak: None,
            dynamic_range: None,
            lra: None,
            stereo: None,
            bands: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_lufs(mut self, target: f64, tolerance: f64) -> Self {
        self.lufs = Some(MetricTarget::new(target, tolerance));
        self
    }

    pub fn with_true_peak(mut self, target: f64, tolerance: f64) -> Self {
        self.true_peak = Some(MetricTarget::new(target, tolerance));
        self
    }

    pub fn with_dynamic_range(mut self, target: f64, tolerance: f64) -> Self {
        self.dynamic_range = Some(MetricTarget::new(target, tolerance));
        self
    }

    pub fn with_lra(mut self, target: f64, tolerance: f64) -> Self {
        self.lra = Some(MetricTarget::new(target, tolerance));
        self
    }

    pub fn with_stereo(mut self, target: f64, tolerance: f64) -> Self {
        self.stereo = Some(MetricTarget::new(target, tolerance));
        self
    }

    pub fn with_band(mut self, band: Band, target_db: f64, tolerance_db: f64) -> Self {
        self.bands.insert(band, BandTarget::new(target_db, tolerance_db));
        self
    }

    /// Scalar target for a metric key
    pub fn scalar_target(&self, metric: MetricKey) -> Option<&MetricTarget> {
        match metric {
            MetricKey::Lufs => self.lufs.as_ref(),
            MetricKey::TruePeak => self.true_peak.as_ref(),
            MetricKey::DynamicRange => self.dynamic_range.as_ref(),
            MetricKey::Lra => self.lra.as_ref(),
            MetricKey::StereoCorrelation => self.stereo.as_ref(),
            _ => None,
        }
    }

    fn scalar_slot(&mut self, metric: MetricKey) -> Option<&mut Option<MetricTarget>> {
        match metric {
            MetricKey::Lufs => Some(&mut self.lufs),
            MetricKey::TruePeak => Some(&mut self.true_peak),
            MetricKey::DynamicRange => Some(&mut self.dynamic_range),
            MetricKey::Lra => Some(&mut self.lra),
            MetricKey::StereoCorrelation => Some(&mut self.stereo),
            _ => None,
        }
    }

    /// Whether at least one target survived resolution
    pub fn has_targets(&self) -> bool {
        SCALAR_FIELDS
            .iter()
            .any(|field| self.scalar_target(field.metric).is_some())
            || !self.bands.is_empty()
    }
}

/// Normalize a genre key: trimmed, lowercase, spaces and hyphens to `_`
pub fn normalize_genre_key(genre: &str) -> String {
    genre
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Keys a scalar metric may be stored under
struct ScalarField {
    metric: MetricKey,
    targets: &'static [&'static str],
    tolerances: &'static [&'static str],
}

const SCALAR_FIELDS: [ScalarField; 5] = [
    ScalarField {
        metric: MetricKey::Lufs,
        targets: &["lufs_target", "lufsTarget", "lufs_integrated_target"],
        tolerances: &["tol_lufs", "tolLufs", "lufs_tolerance"],
    },
    ScalarField {
        metric: MetricKey::TruePeak,
        targets: &["true_peak_target", "truePeakTarget", "tp_target"],
        tolerances: &["tol_true_peak", "tolTruePeak", "tol_tp", "true_peak_tolerance"],
    },
    ScalarField {
        metric: MetricKey::DynamicRange,
        targets: &["dr_target", "drTarget", "dynamic_range_target"],
        tolerances: &["tol_dr", "tolDr", "dr_tolerance"],
    },
    ScalarField {
        metric: MetricKey::Lra,
        targets: &["lra_target", "lraTarget"],
        tolerances: &["tol_lra", "tolLra", "lra_tolerance"],
    },
    ScalarField {
        metric: MetricKey::StereoCorrelation,
        targets: &["stereo_target", "stereoTarget", "correlation_target"],
        tolerances: &["tol_stereo", "tolStereo", "stereo_tolerance"],
    },
];

const BAND_TARGET_KEYS: &[&str] = &["target_db", "targetDb", "target"];
const BAND_TOLERANCE_KEYS: &[&str] = &["tol_db", "tolDb", "tolerance", "tol"];
const BAND_NAME_KEYS: &[&str] = &["name", "band", "id"];
const PERCENT_TARGET_KEYS: &[&str] = &["target_pct", "targetPct", "target", "percentage"];
const PERCENT_TOLERANCE_KEYS: &[&str] = &["tol_pct", "tolPct", "tolerance", "tol"];

/// First finite number stored under any of `keys`
fn number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find_map(Value::as_f64)
        .filter(|v| v.is_finite())
}

fn object<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    map.get(key).and_then(Value::as_object)
}

/// Resolves raw reference payloads into canonical documents
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    default_band_tolerance_db: f64,
}

impl Default for ReferenceResolver {
    fn default() -> Self {
        Self::from_config(&ScoringConfig::default())
    }
}

/// Resolve with default options
pub fn resolve_reference(genre_key: &str, payload: &Value) -> ScoreResult<ReferenceDocument> {
    ReferenceResolver::default().resolve(genre_key, payload)
}

/// Accumulates one document's targets and the warnings raised on the way
struct Builder<'r> {
    resolver: &'r ReferenceResolver,
    doc: ReferenceDocument,
}

impl ReferenceResolver {
    pub fn new(default_band_tolerance_db: f64) -> Self {
        Self {
            default_band_tolerance_db,
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(config.default_band_tolerance_db)
    }

    /// Parse JSON text and resolve it
    pub fn resolve_str(&self, genre_key: &str, json: &str) -> ScoreResult<ReferenceDocument> {
        let payload: Value = serde_json::from_str(json)?;
        self.resolve(genre_key, &payload)
    }

    /// Resolve a raw payload of unknown shape
    pub fn resolve(&self, genre_key: &str, payload: &Value) -> ScoreResult<ReferenceDocument> {
        let genre = normalize_genre_key(genre_key);
        let fail = |reason: &str| ScoreError::ReferenceResolution {
            genre: genre.clone(),
            reason: reason.to_string(),
        };

        let root = payload
            .as_object()
            .ok_or_else(|| fail("payload is not a JSON object"))?;

        let mut builder = Builder {
            resolver: self,
            doc: ReferenceDocument::new(&genre),
        };
        let body = builder.unwrap_genre(root);

        builder.doc.version = body.get("version").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        builder.doc.num_tracks = ["num_tracks", "numTracks"]
            .iter()
            .find_map(|k| body.get(*k).and_then(Value::as_u64));

        let legacy = object(body, "legacy_compatibility");
        builder.read_scalars(body, legacy);
        builder.read_bands(body, legacy);

        let mut doc = builder.doc;
        doc.schemas.sort();
        doc.schemas.dedup();

        if !doc.has_targets() {
            return Err(fail("no usable target data"));
        }

        for warning in &doc.warnings {
            log::warn!("[Reference] {}: {}", doc.genre, warning);
        }
        log::debug!(
            "[Reference] resolved {} (schemas {:?}, {} bands)",
            doc.genre,
            doc.schemas,
            doc.bands.len()
        );

        Ok(doc)
    }
}

impl Builder<'_> {
    /// Strip genre-key and bundle wrappers
    fn unwrap_genre<'a>(&mut self, root: &'a Map<String, Value>) -> &'a Map<String, Value> {
        let genre = self.doc.genre.clone();
        let find = |map: &'a Map<String, Value>| {
            map.iter()
                .find(|(k, _)| normalize_genre_key(k) == genre)
                .and_then(|(_, v)| v.as_object())
        };

        if let Some(inner) = object(root, "genres").and_then(find) {
            self.doc.schemas.push(SchemaVariant::EmbeddedBundle);
            return inner;
        }
        if let Some(inner) = find(root) {
            self.doc.schemas.push(SchemaVariant::GenreWrapped);
            return inner;
        }
        root
    }

    fn warn(&mut self, warning: ScoreWarning) {
        self.doc.warnings.push(warning);
    }

    fn read_scalars(&mut self, body: &Map<String, Value>, legacy: Option<&Map<String, Value>>) {
        for field in &SCALAR_FIELDS {
            let candidates: Vec<(f64, Option<f64>, SchemaVariant)> = [
                legacy.map(|block| (block, SchemaVariant::LegacyCompatibility)),
                Some((body, SchemaVariant::Flat)),
            ]
            .into_iter()
            .flatten()
            .filter_map(|(block, schema)| {
                number(block, field.targets).map(|t| (t, number(block, field.tolerances), schema))
            })
            .collect();

            // Legacy block wins, unless only the flat pair has a usable tolerance
            let usable = candidates
                .iter()
                .find(|(_, tol, _)| tol.is_some_and(|t| t > 0.0));
            let Some(&(target, tolerance, schema)) = usable.or(candidates.first()) else {
                continue;
            };
            if candidates.first().is_some_and(|first| first.2 != schema) {
                log::debug!(
                    "[Reference] {}: legacy {} has no usable tolerance, using flat pair",
                    self.doc.genre,
                    field.metric
                );
            }
            self.doc.schemas.push(schema);

            let tolerance = match tolerance {
                Some(t) if t > 0.0 => t,
                Some(t) => {
                    self.warn(ScoreWarning::InvalidTolerance {
                        metric: field.metric,
                        reason: format!("tolerance {} is not positive", t),
                    });
                    continue;
                }
                None => {
                    self.warn(ScoreWarning::InvalidTolerance {
                        metric: field.metric,
                        reason: "target has no tolerance".into(),
                    });
                    continue;
                }
            };

            if let Some(slot) = self.doc.scalar_slot(field.metric) {
                *slot = Some(MetricTarget::new(target, tolerance));
            }
        }
    }

    fn read_bands(&mut self, body: &Map<String, Value>, legacy: Option<&Map<String, Value>>) {
        if let Some(bands) = legacy.and_then(|b| object(b, "bands")) {
            self.doc.schemas.push(SchemaVariant::LegacyCompatibility);
            for (name, entry) in bands {
                self.insert_db_band(name, entry);
            }
        }

        if let Some(bands) = object(body, "bands") {
            self.doc.schemas.push(SchemaVariant::Flat);
            for (name, entry) in bands {
                self.insert_db_band(name, entry);
            }
        }

        let tonal_curve = object(body, "flex")
            .and_then(|flex| object(flex, "tonalCurve").or_else(|| object(flex, "tonal_curve")))
            .and_then(|curve| curve.get("bands"))
            .and_then(Value::as_array);
        if let Some(entries) = tonal_curve {
            self.doc.schemas.push(SchemaVariant::FlexTonalCurve);
            for entry in entries {
                let name = entry
                    .as_object()
                    .and_then(|e| BAND_NAME_KEYS.iter().find_map(|k| e.get(*k)))
                    .and_then(Value::as_str);
                match name {
                    Some(name) => self.insert_db_band(name, entry),
                    None => self.warn(ScoreWarning::BandMapping {
                        band: entry.to_string(),
                        reason: "tonal curve entry has no band name".into(),
                    }),
                }
            }
        }

        let percent = object(body, "spectralBalance")
            .or_else(|| object(body, "spectral_balance"))
            .and_then(|sb| object(sb, "bands"));
        if let Some(bands) = percent {
            self.doc.schemas.push(SchemaVariant::SpectralBalancePercent);
            for (name, entry) in bands {
                self.insert_percent_band(name, entry);
            }
        }
    }

    /// Map a band name, skipping bands an earlier schema already provided
    fn band_slot(&mut self, name: &str) -> Option<Band> {
        let Some(band) = Band::from_alias(name) else {
            self.warn(ScoreWarning::BandMapping {
                band: name.to_string(),
                reason: "reference band has no canonical counterpart".into(),
            });
            return None;
        };
        (!self.doc.bands.contains_key(&band)).then_some(band)
    }

    fn insert_band(&mut self, band: Band, target_db: f64, tolerance: Tolerance, scale: BandScale) {
        if tolerance.is_valid() {
            self.doc.bands.insert(band, BandTarget { target_db, tolerance, scale });
        } else {
            self.warn(ScoreWarning::InvalidTolerance {
                metric: MetricKey::Band(band),
                reason: format!("tolerance {:?} is not positive", tolerance),
            });
        }
    }

    fn default_tolerance(&mut self, band: Band) -> Tolerance {
        let tolerance_db = self.resolver.default_band_tolerance_db;
        self.warn(ScoreWarning::DefaultToleranceApplied { band, tolerance_db });
        Tolerance::Symmetric(tolerance_db)
    }

    fn insert_db_band(&mut self, name: &str, entry: &Value) {
        let Some(band) = self.band_slot(name) else {
            return;
        };

        let (target, fields) = match entry {
            Value::Number(n) => (n.as_f64(), None),
            Value::Object(fields) => (number(fields, BAND_TARGET_KEYS), Some(fields)),
            _ => (None, None),
        };
        let range = fields
            .and_then(|f| object(f, "target_range"))
            .and_then(|r| Some((number(r, &["min"])?, number(r, &["max"])?)))
            .filter(|(min, max)| min < max);

        let (target, tolerance) = match (target, range) {
            (Some(target), range) => {
                let explicit = fields.and_then(|f| {
                    if let Some(tol) = number(f, BAND_TOLERANCE_KEYS) {
                        return Some(Tolerance::Symmetric(tol));
                    }
                    Some(Tolerance::Asymmetric {
                        below: number(f, &["tol_min", "tolMin"])?,
                        above: number(f, &["tol_max", "tolMax"])?,
                    })
                });
                let tolerance = match (explicit, range) {
                    (Some(tolerance), _) => tolerance,
                    (None, Some((min, max))) => Tolerance::Asymmetric {
                        below: target - min,
                        above: max - target,
                    },
                    (None, None) => self.default_tolerance(band),
                };
                (target, tolerance)
            }
            (None, Some((min, max))) => ((min + max) / 2.0, Tolerance::Symmetric((max - min) / 2.0)),
            (None, None) => {
                self.warn(ScoreWarning::BandMapping {
                    band: name.to_string(),
                    reason: "reference band has no target".into(),
                });
                return;
            }
        };

        self.insert_band(band, target, tolerance, BandScale::Absolute);
    }

    fn insert_percent_band(&mut self, name: &str, entry: &Value) {
        let Some(band) = self.band_slot(name) else {
            return;
        };

        let (percent, tol_pct) = match entry {
            Value::Number(n) => (n.as_f64(), None),
            Value::Object(fields) => (
                number(fields, PERCENT_TARGET_KEYS),
                number(fields, PERCENT_TOLERANCE_KEYS),
            ),
            _ => (None, None),
        };

        let Some((percent, target_db)) =
            percent.and_then(|p| percent_to_share_db(p).map(|db| (p, db)))
        else {
            self.warn(ScoreWarning::BandMapping {
                band: name.to_string(),
                reason: "energy share target is not a percentage in (0, 100]".into(),
            });
            return;
        };

        let tolerance = match tol_pct {
            Some(tol) if tol > 0.0 => {
                let low = (percent - tol).max(ENERGY_SHARE_FLOOR_PCT);
                let high = (percent + tol).min(100.0);
                Tolerance::Asymmetric {
                    below: target_db - 10.0 * (low / 100.0).log10(),
                    above: 10.0 * (high / 100.0).log10() - target_db,
                }
            }
            Some(tol) => Tolerance::Symmetric(tol),
            None => self.default_tolerance(band),
        };

        self.insert_band(band, target_db, tolerance, BandScale::EnergyShare);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_document() {
        let payload = json!({
            "version": "v2.1",
            "num_tracks": 42,
            "lufs_target": -14.0, "tol_lufs": 1.0,
            "true_peak_target": -1.0, "tol_true_peak": 0.5,
            "dr_target": 8.0, "tol_dr": 2.0,
            "lra_target": 7.0, "tol_lra": 3.0,
            "stereo_target": 0.85, "tol_stereo": 0.1,
            "bands": {
                "sub": { "target_db": -20.0, "tol_db": 2.5 },
                "lowMid": { "target_db": -18.0, "tol_min": 1.0, "tol_max": 3.0 }
            }
        });

        let doc = resolve_reference("Pop", &payload).unwrap();
        assert_eq!(doc.genre, "pop");
        assert_eq!(doc.version.as_deref(), Some("v2.1"));
        assert_eq!(doc.num_tracks, Some(42));
        assert_eq!(doc.lufs, Some(MetricTarget::new(-14.0, 1.0)));
        assert_eq!(doc.stereo, Some(MetricTarget::new(0.85, 0.1)));
        assert_eq!(doc.bands[&Band::Sub], BandTarget::new(-20.0, 2.5));
        assert_eq!(
            doc.bands[&Band::LowMid].tolerance,
            Tolerance::Asymmetric { below: 1.0, above: 3.0 }
        );
        assert_eq!(doc.schemas, vec![SchemaVariant::Flat]);
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_genre_wrapped_and_legacy_block() {
        let payload = json!({
            "Funk Mandela": {
                "version": 3,
                "lufs_target": -4.9, "tol_lufs": 0.5,
                "legacy_compatibility": {
                    "lufs_target": -8.0, "tol_lufs": 1.5,
                    "bands": { "mid": { "target_db": -16.0, "tol_db": 2.0 } }
                },
                "bands": {
                    "mid": { "target_db": -40.0, "tol_db": 2.0 },
                    "sub": { "target_db": -12.0, "tol_db": 3.0 }
                }
            }
        });

        let doc = resolve_reference("funk-mandela", &payload).unwrap();
        assert_eq!(doc.genre, "funk_mandela");
        assert_eq!(doc.version.as_deref(), Some("3"));
        assert_eq!(doc.lufs, Some(MetricTarget::new(-8.0, 1.5)));
        assert_eq!(doc.bands[&Band::Mid].target_db, -16.0);
        assert_eq!(doc.bands[&Band::Sub].target_db, -12.0);
        assert!(doc.schemas.contains(&SchemaVariant::GenreWrapped));
        assert!(doc.schemas.contains(&SchemaVariant::LegacyCompatibility));
    }

    #[test]
    fn test_legacy_target_without_tolerance_falls_back_to_flat_pair() {
        let payload = json!({
            "lufs_target": -14.0, "tol_lufs": 1.0,
            "dr_target": 8.0, "tol_dr": 2.0,
            "legacy_compatibility": { "lufs_target": -13.0, "dr_target": 9.0, "tol_dr": 0.0 }
        });

        let doc = resolve_reference("pop", &payload).unwrap();
        assert_eq!(doc.lufs, Some(MetricTarget::new(-14.0, 1.0)));
        assert_eq!(doc.dynamic_range, Some(MetricTarget::new(8.0, 2.0)));
        assert_eq!(doc.schemas, vec![SchemaVariant::Flat]);
        assert!(doc.warnings.is_empty());

        let only_legacy = json!({
            "lufs_target": -14.0, "tol_lufs": 1.0,
            "legacy_compatibility": { "lufs_target": -14.0 }
        });
        let doc = resolve_reference("pop", &only_legacy).unwrap();
        assert_eq!(doc.lufs, Some(MetricTarget::new(-14.0, 1.0)));
    }

    #[test]
    fn test_embedded_bundle() {
        let payload = json!({
            "genres": {
                "trance": { "lufs_target": -9.0, "tol_lufs": 1.0 },
                "rock": { "lufs_target": -10.0, "tol_lufs": 1.0 }
            }
        });
        let doc = resolve_reference("rock", &payload).unwrap();
        assert_eq!(doc.lufs.unwrap().target, -10.0);
        assert_eq!(doc.schemas, vec![SchemaVariant::EmbeddedBundle]);

        let err = resolve_reference("jazz", &payload).unwrap_err();
        assert!(matches!(err, ScoreError::ReferenceResolution { .. }));
    }

    #[test]
    fn test_flex_tonal_curve() {
        let payload = json!({
            "flex": { "tonalCurve": { "bands": [
                { "name": "brilho", "target_db": -28.0, "tol_db": 3.0 },
                { "band": "presenca", "target_db": -33.0 },
                { "target_db": -10.0 }
            ] } }
        });

        let doc = resolve_reference("electronic", &payload).unwrap();
        assert_eq!(doc.bands[&Band::Brilho], BandTarget::new(-28.0, 3.0));
        assert_eq!(doc.bands[&Band::Presenca].tolerance, Tolerance::Symmetric(2.0));
        assert!(doc.warnings.contains(&ScoreWarning::DefaultToleranceApplied {
            band: Band::Presenca,
            tolerance_db: 2.0
        }));
        assert!(
            doc.warnings
                .iter()
                .any(|w| matches!(w, ScoreWarning::BandMapping { .. }))
        );
    }

    #[test]
    fn test_spectral_balance_percent() {
        let payload = json!({
            "spectralBalance": { "bands": {
                "mid": { "target_pct": 10.0, "tol_pct": 5.0 },
                "sub": 20.0
            } }
        });

        let doc = resolve_reference("lofi", &payload).unwrap();
        let mid = doc.bands[&Band::Mid];
        assert_eq!(mid.scale, BandScale::EnergyShare);
        assert!((mid.target_db + 10.0).abs() < 1e-9);
        match mid.tolerance {
            Tolerance::Asymmetric { below, above } => {
                // 5% -> -13.01 dB, 15% -> -8.24 dB
                assert!((below - 3.0103).abs() < 1e-3);
                assert!((above - 1.7609).abs() < 1e-3);
            }
            other => panic!("unexpected tolerance {:?}", other),
        }
        assert_eq!(doc.bands[&Band::Sub].tolerance, Tolerance::Symmetric(2.0));
    }

    #[test]
    fn test_target_range_band() {
        let payload = json!({
            "bands": {
                "mid": { "target_range": { "min": -20.0, "max": -14.0 } },
                "sub": { "target_db": -12.0, "target_range": { "min": -13.0, "max": -8.0 } }
            }
        });
        let doc = resolve_reference("pop", &payload).unwrap();
        assert_eq!(doc.bands[&Band::Mid], BandTarget::new(-17.0, 3.0));
        assert_eq!(
            doc.bands[&Band::Sub].tolerance,
            Tolerance::Asymmetric { below: 1.0, above: 4.0 }
        );
    }

    #[test]
    fn test_invalid_tolerances_exclude_metric() {
        let payload = json!({
            "lufs_target": -14.0, "tol_lufs": 0.0,
            "dr_target": 8.0,
            "lra_target": 6.0, "tol_lra": 2.0,
            "bands": { "sub": { "target_db": -20.0, "tol_db": -1.0 } }
        });

        let doc = resolve_reference("pop", &payload).unwrap();
        assert!(doc.lufs.is_none());
        assert!(doc.dynamic_range.is_none());
        assert!(doc.lra.is_some());
        assert!(doc.bands.is_empty());

        let invalid: Vec<_> = doc
            .warnings
            .iter()
            .filter_map(|w| match w {
                ScoreWarning::InvalidTolerance { metric, .. } => Some(*metric),
                _ => None,
            })
            .collect();
        assert_eq!(
            invalid,
            vec![MetricKey::Lufs, MetricKey::DynamicRange, MetricKey::Band(Band::Sub)]
        );
    }

    #[test]
    fn test_no_targets_is_an_error() {
        for payload in [json!({}), json!({"version": "1"}), json!([1, 2]), json!({"lufs_target": -14.0})] {
            let err = resolve_reference("pop", &payload).unwrap_err();
            assert!(matches!(err, ScoreError::ReferenceResolution { ref genre, .. } if genre == "pop"));
        }
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let payload = json!({ "pop": { "lufs_target": -14.0, "tol_lufs": 1.0, "bands": { "mid": -15.0 } } });
        let resolver = ReferenceResolver::new(1.5);
        let first = resolver.resolve("pop", &payload).unwrap();
        let second = resolver.resolve("pop", &payload).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.bands[&Band::Mid].tolerance, Tolerance::Symmetric(1.5));
    }

    #[test]
    fn test_resolve_str() {
        let doc = ReferenceResolver::default()
            .resolve_str("pop", r#"{"lufs_target": -14, "tol_lufs": 1}"#)
            .unwrap();
        assert_eq!(doc.lufs, Some(MetricTarget::new(-14.0, 1.0)));

        let err = ReferenceResolver::default().resolve_str("pop", "{").unwrap_err();
        assert!(matches!(err, ScoreError::Json(_)));
    }
}
