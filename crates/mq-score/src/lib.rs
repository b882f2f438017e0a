//! MixScore reference-driven mix/master scoring engine
//!
//! Scores an already-measured track against per-genre reference statistics:
//!
//! ## Features
//! - **Tolerance Classification**: IDEAL / ADJUST / FIX per metric from the tolerance ratio
//! - **Reference Resolution**: every historical reference JSON shape folded into one document
//! - **Band Normalization**: analysis band names mapped onto the canonical 8-band schema
//! - **Weighted Aggregation**: legacy or equal category weights, renormalized over what was scored
//! - **Safety Gates**: clipped tracks cannot score high on loudness, dynamics or technical
//! - **Suggestions**: directional, magnitude-scaled fixes with EQ hints for bands
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mq_score::{MetricsVector, MixScorer, ScoringConfig, resolve_reference};
//!
//! let reference = resolve_reference("pop", &payload)?;
//! let metrics = MetricsVector::from_json(&analysis_json)?;
//!
//! let scorer = MixScorer::new(ScoringConfig::legacy());
//! let result = scorer.score(&metrics, &reference);
//! println!("{:?} ({})", result.overall_score_pct, result.classification);
//! ```
//!
//! The engine does no I/O and holds no global state; everything that changes
//! behavior is on [`ScoringConfig`].

pub mod aggregate;
pub mod bands;
pub mod classify;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod reference;
pub mod safety;
pub mod scorers;
pub mod suggest;

mod error;

pub use aggregate::{Aggregate, QualityLabel, aggregate};
pub use bands::{Band, BandInfo, BandScale, BandStatus, NormalizedBands, normalize_bands};
pub use classify::{RATIO_EPSILON, Status, Tolerance, ToleranceClassification, classify};
pub use config::{DynamicRangePolicy, ScoreCurve, ScoringConfig, TechnicalLimits, WeightingStrategy};
pub use engine::{MixScorer, ReferenceInput, ScoringMethod, ScoringResult, compute_mix_score};
pub use error::{ScoreError, ScoreResult, ScoreWarning};
pub use metrics::{Category, MetricKey, MetricsVector};
pub use reference::{
    BandTarget, MetricTarget, ReferenceDocument, ReferenceResolver, SchemaVariant,
    normalize_genre_key, resolve_reference,
};
pub use safety::{ClippingState, GateAction, PeakAssessment, assess_peaks};
pub use scorers::DynamicRangeSource;
pub use suggest::{Direction, EqHint, Suggestion, Urgency, generate_suggestions};
