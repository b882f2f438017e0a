//! MixScore command line
//!
//! Usage:
//!   mixq score track.json --genre pop --refs refs/       - Score one analysis file
//!   mixq batch a.json b.json --genre pop --refs refs/    - Score many files in parallel
//!   mixq resolve --genre pop --refs refs/                - Show the resolved reference
//!   mixq config                                          - Show the effective configuration
//!
//! `RUST_LOG=debug` shows resolver and scorer decisions.

mod report;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use mq_refstore::ReferenceStore;
use mq_score::{
    DynamicRangePolicy, MetricsVector, MixScorer, ReferenceDocument, ScoringConfig,
    WeightingStrategy,
};
use rayon::prelude::*;
use report::{BatchReport, BatchRow, ReportFormat};

#[derive(Parser)]
#[command(name = "mixq", about = "Score mixes against genre reference statistics")]
struct Cli {
    /// Scoring configuration (JSON); missing fields take defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Start from a named preset instead of the defaults
    #[arg(long, global = true, value_enum)]
    preset: Option<Preset>,

    /// Override the category weighting
    #[arg(long, global = true, value_enum)]
    weighting: Option<Weighting>,

    /// Override the dynamic-range estimator
    #[arg(long, global = true, value_enum)]
    dr_source: Option<DrSource>,

    /// Do not cap sub-scores of clipped tracks
    #[arg(long, global = true)]
    no_safety_gates: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: ReportFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where references come from
#[derive(clap::Args)]
struct RefArgs {
    /// Genre key
    #[arg(short, long)]
    genre: String,

    /// Directory of `{genre}.json` reference documents
    #[arg(short, long, default_value = "refs")]
    refs: PathBuf,

    /// Multi-genre bundle used when the genre file is missing
    #[arg(long)]
    bundle: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one analysis file
    Score {
        /// Metrics JSON produced by the analysis pipeline
        metrics: PathBuf,

        #[command(flatten)]
        refs: RefArgs,

        /// Exit with an error when the overall score is below this value
        #[arg(long)]
        min_score: Option<f64>,
    },
    /// Score many analysis files in parallel
    Batch {
        /// Metrics JSON files
        #[arg(required = true)]
        metrics: Vec<PathBuf>,

        #[command(flatten)]
        refs: RefArgs,
    },
    /// Show the resolved reference for a genre
    Resolve {
        #[command(flatten)]
        refs: RefArgs,
    },
    /// Show the effective scoring configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Default,
    Legacy,
    Strict,
}

#[derive(Clone, Copy, ValueEnum)]
enum Weighting {
    Legacy,
    Equal,
}

#[derive(Clone, Copy, ValueEnum)]
enum DrSource {
    Auto,
    TtDr,
    DrStat,
    CrestFactor,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let report = match &cli.command {
        Commands::Score {
            metrics,
            refs,
            min_score,
        } => score_one(&config, metrics, refs, *min_score, cli.format, cli.output.as_deref())?,
        Commands::Batch { metrics, refs } => score_batch(&config, metrics, refs, cli.format)?,
        Commands::Resolve { refs } => {
            let doc = open_store(&config, refs).load(&refs.genre)?;
            report::render_reference(&doc, cli.format)
        }
        Commands::Config => serde_json::to_string_pretty(&config)?,
    };

    emit(&report, cli.output.as_deref())
}

fn build_config(cli: &Cli) -> Result<ScoringConfig> {
    let mut config = match (&cli.config, cli.preset) {
        (Some(path), _) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            ScoringConfig::from_json(&json)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        (None, Some(Preset::Legacy)) => ScoringConfig::legacy(),
        (None, Some(Preset::Strict)) => ScoringConfig::strict(),
        (None, _) => ScoringConfig::default(),
    };

    if let Some(weighting) = cli.weighting {
        config = config.with_weighting(match weighting {
            Weighting::Legacy => WeightingStrategy::Legacy,
            Weighting::Equal => WeightingStrategy::EqualWeight,
        });
    }
    if let Some(source) = cli.dr_source {
        config = config.with_dynamic_range(match source {
            DrSource::Auto => DynamicRangePolicy::Auto,
            DrSource::TtDr => DynamicRangePolicy::TtDr,
            DrSource::DrStat => DynamicRangePolicy::DrStat,
            DrSource::CrestFactor => DynamicRangePolicy::CrestFactor,
        });
    }
    if cli.no_safety_gates {
        config = config.with_safety_gates(false);
    }

    log::debug!("scoring config: {:?}", config);
    Ok(config)
}

fn open_store(config: &ScoringConfig, refs: &RefArgs) -> ReferenceStore {
    let store = ReferenceStore::new(&refs.refs).with_config(config);
    match &refs.bundle {
        Some(bundle) => store.with_fallback_bundle(bundle),
        None => store,
    }
}

fn load_metrics(path: &Path) -> Result<MetricsVector> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read metrics {}", path.display()))?;
    MetricsVector::from_json(&json).with_context(|| format!("Invalid metrics {}", path.display()))
}

fn score_one(
    config: &ScoringConfig,
    metrics_path: &Path,
    refs: &RefArgs,
    min_score: Option<f64>,
    format: ReportFormat,
    output: Option<&Path>,
) -> Result<String> {
    let doc = open_store(config, refs)
        .load(&refs.genre)
        .with_context(|| format!("Failed to load reference for {}", refs.genre))?;
    let metrics = load_metrics(metrics_path)?;
    let result = MixScorer::new(config.clone()).score(&metrics, &doc);
    let report = report::render(&result, format);

    if let Some(min) = min_score {
        let overall = result.overall_score_pct.unwrap_or(0.0);
        if overall < min {
            emit(&report, output)?;
            bail!("Overall score {:.1} is below the minimum {:.1}", overall, min);
        }
    }
    Ok(report)
}

fn score_batch(
    config: &ScoringConfig,
    paths: &[PathBuf],
    refs: &RefArgs,
    format: ReportFormat,
) -> Result<String> {
    let doc: std::sync::Arc<ReferenceDocument> = open_store(config, refs)
        .load(&refs.genre)
        .with_context(|| format!("Failed to load reference for {}", refs.genre))?;
    let scorer = MixScorer::new(config.clone());

    let rows: Vec<BatchRow> = paths
        .par_iter()
        .map(|path| match load_metrics(path) {
            Ok(metrics) => BatchRow::scored(path, scorer.score(&metrics, &doc)),
            Err(e) => {
                log::warn!("[Batch] {}: {:#}", path.display(), e);
                BatchRow::failed(path, &e)
            }
        })
        .collect();

    let report = BatchReport::new(doc.genre.clone(), rows);
    log::info!(
        "[Batch] {} files, {} scored, {} failed",
        report.total,
        report.scored,
        report.failed
    );
    Ok(report.generate(format))
}

fn emit(report: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => fs::write(path, report)
            .with_context(|| format!("Failed to write report {}", path.display())),
        None => {
            println!("{}", report);
            Ok(())
        }
    }
}
