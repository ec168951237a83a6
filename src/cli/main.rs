//! Boundary Adherence CLI Tool
//!
//! Batch evaluation of generated images against ground-truth masks, single
//! pair scoring, curve statistics, and synthetic test data.

use super::config::CliConfigBuilder;
use crate::{
    batch::{discover_pairs, BatchEvaluator},
    config::BoundaryStrategy,
    metrics::BoundaryMetric,
    report::{read_curve_points, write_batch_outputs, CurveStatistics},
    services::{BatchProgress, ImageIOService, NoOpProgressReporter, ProgressReporter},
    synthetic::SyntheticSquare,
    tracing_config::{events, init_cli_tracing, spans, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::{path::PathBuf, sync::Arc, time::Instant};
use tracing::{info, Instrument};

/// Boundary adherence evaluation tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bas-eval")]
pub struct Cli {
    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console, global = true)]
    pub log_format: CliLogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate every candidate image against its site mask
    Evaluate(EvaluateArgs),
    /// Score a single mask/image pair and print the curve as JSON
    Pair(PairArgs),
    /// Per-tolerance mean and SD of F1 from a long-form curve table
    Summarize(SummarizeArgs),
    /// Write a synthetic square mask/image pair
    Generate(GenerateArgs),
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Evaluate(_) => "evaluate",
            Self::Pair(_) => "pair",
            Self::Summarize(_) => "summarize",
            Self::Generate(_) => "generate",
        }
    }
}

/// Metric parameters shared by `evaluate` and `pair`
#[derive(Args, Debug, Clone)]
pub struct MetricArgs {
    /// Tolerances in pixels, comma separated, order preserved
    #[arg(short, long, value_delimiter = ',', default_value = "1,2,3,4,5")]
    pub tolerances: Vec<u32>,

    /// Gaussian sigma for candidate edge detection
    #[arg(long, default_value_t = 2.0)]
    pub edge_sigma: f64,

    /// Canny hysteresis low threshold on the [0, 1] intensity scale
    #[arg(long, default_value_t = 0.1)]
    pub low_threshold: f64,

    /// Canny hysteresis high threshold on the [0, 1] intensity scale
    #[arg(long, default_value_t = 0.2)]
    pub high_threshold: f64,

    /// Ground-truth boundary convention
    #[arg(long, value_enum, default_value_t = CliStrategy::LabelTransitions)]
    pub ground_truth: CliStrategy,

    /// Headline tolerance [default: 3 if swept, else the middle tolerance]
    #[arg(long)]
    pub sanity_tolerance: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub metric: MetricArgs,

    /// Directory of ground-truth rasters named <site_id>.<mask-extension>
    #[arg(long, default_value = "data/rasters")]
    pub mask_dir: PathBuf,

    /// Directory of candidate images
    #[arg(long, default_value = "data/outputs/images")]
    pub image_dir: PathBuf,

    /// Directory for batch_results.csv, batch_curve_long.csv and batch_summary.json
    #[arg(short, long, default_value = "data/outputs/batch_metrics")]
    pub output_dir: PathBuf,

    /// Site identifier prefix, followed by digits in image names
    #[arg(long, default_value = "site_")]
    pub site_prefix: String,

    #[arg(long, default_value = "tif")]
    pub mask_extension: String,

    /// Candidate image extensions, comma separated
    #[arg(long, value_delimiter = ',', default_value = "png,jpg,jpeg")]
    pub image_extensions: Vec<String>,

    /// Scan the image directory recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Glob on image file names (e.g., "site_0*_v2.png")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Concurrent pair evaluations (0 = all cores)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PairArgs {
    /// Ground-truth mask raster
    pub mask: PathBuf,

    /// Candidate image
    pub image: PathBuf,

    #[command(flatten)]
    pub metric: MetricArgs,

    /// Write the JSON result to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    /// Long-form curve table written by `evaluate`
    #[arg(default_value = "data/outputs/batch_metrics/batch_curve_long.csv")]
    pub input: PathBuf,

    /// Statistics JSON destination
    #[arg(short, long, default_value = "paper/figures/fig3_boundary_curve_stats.json")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(long, default_value = "data/rasters")]
    pub mask_dir: PathBuf,

    #[arg(long, default_value = "data/outputs/images")]
    pub image_dir: PathBuf,

    /// Grid side length; the mask square spans the middle half
    #[arg(long, default_value_t = 1024)]
    pub size: usize,

    /// Diagonal shift of the image square in pixels
    #[arg(long, default_value_t = 2)]
    pub offset: usize,

    #[arg(long, default_value = "site_01")]
    pub site_id: String,

    #[arg(long, default_value = "v1")]
    pub variant: String,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliStrategy {
    LabelTransitions,
    GradientEdges,
}

impl From<CliStrategy> for BoundaryStrategy {
    fn from(strategy: CliStrategy) -> Self {
        match strategy {
            CliStrategy::LabelTransitions => Self::LabelTransitions,
            CliStrategy::GradientEdges => Self::GradientEdges,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => Self::Console,
            CliLogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Self::Json,
        }
    }
}

/// Batch progress rendered with an indicatif bar
struct IndicatifProgressReporter {
    bar: ProgressBar,
}

impl IndicatifProgressReporter {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }
}

impl ProgressReporter for IndicatifProgressReporter {
    fn report_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn report_progress(&self, update: &BatchProgress) {
        self.bar.set_position(update.items_completed as u64);
        self.bar.set_message(update.current_item_name.clone());
    }

    fn report_error(&self, item: &str, error: &str) {
        self.bar.println(format!("Error processing {}: {}", item, error));
    }

    fn report_completion(&self, update: &BatchProgress) {
        self.bar.finish_with_message(format!(
            "{} pairs ({} failed)",
            update.items_completed, update.items_failed
        ));
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id =
        init_cli_tracing(cli.verbose, cli.log_format.into()).context("Failed to initialize tracing")?;
    let session = spans::session(&session_id, cli.command.name());

    let result = async {
        match &cli.command {
            Command::Evaluate(args) => run_evaluate(args).await,
            Command::Pair(args) => run_pair(args),
            Command::Summarize(args) => run_summarize(args),
            Command::Generate(args) => run_generate(args),
        }
    }
    .instrument(session)
    .await;

    if let Err(e) = &result {
        events::error_with_context(e, cli.command.name());
    }
    result
}

async fn run_evaluate(args: &EvaluateArgs) -> Result<()> {
    CliConfigBuilder::validate_evaluate(args).context("Invalid CLI arguments")?;
    let metric_config =
        CliConfigBuilder::metric_config(&args.metric).context("Invalid metric configuration")?;
    let batch_config = CliConfigBuilder::batch_config(args).context("Invalid batch configuration")?;
    let sanity_tolerance = metric_config.resolve_sanity_tolerance();

    let span = spans::batch_evaluation(&batch_config.image_dir, &metric_config.tolerances);
    async {
        let discovery = discover_pairs(&batch_config).with_context(|| {
            format!("Failed to scan images in {}", batch_config.image_dir.display())
        })?;
        if discovery.pairs.is_empty() {
            events::warning_with_recommendation(
                &format!("No evaluable images found in {}", batch_config.image_dir.display()),
                "check --image-dir, --mask-dir and --site-prefix",
            );
            anyhow::bail!("No image/mask pairs found ({} skipped)", discovery.skipped.len());
        }
        events::progress(&format!(
            "Found {} pair(s), {} skipped. Starting batch evaluation...",
            discovery.pairs.len(),
            discovery.skipped.len()
        ));

        let reporter: Arc<dyn ProgressReporter> = if args.no_progress || discovery.pairs.len() < 2 {
            Arc::new(NoOpProgressReporter)
        } else {
            Arc::new(IndicatifProgressReporter::new())
        };

        let metric = BoundaryMetric::new(metric_config)?;
        let evaluator =
            BatchEvaluator::new(metric, batch_config.clone())?.with_progress_reporter(reporter);

        let start = Instant::now();
        let report = evaluator.evaluate_pairs(discovery).await;
        events::performance_metric("batch_evaluation", start.elapsed().as_millis() as u64);

        if report.results.is_empty() {
            anyhow::bail!(
                "No pair was evaluated successfully ({} failed, {} skipped)",
                report.failures.len(),
                report.skipped.len()
            );
        }

        let paths = write_batch_outputs(&report, &batch_config.output_dir, sanity_tolerance)
            .context("Failed to write batch outputs")?;

        let summary = &report.summary;
        println!("--- Batch Complete ---");
        println!(
            "Mean AUC-BAS: {:.4} ± {:.4} (n = {})",
            summary.mean_auc, summary.std_auc, summary.n_samples
        );
        if summary.n_failed > 0 || summary.n_skipped > 0 {
            println!("Failed: {}, skipped: {}", summary.n_failed, summary.n_skipped);
        }
        println!("Saved results to {}", batch_config.output_dir.display());
        info!(
            results = %paths.results_csv.display(),
            curve = %paths.curve_csv.display(),
            summary = %paths.summary_json.display(),
            "outputs written"
        );
        Ok(())
    }
    .instrument(span)
    .await
}

fn run_pair(args: &PairArgs) -> Result<()> {
    let _span = spans::pair_evaluation(&args.mask, &args.image).entered();

    let config = CliConfigBuilder::metric_config(&args.metric).context("Invalid metric configuration")?;
    let sanity_tolerance = config.resolve_sanity_tolerance();
    let metric = BoundaryMetric::new(config)?;

    let mask = ImageIOService::load_mask(&args.mask)
        .with_context(|| format!("Failed to load mask {}", args.mask.display()))?;
    let image = ImageIOService::load_image(&args.image)
        .with_context(|| format!("Failed to load image {}", args.image.display()))?;

    let start = Instant::now();
    let curve = metric.sweep_configured(&mask, &image)?;
    let sanity = metric.evaluate(&mask, &image, sanity_tolerance)?;
    events::performance_metric("pair_sweep", start.elapsed().as_millis() as u64);

    if sanity.is_degenerate() {
        events::warning_with_recommendation(
            "an empty boundary map makes these scores low-confidence",
            "check the mask has more than one label and try a smaller --edge-sigma",
        );
    }

    let output = serde_json::json!({
        "mask": args.mask,
        "image": args.image,
        "tolerances": curve.tolerances,
        "f1_values": curve.f1_values,
        "auc_bas": curve.auc,
        "sanity": sanity,
    });
    let text = serde_json::to_string_pretty(&output)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", text))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(output = %path.display(), "pair result written");
        },
        None => println!("{}", text),
    }
    Ok(())
}

fn run_summarize(args: &SummarizeArgs) -> Result<()> {
    let points = read_curve_points(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let stats = CurveStatistics::from_points(&points);
    if stats.is_empty() {
        anyhow::bail!("No valid curve rows in {}", args.input.display());
    }

    stats
        .write_json(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!("Boundary F1 by tolerance (N >= {}):", stats.min_n());
    let rows = stats
        .tolerances
        .iter()
        .zip(&stats.mean_f1)
        .zip(&stats.sd_f1)
        .zip(stats.lower.iter().zip(&stats.upper));
    for (((tolerance, mean), sd), (lower, upper)) in rows {
        println!(
            "  {:>3} px  mean {:.4}  sd {:.4}  band [{:.4}, {:.4}]",
            tolerance, mean, sd, lower, upper
        );
    }
    println!("Statistics saved to {}", args.output.display());
    Ok(())
}

fn run_generate(args: &GenerateArgs) -> Result<()> {
    let square = SyntheticSquare::default()
        .with_size(args.size)
        .with_offset(args.offset)
        .with_site_id(args.site_id.clone())
        .with_variant(args.variant.clone());

    let paths = square
        .write(&args.mask_dir, &args.image_dir)
        .context("Failed to write synthetic data")?;

    println!("Mask:  {}", paths.mask.display());
    println!("Image: {}", paths.image.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_defaults() {
        let cli = Cli::try_parse_from(["bas-eval", "evaluate"]).unwrap();
        let Command::Evaluate(args) = cli.command else {
            panic!("expected evaluate");
        };
        assert_eq!(args.metric.tolerances, vec![1, 2, 3, 4, 5]);
        assert_eq!(args.metric.edge_sigma, 2.0);
        assert_eq!(args.metric.ground_truth, CliStrategy::LabelTransitions);
        assert_eq!(args.image_extensions, vec!["png", "jpg", "jpeg"]);
        assert_eq!(args.mask_dir, PathBuf::from("data/rasters"));
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_evaluate_overrides() {
        let cli = Cli::try_parse_from([
            "bas-eval",
            "-vv",
            "evaluate",
            "--tolerances",
            "5,1,3",
            "--edge-sigma",
            "1.5",
            "--ground-truth",
            "gradient-edges",
            "--jobs",
            "4",
            "--pattern",
            "*_v2.png",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Evaluate(args) = cli.command else {
            panic!("expected evaluate");
        };
        assert_eq!(args.metric.tolerances, vec![5, 1, 3]);
        assert_eq!(args.metric.edge_sigma, 1.5);
        assert_eq!(args.metric.ground_truth, CliStrategy::GradientEdges);
        assert_eq!(args.jobs, 4);
        assert_eq!(args.pattern.as_deref(), Some("*_v2.png"));
    }

    #[test]
    fn test_pair_requires_paths() {
        assert!(Cli::try_parse_from(["bas-eval", "pair", "mask.tif"]).is_err());

        let cli = Cli::try_parse_from(["bas-eval", "pair", "mask.tif", "image.png", "-t", "0,2"]).unwrap();
        assert_eq!(cli.command.name(), "pair");
        let Command::Pair(args) = cli.command else {
            panic!("expected pair");
        };
        assert_eq!(args.metric.tolerances, vec![0, 2]);
        assert!(args.output.is_none());
    }

    #[test]
    fn test_rejects_negative_tolerance() {
        assert!(Cli::try_parse_from(["bas-eval", "pair", "m.tif", "i.png", "-t", "1,-2"]).is_err());
    }

    #[test]
    fn test_strategy_conversion() {
        assert_eq!(
            BoundaryStrategy::from(CliStrategy::GradientEdges),
            BoundaryStrategy::GradientEdges
        );
        assert_eq!(TracingFormat::from(CliLogFormat::Compact), TracingFormat::Compact);
    }
}
