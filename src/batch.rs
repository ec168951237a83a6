//! Batch evaluation of (mask, image) pairs discovered on disk
//!
//! Images are paired with masks by a site identifier at the start of the
//! image file name: `site_07_v2.png` pairs with `<mask_dir>/site_07.tif`.
//! Every pair is swept independently; a failing pair is logged and recorded
//! without aborting the batch.

use crate::{
    config::BatchConfig,
    error::{BoundaryError, Result},
    metrics::{round_to, BoundaryMetric},
    report::{mean, sample_std},
    services::{BatchProgress, ImageIOService, NoOpProgressReporter, ProgressReporter},
    types::ToleranceCurve,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Digits kept in batch-level AUC statistics
pub const SUMMARY_DECIMALS: i32 = 6;

/// One candidate image paired with its ground-truth mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePair {
    pub image_path: PathBuf,
    pub mask_path: PathBuf,
    pub site_id: String,
    /// Image file name, used as the row identifier
    pub filename: String,
}

/// Why a discovered image was not evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// File name does not start with the site prefix and digits
    NoSiteId,
    /// The paired mask raster does not exist
    MissingMask { mask_path: PathBuf },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSiteId => write!(f, "could not extract site id"),
            Self::MissingMask { mask_path } => write!(f, "mask {} not found", mask_path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedInput {
    pub path: PathBuf,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Result of scanning the image directory
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Evaluable pairs, sorted by image path
    pub pairs: Vec<SamplePair>,
    pub skipped: Vec<SkippedInput>,
}

/// Per-pair headline row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleResult {
    pub filename: String,
    pub site_id: String,
    /// File name of the mask raster
    pub mask_source: String,
    pub auc_bas: f64,
    pub sanity_tolerance: u32,
    pub f1_at_sanity: f64,
}

/// One (pair, tolerance) point of the long-form curve table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveRow {
    pub filename: String,
    pub site_id: String,
    pub tolerance_px: u32,
    pub boundary_f1: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFailure {
    pub filename: String,
    pub error: String,
}

/// Batch-level AUC statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub n_samples: usize,
    pub mean_auc: f64,
    /// Sample standard deviation, 0 for fewer than two samples
    pub std_auc: f64,
    pub pairing_regex: String,
    pub n_failed: usize,
    pub n_skipped: usize,
    pub generated_at: DateTime<Utc>,
}

/// Everything a batch run produced, rows in discovery order
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub results: Vec<SampleResult>,
    pub curve_rows: Vec<CurveRow>,
    pub failures: Vec<SampleFailure>,
    pub skipped: Vec<SkippedInput>,
    pub summary: BatchSummary,
}

/// Full evaluation of one pair
#[derive(Debug, Clone)]
pub struct PairEvaluation {
    pub sample: SampleResult,
    pub curve: ToleranceCurve,
}

impl PairEvaluation {
    /// Long-form rows, one per swept tolerance
    #[must_use]
    pub fn curve_rows(&self) -> Vec<CurveRow> {
        self.curve
            .points()
            .map(|(tolerance_px, boundary_f1)| CurveRow {
                filename: self.sample.filename.clone(),
                site_id: self.sample.site_id.clone(),
                tolerance_px,
                boundary_f1,
            })
            .collect()
    }
}

/// Site identifier at the start of `stem`: `prefix` (any case) then digits
///
/// Returns the matched text as written in the file name.
#[must_use]
pub fn extract_site_id(stem: &str, prefix: &str) -> Option<String> {
    let head = stem.get(..prefix.len())?;
    if prefix.is_empty() || !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let digits = stem
        .get(prefix.len()..)?
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    stem.get(..prefix.len() + digits).map(str::to_string)
}

/// Find candidate images and pair them with masks
///
/// # Errors
/// - `BoundaryError::InvalidConfig` for an invalid batch configuration
/// - `BoundaryError::Io` when the image directory does not exist
pub fn discover_pairs(config: &BatchConfig) -> Result<Discovery> {
    config.validate()?;

    if !config.image_dir.is_dir() {
        return Err(BoundaryError::file_io_error(
            "scan image directory",
            &config.image_dir,
            &std::io::Error::new(std::io::ErrorKind::NotFound, "directory does not exist"),
        ));
    }

    let pattern = config
        .pattern
        .as_deref()
        .map(glob::Pattern::new)
        .transpose()
        .map_err(|e| BoundaryError::invalid_config(format!("invalid image pattern: {}", e)))?;

    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let mut images: Vec<PathBuf> = WalkDir::new(&config.image_dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            },
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| has_extension(path, &config.image_extensions))
        .filter(|path| {
            pattern.as_ref().map_or(true, |p| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| p.matches(name))
            })
        })
        .collect();
    images.sort();

    let mut discovery = Discovery::default();
    for image_path in images {
        let stem = image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        let Some(site_id) = extract_site_id(stem, &config.site_prefix) else {
            warn!(path = %image_path.display(), "could not extract site id, skipping");
            discovery.skipped.push(SkippedInput {
                path: image_path,
                reason: SkipReason::NoSiteId,
            });
            continue;
        };

        let mask_path = config
            .mask_dir
            .join(format!("{}.{}", site_id, config.mask_extension));
        if !mask_path.exists() {
            warn!(
                image = %image_path.display(),
                mask = %mask_path.display(),
                "mask not found, skipping"
            );
            discovery.skipped.push(SkippedInput {
                path: image_path,
                reason: SkipReason::MissingMask { mask_path },
            });
            continue;
        }

        let filename = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        discovery.pairs.push(SamplePair {
            image_path,
            mask_path,
            site_id,
            filename,
        });
    }

    debug!(
        pairs = discovery.pairs.len(),
        skipped = discovery.skipped.len(),
        "input discovery complete"
    );
    Ok(discovery)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Load, sweep and score one pair
pub fn evaluate_pair(metric: &BoundaryMetric, pair: &SamplePair) -> Result<PairEvaluation> {
    let _span = tracing::info_span!("pair", file = %pair.filename, site = %pair.site_id).entered();

    let mask = ImageIOService::load_mask(&pair.mask_path)?;
    let image = ImageIOService::load_image(&pair.image_path)?;

    let curve = metric.sweep_configured(&mask, &image)?;
    let sanity_tolerance = metric.config().resolve_sanity_tolerance();
    let f1_at_sanity = match curve.f1_at(sanity_tolerance) {
        Some(f1) => f1,
        None => metric.evaluate(&mask, &image, sanity_tolerance)?.f1,
    };

    let mask_source = pair
        .mask_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(PairEvaluation {
        sample: SampleResult {
            filename: pair.filename.clone(),
            site_id: pair.site_id.clone(),
            mask_source,
            auc_bas: curve.auc,
            sanity_tolerance,
            f1_at_sanity,
        },
        curve,
    })
}

/// Batch-level statistics over successful samples
#[must_use]
pub fn summarize(
    results: &[SampleResult],
    pairing_regex: String,
    n_failed: usize,
    n_skipped: usize,
) -> BatchSummary {
    let aucs: Vec<f64> = results.iter().map(|r| r.auc_bas).collect();
    BatchSummary {
        n_samples: aucs.len(),
        mean_auc: round_to(mean(&aucs), SUMMARY_DECIMALS),
        std_auc: round_to(sample_std(&aucs), SUMMARY_DECIMALS),
        pairing_regex,
        n_failed,
        n_skipped,
        generated_at: Utc::now(),
    }
}

/// Runs the metric over every discovered pair on a bounded blocking pool
pub struct BatchEvaluator {
    metric: Arc<BoundaryMetric>,
    config: BatchConfig,
    reporter: Arc<dyn ProgressReporter>,
}

impl BatchEvaluator {
    pub fn new(metric: BoundaryMetric, config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            metric: Arc::new(metric),
            config,
            reporter: Arc::new(NoOpProgressReporter),
        })
    }

    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn metric(&self) -> &BoundaryMetric {
        &self.metric
    }

    #[must_use]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Discover pairs and evaluate all of them
    pub async fn run(&self) -> Result<BatchReport> {
        let discovery = discover_pairs(&self.config)?;
        info!(
            pairs = discovery.pairs.len(),
            skipped = discovery.skipped.len(),
            image_dir = %self.config.image_dir.display(),
            "starting batch evaluation"
        );
        Ok(self.evaluate_pairs(discovery).await)
    }

    /// Evaluate already discovered pairs, keeping discovery order in the report
    pub async fn evaluate_pairs(&self, discovery: Discovery) -> BatchReport {
        let Discovery { pairs, skipped } = discovery;
        let jobs = self.config.effective_jobs();
        let started_at = Instant::now();
        let total = pairs.len();
        self.reporter.report_start(total);

        let mut outcomes = futures::stream::iter(pairs.into_iter().map(|pair| {
            let metric = Arc::clone(&self.metric);
            async move {
                let task_pair = pair.clone();
                let result = tokio::task::spawn_blocking(move || evaluate_pair(&metric, &task_pair))
                    .await
                    .map_err(|e| BoundaryError::internal(format!("evaluation task failed: {}", e)))
                    .and_then(|r| r);
                (pair, result)
            }
        }))
        .buffered(jobs);

        let mut results = Vec::with_capacity(total);
        let mut curve_rows = Vec::new();
        let mut failures = Vec::new();
        let mut progress = BatchProgress {
            items_completed: 0,
            items_total: total,
            items_failed: 0,
            current_item_name: String::new(),
            started_at,
        };

        while let Some((pair, outcome)) = outcomes.next().await {
            match outcome {
                Ok(evaluation) => {
                    debug!(
                        file = %pair.filename,
                        auc = evaluation.sample.auc_bas,
                        f1_at_sanity = evaluation.sample.f1_at_sanity,
                        "pair evaluated"
                    );
                    curve_rows.extend(evaluation.curve_rows());
                    results.push(evaluation.sample);
                },
                Err(e) => {
                    warn!(file = %pair.filename, error = %e, "pair failed, skipping");
                    self.reporter.report_error(&pair.filename, &e.to_string());
                    progress.items_failed += 1;
                    failures.push(SampleFailure {
                        filename: pair.filename.clone(),
                        error: e.to_string(),
                    });
                },
            }
            progress.items_completed += 1;
            progress.current_item_name = pair.filename;
            self.reporter.report_progress(&progress);
        }

        let summary = summarize(
            &results,
            self.config.pairing_regex(),
            failures.len(),
            skipped.len(),
        );
        self.reporter.report_completion(&progress);
        info!(
            n_samples = summary.n_samples,
            mean_auc = summary.mean_auc,
            std_auc = summary.std_auc,
            failed = summary.n_failed,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "batch evaluation complete"
        );

        BatchReport {
            results,
            curve_rows,
            failures,
            skipped,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_extract_site_id() {
        assert_eq!(extract_site_id("site_01_v2", "site_"), Some("site_01".to_string()));
        assert_eq!(extract_site_id("SITE_12abc", "site_"), Some("SITE_12".to_string()));
        assert_eq!(extract_site_id("site_0042", "site_"), Some("site_0042".to_string()));
        assert_eq!(extract_site_id("site_v1", "site_"), None);
        assert_eq!(extract_site_id("my_site_01", "site_"), None);
        assert_eq!(extract_site_id("site", "site_"), None);
        assert_eq!(extract_site_id("plot7", "plot"), Some("plot7".to_string()));
    }

    #[test]
    fn test_discovery_pairs_and_skips() {
        let dir = tempdir().unwrap();
        let masks = dir.path().join("rasters");
        let images = dir.path().join("images");
        std::fs::create_dir_all(&masks).unwrap();
        std::fs::create_dir_all(images.join("nested")).unwrap();

        std::fs::write(masks.join("site_01.tif"), b"").unwrap();
        for name in ["site_01_v2.png", "site_01_v1.jpg", "site_02_v1.png", "overview.png", "notes.txt"] {
            std::fs::write(images.join(name), b"").unwrap();
        }
        std::fs::write(images.join("nested").join("site_01_v3.png"), b"").unwrap();

        let config = BatchConfig::default()
            .with_mask_dir(&masks)
            .with_image_dir(&images);
        let discovery = discover_pairs(&config).unwrap();

        let names: Vec<_> = discovery.pairs.iter().map(|p| p.filename.as_str()).collect();
        assert_eq!(names, vec!["site_01_v1.jpg", "site_01_v2.png"]);
        assert!(discovery.pairs.iter().all(|p| p.mask_path == masks.join("site_01.tif")));

        assert_eq!(discovery.skipped.len(), 2);
        assert!(discovery
            .skipped
            .iter()
            .any(|s| s.reason == SkipReason::NoSiteId));

        let recursive = discover_pairs(&config.clone().with_recursive(true)).unwrap();
        assert_eq!(recursive.pairs.len(), 3);

        let filtered = discover_pairs(&config.with_pattern(Some("*_v2.*".to_string()))).unwrap();
        assert_eq!(filtered.pairs.len(), 1);
        assert_eq!(filtered.pairs[0].filename, "site_01_v2.png");
    }

    #[test]
    fn test_discovery_requires_image_dir() {
        let dir = tempdir().unwrap();
        let config = BatchConfig::default().with_image_dir(dir.path().join("missing"));
        assert!(matches!(discover_pairs(&config), Err(BoundaryError::Io(_))));
    }

    #[test]
    fn test_summary_statistics() {
        let sample = |auc: f64| SampleResult {
            filename: "a.png".to_string(),
            site_id: "site_01".to_string(),
            mask_source: "site_01.tif".to_string(),
            auc_bas: auc,
            sanity_tolerance: 3,
            f1_at_sanity: 0.5,
        };

        let single = summarize(&[sample(2.5)], r"^(site_\d+)".to_string(), 0, 0);
        assert_eq!(single.n_samples, 1);
        assert_eq!(single.mean_auc, 2.5);
        assert_eq!(single.std_auc, 0.0);

        let pair = summarize(&[sample(1.0), sample(3.0)], String::new(), 1, 2);
        assert_eq!(pair.mean_auc, 2.0);
        assert!((pair.std_auc - 1.414_214).abs() < 1e-9);
        assert_eq!((pair.n_failed, pair.n_skipped), (1, 2));
    }

    #[test]
    fn test_skip_reason_serialization() {
        let skipped = SkippedInput {
            path: PathBuf::from("images/overview.png"),
            reason: SkipReason::NoSiteId,
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["reason"], "no_site_id");
        assert_eq!(json["path"], "images/overview.png");
    }
}
