#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Boundary Adherence
//!
//! Scores how well edges detected in a generated image follow the region
//! boundaries of a ground-truth mask, within a pixel tolerance.
//!
//! Two layers:
//!
//! - **Boundary metric** ([`BoundaryMetric::evaluate`]): extracts a boundary
//!   map from the mask (label transitions by default) and Canny edges from
//!   the candidate's luminance, grows each by the tolerance, and reports
//!   precision, recall and F1.
//! - **Tolerance curve** ([`BoundaryMetric::sweep`]): F1 over an ordered
//!   tolerance list, summarized by the trapezoidal area under the curve
//!   (AUC-BAS).
//!
//! Around them sit raster loading, batch pairing of images with site masks,
//! CSV/JSON reports and per-tolerance curve statistics.
//!
//! ## Quick Start
//!
//! ```rust
//! use boundary_adherence::{BoundaryMetric, CandidateImage, LabelSurface};
//! use ndarray::{s, Array2, Array3};
//!
//! let mut labels = Array2::<i64>::zeros((64, 64));
//! labels.slice_mut(s![16..48, 16..48]).fill(1);
//! let mask = LabelSurface::DiscreteLabels(labels);
//!
//! let mut rgb = Array3::<f64>::zeros((64, 64, 3));
//! rgb.slice_mut(s![17..49, 17..49, ..]).fill(0.8);
//! let image = CandidateImage::Color(rgb);
//!
//! let metric = BoundaryMetric::default();
//! let record = metric.evaluate(&mask, &image, 3)?;
//! assert!(record.f1 > 0.9);
//!
//! let curve = metric.sweep(&mask, &image, &[1, 2, 3, 4, 5])?;
//! assert_eq!(curve.tolerances, vec![1, 2, 3, 4, 5]);
//! # Ok::<(), boundary_adherence::BoundaryError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): the `bas-eval` binary, tracing subscriber setup and
//!   progress bars
//! - `tracing-json`: JSON log output for the CLI

pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod curve;
pub mod edges;
pub mod error;
pub mod metrics;
pub mod morphology;
pub mod report;
pub mod services;
pub mod synthetic;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

use std::path::Path;

// Public API exports
pub use batch::{
    discover_pairs, extract_site_id, BatchEvaluator, BatchReport, BatchSummary, CurveRow,
    SampleFailure, SamplePair, SampleResult, SkipReason,
};
pub use config::{BatchConfig, BoundaryStrategy, MetricConfig, MetricConfigBuilder};
pub use curve::{sweep, trapezoid};
pub use edges::{canny, CannyConfig};
pub use error::{BoundaryError, Result};
pub use metrics::{evaluate, BoundaryMetric, PreparedPair, EPSILON};
pub use report::{write_batch_outputs, CurveStatistics};
pub use services::{ImageIOService, NoOpProgressReporter, ProgressReporter};
pub use synthetic::SyntheticSquare;
pub use types::{
    BoundaryMap, BoundaryScoreRecord, CandidateImage, LabelSurface, ToleranceBuffer,
    ToleranceCurve,
};

#[cfg(feature = "cli")]
pub use tracing_config::{events, init_cli_tracing, spans, TracingConfig, TracingFormat};

/// Sweep one mask/image pair read from disk
///
/// Returns the tolerance curve and the record at the configured sanity
/// tolerance.
///
/// # Examples
/// ```rust,no_run
/// use boundary_adherence::{evaluate_files, MetricConfig};
///
/// let (curve, sanity) = evaluate_files(
///     "data/rasters/site_01.tif",
///     "data/outputs/images/site_01_v1.png",
///     &MetricConfig::default(),
/// )?;
/// println!("AUC-BAS {:.4}, F1@{} {:.4}", curve.auc, sanity.tolerance_used, sanity.f1);
/// # Ok::<(), boundary_adherence::BoundaryError>(())
/// ```
pub fn evaluate_files<P: AsRef<Path>, Q: AsRef<Path>>(
    mask_path: P,
    image_path: Q,
    config: &MetricConfig,
) -> Result<(ToleranceCurve, BoundaryScoreRecord)> {
    let metric = BoundaryMetric::new(config.clone())?;
    let mask = ImageIOService::load_mask(mask_path)?;
    let image = ImageIOService::load_image(image_path)?;

    let curve = metric.sweep_configured(&mask, &image)?;
    let sanity = metric.evaluate(&mask, &image, config.resolve_sanity_tolerance())?;
    Ok((curve, sanity))
}

/// Discover, evaluate and report a whole batch
///
/// Outputs are written only when at least one pair succeeded.
pub async fn evaluate_batch(
    metric_config: MetricConfig,
    batch_config: BatchConfig,
) -> Result<BatchReport> {
    let sanity_tolerance = metric_config.resolve_sanity_tolerance();
    let output_dir = batch_config.output_dir.clone();

    let evaluator = BatchEvaluator::new(BoundaryMetric::new(metric_config)?, batch_config)?;
    let report = evaluator.run().await?;

    if !report.results.is_empty() {
        write_batch_outputs(&report, &output_dir, sanity_tolerance)?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_compiles() {
        let _metric = BoundaryMetric::default();
        let _config = BatchConfig::default();
    }

    #[test]
    fn test_evaluate_files_missing_input() {
        let err = evaluate_files("missing.tif", "missing.png", &MetricConfig::default()).unwrap_err();
        assert!(matches!(err, BoundaryError::Io(_)));
    }
}
