//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{EvaluateArgs, MetricArgs};
use crate::config::{BatchConfig, MetricConfig};
use anyhow::{Context, Result};

/// Convert CLI arguments to library configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build a validated `MetricConfig` from metric arguments
    pub(crate) fn metric_config(args: &MetricArgs) -> Result<MetricConfig> {
        MetricConfig::builder()
            .tolerances(args.tolerances.clone())
            .edge_sigma(args.edge_sigma)
            .thresholds(args.low_threshold, args.high_threshold)
            .ground_truth_strategy(args.ground_truth.into())
            .sanity_tolerance(args.sanity_tolerance)
            .build()
            .context("Metric parameters out of range")
    }

    /// Build a validated `BatchConfig` from evaluate arguments
    pub(crate) fn batch_config(args: &EvaluateArgs) -> Result<BatchConfig> {
        let config = BatchConfig::default()
            .with_mask_dir(&args.mask_dir)
            .with_image_dir(&args.image_dir)
            .with_output_dir(&args.output_dir)
            .with_site_prefix(args.site_prefix.clone())
            .with_mask_extension(args.mask_extension.trim_start_matches('.'))
            .with_image_extensions(
                args.image_extensions
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                    .collect(),
            )
            .with_recursive(args.recursive)
            .with_pattern(args.pattern.clone())
            .with_jobs(args.jobs);
        config.validate()?;
        Ok(config)
    }

    /// Reject argument combinations that cannot produce outputs
    pub(crate) fn validate_evaluate(args: &EvaluateArgs) -> Result<()> {
        if args.output_dir.is_file() {
            anyhow::bail!(
                "Output path exists and is a file, not a directory: {}",
                args.output_dir.display()
            );
        }
        if !args.mask_dir.is_dir() {
            anyhow::bail!("Mask directory not found: {}", args.mask_dir.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, CliStrategy, Command};
    use crate::config::BoundaryStrategy;
    use clap::Parser;

    fn evaluate_args(extra: &[&str]) -> EvaluateArgs {
        let mut argv = vec!["bas-eval", "evaluate"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Evaluate(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_metric_config_from_cli() {
        let mut args = evaluate_args(&["-t", "0,4,8", "--sanity-tolerance", "8"]).metric;
        args.ground_truth = CliStrategy::GradientEdges;

        let config = CliConfigBuilder::metric_config(&args).unwrap();
        assert_eq!(config.tolerances, vec![0, 4, 8]);
        assert_eq!(config.resolve_sanity_tolerance(), 8);
        assert_eq!(config.ground_truth_strategy, BoundaryStrategy::GradientEdges);

        args.edge_sigma = 0.0;
        assert!(CliConfigBuilder::metric_config(&args).is_err());
    }

    #[test]
    fn test_batch_config_normalizes_extensions() {
        let args = evaluate_args(&["--mask-extension", ".tiff", "--image-extensions", ".PNG,jpg"]);
        let config = CliConfigBuilder::batch_config(&args).unwrap();
        assert_eq!(config.mask_extension, "tiff");
        assert_eq!(config.image_extensions, vec!["png", "jpg"]);
    }

    #[test]
    fn test_validate_evaluate_requires_mask_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let args = evaluate_args(&["--mask-dir", missing.to_str().unwrap()]);
        assert!(CliConfigBuilder::validate_evaluate(&args).is_err());

        let args = evaluate_args(&["--mask-dir", dir.path().to_str().unwrap()]);
        assert!(CliConfigBuilder::validate_evaluate(&args).is_ok());
    }
}
