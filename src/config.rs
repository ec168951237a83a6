//! Configuration types for boundary adherence scoring

use crate::edges::{CannyConfig, DEFAULT_EDGE_SIGMA, DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD};
use crate::error::{BoundaryError, Result};
use crate::services::ImageIOService;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tolerance sweep used when none is configured, in pixels
pub const DEFAULT_TOLERANCES: [u32; 5] = [1, 2, 3, 4, 5];

/// Preferred headline tolerance when it appears in the sweep
pub const PREFERRED_SANITY_TOLERANCE: u32 = 3;

/// How the ground-truth boundary is extracted
///
/// The two conventions are not numerically interchangeable: label transitions
/// give sharp two-pixel-wide boundaries, gradient edges give thin smoothed
/// contours found by the same detector used on the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryStrategy {
    /// Thick boundaries between differing labels (default)
    #[default]
    LabelTransitions,
    /// Canny edges on the mask's intensity surface
    GradientEdges,
}

impl std::fmt::Display for BoundaryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LabelTransitions => write!(f, "label-transitions"),
            Self::GradientEdges => write!(f, "gradient-edges"),
        }
    }
}

impl std::str::FromStr for BoundaryStrategy {
    type Err = BoundaryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "label-transitions" | "labels" => Ok(Self::LabelTransitions),
            "gradient-edges" | "gradient" | "canny" => Ok(Self::GradientEdges),
            other => Err(BoundaryError::invalid_config(format!(
                "unknown boundary strategy '{}' (expected label-transitions or gradient-edges)",
                other
            ))),
        }
    }
}

/// Parameters of the boundary metric and the tolerance sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Gaussian smoothing for candidate edge detection, in pixels
    pub edge_sigma: f64,

    /// Hysteresis low threshold on the `[0, 1]` intensity scale
    pub low_threshold: f64,

    /// Hysteresis high threshold on the `[0, 1]` intensity scale
    pub high_threshold: f64,

    /// Ground-truth boundary extraction convention
    pub ground_truth_strategy: BoundaryStrategy,

    /// Tolerances swept per pair, order and duplicates preserved
    pub tolerances: Vec<u32>,

    /// Headline tolerance; `None` picks one from `tolerances`
    pub sanity_tolerance: Option<u32>,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            edge_sigma: DEFAULT_EDGE_SIGMA,
            low_threshold: DEFAULT_LOW_THRESHOLD,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
            ground_truth_strategy: BoundaryStrategy::default(),
            tolerances: DEFAULT_TOLERANCES.to_vec(),
            sanity_tolerance: None,
        }
    }
}

impl MetricConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use boundary_adherence::{BoundaryStrategy, MetricConfig};
    ///
    /// let config = MetricConfig::builder()
    ///     .edge_sigma(1.5)
    ///     .tolerances(vec![0, 2, 4, 8])
    ///     .ground_truth_strategy(BoundaryStrategy::GradientEdges)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.resolve_sanity_tolerance(), 4);
    /// ```
    #[must_use]
    pub fn builder() -> MetricConfigBuilder {
        MetricConfigBuilder::default()
    }

    /// Edge detector parameters for a given smoothing sigma
    #[must_use]
    pub fn canny_config(&self, edge_sigma: f64) -> CannyConfig {
        CannyConfig {
            sigma: edge_sigma,
            low_threshold: self.low_threshold,
            high_threshold: self.high_threshold,
        }
    }

    /// Tolerance used for the single headline F1 score
    ///
    /// An explicit `sanity_tolerance` wins. Otherwise 3 when it appears in the
    /// sweep, else the middle entry of the sweep.
    #[must_use]
    pub fn resolve_sanity_tolerance(&self) -> u32 {
        if let Some(tolerance) = self.sanity_tolerance {
            return tolerance;
        }
        if self.tolerances.contains(&PREFERRED_SANITY_TOLERANCE) {
            return PREFERRED_SANITY_TOLERANCE;
        }
        self.tolerances
            .get(self.tolerances.len() / 2)
            .copied()
            .unwrap_or(PREFERRED_SANITY_TOLERANCE)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - `edge_sigma` not finite or not positive
    /// - thresholds negative, non-finite, or `high < low`
    /// - empty tolerance list
    pub fn validate(&self) -> Result<()> {
        self.canny_config(self.edge_sigma).validate()?;

        if self.tolerances.is_empty() {
            return Err(BoundaryError::invalid_config(
                "tolerance list must not be empty",
            ));
        }

        Ok(())
    }
}

/// Builder for `MetricConfig`
#[derive(Debug, Default)]
pub struct MetricConfigBuilder {
    config: MetricConfig,
}

impl MetricConfigBuilder {
    #[must_use]
    pub fn edge_sigma(mut self, sigma: f64) -> Self {
        self.config.edge_sigma = sigma;
        self
    }

    #[must_use]
    pub fn thresholds(mut self, low: f64, high: f64) -> Self {
        self.config.low_threshold = low;
        self.config.high_threshold = high;
        self
    }

    #[must_use]
    pub fn ground_truth_strategy(mut self, strategy: BoundaryStrategy) -> Self {
        self.config.ground_truth_strategy = strategy;
        self
    }

    #[must_use]
    pub fn tolerances(mut self, tolerances: Vec<u32>) -> Self {
        self.config.tolerances = tolerances;
        self
    }

    #[must_use]
    pub fn sanity_tolerance(mut self, tolerance: Option<u32>) -> Self {
        self.config.sanity_tolerance = tolerance;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<MetricConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

/// Locations and discovery rules for batch evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Directory holding `<site_id>.<mask_extension>` ground-truth rasters
    pub mask_dir: PathBuf,

    /// Directory scanned for candidate images
    pub image_dir: PathBuf,

    /// Directory receiving CSV and JSON outputs
    pub output_dir: PathBuf,

    /// Prefix of the site identifier, matched case-insensitively
    pub site_prefix: String,

    /// Extension of mask rasters, without the dot
    pub mask_extension: String,

    /// Candidate image extensions, without the dot
    pub image_extensions: Vec<String>,

    /// Descend into subdirectories of `image_dir`
    pub recursive: bool,

    /// Optional glob on image file names, e.g. `site_0*_v2.png`
    pub pattern: Option<String>,

    /// Concurrent pair evaluations (0 = available parallelism)
    pub jobs: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            mask_dir: PathBuf::from("data/rasters"),
            image_dir: PathBuf::from("data/outputs/images"),
            output_dir: PathBuf::from("data/outputs/batch_metrics"),
            site_prefix: "site_".to_string(),
            mask_extension: "tif".to_string(),
            image_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
            recursive: false,
            pattern: None,
            jobs: 0,
        }
    }
}

impl BatchConfig {
    #[must_use]
    pub fn with_mask_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.mask_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_image_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.image_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_site_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.site_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_mask_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.mask_extension = extension.into();
        self
    }

    #[must_use]
    pub fn with_image_extensions(mut self, extensions: Vec<String>) -> Self {
        self.image_extensions = extensions;
        self
    }

    #[must_use]
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: Option<String>) -> Self {
        self.pattern = pattern;
        self
    }

    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Number of workers after resolving `0` to the available parallelism
    #[must_use]
    pub fn effective_jobs(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }

    /// Pairing rule in regular-expression notation, recorded in summaries
    #[must_use]
    pub fn pairing_regex(&self) -> String {
        format!("^({}\\d+)", self.site_prefix)
    }

    pub fn validate(&self) -> Result<()> {
        if self.site_prefix.is_empty() {
            return Err(BoundaryError::invalid_config("site prefix must not be empty"));
        }
        if self.mask_extension.is_empty() || self.mask_extension.starts_with('.') {
            return Err(BoundaryError::config_value_error(
                "mask extension",
                format!("'{}'", self.mask_extension),
                "non-empty, without leading dot",
                Some("'tif'".to_string()),
            ));
        }
        if !ImageIOService::is_supported_extension(&self.mask_extension) {
            return Err(BoundaryError::config_value_error(
                "mask extension",
                format!("'{}'", self.mask_extension),
                "a decodable raster format (png, jpg, jpeg, tif, tiff)",
                Some("'tif'".to_string()),
            ));
        }
        if self.image_extensions.is_empty() {
            return Err(BoundaryError::invalid_config(
                "at least one image extension is required",
            ));
        }
        if let Some(ext) = self
            .image_extensions
            .iter()
            .find(|ext| !ImageIOService::is_supported_extension(ext))
        {
            return Err(BoundaryError::config_value_error(
                "image extension",
                format!("'{}'", ext),
                "a decodable raster format (png, jpg, jpeg, tif, tiff)",
                Some("'png'".to_string()),
            ));
        }
        if let Some(pattern) = &self.pattern {
            glob::Pattern::new(pattern).map_err(|e| {
                BoundaryError::invalid_config(format!("invalid image pattern '{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }
}
