//! Boundary Metric Engine
//!
//! Scores one (ground truth, candidate, tolerance) triple. Both boundary maps
//! are extracted once per pair in [`BoundaryMetric::prepare`]; scoring a
//! tolerance then only grows the maps and counts hits, so sweeps reuse the
//! expensive edge detection.

use crate::{
    config::{BoundaryStrategy, MetricConfig},
    edges,
    error::{BoundaryError, Result},
    morphology,
    types::{BoundaryMap, BoundaryScoreRecord, CandidateImage, LabelSurface},
};
use tracing::{debug, warn};

/// Stabilizer added to every ratio denominator
pub const EPSILON: f64 = 1e-8;

/// Decimal digits kept in reported scores
pub const SCORE_DECIMALS: i32 = 4;

/// Round half away from zero to `decimals` digits
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Boundary precision/recall/F1 evaluator
#[derive(Debug, Clone, Default)]
pub struct BoundaryMetric {
    config: MetricConfig,
}

impl BoundaryMetric {
    /// Create an evaluator after validating `config`
    pub fn new(config: MetricConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// Score one tolerance with the configured edge smoothing
    pub fn evaluate(
        &self,
        mask: &LabelSurface,
        image: &CandidateImage,
        tolerance_px: u32,
    ) -> Result<BoundaryScoreRecord> {
        self.evaluate_with_sigma(mask, image, tolerance_px, self.config.edge_sigma)
    }

    /// Score one tolerance with an explicit edge smoothing sigma
    ///
    /// # Errors
    /// - `BoundaryError::Shape` when the spatial shapes disagree or the
    ///   candidate has an unsupported channel count
    /// - `BoundaryError::InvalidConfig` for a non-positive or non-finite sigma
    pub fn evaluate_with_sigma(
        &self,
        mask: &LabelSurface,
        image: &CandidateImage,
        tolerance_px: u32,
        edge_sigma: f64,
    ) -> Result<BoundaryScoreRecord> {
        Ok(self.prepare(mask, image, edge_sigma)?.score(tolerance_px))
    }

    /// Check shapes and extract both boundary maps
    ///
    /// Shape checks run before any computation. An empty boundary map is
    /// logged as a warning; scoring still proceeds with the stabilized ratios.
    pub fn prepare(
        &self,
        mask: &LabelSurface,
        image: &CandidateImage,
        edge_sigma: f64,
    ) -> Result<PreparedPair> {
        let expected = mask.dim();
        if image.spatial_dim() != expected {
            return Err(BoundaryError::shape_mismatch(
                "candidate image",
                expected,
                &image.shape(),
            ));
        }
        self.config.canny_config(edge_sigma).validate()?;

        let _span = tracing::debug_span!(
            "prepare_pair",
            height = expected.0,
            width = expected.1,
            edge_sigma
        )
        .entered();

        let candidate = self.candidate_boundary(image, edge_sigma)?;
        let ground_truth = self.ground_truth_boundary(mask, edge_sigma)?;

        if ground_truth.is_empty() || candidate.is_empty() {
            warn!(
                ground_truth_edges = ground_truth.edge_count(),
                candidate_edges = candidate.edge_count(),
                "degenerate boundary: scores are dominated by the stabilizer and are low-confidence"
            );
        }

        Ok(PreparedPair {
            ground_truth,
            candidate,
        })
    }

    /// Ground-truth boundary under the configured strategy
    pub fn ground_truth_boundary(
        &self,
        mask: &LabelSurface,
        edge_sigma: f64,
    ) -> Result<BoundaryMap> {
        match self.config.ground_truth_strategy {
            BoundaryStrategy::LabelTransitions => Ok(BoundaryMap::new(
                morphology::thick_boundaries(mask.labels().view()),
            )),
            BoundaryStrategy::GradientEdges => {
                let canny = self.config.canny_config(edge_sigma);
                edges::canny(mask.intensity().view(), &canny).map(BoundaryMap::new)
            },
        }
    }

    /// Canny edges of the candidate's luminance
    pub fn candidate_boundary(&self, image: &CandidateImage, edge_sigma: f64) -> Result<BoundaryMap> {
        let luminance = image.luminance()?;
        let canny = self.config.canny_config(edge_sigma);
        edges::canny(luminance.view(), &canny).map(BoundaryMap::new)
    }
}

/// Boundary maps of one (mask, image) pair, ready to score at any tolerance
#[derive(Debug, Clone)]
pub struct PreparedPair {
    ground_truth: BoundaryMap,
    candidate: BoundaryMap,
}

impl PreparedPair {
    #[must_use]
    pub fn ground_truth(&self) -> &BoundaryMap {
        &self.ground_truth
    }

    #[must_use]
    pub fn candidate(&self) -> &BoundaryMap {
        &self.candidate
    }

    /// Precision, recall and F1 at `tolerance_px`
    #[must_use]
    pub fn score(&self, tolerance_px: u32) -> BoundaryScoreRecord {
        let gt_total = self.ground_truth.edge_count();
        let cand_total = self.candidate.edge_count();

        let gt_buffer = self.ground_truth.grow(tolerance_px);
        let cand_buffer = self.candidate.grow(tolerance_px);

        let precision =
            self.candidate.count_within(&gt_buffer) as f64 / (cand_total as f64 + EPSILON);
        let recall =
            self.ground_truth.count_within(&cand_buffer) as f64 / (gt_total as f64 + EPSILON);
        let f1 = 2.0 * precision * recall / (precision + recall + EPSILON);

        let record = BoundaryScoreRecord {
            precision: round_to(precision, SCORE_DECIMALS),
            recall: round_to(recall, SCORE_DECIMALS),
            f1: round_to(f1, SCORE_DECIMALS),
            tolerance_used: tolerance_px,
            ground_truth_edge_pixels: gt_total,
            candidate_edge_pixels: cand_total,
        };

        debug!(
            tolerance_px,
            gt_edges = gt_total,
            candidate_edges = cand_total,
            precision = record.precision,
            recall = record.recall,
            f1 = record.f1,
            "scored boundary pair"
        );

        record
    }
}

/// Score one tolerance with default thresholds and label-transition ground truth
pub fn evaluate(
    mask: &LabelSurface,
    image: &CandidateImage,
    tolerance_px: u32,
    edge_sigma: f64,
) -> Result<BoundaryScoreRecord> {
    BoundaryMetric::default().evaluate_with_sigma(mask, image, tolerance_px, edge_sigma)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array2, Array3};

    fn square_mask(size: usize, lo: usize, hi: usize) -> LabelSurface {
        let mut labels = Array2::<i64>::zeros((size, size));
        labels.slice_mut(s![lo..hi, lo..hi]).fill(1);
        LabelSurface::DiscreteLabels(labels)
    }

    fn square_image(size: usize, lo: usize, hi: usize) -> CandidateImage {
        let mut img = Array3::<f64>::zeros((size, size, 3));
        img.slice_mut(s![lo..hi, lo..hi, ..]).fill(200.0 / 255.0);
        CandidateImage::Color(img)
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123_46, 4), 0.1235);
        assert_eq!(round_to(0.999_999_99, 4), 1.0);
        assert_eq!(round_to(-0.000_06, 4), -0.0001);
        assert_eq!(round_to(0.0, 4), 0.0);
    }

    #[test]
    fn test_offset_square_scores() {
        let mask = square_mask(64, 16, 48);
        let image = square_image(64, 17, 49);
        let metric = BoundaryMetric::default();

        let loose = metric.evaluate(&mask, &image, 3).unwrap();
        assert_eq!(loose.tolerance_used, 3);
        assert!(loose.f1 > 0.9, "f1 at 3px was {}", loose.f1);

        let strict = metric.evaluate(&mask, &image, 0).unwrap();
        assert!(strict.f1 < loose.f1);
        for value in [loose.precision, loose.recall, loose.f1, strict.precision, strict.recall] {
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn test_shape_mismatch_fails_before_computation() {
        let mask = square_mask(16, 4, 8);
        let image = CandidateImage::Gray(Array2::zeros((16, 17)));
        let err = evaluate(&mask, &image, 1, 2.0).unwrap_err();
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_blank_candidate_is_zero_not_nan() {
        let mask = square_mask(32, 8, 24);
        let image = CandidateImage::Gray(Array2::zeros((32, 32)));
        let record = evaluate(&mask, &image, 2, 2.0).unwrap();
        assert_eq!(record.precision, 0.0);
        assert_eq!(record.recall, 0.0);
        assert_eq!(record.f1, 0.0);
        assert!(record.is_degenerate());
        assert_eq!(record.candidate_edge_pixels, 0);
    }

    #[test]
    fn test_identical_gradient_edges_score_one() {
        let mut values = Array2::<f64>::zeros((40, 40));
        values.slice_mut(s![10..30, 12..28]).fill(1.0);
        let mask = LabelSurface::ProbabilityMap(values.clone());
        let image = CandidateImage::Gray(values);

        let config = MetricConfig::builder()
            .ground_truth_strategy(BoundaryStrategy::GradientEdges)
            .build()
            .unwrap();
        let record = BoundaryMetric::new(config).unwrap().evaluate(&mask, &image, 0).unwrap();
        assert_eq!(record.precision, 1.0);
        assert_eq!(record.recall, 1.0);
        assert_eq!(record.f1, 1.0);
        assert!(!record.is_degenerate());
    }

    #[test]
    fn test_strategies_differ_in_edge_counts() {
        let mask = square_mask(48, 12, 36);
        let _image = square_image(48, 12, 36);

        let labels = BoundaryMetric::default();
        let gradient = BoundaryMetric::new(
            MetricConfig::builder()
                .ground_truth_strategy(BoundaryStrategy::GradientEdges)
                .build()
                .unwrap(),
        )
        .unwrap();

        let thick = labels.ground_truth_boundary(&mask, 2.0).unwrap();
        let thin = gradient.ground_truth_boundary(&mask, 2.0).unwrap();
        // 24x24 square: 4 * 24 outside pixels plus the 24 * 4 - 4 inner ring
        assert_eq!(thick.edge_count(), 96 + 92);
        assert!(!thin.is_empty());
        assert_ne!(thin, thick);
    }

    #[test]
    fn test_invalid_sigma_rejected() {
        let mask = square_mask(16, 4, 8);
        let image = square_image(16, 4, 8);
        let err = evaluate(&mask, &image, 1, 0.0).unwrap_err();
        assert!(matches!(err, BoundaryError::InvalidConfig(_)));
    }

    #[test]
    fn test_prepared_pair_matches_direct_evaluation() {
        let mask = square_mask(48, 10, 30);
        let image = square_image(48, 12, 32);
        let metric = BoundaryMetric::default();
        let pair = metric.prepare(&mask, &image, 2.0).unwrap();
        for tolerance in [0, 1, 4] {
            assert_eq!(pair.score(tolerance), metric.evaluate(&mask, &image, tolerance).unwrap());
        }
    }
}
