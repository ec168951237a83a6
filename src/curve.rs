//! Tolerance-Curve Aggregator
//!
//! Sweeps an ordered tolerance list for one (mask, image) pair and integrates
//! F1 over the literal tolerance values.

use crate::{
    error::{BoundaryError, Result},
    metrics::BoundaryMetric,
    types::{CandidateImage, LabelSurface, ToleranceCurve},
};

impl BoundaryMetric {
    /// F1 at every tolerance, in the given order, plus the trapezoidal AUC
    ///
    /// Order and duplicates are preserved. Any evaluation failure aborts the
    /// whole sweep.
    ///
    /// # Errors
    /// - `BoundaryError::InvalidConfig` for an empty tolerance list
    /// - any error from [`BoundaryMetric::prepare`]
    pub fn sweep(
        &self,
        mask: &LabelSurface,
        image: &CandidateImage,
        tolerances: &[u32],
    ) -> Result<ToleranceCurve> {
        if tolerances.is_empty() {
            return Err(BoundaryError::invalid_config(
                "tolerance sweep needs at least one tolerance",
            ));
        }

        let _span = tracing::debug_span!("sweep", points = tolerances.len()).entered();

        let pair = self.prepare(mask, image, self.config().edge_sigma)?;
        let f1_values: Vec<f64> = tolerances.iter().map(|&t| pair.score(t).f1).collect();

        let x: Vec<f64> = tolerances.iter().map(|&t| f64::from(t)).collect();
        let auc = trapezoid(&x, &f1_values);

        tracing::debug!(auc, "tolerance sweep complete");

        Ok(ToleranceCurve {
            tolerances: tolerances.to_vec(),
            f1_values,
            auc,
        })
    }

    /// Sweep over the configured tolerance list
    pub fn sweep_configured(
        &self,
        mask: &LabelSurface,
        image: &CandidateImage,
    ) -> Result<ToleranceCurve> {
        self.sweep(mask, image, &self.config().tolerances)
    }
}

/// Sweep with the default metric configuration
pub fn sweep(
    mask: &LabelSurface,
    image: &CandidateImage,
    tolerances: &[u32],
) -> Result<ToleranceCurve> {
    BoundaryMetric::default().sweep(mask, image, tolerances)
}

/// Trapezoidal integral of `y` against `x`, taken in the given order
///
/// Unsorted `x` yields negative-width segments, exactly as written. Fewer than
/// two points integrate to zero; extra entries in the longer slice are ignored.
#[must_use]
#[allow(clippy::indexing_slicing)]
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array2, Array3};

    #[test]
    fn test_trapezoid() {
        assert_eq!(trapezoid(&[1.0, 2.0, 3.0, 4.0, 5.0], &[0.5; 5]), 2.0);
        assert_eq!(trapezoid(&[0.0, 1.0, 3.0], &[0.0, 1.0, 1.0]), 2.5);
        assert_eq!(trapezoid(&[3.0], &[0.7]), 0.0);
        assert_eq!(trapezoid(&[], &[]), 0.0);
        // Literal x values, not ranks
        assert_eq!(trapezoid(&[1.0, 10.0], &[1.0, 1.0]), 9.0);
        // Descending x integrates negatively
        assert_eq!(trapezoid(&[5.0, 1.0], &[1.0, 1.0]), -4.0);
    }

    fn pair(size: usize) -> (LabelSurface, CandidateImage) {
        let lo = size / 4;
        let hi = 3 * size / 4;
        let mut labels = Array2::<i64>::zeros((size, size));
        labels.slice_mut(s![lo..hi, lo..hi]).fill(255);
        let mut img = Array3::<f64>::zeros((size, size, 3));
        img.slice_mut(s![lo + 2..hi + 2, lo + 2..hi + 2, ..]).fill(200.0 / 255.0);
        (LabelSurface::DiscreteLabels(labels), CandidateImage::Color(img))
    }

    #[test]
    fn test_sweep_matches_pointwise_evaluation() {
        let (mask, image) = pair(64);
        let metric = BoundaryMetric::default();
        let curve = metric.sweep(&mask, &image, &[0, 1, 2, 3]).unwrap();

        assert_eq!(curve.tolerances, vec![0, 1, 2, 3]);
        for (tolerance, f1) in curve.points() {
            assert_eq!(f1, metric.evaluate(&mask, &image, tolerance).unwrap().f1);
        }
    }

    #[test]
    fn test_sweep_rejects_empty_tolerances() {
        let (mask, image) = pair(32);
        assert!(matches!(
            sweep(&mask, &image, &[]).unwrap_err(),
            BoundaryError::InvalidConfig(_)
        ));
    }

    #[test]
    fn test_sweep_keeps_duplicates() {
        let (mask, image) = pair(32);
        let curve = sweep(&mask, &image, &[2, 2, 1]).unwrap();
        assert_eq!(curve.tolerances, vec![2, 2, 1]);
        assert_eq!(curve.f1_values[0], curve.f1_values[1]);
    }

    #[test]
    fn test_sweep_propagates_shape_errors() {
        let (mask, _) = pair(32);
        let image = CandidateImage::Gray(Array2::zeros((32, 31)));
        assert!(sweep(&mask, &image, &[1, 2]).unwrap_err().is_shape_error());
    }

    #[test]
    fn test_configured_sweep_uses_config_tolerances() {
        let (mask, image) = pair(32);
        let curve = BoundaryMetric::default().sweep_configured(&mask, &image).unwrap();
        assert_eq!(curve.tolerances, vec![1, 2, 3, 4, 5]);
        assert_eq!(curve.f1_values.len(), 5);
    }
}
