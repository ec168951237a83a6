//! Core data types for boundary adherence scoring

use crate::{
    error::{BoundaryError, Result},
    morphology,
};
use ndarray::{Array2, Array3, ArrayD, ArrayView2, Axis, Ix2, Ix3};
use serde::{Deserialize, Serialize};

/// Luminance weights applied to the first three channels of a color image
pub const LUMINANCE_WEIGHTS: [f64; 3] = [0.2125, 0.7154, 0.0721];

/// Threshold above which a probability value counts as foreground
pub const PROBABILITY_THRESHOLD: f64 = 0.5;

/// Ground-truth region labels
///
/// The variant decides how boundaries are extracted: discrete labels are used
/// as-is, probability maps are binarized at [`PROBABILITY_THRESHOLD`] first.
/// [`LabelSurface::from_float`] picks the variant with a fixed rule: a float
/// grid whose finite values all lie in `[0, 1]` is a probability map,
/// anything else is truncated to integer labels.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelSurface {
    /// Integer region labels
    DiscreteLabels(Array2<i64>),
    /// Foreground probability or indicator values in `[0, 1]`
    ProbabilityMap(Array2<f64>),
}

impl LabelSurface {
    /// Build discrete labels from any integer-like grid
    pub fn from_labels<T>(labels: ArrayView2<'_, T>) -> Self
    where
        T: Copy + Into<i64>,
    {
        Self::DiscreteLabels(labels.mapv(Into::into))
    }

    /// Build discrete foreground/background labels from a boolean grid
    #[must_use]
    pub fn from_bool(mask: ArrayView2<'_, bool>) -> Self {
        Self::DiscreteLabels(mask.mapv(i64::from))
    }

    /// Build a label surface from float values using the probability-map rule
    #[must_use]
    pub fn from_float(values: Array2<f64>) -> Self {
        if Self::is_probability_map(&values) {
            Self::ProbabilityMap(values)
        } else {
            Self::DiscreteLabels(values.mapv(|v| v as i64))
        }
    }

    /// Whether a float grid qualifies as a probability map
    ///
    /// NaN values are ignored when computing the range; an empty or all-NaN
    /// grid is not a probability map.
    #[must_use]
    pub fn is_probability_map(values: &Array2<f64>) -> bool {
        let (min, max) = values
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        // min > max when the grid is empty or entirely NaN
        min <= max && min >= 0.0 && max <= 1.0
    }

    /// Build discrete labels from a dynamically shaped grid, which must be 2-D
    pub fn from_dyn_labels(labels: ArrayD<i64>) -> Result<Self> {
        let shape = labels.shape().to_vec();
        let labels = labels.into_dimensionality::<Ix2>().map_err(|_| {
            BoundaryError::shape(format!("mask must be 2-D; got shape {:?}", shape))
        })?;
        Ok(Self::DiscreteLabels(labels))
    }

    /// Build a label surface from a dynamically shaped float grid, which must be 2-D
    pub fn from_dyn_float(values: ArrayD<f64>) -> Result<Self> {
        let shape = values.shape().to_vec();
        let values = values.into_dimensionality::<Ix2>().map_err(|_| {
            BoundaryError::shape(format!("mask must be 2-D; got shape {:?}", shape))
        })?;
        Ok(Self::from_float(values))
    }

    /// Spatial shape as `(height, width)`
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        match self {
            Self::DiscreteLabels(labels) => labels.dim(),
            Self::ProbabilityMap(values) => values.dim(),
        }
    }

    /// Region labels used for boundary extraction
    #[must_use]
    pub fn labels(&self) -> Array2<i64> {
        match self {
            Self::DiscreteLabels(labels) => labels.clone(),
            Self::ProbabilityMap(values) => {
                values.mapv(|v| i64::from(v > PROBABILITY_THRESHOLD))
            },
        }
    }

    /// Intensity surface in `[0, 1]` used when boundaries come from gradient edges
    ///
    /// Probability maps are returned unchanged. Discrete labels are divided by
    /// the largest absolute label so a `0/255` mask becomes `0/1`.
    #[must_use]
    pub fn intensity(&self) -> Array2<f64> {
        match self {
            Self::ProbabilityMap(values) => values.clone(),
            Self::DiscreteLabels(labels) => {
                let scale = labels.iter().map(|v| v.unsigned_abs()).max().unwrap_or(0);
                if scale == 0 {
                    return Array2::zeros(labels.dim());
                }
                let scale = scale as f64;
                labels.mapv(|v| v as f64 / scale)
            },
        }
    }
}

/// Candidate image under evaluation, intensities on a `[0, 1]` scale
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateImage {
    /// Single-channel intensity grid
    Gray(Array2<f64>),
    /// Multi-channel grid laid out as `(height, width, channels)`
    Color(Array3<f64>),
}

impl CandidateImage {
    /// Build a candidate from a dynamically shaped grid, which must be 2-D or 3-D
    pub fn from_dyn(values: ArrayD<f64>) -> Result<Self> {
        match values.ndim() {
            2 => values
                .into_dimensionality::<Ix2>()
                .map(Self::Gray)
                .map_err(|e| BoundaryError::internal(e.to_string())),
            3 => values
                .into_dimensionality::<Ix3>()
                .map(Self::Color)
                .map_err(|e| BoundaryError::internal(e.to_string())),
            _ => Err(BoundaryError::shape(format!(
                "candidate image must be 2-D or 3-D; got shape {:?}",
                values.shape()
            ))),
        }
    }

    /// Spatial shape as `(height, width)`
    #[must_use]
    pub fn spatial_dim(&self) -> (usize, usize) {
        match self {
            Self::Gray(values) => values.dim(),
            Self::Color(values) => {
                let (h, w, _) = values.dim();
                (h, w)
            },
        }
    }

    /// Full shape including the channel axis for color images
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Self::Gray(values) => values.shape().to_vec(),
            Self::Color(values) => values.shape().to_vec(),
        }
    }

    /// Single-channel luminance surface
    ///
    /// One-channel color grids are squeezed, three- and four-channel grids are
    /// weighted with [`LUMINANCE_WEIGHTS`] (alpha is ignored).
    #[allow(clippy::indexing_slicing)]
    pub fn luminance(&self) -> Result<Array2<f64>> {
        match self {
            Self::Gray(values) => Ok(values.clone()),
            Self::Color(values) => match values.len_of(Axis(2)) {
                1 => Ok(values.index_axis(Axis(2), 0).to_owned()),
                3 | 4 => {
                    let [wr, wg, wb] = LUMINANCE_WEIGHTS;
                    let (h, w, _) = values.dim();
                    Ok(Array2::from_shape_fn((h, w), |(i, j)| {
                        wr * values[[i, j, 0]] + wg * values[[i, j, 1]] + wb * values[[i, j, 2]]
                    }))
                },
                channels => Err(BoundaryError::shape(format!(
                    "candidate image must have 1, 3 or 4 channels; got {}",
                    channels
                ))),
            },
        }
    }
}

/// Boolean grid marking boundary ("edge") pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryMap {
    edges: Array2<bool>,
}

impl BoundaryMap {
    #[must_use]
    pub fn new(edges: Array2<bool>) -> Self {
        Self { edges }
    }

    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.edges.dim()
    }

    /// Number of boundary pixels
    #[must_use]
    pub fn edge_count(&self) -> u64 {
        self.edges.iter().filter(|&&e| e).count() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.edges.iter().any(|&e| e)
    }

    #[must_use]
    pub fn as_array(&self) -> &Array2<bool> {
        &self.edges
    }

    #[must_use]
    pub fn into_array(self) -> Array2<bool> {
        self.edges
    }

    /// Grow the boundary by `radius` iterations of unit cross dilation
    #[must_use]
    pub fn grow(&self, radius: u32) -> ToleranceBuffer {
        ToleranceBuffer {
            mask: morphology::dilate_cross(&self.edges, radius),
            radius,
        }
    }

    /// Number of boundary pixels that fall inside `buffer`
    #[must_use]
    pub fn count_within(&self, buffer: &ToleranceBuffer) -> u64 {
        self.edges
            .iter()
            .zip(buffer.mask.iter())
            .filter(|(&edge, &inside)| edge && inside)
            .count() as u64
    }
}

/// Boundary map grown outward by an integer pixel radius
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToleranceBuffer {
    mask: Array2<bool>,
    radius: u32,
}

impl ToleranceBuffer {
    #[must_use]
    pub fn radius(&self) -> u32 {
        self.radius
    }

    #[must_use]
    pub fn as_array(&self) -> &Array2<bool> {
        &self.mask
    }

    /// Number of pixels covered by the buffer
    #[must_use]
    pub fn covered_count(&self) -> u64 {
        self.mask.iter().filter(|&&m| m).count() as u64
    }
}

/// Scores from one (mask, image, tolerance) evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryScoreRecord {
    /// Fraction of candidate edge pixels within tolerance of a true boundary
    #[serde(rename = "boundary_precision")]
    pub precision: f64,
    /// Fraction of true boundary pixels within tolerance of a candidate edge
    #[serde(rename = "boundary_recall")]
    pub recall: f64,
    /// Harmonic mean of precision and recall
    #[serde(rename = "boundary_f1")]
    pub f1: f64,
    pub tolerance_used: u32,
    /// Boundary pixels extracted from the ground truth
    pub ground_truth_edge_pixels: u64,
    /// Edge pixels detected in the candidate image
    pub candidate_edge_pixels: u64,
}

impl BoundaryScoreRecord {
    /// Whether either boundary map was empty, making the scores low-confidence
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.ground_truth_edge_pixels == 0 || self.candidate_edge_pixels == 0
    }
}

/// F1 as a function of tolerance for one (mask, image) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceCurve {
    /// Tolerances in the order they were supplied
    pub tolerances: Vec<u32>,
    /// F1 score per tolerance, parallel to `tolerances`
    pub f1_values: Vec<f64>,
    /// Trapezoidal area under the F1-vs-tolerance curve
    pub auc: f64,
}

impl ToleranceCurve {
    /// `(tolerance, f1)` pairs in sweep order
    pub fn points(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.tolerances
            .iter()
            .copied()
            .zip(self.f1_values.iter().copied())
    }

    /// F1 at the first occurrence of `tolerance`
    #[must_use]
    pub fn f1_at(&self, tolerance: u32) -> Option<f64> {
        self.points().find(|(t, _)| *t == tolerance).map(|(_, f1)| f1)
    }
}
