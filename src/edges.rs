//! Canny edge detection on luminance grids.
//!
//! Pipeline:
//! 1. Gaussian smoothing, truncated at `4 * sigma`. Pixels outside the grid
//!    count as zero and each output is renormalized by the kernel mass that
//!    fell inside the grid, so borders do not darken.
//! 2. Sobel gradients with reflected borders; magnitude is `hypot(gy, gx)`.
//! 3. Non-maximum suppression along the gradient direction, with the two
//!    neighbors on each side bilinearly interpolated. The outermost ring of
//!    pixels is never an edge.
//! 4. Hysteresis: 8-connected components of suppressed pixels with magnitude
//!    `>= low_threshold` survive when they contain a pixel `>= high_threshold`.
//!
//! Thresholds are absolute gradient magnitudes for intensities on `[0, 1]`.

use crate::error::{BoundaryError, Result};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EDGE_SIGMA: f64 = 2.0;
pub const DEFAULT_LOW_THRESHOLD: f64 = 0.1;
pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.2;

/// Kernel half-width in standard deviations
const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// Sobel smoothing taps perpendicular to the derivative axis
const SOBEL_SMOOTH: [f64; 3] = [1.0, 2.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CannyConfig {
    /// Gaussian smoothing standard deviation in pixels
    pub sigma: f64,
    pub low_threshold: f64,
    pub high_threshold: f64,
}

impl Default for CannyConfig {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_EDGE_SIGMA,
            low_threshold: DEFAULT_LOW_THRESHOLD,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
        }
    }
}

impl CannyConfig {
    #[must_use]
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(BoundaryError::config_value_error(
                "edge sigma",
                self.sigma,
                "finite and > 0",
                Some(DEFAULT_EDGE_SIGMA),
            ));
        }
        if !self.low_threshold.is_finite() || self.low_threshold < 0.0 {
            return Err(BoundaryError::config_value_error(
                "low threshold",
                self.low_threshold,
                "finite and >= 0",
                Some(DEFAULT_LOW_THRESHOLD),
            ));
        }
        if !self.high_threshold.is_finite() || self.high_threshold < self.low_threshold {
            return Err(BoundaryError::invalid_config(format!(
                "high threshold {} must be finite and >= low threshold {}",
                self.high_threshold, self.low_threshold
            )));
        }
        Ok(())
    }
}

/// Normalized, truncated 1D Gaussian kernel
#[derive(Debug, Clone)]
pub struct GaussianKernel1D {
    pub sigma: f64,
    pub radius: usize,
    pub weights: Vec<f64>,
}

impl GaussianKernel1D {
    #[must_use]
    pub fn new(sigma: f64) -> Self {
        let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as usize;
        let sigma2 = sigma * sigma;
        let mut weights: Vec<f64> = (0..=2 * radius)
            .map(|i| {
                let x = i as f64 - radius as f64;
                (-0.5 * x * x / sigma2).exp()
            })
            .collect();

        let sum: f64 = weights.iter().sum();
        for wi in &mut weights {
            *wi /= sum;
        }

        Self {
            sigma,
            radius,
            weights,
        }
    }
}

/// Detect edges in a luminance grid
#[allow(clippy::indexing_slicing)]
pub fn canny(image: ArrayView2<'_, f64>, config: &CannyConfig) -> Result<Array2<bool>> {
    config.validate()?;

    let (h, w) = image.dim();
    if h == 0 || w == 0 {
        return Ok(Array2::from_elem((h, w), false));
    }

    let smoothed = gaussian_smooth(image, config.sigma);
    let (gy, gx) = sobel_gradients(smoothed.view());
    let magnitude = Array2::from_shape_fn((h, w), |idx| gy[idx].hypot(gx[idx]));
    let suppressed = non_maximum_suppression(
        gy.view(),
        gx.view(),
        magnitude.view(),
        config.low_threshold,
    );

    Ok(hysteresis(suppressed.view(), config.high_threshold))
}

/// Gaussian smoothing with zero padding and mass renormalization
#[must_use]
pub fn gaussian_smooth(image: ArrayView2<'_, f64>, sigma: f64) -> Array2<f64> {
    let kernel = GaussianKernel1D::new(sigma);
    let rows = convolve_axis(image, &kernel, Axis(0));
    convolve_axis(rows.view(), &kernel, Axis(1))
}

#[allow(clippy::indexing_slicing, clippy::cast_possible_wrap)]
fn convolve_axis(src: ArrayView2<'_, f64>, kernel: &GaussianKernel1D, axis: Axis) -> Array2<f64> {
    let (h, w) = src.dim();
    let len = if axis == Axis(0) { h } else { w };
    let radius = kernel.radius as isize;

    Array2::from_shape_fn((h, w), |(i, j)| {
        let pos = if axis == Axis(0) { i } else { j };
        let mut acc = 0.0;
        let mut mass = 0.0;
        for (k, &wk) in kernel.weights.iter().enumerate() {
            let Some(p) = pos.checked_add_signed(k as isize - radius) else {
                continue;
            };
            if p >= len {
                continue;
            }
            let v = if axis == Axis(0) { src[[p, j]] } else { src[[i, p]] };
            acc += wk * v;
            mass += wk;
        }
        if mass > 0.0 {
            acc / mass
        } else {
            0.0
        }
    })
}

/// Sobel derivatives `(gy, gx)` along rows and columns, borders reflected
#[must_use]
#[allow(clippy::indexing_slicing, clippy::cast_possible_wrap)]
pub fn sobel_gradients(src: ArrayView2<'_, f64>) -> (Array2<f64>, Array2<f64>) {
    let (h, w) = src.dim();
    let clamp = |v: isize, n: usize| v.clamp(0, n as isize - 1) as usize;
    let at = |i: isize, j: isize| src[[clamp(i, h), clamp(j, w)]];

    let gy = Array2::from_shape_fn((h, w), |(i, j)| {
        let (i, j) = (i as isize, j as isize);
        SOBEL_SMOOTH
            .iter()
            .zip(-1isize..=1)
            .map(|(&s, dj)| s * (at(i + 1, j + dj) - at(i - 1, j + dj)))
            .sum()
    });
    let gx = Array2::from_shape_fn((h, w), |(i, j)| {
        let (i, j) = (i as isize, j as isize);
        SOBEL_SMOOTH
            .iter()
            .zip(-1isize..=1)
            .map(|(&s, di)| s * (at(i + di, j + 1) - at(i + di, j - 1)))
            .sum()
    });

    (gy, gx)
}

fn interpolate(near: f64, diagonal: f64, weight: f64) -> f64 {
    diagonal * weight + near * (1.0 - weight)
}

/// Keep local maxima along the gradient direction with magnitude `>= low`
#[allow(clippy::indexing_slicing, clippy::many_single_char_names)]
fn non_maximum_suppression(
    gy: ArrayView2<'_, f64>,
    gx: ArrayView2<'_, f64>,
    mag: ArrayView2<'_, f64>,
    low: f64,
) -> Array2<f64> {
    let (h, w) = mag.dim();
    let mut out = Array2::zeros((h, w));
    if h < 3 || w < 3 {
        return out;
    }

    for r in 1..h - 1 {
        for c in 1..w - 1 {
            let m = mag[[r, c]];
            if m < low || m <= 0.0 {
                continue;
            }

            let vy = gy[[r, c]];
            let vx = gx[[r, c]];
            let (up, down, right, left) = (vy >= 0.0, vy <= 0.0, vx >= 0.0, vx <= 0.0);
            let (ay, ax) = (vy.abs(), vx.abs());

            // Gradient in the first/third quadrant: neighbors toward (+1, +1) and (-1, -1).
            if (up && right) || (down && left) {
                let (wt, n1, d1, n2, d2) = if ay > ax {
                    (ax / ay, mag[[r + 1, c]], mag[[r + 1, c + 1]], mag[[r - 1, c]], mag[[r - 1, c - 1]])
                } else {
                    (ay / ax, mag[[r, c + 1]], mag[[r + 1, c + 1]], mag[[r, c - 1]], mag[[r - 1, c - 1]])
                };
                // On a symmetric step the two flanking pixels tie, so rounding
                // decides whether one or both survive.
                if interpolate(n1, d1, wt) <= m && interpolate(n2, d2, wt) <= m {
                    out[[r, c]] = m;
                    continue;
                }
            }

            // Second/fourth quadrant: neighbors toward (-1, +1) and (+1, -1).
            if (down && right) || (up && left) {
                let (wt, n1, d1, n2, d2) = if ay < ax {
                    (ay / ax, mag[[r, c + 1]], mag[[r - 1, c + 1]], mag[[r, c - 1]], mag[[r + 1, c - 1]])
                } else {
                    (ax / ay, mag[[r - 1, c]], mag[[r - 1, c + 1]], mag[[r + 1, c]], mag[[r + 1, c - 1]])
                };
                if interpolate(n1, d1, wt) <= m && interpolate(n2, d2, wt) <= m {
                    out[[r, c]] = m;
                }
            }
        }
    }

    out
}

/// Grow strong pixels through 8-connected weak pixels
#[allow(clippy::indexing_slicing)]
fn hysteresis(suppressed: ArrayView2<'_, f64>, high: f64) -> Array2<bool> {
    let (h, w) = suppressed.dim();
    let mut edges = Array2::from_elem((h, w), false);
    let mut stack = Vec::new();

    for ((r, c), &v) in suppressed.indexed_iter() {
        if v > 0.0 && v >= high {
            edges[[r, c]] = true;
            stack.push((r, c));
        }
    }

    while let Some((r, c)) = stack.pop() {
        for nr in r.saturating_sub(1)..=(r + 1).min(h - 1) {
            for nc in c.saturating_sub(1)..=(c + 1).min(w - 1) {
                if !edges[[nr, nc]] && suppressed[[nr, nc]] > 0.0 {
                    edges[[nr, nc]] = true;
                    stack.push((nr, nc));
                }
            }
        }
    }

    edges
}
