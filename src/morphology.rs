//! Binary morphology on boundary grids
//!
//! Neighborhoods are the 3x3 cross (4-connectivity). Pixels outside the grid
//! are background for dilation and are ignored for boundary extraction, so the
//! image border never creates an artificial boundary.

use ndarray::{Array2, ArrayView2};

/// Cross neighborhood offsets, excluding the center
const CROSS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

fn neighbor(
    i: usize,
    j: usize,
    (di, dj): (isize, isize),
    h: usize,
    w: usize,
) -> Option<(usize, usize)> {
    let ni = i.checked_add_signed(di)?;
    let nj = j.checked_add_signed(dj)?;
    (ni < h && nj < w).then_some((ni, nj))
}

/// Thick label-transition boundaries
///
/// A pixel is marked when any in-grid 4-neighbor carries a different label,
/// so both sides of every transition are marked.
#[must_use]
#[allow(clippy::indexing_slicing)]
pub fn thick_boundaries(labels: ArrayView2<'_, i64>) -> Array2<bool> {
    let (h, w) = labels.dim();
    Array2::from_shape_fn((h, w), |(i, j)| {
        let center = labels[[i, j]];
        CROSS
            .iter()
            .filter_map(|&offset| neighbor(i, j, offset, h, w))
            .any(|(ni, nj)| labels[[ni, nj]] != center)
    })
}

/// One unit dilation with the 3x3 cross
#[must_use]
#[allow(clippy::indexing_slicing)]
pub fn dilate_cross_once(mask: ArrayView2<'_, bool>) -> Array2<bool> {
    let (h, w) = mask.dim();
    Array2::from_shape_fn((h, w), |(i, j)| {
        mask[[i, j]]
            || CROSS
                .iter()
                .filter_map(|&offset| neighbor(i, j, offset, h, w))
                .any(|(ni, nj)| mask[[ni, nj]])
    })
}

/// `iterations` successive unit cross dilations
///
/// Zero iterations returns the mask unchanged. Iteration stops early once the
/// mask no longer changes since further passes are then no-ops.
#[must_use]
pub fn dilate_cross(mask: &Array2<bool>, iterations: u32) -> Array2<bool> {
    let mut current = mask.clone();
    for _ in 0..iterations {
        let next = dilate_cross_once(current.view());
        if next == current {
            break;
        }
        current = next;
    }
    current
}
