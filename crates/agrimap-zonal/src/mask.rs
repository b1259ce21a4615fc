//! Polygon to pixel rasterization by pixel centre.

use geo::{BoundingRect, Contains, MultiPolygon, Point};

use agrimap_raster::{InverseTransform, RasterGrid};

/// Pixels of `grid` whose centre lies strictly inside `geometry`, row-major.
///
/// Only the window covering the polygon's bounding box is tested. Returns
/// nothing when the geometry is empty, lies outside the grid, or the grid's
/// transform is singular.
#[must_use]
pub fn region_mask(geometry: &MultiPolygon<f64>, grid: &RasterGrid) -> Vec<(usize, usize)> {
    let Some(inverse) = grid.transform.inverse() else {
        return Vec::new();
    };
    let Some((rows, cols)) = pixel_window(geometry, grid, &inverse) else {
        return Vec::new();
    };
    let mut pixels = Vec::new();
    for row in rows.0..=rows.1 {
        for col in cols.0..=cols.1 {
            let (x, y) = grid.transform.pixel_center(row, col);
            if geometry.contains(&Point::new(x, y)) {
                pixels.push((row, col));
            }
        }
    }
    pixels
}

/// Inclusive (row, col) ranges of pixel centres that can fall in the bounding box.
fn pixel_window(
    geometry: &MultiPolygon<f64>,
    grid: &RasterGrid,
    inverse: &InverseTransform,
) -> Option<((usize, usize), (usize, usize))> {
    if grid.rows == 0 || grid.cols == 0 {
        return None;
    }
    let bbox = geometry.bounding_rect()?;
    let (min, max) = (bbox.min(), bbox.max());
    let corners = [(min.x, min.y), (min.x, max.y), (max.x, min.y), (max.x, max.y)]
        .map(|(x, y)| inverse.apply(x, y));
    let col_lo = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let col_hi = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let row_lo = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let row_hi = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

    // Index i has its centre at i + 0.5.
    let clamp = |lo: f64, hi: f64, n: usize| -> Option<(usize, usize)> {
        let first = (lo - 0.5).ceil().max(0.0);
        let last = (hi - 0.5).floor().min(n as f64 - 1.0);
        (first <= last).then(|| (first as usize, last as usize))
    };
    Some((clamp(row_lo, row_hi, grid.rows)?, clamp(col_lo, col_hi, grid.cols)?))
}
