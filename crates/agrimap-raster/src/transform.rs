//! Affine pixel-to-map transform.

use serde::{Deserialize, Serialize};

const SQUARE_METRES_PER_HECTARE: f64 = 10_000.0;

/// Six-coefficient affine mapping pixel (col, row) to map (x, y).
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// North-up rasters have zero rotation and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl Default for GeoTransform {
    /// Pixel space: unit cells, origin at the top-left corner, y growing down.
    fn default() -> Self {
        Self {
            origin_x: 0.0,
            pixel_width: 1.0,
            row_rotation: 0.0,
            origin_y: 0.0,
            col_rotation: 0.0,
            pixel_height: 1.0,
        }
    }
}

impl GeoTransform {
    /// North-up transform from the top-left corner and positive cell sizes.
    #[must_use]
    pub fn north_up(origin_x: f64, origin_y: f64, cell_width: f64, cell_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width: cell_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height: -cell_height,
        }
    }

    /// Map coordinates of a fractional pixel position.
    #[must_use]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Map coordinates of the centre of pixel (`row`, `col`).
    #[must_use]
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Ground area of one pixel in squared map units.
    #[must_use]
    pub fn pixel_area(&self) -> f64 {
        (self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation).abs()
    }

    /// Pixel area in hectares, taking map units as metres.
    #[must_use]
    pub fn pixel_area_ha(&self) -> f64 {
        self.pixel_area() / SQUARE_METRES_PER_HECTARE
    }

    #[must_use]
    pub fn is_rotated(&self) -> bool {
        self.row_rotation != 0.0 || self.col_rotation != 0.0
    }

    /// The map-to-pixel transform, `None` when the matrix is singular.
    #[must_use]
    pub fn inverse(&self) -> Option<InverseTransform> {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        Some(InverseTransform {
            forward: *self,
            det,
        })
    }

    /// Fractional (col, row) of a map coordinate.
    #[must_use]
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        self.inverse().map(|inv| inv.apply(x, y))
    }

    /// Coefficients agree within a relative tolerance.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0);
        close(self.origin_x, other.origin_x)
            && close(self.pixel_width, other.pixel_width)
            && close(self.row_rotation, other.row_rotation)
            && close(self.origin_y, other.origin_y)
            && close(self.col_rotation, other.col_rotation)
            && close(self.pixel_height, other.pixel_height)
    }
}

/// Precomputed map-to-pixel mapping.
#[derive(Debug, Clone, Copy)]
pub struct InverseTransform {
    forward: GeoTransform,
    det: f64,
}

impl InverseTransform {
    /// Fractional (col, row) of map point (`x`, `y`).
    #[must_use]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let t = &self.forward;
        let dx = x - t.origin_x;
        let dy = y - t.origin_y;
        (
            (t.pixel_height * dx - t.row_rotation * dy) / self.det,
            (t.pixel_width * dy - t.col_rotation * dx) / self.det,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::GeoTransform;

    #[test]
    fn centre_of_first_pixel() {
        let t = GeoTransform::north_up(77.0, 13.5, 0.001, 0.001);
        let (x, y) = t.pixel_center(0, 0);
        assert!((x - 77.0005).abs() < 1e-12);
        assert!((y - 13.4995).abs() < 1e-12);
    }

    #[test]
    fn area_is_product_of_cell_sizes() {
        let t = GeoTransform::north_up(500_000.0, 1_500_000.0, 10.0, 10.0);
        assert_eq!(t.pixel_area(), 100.0);
        assert!((t.pixel_area_ha() - 0.01).abs() < 1e-15);
    }

    #[test]
    fn inverse_round_trips_rotated() {
        let t = GeoTransform {
            origin_x: 100.0,
            pixel_width: 2.0,
            row_rotation: 0.5,
            origin_y: 50.0,
            col_rotation: 0.25,
            pixel_height: -3.0,
        };
        let (x, y) = t.apply(12.5, 7.25);
        let (col, row) = t.geo_to_pixel(x, y).unwrap();
        assert!((col - 12.5).abs() < 1e-9);
        assert!((row - 7.25).abs() < 1e-9);
    }

    #[test]
    fn singular_has_no_inverse() {
        let t = GeoTransform {
            pixel_width: 0.0,
            ..GeoTransform::default()
        };
        assert!(t.inverse().is_none());
    }

    #[test]
    fn approx_eq_tolerates_rounding() {
        let a = GeoTransform::north_up(77.0, 13.5, 0.001, 0.001);
        let mut b = a;
        b.origin_x += 1e-12;
        assert!(a.approx_eq(&b));
        b.origin_x += 1e-3;
        assert!(!a.approx_eq(&b));
    }
}
