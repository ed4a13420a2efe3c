//! North-up affine transform between cell indices and map coordinates

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Georeferencing of a north-up grid.
///
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// `pixel_height` is negative so that row 0 is the northern edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X
    pub pixel_width: f64,
    /// Cell size in Y, usually negative
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Grid of square `cell_size` cells whose upper-left corner sits on
    /// (`min_x`, `max_y`) and which covers the whole envelope.
    ///
    /// Returns the transform with the number of rows and columns. A zero-width
    /// or zero-height envelope still yields one row/column.
    pub fn covering(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        cell_size: f64,
    ) -> Result<(Self, usize, usize)> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::invalid("cell_size", cell_size, "must be a positive number"));
        }
        if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) || max_x < min_x || max_y < min_y {
            return Err(Error::Other(format!(
                "invalid envelope ({}, {}) - ({}, {})",
                min_x, min_y, max_x, max_y
            )));
        }

        let cols = (((max_x - min_x) / cell_size).ceil() as usize).max(1);
        let rows = (((max_y - min_y) / cell_size).ceil() as usize).max(1);

        Ok((Self::new(min_x, max_y, cell_size, -cell_size), rows, cols))
    }

    /// Map coordinates of the centre of cell (`col`, `row`)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }

    /// Map coordinates of the upper-left corner of cell (`col`, `row`)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + col as f64 * self.pixel_width;
        let y = self.origin_y + row as f64 * self.pixel_height;
        (x, y)
    }

    /// Fractional (col, row) of a map coordinate; `.floor()` gives the cell.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        if self.pixel_width.abs() < 1e-12 || self.pixel_height.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// The (row, col) of the cell containing (`x`, `y`) in a `rows` x `cols`
    /// grid, or `None` when the point lies outside it.
    ///
    /// A point on the shared edge of two cells belongs to the cell to its
    /// south-east, except on the outer right/bottom edge, which is kept in the grid.
    pub fn cell_index(&self, x: f64, y: f64, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let (col_f, row_f) = self.geo_to_pixel(x, y);
        if !col_f.is_finite() || !row_f.is_finite() || col_f < 0.0 || row_f < 0.0 {
            return None;
        }
        let clamp_edge = |v: f64, n: usize| -> Option<usize> {
            let i = v.floor() as usize;
            if i < n {
                Some(i)
            } else if i == n && v == n as f64 {
                Some(n - 1)
            } else {
                None
            }
        };
        Some((clamp_edge(row_f, rows)?, clamp_edge(col_f, cols)?))
    }

    /// Cell size (square cells)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Envelope (min_x, min_y, max_x, max_y) of a `width` x `height` grid
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.pixel_to_geo_corner(0, 0);
        let (x1, y1) = self.pixel_to_geo_corner(width, height);
        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 100);

        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_covering_envelope() {
        let (gt, rows, cols) = GeoTransform::covering(0.0, 0.0, 10.0, 4.5, 2.0).unwrap();
        assert_eq!((rows, cols), (3, 5));
        assert_relative_eq!(gt.origin_x, 0.0);
        assert_relative_eq!(gt.origin_y, 4.5);
        let (_, min_y, max_x, _) = gt.bounds(cols, rows);
        assert!(min_y <= 0.0 && max_x >= 10.0);
    }

    #[test]
    fn test_covering_rejects_bad_cell_size() {
        assert!(GeoTransform::covering(0.0, 0.0, 1.0, 1.0, 0.0).is_err());
        assert!(GeoTransform::covering(0.0, 0.0, 1.0, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_cell_index() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        assert_eq!(gt.cell_index(0.5, 9.5, 10, 10), Some((0, 0)));
        assert_eq!(gt.cell_index(9.2, 0.3, 10, 10), Some((9, 9)));
        // outer right/bottom edge stays in the grid
        assert_eq!(gt.cell_index(10.0, 0.0, 10, 10), Some((9, 9)));
        assert_eq!(gt.cell_index(-0.1, 5.0, 10, 10), None);
        assert_eq!(gt.cell_index(5.0, 10.5, 10, 10), None);
        assert_eq!(gt.cell_index(f64::NAN, 5.0, 10, 10), None);
    }
}
