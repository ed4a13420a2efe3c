//! Physical-bound correction

use coralsurf_core::raster::Raster;

/// Replace every value strictly below `lower_bound` with `lower_bound`.
///
/// "No data" cells and values at or above the bound pass through unchanged.
/// Applying the correction twice gives the same surface as applying it once.
///
/// # Example
/// ```ignore
/// // bleaching percentages cannot be negative
/// let corrected = clamp_below(&spline, 0.0);
/// ```
pub fn clamp_below(surface: &Raster<f64>, lower_bound: f64) -> Raster<f64> {
    surface.map_valid(|v| if v < lower_bound { lower_bound } else { v })
}
