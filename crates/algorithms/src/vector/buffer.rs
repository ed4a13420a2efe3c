//! Buffer zones around site locations
//!
//! Points become circles approximated as polygons; overlapping circles of the
//! same site are dissolved into one region.

use coralsurf_core::{Error, Result};
use geo::BooleanOps;
use geo_types::{LineString, MultiPolygon, Point, Polygon};
use std::f64::consts::PI;

/// Parameters for buffer operations
#[derive(Debug, Clone)]
pub struct BufferParams {
    /// Buffer radius in map units (≥ 0)
    pub distance: f64,
    /// Number of segments approximating each circle (default: 32)
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            distance: 1.0,
            segments: 32,
        }
    }
}

/// Circular buffer around a point.
///
/// The polygon's vertices lie on the circle; at least 4 segments are used.
pub fn buffer_point(point: &Point<f64>, params: &BufferParams) -> Polygon<f64> {
    let n = params.segments.max(4);
    let r = params.distance.abs();
    let cx = point.x();
    let cy = point.y();

    let mut coords: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            (cx + r * angle.cos(), cy + r * angle.sin())
        })
        .collect();
    coords.push(coords[0]);

    Polygon::new(LineString::from(coords), vec![])
}

/// Buffer every location and dissolve the circles into a single region.
///
/// A zero radius yields an empty region.
///
/// # Errors
/// `InvalidParameter` when the radius is negative or not finite.
pub fn dissolve_buffers(points: &[(f64, f64)], params: &BufferParams) -> Result<MultiPolygon<f64>> {
    if !(params.distance.is_finite() && params.distance >= 0.0) {
        return Err(Error::invalid(
            "buffer_radius",
            params.distance,
            "must be a finite value >= 0",
        ));
    }
    if params.distance == 0.0 {
        return Ok(MultiPolygon::new(vec![]));
    }

    Ok(points
        .iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|&(x, y)| MultiPolygon::new(vec![buffer_point(&Point::new(x, y), params)]))
        .fold(MultiPolygon::new(vec![]), |acc, circle| {
            if acc.0.is_empty() {
                circle
            } else {
                acc.union(&circle)
            }
        }))
}
