//! Spatial interpolation of scattered samples onto regular grids
//!
//! - TPS: thin plate smoothing spline
//! - Barrier spline: TPS fitted separately inside each barrier region so that
//!   samples never influence cells across a region's boundary

mod barrier;
mod tps;

pub use barrier::{spline_with_barriers, BarrierSplineParams};
pub use tps::{merge_coincident, ThinPlateSpline};

/// A sample point with x, y coordinates and a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    /// Whether coordinates and value are all finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.value.is_finite()
    }
}

impl From<(f64, f64, f64)> for SamplePoint {
    fn from((x, y, value): (f64, f64, f64)) -> Self {
        Self::new(x, y, value)
    }
}
