//! # coralsurf algorithms
//!
//! The numerical and geometric steps that turn point observations into a
//! finished yearly surface, and a surface back into point summaries.
//!
//! - **vector**: convex-hull support boundary, site buffers
//! - **interpolation**: thin plate smoothing spline, barrier-constrained fitting
//! - **surface**: lower-bound correction, masking to the support boundary
//! - **statistics**: sampling a surface at query points

pub mod interpolation;
pub(crate) mod maybe_rayon;
pub mod statistics;
pub mod surface;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::interpolation::{
        spline_with_barriers, BarrierSplineParams, SamplePoint, ThinPlateSpline,
    };
    pub use crate::statistics::{extract_mean, sample_points, PointSample, QueryPoints};
    pub use crate::surface::{clamp_below, mask_to_support};
    pub use crate::vector::{dissolve_buffers, BoundingBox, BufferParams, SupportBoundary};
    pub use coralsurf_core::prelude::*;
}
