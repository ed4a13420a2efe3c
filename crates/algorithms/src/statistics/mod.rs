//! Statistics over surfaces
//!
//! - **extract**: sampling a surface at query locations and averaging the result

pub mod extract;

pub use extract::{extract_mean, sample_points, PointSample, QueryPoints};
