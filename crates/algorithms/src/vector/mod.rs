//! Vector geometry for support regions
//!
//! - Support boundary: convex hull of observation locations
//! - Buffer: circles around site locations, dissolved into one region

mod buffer;
mod spatial;

pub use buffer::{buffer_point, dissolve_buffers, BufferParams};
pub use spatial::{BoundingBox, SupportBoundary};
