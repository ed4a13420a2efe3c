//! # coralsurf core
//!
//! Core types and I/O for reconstructing bleaching surfaces.
//!
//! This crate provides:
//! - `Raster<T>` / `Surface`: georeferenced grid with explicit "no data" cells
//! - `GeoTransform`: north-up cell/coordinate mapping
//! - `CRS`: opaque spatial reference metadata
//! - `Observation` / `ObservationSet`: survey records
//! - GeoTIFF persistence of surfaces

pub mod crs;
pub mod error;
pub mod io;
pub mod observation;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, NoDataReason, Result};
pub use observation::{distinct_site_names, Field, Observation, ObservationSet};
pub use raster::{GeoTransform, Raster, RasterElement, Surface};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, NoDataReason, Result};
    pub use crate::observation::{Field, Observation, ObservationSet};
    pub use crate::raster::{GeoTransform, Raster, RasterElement, Surface};
}
