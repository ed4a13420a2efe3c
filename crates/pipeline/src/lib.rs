//! # CoralSurf Pipeline
//!
//! Year-by-year reconstruction of bleaching surfaces from survey
//! observations, and their summary at a site or coordinate.
//!
//! - [`config`]: run configuration, site and point queries
//! - [`store`]: where observations come from
//! - [`persist`]: where surfaces go
//! - [`build`]: boundary, spline, correction and mask for each year
//! - [`query`] / [`series`]: sampling finished surfaces into a result series
//! - [`export`]: `Year,Value` CSV output

pub mod build;
pub mod config;
pub mod export;
pub mod persist;
pub mod query;
pub mod series;
pub mod store;

pub use build::{build_surface, build_surfaces, build_surfaces_with, BuildReport, CancelToken, YearOutcome, YearSurfaces};
pub use config::{PipelineConfig, PointQuery, SiteQuery, YearRange};
pub use export::{write_series_csv, write_series_csv_file};
pub use persist::{GeoTiffSurfaceStore, MemorySurfaceStore, SurfaceStage, SurfaceStore};
pub use query::SeriesQuery;
pub use series::{
    summarize_series, summarize_store, summarize_year, ResultSeries, SummaryValue, SurfaceLookup,
    YearlySummary, DEFAULT_MISSING_TOKEN,
};
pub use store::{CsvSampleStore, MemorySampleStore, SampleStore};
