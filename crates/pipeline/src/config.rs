//! Run configuration
//!
//! Everything a run needs is carried by these values and passed explicitly
//! into each call. They deserialize from YAML; CLI flags override file values.

use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use coralsurf_core::{Error, Field, Result, CRS};
use coralsurf_parallel::ProcessingMode;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cell size (map units) used when none is configured
pub const DEFAULT_CELL_SIZE: f64 = 0.0229812;
/// Largest grid built for one year unless configured otherwise
pub const DEFAULT_MAX_CELLS: usize = 25_000_000;

/// Inclusive range of survey years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    /// Checked constructor; `start` must not be after `end`.
    pub fn new(start: i32, end: i32) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(Error::invalid(
                "years",
                format!("{}..={}", self.start, self.end),
                "start year is after end year",
            ));
        }
        Ok(())
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            (self.end as i64 - self.start as i64 + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, year: i32) -> bool {
        self.years().contains(&year)
    }
}

impl std::fmt::Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

fn default_cell_size() -> f64 {
    DEFAULT_CELL_SIZE
}

fn default_max_cells() -> usize {
    DEFAULT_MAX_CELLS
}

/// Parameters of the per-year surface build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub years: YearRange,
    /// Spline smoothing weight; 0 interpolates every sample exactly
    #[serde(default)]
    pub smoothing: f64,
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,
    /// Physical floor of the interpolated quantity
    #[serde(default)]
    pub lower_bound: f64,
    #[serde(default)]
    pub field: Field,
    #[serde(default = "default_max_cells")]
    pub max_cells: usize,
    /// EPSG code attached to every surface
    #[serde(default)]
    pub crs: Option<u32>,
    /// Also persist the raw spline and the corrected surface
    #[serde(default)]
    pub keep_intermediate: bool,
    /// Worker threads; all cores when absent
    #[serde(default)]
    pub threads: Option<usize>,
}

impl PipelineConfig {
    pub fn new(years: YearRange) -> Self {
        Self {
            years,
            smoothing: 0.0,
            cell_size: DEFAULT_CELL_SIZE,
            lower_bound: 0.0,
            field: Field::default(),
            max_cells: DEFAULT_MAX_CELLS,
            crs: None,
            keep_intermediate: false,
            threads: None,
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)
            .map_err(|e| Error::Parse(format!("configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&contents)?;
        debug!(path = ?path.as_ref(), years = %config.years, "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.years.validate()?;
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(Error::invalid("cell_size", self.cell_size, "must be a finite value > 0"));
        }
        if !(self.smoothing.is_finite() && self.smoothing >= 0.0) {
            return Err(Error::invalid("smoothing", self.smoothing, "must be a finite value >= 0"));
        }
        if !self.lower_bound.is_finite() {
            return Err(Error::invalid("lower_bound", self.lower_bound, "must be finite"));
        }
        if self.max_cells == 0 {
            return Err(Error::invalid("max_cells", self.max_cells, "must be > 0"));
        }
        if self.threads == Some(0) {
            return Err(Error::invalid("threads", 0, "must be > 0"));
        }
        Ok(())
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        ProcessingMode::from_threads(self.threads)
    }

    pub fn spatial_reference(&self) -> Option<CRS> {
        self.crs.map(CRS::from_epsg)
    }
}

/// Summarize the surfaces around a named monitoring site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteQuery {
    pub name: String,
    /// Radius of the dissolved buffer around the site's observations.
    /// Zero samples the observation locations themselves.
    pub buffer_radius: f64,
}

impl SiteQuery {
    pub fn new(name: impl Into<String>, buffer_radius: f64) -> Result<Self> {
        let query = Self {
            name: name.into(),
            buffer_radius,
        };
        query.validate()?;
        Ok(query)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid("site", &self.name, "site name is empty"));
        }
        if !(self.buffer_radius.is_finite() && self.buffer_radius >= 0.0) {
            return Err(Error::invalid(
                "buffer_radius",
                self.buffer_radius,
                "must be a finite value >= 0",
            ));
        }
        Ok(())
    }
}

/// Summarize the surfaces at a single coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointQuery {
    pub x: f64,
    pub y: f64,
    /// Spatial reference of (x, y); compared with each surface when both are known
    #[serde(default)]
    pub crs: Option<CRS>,
}

impl PointQuery {
    pub fn new(x: f64, y: f64, crs: Option<CRS>) -> Result<Self> {
        let query = Self { x, y, crs };
        query.validate()?;
        Ok(query)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(Error::invalid(
                "coordinate",
                format!("({}, {})", self.x, self.y),
                "coordinates must be finite",
            ));
        }
        Ok(())
    }
}
