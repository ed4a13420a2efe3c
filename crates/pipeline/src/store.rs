//! Sample Store: where observations come from
//!
//! Queries that match nothing return an empty set; only storage failures
//! are errors.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use coralsurf_core::{Error, Observation, ObservationSet, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use tracing::{debug, warn};

/// Source of survey observations
pub trait SampleStore: Send + Sync {
    /// Observations recorded in `year`
    fn observations_for_year(&self, year: i32) -> Result<ObservationSet>;

    /// Observations at the site called `name`
    fn observations_for_site(&self, name: &str) -> Result<ObservationSet>;

    /// Every observation held by the store
    fn all(&self) -> Result<ObservationSet>;
}

/// Observations held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySampleStore {
    observations: ObservationSet,
}

impl MemorySampleStore {
    pub fn new(observations: ObservationSet) -> Self {
        Self { observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl FromIterator<Observation> for MemorySampleStore {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl SampleStore for MemorySampleStore {
    fn observations_for_year(&self, year: i32) -> Result<ObservationSet> {
        Ok(self.observations.for_year(year))
    }

    fn observations_for_site(&self, name: &str) -> Result<ObservationSet> {
        Ok(self.observations.for_site(name))
    }

    fn all(&self) -> Result<ObservationSet> {
        Ok(self.observations.clone())
    }
}

/// One row of an observation table.
///
/// Column names of the survey exports (`Date_Year`, `Percent_Bl`,
/// `Site_Name`, `SSTA_DHW`) are accepted alongside the plain ones.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "X", alias = "lon", alias = "Lon", alias = "longitude", alias = "Longitude")]
    x: f64,
    #[serde(alias = "Y", alias = "lat", alias = "Lat", alias = "latitude", alias = "Latitude")]
    y: f64,
    #[serde(alias = "Date_Year", alias = "Year")]
    year: i32,
    #[serde(alias = "Site_Name", alias = "Site", default)]
    site: String,
    #[serde(alias = "Percent_Bl", deserialize_with = "csv::invalid_option", default)]
    bleaching: Option<f64>,
    #[serde(alias = "SSTA_DHW", deserialize_with = "csv::invalid_option", default)]
    thermal_stress: Option<f64>,
}

/// Observations loaded from a CSV table
#[derive(Debug, Clone)]
pub struct CsvSampleStore {
    inner: MemorySampleStore,
}

impl CsvSampleStore {
    /// Load every row of the CSV file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let store = Self::from_reader(file)?;
        debug!(path = ?path.as_ref(), observations = store.inner.len(), "Loaded observations");
        Ok(store)
    }

    /// Load every row from a CSV stream with a header line.
    ///
    /// Every well-formed row is kept, even with no measured value: the
    /// field chosen for a run decides which rows feed its surfaces.
    /// Malformed rows are errors.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut observations = ObservationSet::new();
        let mut unmeasured = 0usize;
        for (i, row) in rdr.deserialize::<CsvRecord>().enumerate() {
            // header is line 1
            let record = row.map_err(|e| Error::Parse(format!("observation row {}: {}", i + 2, e)))?;
            if record.bleaching.is_none() && record.thermal_stress.is_none() {
                unmeasured += 1;
            }
            let mut observation =
                Observation::unmeasured(record.x, record.y, record.year, record.site);
            observation.bleaching = record.bleaching;
            observation.thermal_stress = record.thermal_stress;
            observations.push(observation);
        }
        if unmeasured > 0 {
            warn!(unmeasured, "Observation rows with no measured value");
        }
        Ok(Self {
            inner: MemorySampleStore::new(observations),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl SampleStore for CsvSampleStore {
    fn observations_for_year(&self, year: i32) -> Result<ObservationSet> {
        self.inner.observations_for_year(year)
    }

    fn observations_for_site(&self, name: &str) -> Result<ObservationSet> {
        self.inner.observations_for_site(name)
    }

    fn all(&self) -> Result<ObservationSet> {
        self.inner.all()
    }
}
