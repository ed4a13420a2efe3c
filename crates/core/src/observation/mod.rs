//! Field observations and observation sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which measured quantity a surface is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Percentage of colonies bleached
    #[default]
    Bleaching,
    /// Thermal stress metric (e.g. degree heating weeks)
    ThermalStress,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Bleaching => "bleaching",
            Field::ThermalStress => "thermal_stress",
        }
    }
}

impl std::str::FromStr for Field {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "bleaching" | "percent_bl" => Ok(Field::Bleaching),
            "thermal_stress" | "dhw" | "ssta_dhw" => Ok(Field::ThermalStress),
            other => Err(crate::Error::invalid(
                "field",
                other,
                "expected bleaching or thermal_stress",
            )),
        }
    }
}

/// A single survey record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub x: f64,
    pub y: f64,
    pub year: i32,
    pub site: String,
    /// Bleaching percentage, nominally in [0, 100]
    pub bleaching: Option<f64>,
    pub thermal_stress: Option<f64>,
}

impl Observation {
    pub fn new(x: f64, y: f64, year: i32, site: impl Into<String>, bleaching: f64) -> Self {
        Self {
            x,
            y,
            year,
            site: site.into(),
            bleaching: Some(bleaching),
            thermal_stress: None,
        }
    }

    /// A record with no measured value; fill fields in with the `with_*` builders
    pub fn unmeasured(x: f64, y: f64, year: i32, site: impl Into<String>) -> Self {
        Self {
            x,
            y,
            year,
            site: site.into(),
            bleaching: None,
            thermal_stress: None,
        }
    }

    pub fn with_bleaching(mut self, value: f64) -> Self {
        self.bleaching = Some(value);
        self
    }

    pub fn with_thermal_stress(mut self, value: f64) -> Self {
        self.thermal_stress = Some(value);
        self
    }

    /// Value of `field`, if recorded
    pub fn value(&self, field: Field) -> Option<f64> {
        match field {
            Field::Bleaching => self.bleaching,
            Field::ThermalStress => self.thermal_stress,
        }
    }
}

/// Observations sharing a selection predicate (a year or a site)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationSet {
    observations: Vec<Observation>,
}

impl ObservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Observations recorded in `year`
    pub fn for_year(&self, year: i32) -> ObservationSet {
        self.iter().filter(|o| o.year == year).cloned().collect()
    }

    /// Observations at the site called `name` (exact match after trimming)
    pub fn for_site(&self, name: &str) -> ObservationSet {
        let name = name.trim();
        self.iter().filter(|o| o.site.trim() == name).cloned().collect()
    }

    /// (x, y) of every observation
    pub fn locations(&self) -> Vec<(f64, f64)> {
        self.iter().map(|o| (o.x, o.y)).collect()
    }

    /// (x, y, value) for observations that recorded `field`
    pub fn values(&self, field: Field) -> Vec<(f64, f64, f64)> {
        self.iter()
            .filter_map(|o| o.value(field).map(|v| (o.x, o.y, v)))
            .collect()
    }
}

impl FromIterator<Observation> for ObservationSet {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self {
            observations: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ObservationSet {
    type Item = Observation;
    type IntoIter = std::vec::IntoIter<Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.into_iter()
    }
}

/// Distinct, trimmed, non-empty site names in a set
pub fn distinct_site_names(set: &ObservationSet) -> BTreeSet<String> {
    set.iter()
        .map(|o| o.site.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
