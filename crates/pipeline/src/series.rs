//! Year-ordered summaries of finished surfaces
//!
//! Every year of the requested range produces exactly one [`YearlySummary`].
//! A year without a surface, or whose samples all land on "no data", carries
//! an explicit [`SummaryValue::NoData`] instead of being left out.

use coralsurf_algorithms::statistics::extract_mean;
use coralsurf_core::{NoDataReason, Surface};
use tracing::{debug, warn};

use crate::config::YearRange;
use crate::persist::{SurfaceStage, SurfaceStore};
use crate::query::SeriesQuery;

/// Token printed for a missing value unless another one is configured
pub const DEFAULT_MISSING_TOKEN: &str = "No Data";

/// A year's finished surface, or why there is none
#[derive(Debug, Clone)]
pub enum SurfaceLookup {
    Present(Surface),
    Missing(NoDataReason),
}

impl SurfaceLookup {
    /// Final surface of `year` from `store`
    pub fn from_store(store: &dyn SurfaceStore, year: i32) -> Self {
        match store.load(year, SurfaceStage::Final) {
            Ok(Some(surface)) => SurfaceLookup::Present(surface),
            Ok(None) => SurfaceLookup::Missing(NoDataReason::MissingSurface),
            Err(e) => {
                warn!(year, error = %e, "Cannot load surface");
                SurfaceLookup::Missing(e.reason())
            }
        }
    }
}

/// Aggregate for one year
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SummaryValue {
    Value(f64),
    NoData(NoDataReason),
}

impl SummaryValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            SummaryValue::Value(v) => Some(*v),
            SummaryValue::NoData(_) => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, SummaryValue::NoData(_))
    }

    pub fn reason(&self) -> Option<NoDataReason> {
        match self {
            SummaryValue::Value(_) => None,
            SummaryValue::NoData(reason) => Some(*reason),
        }
    }
}

/// One (year, aggregate-or-missing) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearlySummary {
    pub year: i32,
    pub value: SummaryValue,
    /// Number of cells that contributed to the value
    pub sampled: usize,
}

/// One summary per year of a range, ascending, without gaps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSeries {
    summaries: Vec<YearlySummary>,
}

impl ResultSeries {
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &YearlySummary> {
        self.summaries.iter()
    }

    pub fn get(&self, year: i32) -> Option<&YearlySummary> {
        self.summaries
            .binary_search_by_key(&year, |s| s.year)
            .ok()
            .map(|i| &self.summaries[i])
    }

    /// Years that carry a value
    pub fn valued(&self) -> usize {
        self.iter().filter(|s| !s.value.is_no_data()).count()
    }

    /// Console table; missing values show `missing_token` and their reason
    pub fn to_table(&self, missing_token: &str) -> String {
        let mut out = String::from("Year  Value\n----  -----\n");
        for s in &self.summaries {
            let value = match s.value {
                SummaryValue::Value(v) => format!("{:.4}", v),
                SummaryValue::NoData(reason) => format!("{} ({})", missing_token, reason),
            };
            out.push_str(&format!("{:<4}  {}\n", s.year, value));
        }
        out
    }
}

impl<'a> IntoIterator for &'a ResultSeries {
    type Item = &'a YearlySummary;
    type IntoIter = std::slice::Iter<'a, YearlySummary>;

    fn into_iter(self) -> Self::IntoIter {
        self.summaries.iter()
    }
}

/// Summarize one year
pub fn summarize_year(year: i32, lookup: SurfaceLookup, query: &SeriesQuery) -> YearlySummary {
    let no_data = |reason| YearlySummary {
        year,
        value: SummaryValue::NoData(reason),
        sampled: 0,
    };

    let surface = match lookup {
        SurfaceLookup::Present(surface) => surface,
        SurfaceLookup::Missing(reason) => return no_data(reason),
    };
    if query.points.is_empty() {
        return no_data(NoDataReason::InsufficientData);
    }
    if let (Some(wanted), Some(actual)) = (&query.crs, surface.crs()) {
        if !wanted.is_equivalent(actual) {
            debug!(year, query = %wanted, surface = %actual, "CRS mismatch");
            return no_data(NoDataReason::CrsMismatch);
        }
    }

    let sample = extract_mean(&surface, &query.points);
    match sample.mean {
        Some(mean) => YearlySummary {
            year,
            value: SummaryValue::Value(mean),
            sampled: sample.sampled,
        },
        None => no_data(NoDataReason::NoSupport),
    }
}

/// Summarize every year of `years` in ascending order, asking `lookup` for
/// each year's surface.
pub fn summarize_series<F>(years: YearRange, query: &SeriesQuery, mut lookup: F) -> ResultSeries
where
    F: FnMut(i32) -> SurfaceLookup,
{
    let summaries = years
        .years()
        .map(|year| {
            let summary = summarize_year(year, lookup(year), query);
            debug!(year, value = ?summary.value, "Summarized year");
            summary
        })
        .collect();
    ResultSeries { summaries }
}

/// [`summarize_series`] over the final surfaces of `store`
pub fn summarize_store(years: YearRange, query: &SeriesQuery, store: &dyn SurfaceStore) -> ResultSeries {
    summarize_series(years, query, |year| SurfaceLookup::from_store(store, year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use coralsurf_algorithms::statistics::QueryPoints;
    use coralsurf_core::{GeoTransform, Raster, CRS};

    fn surface() -> Surface {
        let data = vec![
            12.0, 18.0, f64::NAN, //
            0.0, 0.0, 0.0, //
            f64::NAN, f64::NAN, f64::NAN,
        ];
        let mut s = Raster::from_vec(data, 3, 3).unwrap();
        s.set_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        s.set_nodata(Some(f64::NAN));
        s.set_crs(Some(CRS::from_epsg(32755)));
        s
    }

    fn points(points: Vec<(f64, f64)>) -> SeriesQuery {
        SeriesQuery {
            points: QueryPoints::Points(points),
            crs: None,
        }
    }

    #[test]
    fn test_nodata_sample_excluded() {
        let query = points(vec![(0.5, 2.5), (1.5, 2.5), (2.5, 2.5)]);
        let summary = summarize_year(2010, SurfaceLookup::Present(surface()), &query);
        assert_relative_eq!(summary.value.value().unwrap(), 15.0);
        assert_eq!(summary.sampled, 2);
    }

    #[test]
    fn test_all_points_unsupported_is_no_data_not_zero() {
        let query = points(vec![(0.5, 0.5), (2.5, 0.5), (50.0, 50.0)]);
        let summary = summarize_year(2010, SurfaceLookup::Present(surface()), &query);
        assert_eq!(summary.value, SummaryValue::NoData(NoDataReason::NoSupport));
    }

    #[test]
    fn test_zero_is_a_value() {
        let summary = summarize_year(2010, SurfaceLookup::Present(surface()), &points(vec![(1.5, 1.5)]));
        assert_eq!(summary.value, SummaryValue::Value(0.0));
    }

    #[test]
    fn test_missing_surface_keeps_year() {
        let query = points(vec![(0.5, 2.5)]);
        let series = summarize_series(YearRange::new(2002, 2006).unwrap(), &query, |year| {
            if year % 2 == 0 {
                SurfaceLookup::Present(surface())
            } else {
                SurfaceLookup::Missing(NoDataReason::MissingSurface)
            }
        });

        let years: Vec<i32> = series.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![2002, 2003, 2004, 2005, 2006]);
        assert_eq!(series.valued(), 3);
        assert_eq!(
            series.get(2003).unwrap().value,
            SummaryValue::NoData(NoDataReason::MissingSurface)
        );
        assert_eq!(series.get(2004).unwrap().value, SummaryValue::Value(12.0));
        assert!(series.get(2007).is_none());
    }

    #[test]
    fn test_crs_mismatch() {
        let mut query = points(vec![(0.5, 2.5)]);
        query.crs = Some(CRS::wgs84());
        let summary = summarize_year(2010, SurfaceLookup::Present(surface()), &query);
        assert_eq!(summary.value, SummaryValue::NoData(NoDataReason::CrsMismatch));

        query.crs = Some(CRS::from_epsg(32755));
        let summary = summarize_year(2010, SurfaceLookup::Present(surface()), &query);
        assert_eq!(summary.value, SummaryValue::Value(12.0));
    }

    #[test]
    fn test_empty_query() {
        let summary = summarize_year(2010, SurfaceLookup::Present(surface()), &points(vec![]));
        assert_eq!(summary.value, SummaryValue::NoData(NoDataReason::InsufficientData));
    }

    #[test]
    fn test_table_shows_reason() {
        let query = points(vec![(0.5, 2.5)]);
        let series = summarize_series(YearRange::new(2004, 2005).unwrap(), &query, |year| {
            if year == 2004 {
                SurfaceLookup::Present(surface())
            } else {
                SurfaceLookup::Missing(NoDataReason::DegenerateBoundary)
            }
        });
        let table = series.to_table(DEFAULT_MISSING_TOKEN);
        assert!(table.contains("2004  12.0000"));
        assert!(table.contains("2005  No Data (degenerate boundary)"));
    }
}
