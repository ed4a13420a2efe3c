//! Per-year surface reconstruction
//!
//! For one year: support boundary, barrier spline over the boundary's
//! extent, correction to the physical floor, then masking to the boundary.
//! Years share nothing, so a run maps the chain over the year range with
//! the configured [`ProcessingMode`](coralsurf_parallel::ProcessingMode).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use coralsurf_algorithms::interpolation::{spline_with_barriers, BarrierSplineParams, SamplePoint, ThinPlateSpline};
use coralsurf_algorithms::surface::{clamp_below, mask_to_support};
use coralsurf_algorithms::vector::SupportBoundary;
use coralsurf_core::{Error, GeoTransform, NoDataReason, ObservationSet, Result, Surface};
use coralsurf_parallel::ParallelStrategy;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::persist::{SurfaceStage, SurfaceStore};
use crate::store::SampleStore;

/// Every stage of one year's reconstruction
#[derive(Debug, Clone)]
pub struct YearSurfaces {
    pub boundary: SupportBoundary,
    /// Raw spline over the boundary's bounding box
    pub spline: Surface,
    /// Spline raised to the lower bound
    pub corrected: Surface,
    /// Corrected surface with cells outside the boundary set to "no data"
    pub masked: Surface,
}

/// Run the reconstruction chain for one set of observations.
///
/// # Errors
/// - `InsufficientData` when fewer than three distinct locations carry the configured field
/// - `DegenerateBoundary` when the locations are collinear
/// - `Interpolation` for non-finite input, oversized grids and singular systems
pub fn build_surface(observations: &ObservationSet, config: &PipelineConfig) -> Result<YearSurfaces> {
    let samples: Vec<SamplePoint> = observations
        .values(config.field)
        .into_iter()
        .map(SamplePoint::from)
        .collect();

    if let Some(bad) = samples.iter().find(|p| !p.is_finite()) {
        return Err(Error::Interpolation(format!(
            "non-finite observation ({}, {}) = {}",
            bad.x, bad.y, bad.value
        )));
    }
    if samples.is_empty() {
        return Err(Error::InsufficientData {
            needed: ThinPlateSpline::MIN_POINTS,
            found: 0,
        });
    }

    let locations: Vec<(f64, f64)> = samples.iter().map(|p| (p.x, p.y)).collect();
    let boundary = SupportBoundary::from_locations(&locations)?;
    if boundary.distinct_points() < ThinPlateSpline::MIN_POINTS {
        return Err(Error::InsufficientData {
            needed: ThinPlateSpline::MIN_POINTS,
            found: boundary.distinct_points(),
        });
    }
    boundary.require_area()?;

    let bbox = boundary.bounding_box();
    let (transform, rows, cols) =
        GeoTransform::covering(bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y, config.cell_size)?;
    let cells = rows.saturating_mul(cols);
    if cells > config.max_cells {
        return Err(Error::Interpolation(format!(
            "{} x {} grid ({} cells) exceeds max_cells = {}",
            rows, cols, cells, config.max_cells
        )));
    }

    let params = BarrierSplineParams {
        rows,
        cols,
        transform,
        smoothing: config.smoothing,
    };
    let mut spline = spline_with_barriers(&samples, &boundary.as_barriers(), params)?;
    spline.set_crs(config.spatial_reference());
    spline.set_nodata(Some(f64::NAN));

    let corrected = clamp_below(&spline, config.lower_bound);
    let masked = mask_to_support(&corrected, &boundary)?;

    Ok(YearSurfaces {
        boundary,
        spline,
        corrected,
        masked,
    })
}

/// Shared flag that stops a run from starting further years
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// What happened to one year of a run
#[derive(Debug, Clone, PartialEq)]
pub enum YearOutcome {
    Built {
        year: i32,
        observations: usize,
        valid_cells: usize,
    },
    Failed {
        year: i32,
        reason: NoDataReason,
        message: String,
    },
}

impl YearOutcome {
    pub fn year(&self) -> i32 {
        match self {
            YearOutcome::Built { year, .. } | YearOutcome::Failed { year, .. } => *year,
        }
    }

    pub fn is_built(&self) -> bool {
        matches!(self, YearOutcome::Built { .. })
    }

    /// Reason for a failed year
    pub fn reason(&self) -> Option<NoDataReason> {
        match self {
            YearOutcome::Built { .. } => None,
            YearOutcome::Failed { reason, .. } => Some(*reason),
        }
    }

    fn failed(year: i32, err: &Error) -> Self {
        YearOutcome::Failed {
            year,
            reason: err.reason(),
            message: err.to_string(),
        }
    }

    fn cancelled(year: i32) -> Self {
        YearOutcome::Failed {
            year,
            reason: NoDataReason::Cancelled,
            message: "run cancelled".to_string(),
        }
    }
}

/// One outcome per year of the configured range, ascending
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    outcomes: Vec<YearOutcome>,
}

impl BuildReport {
    pub fn outcomes(&self) -> &[YearOutcome] {
        &self.outcomes
    }

    pub fn outcome(&self, year: i32) -> Option<&YearOutcome> {
        self.outcomes.iter().find(|o| o.year() == year)
    }

    pub fn built(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_built()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.built()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Build and persist the surface of every year in `config.years`.
///
/// Only configuration errors fail the call; a year that cannot be built is
/// recorded in the report and its stored surfaces are removed.
pub fn build_surfaces(
    samples: &dyn SampleStore,
    surfaces: &dyn SurfaceStore,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<BuildReport> {
    build_surfaces_with(samples, surfaces, config, cancel, |_| {})
}

/// [`build_surfaces`], calling `on_year` as each year finishes (in completion order)
pub fn build_surfaces_with<F>(
    samples: &dyn SampleStore,
    surfaces: &dyn SurfaceStore,
    config: &PipelineConfig,
    cancel: &CancelToken,
    on_year: F,
) -> Result<BuildReport>
where
    F: Fn(&YearOutcome) + Sync + Send,
{
    config.validate()?;

    let years: Vec<i32> = config.years.years().collect();
    let mode = config.processing_mode();
    info!(years = %config.years, ?mode, field = config.field.as_str(), "Building surfaces");

    let outcomes = mode.par_map(&years, |&year| {
        let outcome = build_year(year, samples, surfaces, config, cancel);
        on_year(&outcome);
        outcome
    });

    let report = BuildReport { outcomes };
    info!(built = report.built(), failed = report.failed(), "Finished building surfaces");
    Ok(report)
}

fn build_year(
    year: i32,
    samples: &dyn SampleStore,
    surfaces: &dyn SurfaceStore,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> YearOutcome {
    if cancel.is_cancelled() {
        discard(year, surfaces);
        return YearOutcome::cancelled(year);
    }

    let observations = match samples.observations_for_year(year) {
        Ok(set) => set,
        Err(e) => {
            warn!(year, error = %e, "Cannot read observations");
            return YearOutcome::failed(year, &e);
        }
    };
    debug!(year, observations = observations.len(), "Building surface");

    let built = match build_surface(&observations, config) {
        Ok(built) => built,
        Err(e) => {
            warn!(year, reason = %e.reason(), error = %e, "No surface for year");
            discard(year, surfaces);
            return YearOutcome::failed(year, &e);
        }
    };

    if cancel.is_cancelled() {
        debug!(year, "Cancelled, discarding surface");
        discard(year, surfaces);
        return YearOutcome::cancelled(year);
    }

    if let Err(e) = persist(year, &built, surfaces, config.keep_intermediate) {
        warn!(year, error = %e, "Cannot save surface");
        discard(year, surfaces);
        return YearOutcome::failed(year, &e);
    }

    let valid_cells = built.masked.valid_count();
    info!(year, observations = observations.len(), valid_cells, "Surface built");
    YearOutcome::Built {
        year,
        observations: observations.len(),
        valid_cells,
    }
}

fn persist(year: i32, built: &YearSurfaces, surfaces: &dyn SurfaceStore, keep_intermediate: bool) -> Result<()> {
    if keep_intermediate {
        surfaces.save(year, SurfaceStage::Spline, &built.spline)?;
        surfaces.save(year, SurfaceStage::Corrected, &built.corrected)?;
    }
    surfaces.save(year, SurfaceStage::Final, &built.masked)
}

// Stale surfaces from an earlier run must not answer for a failed or cancelled year
fn discard(year: i32, surfaces: &dyn SurfaceStore) {
    for stage in SurfaceStage::ALL {
        if let Err(e) = surfaces.remove(year, stage) {
            warn!(year, %stage, error = %e, "Cannot remove stale surface");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::YearRange;
    use crate::persist::MemorySurfaceStore;
    use crate::store::MemorySampleStore;
    use approx::assert_relative_eq;
    use coralsurf_core::{Field, Observation};

    fn config(start: i32, end: i32) -> PipelineConfig {
        let mut config = PipelineConfig::new(YearRange::new(start, end).unwrap());
        config.cell_size = 1.0;
        config
    }

    fn square(year: i32, values: [f64; 4]) -> Vec<Observation> {
        let corners = [(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)];
        corners
            .iter()
            .zip(values)
            .map(|(&(x, y), v)| Observation::new(x, y, year, "Reef", v))
            .collect()
    }

    #[test]
    fn test_square_centroid_within_sample_range() {
        let set: ObservationSet = square(2010, [10.0, 20.0, 30.0, 40.0]).into_iter().collect();
        let built = build_surface(&set, &config(2010, 2010)).unwrap();

        assert_eq!(built.spline.shape(), (20, 20));
        let centre = built.masked.sample(10.0, 10.0).unwrap();
        assert!((10.0..=40.0).contains(&centre), "centre value {}", centre);
        assert!(built.masked.data().iter().filter(|v| !v.is_nan()).all(|&v| v >= 0.0));
    }

    #[test]
    fn test_every_masked_cell_inside_boundary() {
        let mut obs = square(2011, [5.0, 60.0, 15.0, 80.0]);
        obs.push(Observation::new(30.0, 10.0, 2011, "Reef", 45.0));
        let set: ObservationSet = obs.into_iter().collect();
        let built = build_surface(&set, &config(2011, 2011)).unwrap();

        let (rows, cols) = built.masked.shape();
        for row in 0..rows {
            for col in 0..cols {
                let (x, y) = built.masked.cell_center(row, col);
                let v = built.masked.get(row, col).unwrap();
                if built.boundary.contains(x, y) {
                    assert!(v >= 0.0);
                    assert_eq!(v, built.corrected.get(row, col).unwrap());
                } else {
                    assert!(v.is_nan());
                }
            }
        }
    }

    #[test]
    fn test_field_selects_contributing_rows() {
        let mut obs = square(2013, [10.0, 20.0, 30.0, 40.0]);
        for (o, dhw) in obs.iter_mut().zip([1.0, 2.0, 3.0, 4.0]) {
            o.thermal_stress = Some(dhw);
        }
        obs[2].bleaching = None;
        let set: ObservationSet = obs.into_iter().collect();

        let mut cfg = config(2013, 2013);
        cfg.field = Field::ThermalStress;
        let built = build_surface(&set, &cfg).unwrap();
        assert_eq!(built.boundary.distinct_points(), 4);
        assert!((built.boundary.area() - 400.0).abs() < 1e-9);

        // the bleaching surface only sees the three remaining corners
        cfg.field = Field::Bleaching;
        let built = build_surface(&set, &cfg).unwrap();
        assert_eq!(built.boundary.distinct_points(), 3);
        assert!((built.boundary.area() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_spline_values_corrected() {
        // a steep dip drives the exact spline below zero between samples
        let obs = vec![
            Observation::new(0.0, 0.0, 2012, "Reef", 0.0),
            Observation::new(10.0, 0.0, 2012, "Reef", 0.0),
            Observation::new(0.0, 10.0, 2012, "Reef", 0.0),
            Observation::new(10.0, 10.0, 2012, "Reef", 0.0),
            Observation::new(4.0, 5.0, 2012, "Reef", 0.0),
            Observation::new(6.0, 5.0, 2012, "Reef", 100.0),
        ];
        let set: ObservationSet = obs.into_iter().collect();
        let built = build_surface(&set, &config(2012, 2012)).unwrap();
        assert!(built.spline.data().iter().any(|&v| v < 0.0));
        assert!(built.corrected.data().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_single_point_is_insufficient() {
        let set: ObservationSet = vec![Observation::new(1.0, 1.0, 2005, "Reef", 30.0)]
            .into_iter()
            .collect();
        let err = build_surface(&set, &config(2005, 2005)).unwrap_err();
        assert_eq!(err.reason(), NoDataReason::InsufficientData);
    }

    #[test]
    fn test_collinear_points_degenerate() {
        let set: ObservationSet = (0..4)
            .map(|i| Observation::new(i as f64, i as f64, 2006, "Reef", 10.0))
            .collect();
        let err = build_surface(&set, &config(2006, 2006)).unwrap_err();
        assert!(matches!(err, Error::DegenerateBoundary { distinct_points: 4 }));
        assert_eq!(err.reason(), NoDataReason::DegenerateBoundary);
    }

    #[test]
    fn test_non_finite_value_fails_interpolation() {
        let mut obs = square(2007, [1.0, 2.0, 3.0, 4.0]);
        obs[2].bleaching = Some(f64::NAN);
        let set: ObservationSet = obs.into_iter().collect();
        let err = build_surface(&set, &config(2007, 2007)).unwrap_err();
        assert_eq!(err.reason(), NoDataReason::InterpolationFailure);
    }

    #[test]
    fn test_grid_size_guard() {
        let set: ObservationSet = square(2008, [1.0, 2.0, 3.0, 4.0]).into_iter().collect();
        let mut cfg = config(2008, 2008);
        cfg.max_cells = 100;
        assert!(matches!(build_surface(&set, &cfg), Err(Error::Interpolation(_))));
    }

    #[test]
    fn test_thermal_stress_field() {
        let obs: Vec<Observation> = square(2009, [1.0, 2.0, 3.0, 4.0])
            .into_iter()
            .enumerate()
            .map(|(i, o)| o.with_thermal_stress(i as f64 * 2.0))
            .collect();
        let set: ObservationSet = obs.into_iter().collect();
        let mut cfg = config(2009, 2009);
        cfg.field = Field::ThermalStress;
        let built = build_surface(&set, &cfg).unwrap();
        assert_relative_eq!(built.spline.sample(20.0, 20.0).unwrap(), 4.0, epsilon = 0.5);
    }

    #[test]
    fn test_run_reports_every_year() {
        let mut obs = square(2010, [10.0, 20.0, 30.0, 40.0]);
        obs.extend(square(2012, [5.0, 5.0, 5.0, 5.0]));
        obs.push(Observation::new(3.0, 3.0, 2011, "Reef", 12.0));
        let samples: MemorySampleStore = obs.into_iter().collect();
        let surfaces = MemorySurfaceStore::new();

        let report =
            build_surfaces(&samples, &surfaces, &config(2009, 2012), &CancelToken::new()).unwrap();

        let years: Vec<i32> = report.outcomes().iter().map(|o| o.year()).collect();
        assert_eq!(years, vec![2009, 2010, 2011, 2012]);
        assert_eq!(report.built(), 2);
        assert_eq!(report.outcome(2009).unwrap().reason(), Some(NoDataReason::InsufficientData));
        assert_eq!(report.outcome(2011).unwrap().reason(), Some(NoDataReason::InsufficientData));
        assert!(surfaces.load(2010, SurfaceStage::Final).unwrap().is_some());
        assert!(surfaces.load(2010, SurfaceStage::Spline).unwrap().is_none());
        assert!(surfaces.load(2011, SurfaceStage::Final).unwrap().is_none());
    }

    #[test]
    fn test_intermediate_stages_kept_on_request() {
        let samples: MemorySampleStore = square(2010, [1.0, 2.0, 3.0, 4.0]).into_iter().collect();
        let surfaces = MemorySurfaceStore::new();
        let mut cfg = config(2010, 2010);
        cfg.keep_intermediate = true;
        cfg.crs = Some(32755);

        build_surfaces(&samples, &surfaces, &cfg, &CancelToken::new()).unwrap();
        assert_eq!(surfaces.keys().unwrap().len(), 3);
        let stored = surfaces.load(2010, SurfaceStage::Final).unwrap().unwrap();
        assert_eq!(stored.crs().and_then(|c| c.epsg()), Some(32755));
    }

    #[test]
    fn test_failed_year_removes_stale_surface() {
        let samples = MemorySampleStore::default();
        let surfaces = MemorySurfaceStore::new();
        surfaces.save(2010, SurfaceStage::Final, &Surface::filled(2, 2, 1.0)).unwrap();

        build_surfaces(&samples, &surfaces, &config(2010, 2010), &CancelToken::new()).unwrap();
        assert!(surfaces.load(2010, SurfaceStage::Final).unwrap().is_none());
    }

    #[test]
    fn test_cancelled_run_starts_nothing() {
        let samples: MemorySampleStore = square(2010, [1.0, 2.0, 3.0, 4.0]).into_iter().collect();
        let surfaces = MemorySurfaceStore::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = build_surfaces(&samples, &surfaces, &config(2010, 2011), &cancel).unwrap();
        assert_eq!(report.len(), 2);
        assert!(report
            .outcomes()
            .iter()
            .all(|o| o.reason() == Some(NoDataReason::Cancelled)));
        assert!(surfaces.keys().unwrap().is_empty());
    }

    /// Cancels the run while `year`'s observations are being read
    struct CancelOnRead {
        inner: MemorySampleStore,
        year: i32,
        cancel: CancelToken,
    }

    impl SampleStore for CancelOnRead {
        fn observations_for_year(&self, year: i32) -> Result<ObservationSet> {
            if year == self.year {
                self.cancel.cancel();
            }
            self.inner.observations_for_year(year)
        }

        fn observations_for_site(&self, name: &str) -> Result<ObservationSet> {
            self.inner.observations_for_site(name)
        }

        fn all(&self) -> Result<ObservationSet> {
            self.inner.all()
        }
    }

    #[test]
    fn test_cancel_mid_year_removes_stale_surface() {
        let mut obs = square(2010, [1.0, 2.0, 3.0, 4.0]);
        obs.extend(square(2011, [5.0, 6.0, 7.0, 8.0]));
        let cancel = CancelToken::new();
        let samples = CancelOnRead {
            inner: obs.into_iter().collect(),
            year: 2011,
            cancel: cancel.clone(),
        };
        let surfaces = MemorySurfaceStore::new();
        surfaces.save(2011, SurfaceStage::Final, &Surface::filled(2, 2, 1.0)).unwrap();

        let mut cfg = config(2010, 2011);
        cfg.threads = Some(1);
        let report = build_surfaces(&samples, &surfaces, &cfg, &cancel).unwrap();

        assert!(report.outcome(2010).unwrap().is_built());
        assert_eq!(report.outcome(2011).unwrap().reason(), Some(NoDataReason::Cancelled));
        assert!(surfaces.load(2010, SurfaceStage::Final).unwrap().is_some());
        assert!(surfaces.load(2011, SurfaceStage::Final).unwrap().is_none());
    }

    #[test]
    fn test_invalid_configuration_aborts_run() {
        let samples = MemorySampleStore::default();
        let surfaces = MemorySurfaceStore::new();
        let mut cfg = config(2010, 2012);
        cfg.cell_size = 0.0;
        assert!(matches!(
            build_surfaces(&samples, &surfaces, &cfg, &CancelToken::new()),
            Err(Error::InvalidParameter { name: "cell_size", .. })
        ));
    }
}
