//! Thin plate spline constrained by barrier polygons
//!
//! Each barrier polygon is a separate region of support. A spline is fitted
//! per region from the samples that region contains, and a cell takes its
//! value from the spline of the region its centre falls in. Cells outside
//! every region are evaluated with the nearest region's spline. Samples in
//! one region therefore never pull the surface of another, and the
//! rectangular grid is still fully populated for the masking step.

use geo::{Area, BoundingRect, Coord, Distance, Euclidean, Intersects, MultiPolygon, Point, Polygon};
use ndarray::Array2;
use crate::maybe_rayon::*;
use coralsurf_core::raster::{GeoTransform, Raster};
use coralsurf_core::{Error, Result};

use super::tps::ThinPlateSpline;
use super::SamplePoint;

/// Parameters for barrier-constrained spline interpolation
#[derive(Debug, Clone, Copy)]
pub struct BarrierSplineParams {
    /// Output raster rows
    pub rows: usize,
    /// Output raster columns
    pub cols: usize,
    /// Output raster geotransform
    pub transform: GeoTransform,
    /// Smoothing weight (λ ≥ 0). 0.0 = exact interpolation.
    pub smoothing: f64,
}

impl Default for BarrierSplineParams {
    fn default() -> Self {
        Self {
            rows: 100,
            cols: 100,
            transform: GeoTransform::default(),
            smoothing: 0.0,
        }
    }
}

struct Region<'a> {
    polygon: &'a Polygon<f64>,
    envelope: Option<geo::Rect<f64>>,
    spline: Option<ThinPlateSpline>,
}

impl Region<'_> {
    fn contains(&self, c: Coord<f64>) -> bool {
        match self.envelope {
            Some(env) if env.intersects(&c) => self.polygon.intersects(&c),
            _ => false,
        }
    }
}

/// Fit a barrier-constrained spline and evaluate it on a grid.
///
/// Polygons of zero area in `barriers` are ignored. With no usable barrier
/// polygon the samples are fitted as a single unconstrained spline.
/// Samples lying outside every barrier polygon do not contribute.
/// Regions with too few samples to fit are left as "no data".
///
/// # Errors
/// Fails when no region could be fitted; the error of the best-supplied
/// region is returned (`InsufficientData` or `Interpolation`).
pub fn spline_with_barriers(
    points: &[SamplePoint],
    barriers: &MultiPolygon<f64>,
    params: BarrierSplineParams,
) -> Result<Raster<f64>> {
    let polygons: Vec<&Polygon<f64>> = barriers
        .0
        .iter()
        .filter(|p| p.unsigned_area() > 0.0)
        .collect();

    if polygons.is_empty() {
        let spline = ThinPlateSpline::fit(points, params.smoothing)?;
        let regions = vec![RegionFit::Unbounded(spline)];
        return evaluate_grid(&regions, &params);
    }

    let mut fits = Vec::with_capacity(polygons.len());
    let mut best_error: Option<(usize, Error)> = None;

    for polygon in polygons {
        let envelope = polygon.bounding_rect();
        let members: Vec<SamplePoint> = points
            .iter()
            .filter(|p| polygon.intersects(&Coord { x: p.x, y: p.y }))
            .copied()
            .collect();

        let spline = match ThinPlateSpline::fit(&members, params.smoothing) {
            Ok(spline) => Some(spline),
            Err(e @ Error::InvalidParameter { .. }) => return Err(e),
            Err(e) => {
                if best_error.as_ref().map_or(true, |(n, _)| members.len() > *n) {
                    best_error = Some((members.len(), e));
                }
                None
            }
        };
        fits.push(Region {
            polygon,
            envelope,
            spline,
        });
    }

    if fits.iter().all(|r| r.spline.is_none()) {
        return Err(best_error
            .map(|(_, e)| e)
            .unwrap_or(Error::InsufficientData {
                needed: ThinPlateSpline::MIN_POINTS,
                found: 0,
            }));
    }

    let regions: Vec<RegionFit> = fits.into_iter().map(RegionFit::Bounded).collect();
    evaluate_grid(&regions, &params)
}

enum RegionFit<'a> {
    Unbounded(ThinPlateSpline),
    Bounded(Region<'a>),
}

fn evaluate_grid(regions: &[RegionFit], params: &BarrierSplineParams) -> Result<Raster<f64>> {
    let rows = params.rows;
    let cols = params.cols;
    let transform = params.transform;

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let (x, y) = transform.pixel_to_geo(col, row);
                    evaluate_cell(regions, Coord { x, y })
                })
                .collect::<Vec<f64>>()
        })
        .collect();

    let mut output = Raster::from_array(
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?,
    );
    output.set_transform(transform);
    output.set_nodata(Some(f64::NAN));
    Ok(output)
}

fn evaluate_cell(regions: &[RegionFit], c: Coord<f64>) -> f64 {
    let mut nearest: Option<(f64, &ThinPlateSpline)> = None;

    for fit in regions {
        let region = match fit {
            RegionFit::Unbounded(spline) => return spline.evaluate(c.x, c.y),
            RegionFit::Bounded(region) => region,
        };
        if region.contains(c) {
            return region
                .spline
                .as_ref()
                .map_or(f64::NAN, |s| s.evaluate(c.x, c.y));
        }
        if let Some(spline) = &region.spline {
            let d = Euclidean.distance(&Point::from(c), region.polygon.exterior());
            if nearest.map_or(true, |(best, _)| d < best) {
                nearest = Some((d, spline));
            }
        }
    }

    nearest.map_or(f64::NAN, |(_, s)| s.evaluate(c.x, c.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::LineString;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + size, y0),
                (x0 + size, y0 + size),
                (x0, y0 + size),
                (x0, y0),
            ]),
            vec![],
        )
    }

    fn corners(x0: f64, y0: f64, size: f64, value: f64) -> Vec<SamplePoint> {
        vec![
            SamplePoint::new(x0, y0, value),
            SamplePoint::new(x0 + size, y0, value),
            SamplePoint::new(x0 + size, y0 + size, value),
            SamplePoint::new(x0, y0 + size, value),
        ]
    }

    fn grid(rows: usize, cols: usize, cell: f64, origin_y: f64) -> BarrierSplineParams {
        BarrierSplineParams {
            rows,
            cols,
            transform: GeoTransform::new(0.0, origin_y, cell, -cell),
            smoothing: 0.0,
        }
    }

    #[test]
    fn test_single_region_matches_plain_spline() {
        let mut points = corners(0.0, 0.0, 10.0, 10.0);
        points.push(SamplePoint::new(5.0, 5.0, 30.0));
        let barrier = MultiPolygon::new(vec![square(0.0, 0.0, 10.0)]);

        let surface = spline_with_barriers(&points, &barrier, grid(10, 10, 1.0, 10.0)).unwrap();
        let spline = ThinPlateSpline::fit(&points, 0.0).unwrap();

        for row in 0..10 {
            for col in 0..10 {
                let (x, y) = surface.cell_center(row, col);
                assert_relative_eq!(surface.get(row, col).unwrap(), spline.evaluate(x, y), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_regions_do_not_see_each_other() {
        // Two disjoint regions with constant but different values.
        let mut points = corners(0.0, 0.0, 10.0, 10.0);
        points.extend(corners(20.0, 0.0, 10.0, 90.0));
        let barrier = MultiPolygon::new(vec![square(0.0, 0.0, 10.0), square(20.0, 0.0, 10.0)]);

        let surface = spline_with_barriers(&points, &barrier, grid(10, 30, 1.0, 10.0)).unwrap();

        // Inside each region the surface is exactly that region's constant.
        assert_relative_eq!(surface.get(5, 5).unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(surface.get(5, 25).unwrap(), 90.0, epsilon = 1e-9);
        // The gap takes the nearest region's value rather than a blend.
        assert_relative_eq!(surface.get(5, 11).unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(surface.get(5, 18).unwrap(), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_undersupplied_region_is_nodata() {
        let mut points = corners(0.0, 0.0, 10.0, 10.0);
        points.push(SamplePoint::new(25.0, 5.0, 90.0));
        let barrier = MultiPolygon::new(vec![square(0.0, 0.0, 10.0), square(20.0, 0.0, 10.0)]);

        let surface = spline_with_barriers(&points, &barrier, grid(10, 30, 1.0, 10.0)).unwrap();
        assert_relative_eq!(surface.get(5, 5).unwrap(), 10.0, epsilon = 1e-9);
        assert!(surface.get(5, 25).unwrap().is_nan());
    }

    #[test]
    fn test_no_region_fitted_is_an_error() {
        let points = vec![SamplePoint::new(1.0, 1.0, 5.0), SamplePoint::new(2.0, 2.0, 6.0)];
        let barrier = MultiPolygon::new(vec![square(0.0, 0.0, 10.0)]);
        assert!(matches!(
            spline_with_barriers(&points, &barrier, grid(5, 5, 2.0, 10.0)),
            Err(Error::InsufficientData { found: 2, .. })
        ));
    }

    #[test]
    fn test_empty_barrier_fits_everything() {
        let points = corners(0.0, 0.0, 10.0, 7.0);
        let surface =
            spline_with_barriers(&points, &MultiPolygon::new(vec![]), grid(4, 4, 2.5, 10.0)).unwrap();
        assert_eq!(surface.valid_count(), 16);
        assert_relative_eq!(surface.get(1, 1).unwrap(), 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gap_cells_follow_nearest_edge() {
        // B sits diagonally off A's top-right corner
        let mut points = corners(0.0, 0.0, 10.0, 10.0);
        points.extend(corners(13.0, 13.0, 10.0, 90.0));
        let barrier = MultiPolygon::new(vec![square(0.0, 0.0, 10.0), square(13.0, 13.0, 10.0)]);

        let surface = spline_with_barriers(&points, &barrier, grid(23, 23, 1.0, 23.0)).unwrap();
        // centre (15.5, 5.5): 5.5 from A's right edge, 7.5 below B
        assert_relative_eq!(surface.get(17, 15).unwrap(), 10.0, epsilon = 1e-9);
        // centre (12.5, 12.5): next to B's corner, far from A's
        assert_relative_eq!(surface.get(10, 12).unwrap(), 90.0, epsilon = 1e-9);
    }
}
