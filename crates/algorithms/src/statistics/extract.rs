//! Point extraction and aggregation
//!
//! A query is either a set of locations (each sampled from the cell that
//! contains it) or a buffered region (every cell whose centre lies inside).
//! The aggregate is the mean over sampled values that are not "no data".

use coralsurf_core::raster::Raster;
use geo::{BoundingRect, Coord, Intersects, MultiPolygon, Rect};

/// Locations to read from a surface
#[derive(Debug, Clone)]
pub enum QueryPoints {
    /// Discrete locations, one cell each
    Points(Vec<(f64, f64)>),
    /// Area around `seeds`. Cells are selected by centre; when the area is
    /// smaller than a cell the seeds themselves are sampled.
    Region {
        area: MultiPolygon<f64>,
        seeds: Vec<(f64, f64)>,
    },
}

impl QueryPoints {
    pub fn is_empty(&self) -> bool {
        match self {
            QueryPoints::Points(points) => points.is_empty(),
            QueryPoints::Region { area, seeds } => area.0.is_empty() && seeds.is_empty(),
        }
    }
}

/// Outcome of sampling one surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSample {
    /// Cells visited
    pub cells: usize,
    /// Cells that held a value
    pub sampled: usize,
    /// Mean of the held values, `None` when nothing was sampled
    pub mean: Option<f64>,
}

impl PointSample {
    fn from_values(values: &[Option<f64>]) -> Self {
        let mut sum = 0.0;
        let mut sampled = 0usize;
        for v in values.iter().flatten() {
            sum += v;
            sampled += 1;
        }
        Self {
            cells: values.len(),
            sampled,
            mean: if sampled > 0 {
                Some(sum / sampled as f64)
            } else {
                None
            },
        }
    }
}

/// Value at each location, `None` for off-grid or "no data" cells
pub fn sample_points(surface: &Raster<f64>, points: &[(f64, f64)]) -> Vec<Option<f64>> {
    points.iter().map(|&(x, y)| surface.sample(x, y)).collect()
}

/// Sample `query` from `surface` and average the values found
pub fn extract_mean(surface: &Raster<f64>, query: &QueryPoints) -> PointSample {
    match query {
        QueryPoints::Points(points) => PointSample::from_values(&sample_points(surface, points)),
        QueryPoints::Region { area, seeds } => {
            let values = region_values(surface, area);
            if values.is_empty() {
                PointSample::from_values(&sample_points(surface, seeds))
            } else {
                PointSample::from_values(&values)
            }
        }
    }
}

/// Values of every cell whose centre falls inside `area`
fn region_values(surface: &Raster<f64>, area: &MultiPolygon<f64>) -> Vec<Option<f64>> {
    let Some(envelope) = area.bounding_rect() else {
        return Vec::new();
    };
    let (rows, cols) = surface.shape();
    let Some((row_range, col_range)) = window(surface, &envelope) else {
        return Vec::new();
    };

    let mut values = Vec::new();
    for row in row_range.0..=row_range.1.min(rows - 1) {
        for col in col_range.0..=col_range.1.min(cols - 1) {
            let (x, y) = surface.cell_center(row, col);
            if area.intersects(&Coord { x, y }) {
                let v = surface.data()[(row, col)];
                values.push(if surface.is_nodata(v) { None } else { Some(v) });
            }
        }
    }
    values
}

/// Row and column span of the grid overlapping `envelope`
fn window(surface: &Raster<f64>, envelope: &Rect<f64>) -> Option<((usize, usize), (usize, usize))> {
    let (rows, cols) = surface.shape();
    if rows == 0 || cols == 0 {
        return None;
    }
    let t = surface.transform();
    let (c0, r0) = t.geo_to_pixel(envelope.min().x, envelope.max().y);
    let (c1, r1) = t.geo_to_pixel(envelope.max().x, envelope.min().y);

    let clamp = |v: f64, n: usize| -> Option<usize> {
        if !v.is_finite() {
            return None;
        }
        Some(v.floor().max(0.0).min((n - 1) as f64) as usize)
    };
    let (c_lo, c_hi) = (c0.min(c1), c0.max(c1));
    let (r_lo, r_hi) = (r0.min(r1), r0.max(r1));
    if c_hi < 0.0 || r_hi < 0.0 || c_lo >= cols as f64 || r_lo >= rows as f64 {
        return None;
    }
    Some((
        (clamp(r_lo, rows)?, clamp(r_hi, rows)?),
        (clamp(c_lo, cols)?, clamp(c_hi, cols)?),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use coralsurf_core::GeoTransform;
    use geo::{LineString, Polygon};

    fn grid() -> Raster<f64> {
        // 3x3, cells of size 1, covering (0,0)-(3,3)
        let data = vec![
            12.0, 18.0, f64::NAN, //
            1.0, 2.0, 3.0, //
            4.0, 5.0, 6.0,
        ];
        let mut r = Raster::from_vec(data, 3, 3).unwrap();
        r.set_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        r.set_nodata(Some(f64::NAN));
        r
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )])
    }

    #[test]
    fn test_nodata_excluded_from_mean() {
        let query = QueryPoints::Points(vec![(0.5, 2.5), (1.5, 2.5), (2.5, 2.5)]);
        let sample = extract_mean(&grid(), &query);
        assert_eq!(sample.cells, 3);
        assert_eq!(sample.sampled, 2);
        assert_relative_eq!(sample.mean.unwrap(), 15.0);
    }

    #[test]
    fn test_points_off_grid_give_no_value() {
        let query = QueryPoints::Points(vec![(-10.0, -10.0), (50.0, 1.0)]);
        let sample = extract_mean(&grid(), &query);
        assert_eq!(sample.sampled, 0);
        assert!(sample.mean.is_none());
    }

    #[test]
    fn test_sample_points_per_location() {
        let values = sample_points(&grid(), &[(0.5, 0.5), (2.5, 2.5), (9.0, 9.0)]);
        assert_eq!(values, vec![Some(4.0), None, None]);
    }

    #[test]
    fn test_region_uses_cell_centres() {
        // covers centres (0.5,0.5), (1.5,0.5), (0.5,1.5), (1.5,1.5)
        let query = QueryPoints::Region {
            area: square(0.0, 0.0, 2.0, 2.0),
            seeds: vec![(1.0, 1.0)],
        };
        let sample = extract_mean(&grid(), &query);
        assert_eq!(sample.cells, 4);
        assert_relative_eq!(sample.mean.unwrap(), (1.0 + 2.0 + 4.0 + 5.0) / 4.0);
    }

    #[test]
    fn test_small_region_falls_back_to_seeds() {
        let query = QueryPoints::Region {
            area: square(2.1, 0.1, 2.2, 0.2),
            seeds: vec![(2.15, 0.15)],
        };
        let sample = extract_mean(&grid(), &query);
        assert_eq!(sample.cells, 1);
        assert_relative_eq!(sample.mean.unwrap(), 6.0);
    }

    #[test]
    fn test_region_outside_grid() {
        let query = QueryPoints::Region {
            area: square(100.0, 100.0, 101.0, 101.0),
            seeds: vec![(100.5, 100.5)],
        };
        let sample = extract_mean(&grid(), &query);
        assert!(sample.mean.is_none());
        assert!(!query.is_empty());
    }
}
