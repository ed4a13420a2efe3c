//! Support boundary (convex hull) and bounding boxes

use coralsurf_core::{Error, Result};
use geo::{Area, BoundingRect, ConvexHull, Intersects};
use geo_types::{Coord, LineString, MultiPoint, MultiPolygon, Point, Polygon, Rect};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// The region an observation set supports: the convex hull of its locations.
///
/// With fewer than three distinct locations, or when all locations are
/// collinear, the hull has no area. Such a boundary is *degenerate*: it is
/// still returned, but it supports nothing and [`SupportBoundary::contains`]
/// is false everywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportBoundary {
    hull: Polygon<f64>,
    envelope: BoundingBox,
    distinct_points: usize,
    area: f64,
}

impl SupportBoundary {
    /// Build the convex hull of `locations`.
    ///
    /// # Errors
    /// - `InsufficientData` when `locations` is empty
    /// - `InvalidParameter` when a coordinate is not finite
    pub fn from_locations(locations: &[(f64, f64)]) -> Result<Self> {
        if locations.is_empty() {
            return Err(Error::InsufficientData { needed: 1, found: 0 });
        }
        if let Some(&(x, y)) = locations.iter().find(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(Error::invalid(
                "location",
                format!("({}, {})", x, y),
                "coordinates must be finite",
            ));
        }

        let mut distinct: Vec<(f64, f64)> = locations.to_vec();
        distinct.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        distinct.dedup();
        let distinct_points = distinct.len();

        let hull = if distinct_points < 3 {
            let mut ring: Vec<(f64, f64)> = distinct.clone();
            ring.push(distinct[0]);
            Polygon::new(LineString::from(ring), vec![])
        } else {
            MultiPoint::from(
                distinct
                    .iter()
                    .map(|&(x, y)| Point::new(x, y))
                    .collect::<Vec<_>>(),
            )
            .convex_hull()
        };

        let envelope = hull
            .bounding_rect()
            .map(BoundingBox::from)
            .unwrap_or(BoundingBox::new(distinct[0].0, distinct[0].1, distinct[0].0, distinct[0].1));

        // Collinear input yields a sliver whose area is rounding noise.
        let scale = envelope.width().max(envelope.height());
        let area = hull.unsigned_area();
        let area = if area <= 1e-12 * scale * scale { 0.0 } else { area };

        Ok(Self {
            hull,
            envelope,
            distinct_points,
            area,
        })
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.hull
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.envelope
    }

    pub fn distinct_points(&self) -> usize {
        self.distinct_points
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn is_degenerate(&self) -> bool {
        self.area == 0.0
    }

    /// Fail with `DegenerateBoundary` unless the boundary encloses an area.
    pub fn require_area(&self) -> Result<&Self> {
        if self.is_degenerate() {
            Err(Error::DegenerateBoundary {
                distinct_points: self.distinct_points,
            })
        } else {
            Ok(self)
        }
    }

    /// Whether (`x`, `y`) lies inside or on the boundary.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        !self.is_degenerate()
            && self.envelope.contains_point(x, y)
            && self.hull.intersects(&Coord { x, y })
    }

    /// The boundary as a barrier set; empty when degenerate.
    pub fn as_barriers(&self) -> MultiPolygon<f64> {
        if self.is_degenerate() {
            MultiPolygon::new(vec![])
        } else {
            MultiPolygon::new(vec![self.hull.clone()])
        }
    }
}
