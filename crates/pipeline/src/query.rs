//! Turning site and point selections into sampling locations

use coralsurf_algorithms::statistics::QueryPoints;
use coralsurf_algorithms::vector::{dissolve_buffers, BufferParams};
use coralsurf_core::{ObservationSet, Result, CRS};

use crate::config::{PointQuery, SiteQuery};

/// Where to read each year's surface, and in which spatial reference
#[derive(Debug, Clone)]
pub struct SeriesQuery {
    pub points: QueryPoints,
    /// Reference system of `points`; `None` means "same as the surfaces"
    pub crs: Option<CRS>,
}

impl SeriesQuery {
    /// Locations of the site's observations (across every year), buffered by
    /// `query.buffer_radius` and dissolved into one region.
    ///
    /// A site without observations yields an empty query.
    pub fn site(observations: &ObservationSet, query: &SiteQuery) -> Result<Self> {
        query.validate()?;
        let mut locations = observations.for_site(&query.name).locations();
        locations.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        locations.dedup();

        let points = if query.buffer_radius == 0.0 || locations.is_empty() {
            QueryPoints::Points(locations)
        } else {
            let params = BufferParams {
                distance: query.buffer_radius,
                ..BufferParams::default()
            };
            QueryPoints::Region {
                area: dissolve_buffers(&locations, &params)?,
                seeds: locations,
            }
        };
        Ok(Self { points, crs: None })
    }

    /// A single coordinate
    pub fn point(query: &PointQuery) -> Result<Self> {
        query.validate()?;
        Ok(Self {
            points: QueryPoints::Points(vec![(query.x, query.y)]),
            crs: query.crs.clone(),
        })
    }
}
