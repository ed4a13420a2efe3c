//! Masking a surface to the region supported by observations

use crate::maybe_rayon::*;
use crate::vector::SupportBoundary;
use coralsurf_core::raster::Raster;
use coralsurf_core::{Error, Result};
use ndarray::Array2;

/// Keep cells whose centre lies inside or on `boundary`; every other cell
/// becomes "no data". A degenerate boundary masks the whole surface.
pub fn mask_to_support(surface: &Raster<f64>, boundary: &SupportBoundary) -> Result<Raster<f64>> {
    let (rows, cols) = surface.shape();
    let transform = *surface.transform();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let (x, y) = transform.pixel_to_geo(col, row);
                    if boundary.contains(x, y) {
                        surface.data()[(row, col)]
                    } else {
                        f64::NAN
                    }
                })
                .collect::<Vec<f64>>()
        })
        .collect();

    let mut output = surface.like(f64::NAN);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}
