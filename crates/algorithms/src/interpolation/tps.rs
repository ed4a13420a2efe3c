//! Thin Plate Spline (TPS) interpolation
//!
//! The fitted surface has the form:
//! ```text
//! f(x,y) = a₁ + a₂·x + a₃·y + Σᵢ wᵢ · U(‖(x,y) - (xᵢ,yᵢ)‖)
//! ```
//! where U(r) = r²·ln(r) is the TPS radial basis function in 2D. The weights
//! solve the (n+3)×(n+3) system
//! ```text
//! [K + λI  P] [w]   [z]
//! [Pᵀ      0] [a] = [0]
//! ```
//! λ = 0 interpolates every sample exactly; λ > 0 gives a smoothing spline
//! that trades fidelity at the samples for a smoother surface.
//!
//! Coordinates are centred on the sample mean and scaled by the largest
//! offset before fitting, so λ is expressed in that unit-free space and the
//! system stays well conditioned for projected (metre) coordinates.
//!
//! Reference:
//! Wahba, G. (1990). Spline Models for Observational Data. SIAM.

use coralsurf_core::{Error, Result};

use super::SamplePoint;

/// TPS radial basis function: U(r) = r² · ln(r), with U(0) = 0
#[inline]
fn tps_kernel(r: f64) -> f64 {
    if r < 1e-15 {
        0.0
    } else {
        r * r * r.ln()
    }
}

/// A fitted thin plate spline that can be evaluated anywhere.
///
/// Owns its working memory, so independent fits can run on separate threads.
#[derive(Debug, Clone)]
pub struct ThinPlateSpline {
    /// Sample locations in normalized coordinates
    centers: Vec<(f64, f64)>,
    weights: Vec<f64>,
    /// a₁, a₂, a₃
    affine: [f64; 3],
    origin: (f64, f64),
    scale: f64,
}

impl ThinPlateSpline {
    /// Fewest distinct, non-collinear samples a fit needs
    pub const MIN_POINTS: usize = 3;

    /// Fit a spline through `points`.
    ///
    /// Samples at the same location are merged (values averaged) first.
    ///
    /// # Errors
    /// - `InvalidParameter` if `smoothing` is negative or not finite
    /// - `Interpolation` if any sample is not finite, or the system is
    ///   singular (collinear samples)
    /// - `InsufficientData` if fewer than [`Self::MIN_POINTS`] distinct samples remain
    pub fn fit(points: &[SamplePoint], smoothing: f64) -> Result<Self> {
        if !(smoothing.is_finite() && smoothing >= 0.0) {
            return Err(Error::invalid("smoothing", smoothing, "must be a finite value >= 0"));
        }
        if let Some(bad) = points.iter().find(|p| !p.is_finite()) {
            return Err(Error::Interpolation(format!(
                "non-finite sample ({}, {}) = {}",
                bad.x, bad.y, bad.value
            )));
        }

        let points = merge_coincident(points);
        let n = points.len();
        if n < Self::MIN_POINTS {
            return Err(Error::InsufficientData {
                needed: Self::MIN_POINTS,
                found: n,
            });
        }

        let origin = (
            points.iter().map(|p| p.x).sum::<f64>() / n as f64,
            points.iter().map(|p| p.y).sum::<f64>() / n as f64,
        );
        let scale = points
            .iter()
            .map(|p| (p.x - origin.0).abs().max((p.y - origin.1).abs()))
            .fold(0.0_f64, f64::max);
        if scale <= 0.0 {
            return Err(Error::Interpolation("all samples share one location".into()));
        }

        let centers: Vec<(f64, f64)> = points
            .iter()
            .map(|p| ((p.x - origin.0) / scale, (p.y - origin.1) / scale))
            .collect();

        let m = n + 3;
        let mut mat = vec![0.0_f64; m * m];
        let mut rhs = vec![0.0_f64; m];

        for i in 0..n {
            for j in 0..n {
                mat[i * m + j] = if i == j {
                    smoothing
                } else {
                    let dx = centers[i].0 - centers[j].0;
                    let dy = centers[i].1 - centers[j].1;
                    tps_kernel((dx * dx + dy * dy).sqrt())
                };
            }
            let (x, y) = centers[i];
            mat[i * m + n] = 1.0;
            mat[i * m + n + 1] = x;
            mat[i * m + n + 2] = y;
            mat[n * m + i] = 1.0;
            mat[(n + 1) * m + i] = x;
            mat[(n + 2) * m + i] = y;
            rhs[i] = points[i].value;
        }

        let coeffs = gauss_solve(m, &mut mat, &mut rhs)?;

        Ok(Self {
            centers,
            weights: coeffs[..n].to_vec(),
            affine: [coeffs[n], coeffs[n + 1], coeffs[n + 2]],
            origin,
            scale,
        })
    }

    /// Number of (merged) samples the spline was fitted to
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Spline value at map coordinate (`x`, `y`)
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let u = (x - self.origin.0) / self.scale;
        let v = (y - self.origin.1) / self.scale;

        let mut val = self.affine[0] + self.affine[1] * u + self.affine[2] * v;
        for (&(cx, cy), &w) in self.centers.iter().zip(&self.weights) {
            let dx = u - cx;
            let dy = v - cy;
            val += w * tps_kernel((dx * dx + dy * dy).sqrt());
        }
        val
    }
}

/// Collapse samples sharing a location into one sample carrying their mean.
///
/// Locations are compared exactly; order of first appearance is kept.
pub fn merge_coincident(points: &[SamplePoint]) -> Vec<SamplePoint> {
    let mut merged: Vec<(SamplePoint, usize)> = Vec::with_capacity(points.len());
    let mut index: std::collections::HashMap<(u64, u64), usize> =
        std::collections::HashMap::with_capacity(points.len());

    for p in points {
        // +0.0 so that -0.0 and 0.0 share a key
        let key = ((p.x + 0.0).to_bits(), (p.y + 0.0).to_bits());
        match index.get(&key) {
            Some(&i) => {
                let (acc, count) = &mut merged[i];
                acc.value += p.value;
                *count += 1;
            }
            None => {
                index.insert(key, merged.len());
                merged.push((*p, 1));
            }
        }
    }

    merged
        .into_iter()
        .map(|(p, count)| SamplePoint::new(p.x, p.y, p.value / count as f64))
        .collect()
}

/// Solve Ax = b using Gaussian elimination with partial pivoting.
///
/// Modifies `mat` and `rhs` in place. Returns solution vector.
fn gauss_solve(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> Result<Vec<f64>> {
    for col in 0..n {
        let mut max_val = mat[col * n + col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = mat[row * n + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < 1e-12 {
            return Err(Error::Interpolation(
                "singular spline system (samples may be collinear)".into(),
            ));
        }

        if max_row != col {
            for j in 0..n {
                mat.swap(col * n + j, max_row * n + j);
            }
            rhs.swap(col, max_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for j in (col + 1)..n {
            sum -= mat[col * n + j] * x[j];
        }
        x[col] = sum / mat[col * n + col];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(Error::Interpolation("spline coefficients are not finite".into()));
    }
    Ok(x)
}
