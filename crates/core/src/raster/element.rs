//! Cell value trait for continuous surfaces

use num_traits::{Float, NumCast};
use std::fmt::Debug;

/// Trait for types that can be stored in a surface cell.
///
/// Surfaces are continuous fields, so only floating point cells are
/// supported; NaN always counts as "no data". Conversion to `f64` comes
/// from `num_traits::ToPrimitive`.
pub trait RasterElement: Float + Debug + Send + Sync + 'static {
    /// Default no-data value for this type
    fn default_nodata() -> Self {
        Self::nan()
    }

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool {
        if self.is_nan() {
            return true;
        }
        match nodata {
            Some(nd) if !nd.is_nan() => {
                let tolerance = <Self as NumCast>::from(100.0_f64).unwrap_or_else(Self::one);
                (*self - nd).abs() <= Self::epsilon() * tolerance
            }
            _ => false,
        }
    }
}

impl RasterElement for f32 {}
impl RasterElement for f64 {}
