//! Post-processing of interpolated surfaces
//!
//! - Correct: raise values below a physical floor to that floor
//! - Mask: discard cells outside the supported region

mod correct;
mod mask;

pub use correct::clamp_below;
pub use mask::mask_to_support;
