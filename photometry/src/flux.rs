//! Background correction of raw aperture sums.
//!
//! The background is measured per pixel over the annulus population but has
//! to be removed from the *source* aperture, so it is scaled by the source
//! aperture's geometric area before subtraction.

use serde::Serialize;

/// Result of subtracting a local background from one aperture sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FluxCorrection {
    /// Background level per pixel
    pub bkg_per_pixel: f64,
    /// Background contribution inside the source aperture
    pub total_background: f64,
    /// Raw sum minus the total background
    pub flux: f64,
}

/// Remove `bkg_per_pixel × source_area` from `raw_sum`.
///
/// NaN inputs propagate to the output.
pub fn correct_flux(raw_sum: f64, bkg_per_pixel: f64, source_area: f64) -> FluxCorrection {
    let total_background = bkg_per_pixel * source_area;
    FluxCorrection {
        bkg_per_pixel,
        total_background,
        flux: raw_sum - total_background,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_background_only_source() {
        let area = PI * 25.0;
        let correction = correct_flux(5.0 * area, 5.0, area);
        assert_relative_eq!(correction.total_background, 392.699_081_698_724_1, epsilon = 1e-9);
        assert_relative_eq!(correction.flux, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_source_flux_recovered() {
        let correction = correct_flux(1500.0, 2.0, 100.0);
        assert_eq!(correction.total_background, 200.0);
        assert_eq!(correction.flux, 1300.0);
    }

    #[test]
    fn test_nan_background_propagates() {
        let correction = correct_flux(100.0, f64::NAN, 10.0);
        assert!(correction.flux.is_nan());
    }
}
