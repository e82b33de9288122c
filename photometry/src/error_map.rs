//! Total per-pixel uncertainty from background RMS and source shot noise.
//!
//! ```text
//! σ_total = sqrt(σ_bkg² + max(data, 0) / gain)
//! ```
//!
//! `gain` is the effective gain converting image units to counted
//! electrons. For images in counts per second it is the exposure time.
//! Negative data values carry no Poisson term; NaN data values get a NaN
//! error.

use ndarray::{Array2, ArrayView2, Zip};

use crate::error::PhotometryError;

/// Effective gain, constant or per pixel.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectiveGain {
    Scalar(f64),
    Map(Array2<f64>),
}

impl From<f64> for EffectiveGain {
    fn from(value: f64) -> Self {
        EffectiveGain::Scalar(value)
    }
}

/// Combine a background error map with the Poisson noise of `data`.
///
/// # Errors
/// * `PhotometryError::ShapeMismatch` - `bkg_error` or a gain map differs in shape from `data`
/// * `PhotometryError::InvalidGain` - any gain value is not finite and positive
pub fn calc_total_error(
    data: &ArrayView2<f64>,
    bkg_error: &ArrayView2<f64>,
    effective_gain: &EffectiveGain,
) -> Result<Array2<f64>, PhotometryError> {
    PhotometryError::check_shape("background error", data.dim(), bkg_error.dim())?;

    let total = match effective_gain {
        EffectiveGain::Scalar(gain) => {
            check_gain(*gain)?;
            Zip::from(data)
                .and(bkg_error)
                .map_collect(|&d, &e| combine(d, e, *gain))
        }
        EffectiveGain::Map(gain) => {
            PhotometryError::check_shape("effective gain", data.dim(), gain.dim())?;
            if let Some(&bad) = gain.iter().find(|g| !(g.is_finite() && **g > 0.0)) {
                return Err(PhotometryError::InvalidGain(format!(
                    "gain map contains non-positive value {bad}"
                )));
            }
            Zip::from(data)
                .and(bkg_error)
                .and(gain)
                .map_collect(|&d, &e, &g| combine(d, e, g))
        }
    };
    Ok(total)
}

fn check_gain(gain: f64) -> Result<(), PhotometryError> {
    if !gain.is_finite() || gain <= 0.0 {
        return Err(PhotometryError::InvalidGain(format!(
            "effective gain must be finite and positive, got {gain}"
        )));
    }
    Ok(())
}

fn combine(data: f64, bkg_error: f64, gain: f64) -> f64 {
    // f64::max would turn a NaN pixel into zero shot noise
    if data.is_nan() {
        return f64::NAN;
    }
    (bkg_error * bkg_error + data.max(0.0) / gain).sqrt()
}
