//! Robust statistics for estimating sky background levels.
//!
//! Background annuli around point sources are contaminated by neighbouring
//! stars, cosmic rays and hot pixels. This crate provides the estimators used
//! to reduce such a pixel sample to a single background-per-pixel value:
//!
//! - **Descriptive**: mean, median, population standard deviation, MAD
//! - **Sigma clipping**: iterative rejection around the running median
//! - **Biweight location**: Tukey biweight M-estimator with smooth down-weighting
//!
//! All functions ignore NaN values and report [`StatsError::InsufficientData`]
//! when nothing usable remains.

pub mod biweight;
pub mod descriptive;
pub mod sigma_clip;

pub use biweight::{biweight_location, BIWEIGHT_TUNING_CONSTANT};
pub use descriptive::{mad, mad_std, mean, median, std_dev, MAD_TO_SIGMA};
pub use sigma_clip::{SigmaClip, SigmaClippedStats};

use thiserror::Error;

/// Errors produced by the statistical estimators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Copy the non-NaN values of a sample, failing when none remain.
pub(crate) fn valid_values(values: &[f64], what: &str) -> Result<Vec<f64>, StatsError> {
    let valid: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if valid.is_empty() {
        return Err(StatsError::InsufficientData(format!(
            "cannot compute {what}: {} total values, 0 valid",
            values.len()
        )));
    }
    Ok(valid)
}
