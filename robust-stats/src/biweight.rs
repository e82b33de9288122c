//! Tukey biweight location estimator.
//!
//! ```text
//! u_i = (x_i - M) / (c · MAD)
//! ζ   = M + Σ_{|u_i|<1} (x_i - M)(1 - u_i²)² / Σ_{|u_i|<1} (1 - u_i²)²
//! ```
//!
//! where `M` is the sample median and `MAD` the median absolute deviation.
//! Values with `|u| >= 1` get zero weight; values close to the median get
//! weights close to one.

use crate::descriptive::median_of_valid;
use crate::{valid_values, StatsError};

/// Tuning constant giving good efficiency for Gaussian and contaminated data.
pub const BIWEIGHT_TUNING_CONSTANT: f64 = 6.0;

/// Compute the biweight location of the non-NaN values.
///
/// When the MAD is zero (more than half the sample shares one value) the
/// median is returned directly.
///
/// # Arguments
/// * `values` - Sample to reduce
/// * `c` - Tuning constant, see [`BIWEIGHT_TUNING_CONSTANT`]
pub fn biweight_location(values: &[f64], c: f64) -> Result<f64, StatsError> {
    if !c.is_finite() || c <= 0.0 {
        return Err(StatsError::InvalidParameter(format!(
            "biweight tuning constant must be finite and positive, got {c}"
        )));
    }

    let valid = valid_values(values, "biweight location")?;
    let mut scratch = valid.clone();
    let center = median_of_valid(&mut scratch);

    scratch.clear();
    scratch.extend(valid.iter().map(|v| (v - center).abs()));
    let mad = median_of_valid(&mut scratch);
    if mad == 0.0 {
        return Ok(center);
    }

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for &v in &valid {
        let d = v - center;
        let u = d / (c * mad);
        if u.abs() < 1.0 {
            let w = (1.0 - u * u).powi(2);
            numerator += d * w;
            denominator += w;
        }
    }

    Ok(center + numerator / denominator)
}
