//! Basic descriptive statistics over `f64` samples.

use crate::{valid_values, StatsError};

/// MAD to standard deviation conversion factor for normally distributed data.
///
/// σ ≈ 1.4826 × MAD, the exact value being 1 / Φ⁻¹(3/4).
pub const MAD_TO_SIGMA: f64 = 1.482_602_218_505_602;

/// Arithmetic mean of the non-NaN values.
pub fn mean(values: &[f64]) -> Result<f64, StatsError> {
    let valid = valid_values(values, "mean")?;
    Ok(valid.iter().sum::<f64>() / valid.len() as f64)
}

/// Median of the non-NaN values.
///
/// For even-length data, returns the average of the two middle values.
pub fn median(values: &[f64]) -> Result<f64, StatsError> {
    let mut valid = valid_values(values, "median")?;
    Ok(median_of_valid(&mut valid))
}

/// Population standard deviation (ddof = 0) of the non-NaN values.
pub fn std_dev(values: &[f64]) -> Result<f64, StatsError> {
    let valid = valid_values(values, "standard deviation")?;
    Ok(population_std(&valid))
}

/// Median absolute deviation around the median.
pub fn mad(values: &[f64]) -> Result<f64, StatsError> {
    let mut valid = valid_values(values, "MAD")?;
    let center = median_of_valid(&mut valid);
    let mut deviations: Vec<f64> = valid.iter().map(|v| (v - center).abs()).collect();
    Ok(median_of_valid(&mut deviations))
}

/// Standard deviation estimated from the MAD, robust against outliers.
pub fn mad_std(values: &[f64]) -> Result<f64, StatsError> {
    Ok(mad(values)? * MAD_TO_SIGMA)
}

/// Median of a NaN-free, non-empty buffer. Reorders the buffer.
pub(crate) fn median_of_valid(data: &mut [f64]) -> f64 {
    debug_assert!(!data.is_empty());
    data.sort_by(|a, b| a.total_cmp(b));
    let mid = data.len() / 2;
    if data.len() % 2 == 0 {
        (data[mid - 1] + data[mid]) / 2.0
    } else {
        data[mid]
    }
}

/// Mean of a NaN-free, non-empty buffer.
pub(crate) fn mean_of_valid(data: &[f64]) -> f64 {
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation of a NaN-free, non-empty buffer.
pub(crate) fn population_std(data: &[f64]) -> f64 {
    let m = mean_of_valid(data);
    let variance = data.iter().map(|v| (v - m).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}
