//! Background-per-pixel estimation from annulus pixels.
//!
//! The annulus pixels are selected with a mask (normally
//! [`OverlapMethod::Center`], so every selected pixel has weight one and a
//! plain statistic applies) and reduced to a single value with one of the
//! [`BackgroundStatistic`] estimators.

use log::debug;
use robust_stats::{biweight_location, mean, median, SigmaClip, BIWEIGHT_TUNING_CONSTANT};
use serde::{Deserialize, Serialize};

use crate::aperture::OverlapMethod;
use crate::error::PhotometryError;
use crate::mask::ApertureMask;
use ndarray::ArrayView2;

/// Which sigma-clipped statistic is reported as the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipCenter {
    Mean,
    Median,
}

/// Statistic used to reduce annulus pixels to a background level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackgroundStatistic {
    Mean,
    Median,
    SigmaClipped {
        sigma: f64,
        max_iters: Option<usize>,
        center: ClipCenter,
    },
    Biweight {
        c: f64,
    },
}

impl Default for BackgroundStatistic {
    fn default() -> Self {
        BackgroundStatistic::sigma_clipped_median()
    }
}

impl BackgroundStatistic {
    /// 3σ, 5 iteration sigma-clipped median
    pub fn sigma_clipped_median() -> Self {
        let clip = SigmaClip::default();
        BackgroundStatistic::SigmaClipped {
            sigma: clip.sigma,
            max_iters: clip.max_iters,
            center: ClipCenter::Median,
        }
    }

    /// 3σ, 5 iteration sigma-clipped mean
    pub fn sigma_clipped_mean() -> Self {
        let clip = SigmaClip::default();
        BackgroundStatistic::SigmaClipped {
            sigma: clip.sigma,
            max_iters: clip.max_iters,
            center: ClipCenter::Mean,
        }
    }

    /// Biweight location with the standard tuning constant
    pub fn biweight() -> Self {
        BackgroundStatistic::Biweight {
            c: BIWEIGHT_TUNING_CONSTANT,
        }
    }

    /// Output column name, e.g. `annulus_median`
    pub fn column_name(&self) -> &'static str {
        match self {
            BackgroundStatistic::Mean => "annulus_mean",
            BackgroundStatistic::Median => "annulus_median",
            BackgroundStatistic::SigmaClipped {
                center: ClipCenter::Mean,
                ..
            } => "annulus_sigclip_mean",
            BackgroundStatistic::SigmaClipped {
                center: ClipCenter::Median,
                ..
            } => "annulus_sigclip_median",
            BackgroundStatistic::Biweight { .. } => "annulus_biweight",
        }
    }

    /// Reduce a pixel sample to a background level.
    ///
    /// # Errors
    /// * `PhotometryError::InsufficientData` - no usable values, or sigma
    ///   clipping rejected all of them
    /// * `PhotometryError::InvalidParameter` - bad sigma or tuning constant
    pub fn estimate(&self, values: &[f64]) -> Result<f64, PhotometryError> {
        let value = match *self {
            BackgroundStatistic::Mean => mean(values)?,
            BackgroundStatistic::Median => median(values)?,
            BackgroundStatistic::SigmaClipped {
                sigma,
                max_iters,
                center,
            } => {
                let stats = SigmaClip::new(sigma, max_iters)?.stats(values)?;
                match center {
                    ClipCenter::Mean => stats.mean,
                    ClipCenter::Median => stats.median,
                }
            }
            BackgroundStatistic::Biweight { c } => biweight_location(values, c)?,
        };
        Ok(value)
    }
}

/// Background level measured in one annulus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BackgroundEstimate {
    /// Background per pixel
    pub per_pixel: f64,
    /// Number of annulus pixels the statistic was computed from
    pub n_pixels: usize,
}

/// Estimate the background under one annulus mask.
///
/// Non-`Center` masks yield weighted values; they are accepted but the
/// statistic then describes `w·v` rather than raw pixels.
///
/// # Errors
/// * `PhotometryError::InsufficientData` - annulus misses the image or has no
///   valid pixels
pub fn estimate_background(
    mask: &ApertureMask,
    image: &ArrayView2<f64>,
    statistic: &BackgroundStatistic,
) -> Result<BackgroundEstimate, PhotometryError> {
    let values = mask.get_values(image);
    if values.is_empty() {
        return Err(PhotometryError::InsufficientData(format!(
            "background annulus at {} has no pixels on the image",
            mask.center()
        )));
    }
    if mask.method() != OverlapMethod::Center {
        debug!(
            "background at {} uses {:?} weights, values are weighted",
            mask.center(),
            mask.method()
        );
    }

    let values = values.to_vec();
    let per_pixel = statistic.estimate(&values).map_err(|e| match e {
        PhotometryError::InsufficientData(msg) => PhotometryError::InsufficientData(format!(
            "background annulus at {}: {msg}",
            mask.center()
        )),
        other => other,
    })?;

    Ok(BackgroundEstimate {
        per_pixel,
        n_pixels: values.iter().filter(|v| !v.is_nan()).count(),
    })
}
