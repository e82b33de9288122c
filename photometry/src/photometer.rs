//! Weighted aperture sums.
//!
//! For every aperture the sum is `Σ w·v` over the pixels of its mask that lie
//! on the image. With an error map the propagated uncertainty is
//! `sqrt(Σ w·σ²)`. NaN pixels are not skipped: they turn the sum into NaN so
//! bad data is visible in the output. Pixels flagged in the optional bad
//! pixel mask are excluded explicitly.

use log::debug;
use ndarray::{s, ArrayView2};
use serde::Serialize;

use crate::aperture::{OverlapMethod, PixelAperture, PixelPosition};
use crate::error::PhotometryError;
use crate::image::Image;
use crate::mask::ApertureMask;

/// Options controlling [`aperture_photometry`].
#[derive(Debug, Clone, Default)]
pub struct PhotometryOptions<'a> {
    pub method: OverlapMethod,
    /// Pixels set to `true` contribute nothing to sums or errors
    pub bad_pixel_mask: Option<ArrayView2<'a, bool>>,
}

/// Sum and optional uncertainty of one aperture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureSum {
    pub sum: f64,
    pub error: Option<f64>,
}

/// Sum the pixels under one mask.
pub fn sum_in_mask(
    mask: &ApertureMask,
    data: &ArrayView2<f64>,
    error: Option<&ArrayView2<f64>>,
    bad_pixel_mask: Option<&ArrayView2<bool>>,
) -> ApertureSum {
    let Some(slices) = mask.bbox().overlap_slices(data.dim()) else {
        return ApertureSum {
            sum: 0.0,
            error: error.map(|_| 0.0),
        };
    };

    let weights = mask
        .weights()
        .slice(s![slices.small_rows.clone(), slices.small_cols.clone()]);
    let large = s![slices.large_rows.clone(), slices.large_cols.clone()];
    let pixels = data.slice(&large);
    let errors = error.map(|e| e.slice(&large));
    let bad = bad_pixel_mask.map(|m| m.slice(&large));

    let mut sum = 0.0;
    let mut variance = 0.0;
    for ((idx, &w), &v) in weights.indexed_iter().zip(pixels.iter()) {
        if w == 0.0 {
            continue;
        }
        if bad.as_ref().is_some_and(|b| b[idx]) {
            continue;
        }
        sum += w * v;
        if let Some(errors) = &errors {
            variance += w * errors[idx] * errors[idx];
        }
    }

    ApertureSum {
        sum,
        error: errors.map(|_| variance.sqrt()),
    }
}

/// One row of an aperture photometry table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApertureSumRow {
    /// 1-based source id, in input order
    pub id: usize,
    pub position: PixelPosition,
    /// One sum per aperture set
    pub sums: Vec<f64>,
    /// One error per aperture set, present when the image carries errors
    pub errors: Option<Vec<f64>>,
}

/// Aperture sums for every source and every aperture set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApertureSumTable {
    pub rows: Vec<ApertureSumRow>,
    n_apertures: usize,
}

impl ApertureSumTable {
    /// Column names: `aperture_sum` for a single set, otherwise
    /// `aperture_sum_0`, `aperture_sum_1`, ...
    pub fn sum_columns(&self) -> Vec<String> {
        suffixed_columns("aperture_sum", self.n_apertures)
    }

    /// Error column names, matching [`ApertureSumTable::sum_columns`]
    pub fn error_columns(&self) -> Vec<String> {
        suffixed_columns("aperture_sum_err", self.n_apertures)
    }

    /// Sums of aperture set `index` for every source
    pub fn sums(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row.sums[index]).collect()
    }

    /// Errors of aperture set `index` for every source, if computed
    pub fn errors(&self, index: usize) -> Option<Vec<f64>> {
        self.rows
            .iter()
            .map(|row| row.errors.as_ref().map(|e| e[index]))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn suffixed_columns(base: &str, n: usize) -> Vec<String> {
    if n == 1 {
        vec![base.to_string()]
    } else {
        (0..n).map(|i| format!("{base}_{i}")).collect()
    }
}

/// Perform aperture photometry for one or more aperture sets sharing the
/// same positions.
///
/// # Errors
/// * `PhotometryError::InvalidParameter` - no aperture sets given
/// * `PhotometryError::PositionMismatch` - aperture sets have different positions
/// * `PhotometryError::ShapeMismatch` - bad pixel mask does not match the image
pub fn aperture_photometry(
    image: &Image,
    apertures: &[&dyn PixelAperture],
    options: &PhotometryOptions,
) -> Result<ApertureSumTable, PhotometryError> {
    let Some(first) = apertures.first() else {
        return Err(PhotometryError::InvalidParameter(
            "at least one aperture set is required".to_string(),
        ));
    };
    let positions = first.positions();
    for (i, aperture) in apertures.iter().enumerate().skip(1) {
        if aperture.positions() != positions {
            return Err(PhotometryError::PositionMismatch(format!(
                "aperture set {i} differs from aperture set 0"
            )));
        }
    }
    if let Some(mask) = &options.bad_pixel_mask {
        PhotometryError::check_shape("bad pixel mask", image.dim(), mask.dim())?;
    }

    let data = image.data();
    let error = image.error();
    let masks: Vec<Vec<ApertureMask>> = apertures
        .iter()
        .map(|aperture| aperture.to_masks(options.method))
        .collect();

    let rows = positions
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            let sums: Vec<ApertureSum> = masks
                .iter()
                .map(|set| {
                    sum_in_mask(
                        &set[i],
                        &data,
                        error.as_ref(),
                        options.bad_pixel_mask.as_ref(),
                    )
                })
                .collect();
            ApertureSumRow {
                id: i + 1,
                position,
                sums: sums.iter().map(|s| s.sum).collect(),
                errors: sums.iter().map(|s| s.error).collect(),
            }
        })
        .collect();

    debug!(
        "aperture photometry: {} sources x {} aperture set(s), method {:?}",
        positions.len(),
        apertures.len(),
        options.method
    );

    Ok(ApertureSumTable {
        rows,
        n_apertures: apertures.len(),
    })
}
