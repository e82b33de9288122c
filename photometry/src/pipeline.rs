//! Local background photometry pipeline.
//!
//! For every source position:
//!
//! 1. sum the source aperture (and its error) on the image
//! 2. select the annulus pixels and estimate the background per pixel
//! 3. scale the background to the source aperture area and subtract it
//!
//! Each stage returns a new value that feeds the next; rows are assembled
//! into a [`PhotometryTable`] at the end. A source whose background cannot be
//! measured gets a flagged NaN row; the other sources are unaffected.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::aperture::{
    CircularAnnulus, CircularAperture, OverlapMethod, PixelAperture, PixelPosition,
};
use crate::background::{estimate_background, BackgroundEstimate, BackgroundStatistic};
use crate::error::PhotometryError;
use crate::flux::{correct_flux, FluxCorrection};
use crate::image::Image;
use crate::io::ScienceFrame;
use crate::mask::ApertureMask;
use crate::photometer::sum_in_mask;
use crate::table::{PhotometryRecord, PhotometryTable, RecordFlags};

/// Aperture geometry and estimator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Source aperture radius in pixels
    pub aperture_radius: f64,
    /// Background annulus inner radius in pixels
    pub annulus_inner: f64,
    /// Background annulus outer radius in pixels
    pub annulus_outer: f64,
    /// Pixel weighting for the source aperture sum
    pub aperture_method: OverlapMethod,
    /// Pixel selection for the background annulus
    pub annulus_method: OverlapMethod,
    pub statistic: BackgroundStatistic,
    /// Effective gain override; the exposure time is used when absent
    pub effective_gain: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            aperture_radius: 5.0,
            annulus_inner: 10.0,
            annulus_outer: 15.0,
            aperture_method: OverlapMethod::Exact,
            annulus_method: OverlapMethod::Center,
            statistic: BackgroundStatistic::default(),
            effective_gain: None,
        }
    }
}

impl PipelineConfig {
    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), PhotometryError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON file; missing fields take their defaults
    pub fn load_from_file(path: &Path) -> Result<Self, PhotometryError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Raw sums of one source, the output of the first stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceSums {
    pub id: usize,
    pub position: PixelPosition,
    pub aperture_sum: f64,
    pub aperture_sum_err: Option<f64>,
    pub annulus_sum: f64,
    pub flags: RecordFlags,
}

impl SourceSums {
    /// Finish the row with the background stage result.
    pub fn with_background(
        self,
        background: Result<BackgroundEstimate, PhotometryError>,
        source_area: f64,
    ) -> PhotometryRecord {
        let mut flags = self.flags;
        let (correction, annulus_npix, message) = match background {
            Ok(estimate) => (
                correct_flux(self.aperture_sum, estimate.per_pixel, source_area),
                estimate.n_pixels,
                None,
            ),
            Err(err) => {
                flags.insert(RecordFlags::BACKGROUND_FAILED);
                (
                    FluxCorrection {
                        bkg_per_pixel: f64::NAN,
                        total_background: f64::NAN,
                        flux: f64::NAN,
                    },
                    0,
                    Some(err.to_string()),
                )
            }
        };

        PhotometryRecord {
            id: self.id,
            position: self.position,
            aperture_sum: self.aperture_sum,
            aperture_sum_err: self.aperture_sum_err,
            annulus_sum: self.annulus_sum,
            annulus_npix,
            correction,
            flags,
            message,
        }
    }
}

/// Circular aperture photometry with annulus background subtraction.
#[derive(Debug, Clone)]
pub struct LocalBackgroundPipeline {
    config: PipelineConfig,
}

impl LocalBackgroundPipeline {
    /// # Errors
    /// * `PhotometryError::InvalidGeometry` - radii are invalid
    pub fn new(config: PipelineConfig) -> Result<Self, PhotometryError> {
        // Validate geometry once up front
        CircularAperture::new(Vec::new(), config.aperture_radius)?;
        CircularAnnulus::new(Vec::new(), config.annulus_inner, config.annulus_outer)?;
        if config.annulus_inner < config.aperture_radius {
            warn!(
                "annulus inner radius {} is inside the aperture radius {}; source light will bias the background",
                config.annulus_inner, config.aperture_radius
            );
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Measure every position on `image`.
    ///
    /// Positions failing background estimation produce flagged rows rather
    /// than an error.
    pub fn run(
        &self,
        image: &Image,
        positions: &[PixelPosition],
    ) -> Result<PhotometryTable, PhotometryError> {
        let apertures = CircularAperture::new(positions.to_vec(), self.config.aperture_radius)?;
        let annuli = CircularAnnulus::new(
            positions.to_vec(),
            self.config.annulus_inner,
            self.config.annulus_outer,
        )?;

        let aperture_masks = apertures.to_masks(self.config.aperture_method);
        let annulus_sum_masks = annuli.to_masks(self.config.aperture_method);
        let annulus_masks = annuli.to_masks(self.config.annulus_method);
        let source_area = apertures.area();

        let rows: Vec<PhotometryRecord> = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| {
                let sums = self.measure_sums(
                    image,
                    i + 1,
                    position,
                    &aperture_masks[i],
                    &annulus_sum_masks[i],
                );
                let background = estimate_background(
                    &annulus_masks[i],
                    &image.data(),
                    &self.config.statistic,
                );
                if let Err(err) = &background {
                    warn!("source {} at {position}: {err}", i + 1);
                }
                sums.with_background(background, source_area)
            })
            .collect();

        let table = PhotometryTable::new(self.config.statistic.column_name(), rows);
        info!(
            "measured {} sources ({} with failed background)",
            table.len(),
            table.n_failed()
        );
        Ok(table)
    }

    /// Combine the frame's RMS map with shot noise and measure `positions`.
    ///
    /// # Errors
    /// * `PhotometryError::InvalidGain` - no gain override and no EXPTIME
    pub fn run_frame(
        &self,
        frame: &ScienceFrame,
        positions: &[PixelPosition],
    ) -> Result<PhotometryTable, PhotometryError> {
        let image = frame.to_image(self.config.effective_gain)?;
        self.run(&image, positions)
    }

    fn measure_sums(
        &self,
        image: &Image,
        id: usize,
        position: PixelPosition,
        aperture_mask: &ApertureMask,
        annulus_mask: &ApertureMask,
    ) -> SourceSums {
        let data = image.data();
        let error = image.error();
        let aperture = sum_in_mask(aperture_mask, &data, error.as_ref(), None);
        let annulus = sum_in_mask(annulus_mask, &data, None, None);

        let mut flags = RecordFlags::empty();
        if !aperture_mask.bbox().is_within(image.dim()) {
            flags.insert(RecordFlags::APERTURE_EDGE);
        }
        if !annulus_mask.bbox().is_within(image.dim()) {
            flags.insert(RecordFlags::ANNULUS_EDGE);
        }
        if aperture.sum.is_nan() {
            flags.insert(RecordFlags::NAN_IN_APERTURE);
        }

        SourceSums {
            id,
            position,
            aperture_sum: aperture.sum,
            aperture_sum_err: aperture.error,
            annulus_sum: annulus.sum,
            flags,
        }
    }
}
