//! Seeded synthetic star fields for fixtures and the `synth` command.

use log::info;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

use crate::aperture::PixelPosition;
use crate::error::PhotometryError;
use crate::io::{write_fits_image, FitsHeader, ScienceFrame};

/// A point source with a circular Gaussian profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSource {
    pub position: PixelPosition,
    /// Total flux integrated over the profile
    pub flux: f64,
}

/// Parameters of a synthetic frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarField {
    /// Image shape `(height, width)`
    pub shape: (usize, usize),
    /// Uniform sky level per pixel
    pub background: f64,
    /// Gaussian PSF sigma in pixels
    pub psf_sigma: f64,
    /// Per-pixel 1σ Gaussian noise; zero gives a noiseless frame
    pub noise_sigma: f64,
    pub exptime: f64,
    pub seed: u64,
    pub sources: Vec<SyntheticSource>,
}

impl Default for StarField {
    fn default() -> Self {
        Self {
            shape: (200, 200),
            background: 5.0,
            psf_sigma: 2.0,
            noise_sigma: 0.0,
            exptime: 1.0,
            seed: 42,
            sources: Vec::new(),
        }
    }
}

impl StarField {
    /// Noise-free model: sky plus every source.
    pub fn model(&self) -> Array2<f64> {
        let norm = 1.0 / (2.0 * PI * self.psf_sigma * self.psf_sigma);
        let two_s2 = 2.0 * self.psf_sigma * self.psf_sigma;
        let mut image = Array2::from_elem(self.shape, self.background);
        for source in &self.sources {
            for ((row, col), pixel) in image.indexed_iter_mut() {
                let dx = col as f64 - source.position.x;
                let dy = row as f64 - source.position.y;
                *pixel += source.flux * norm * (-(dx * dx + dy * dy) / two_s2).exp();
            }
        }
        image
    }

    /// Render the field with seeded noise.
    ///
    /// Returns the science image and its constant RMS map.
    ///
    /// # Errors
    /// * `PhotometryError::InvalidParameter` - negative or non-finite noise or PSF sigma
    pub fn render(&self) -> Result<(Array2<f64>, Array2<f64>), PhotometryError> {
        if !(self.psf_sigma.is_finite() && self.psf_sigma > 0.0) {
            return Err(PhotometryError::InvalidParameter(format!(
                "PSF sigma must be positive, got {}",
                self.psf_sigma
            )));
        }
        if !(self.noise_sigma.is_finite() && self.noise_sigma >= 0.0) {
            return Err(PhotometryError::InvalidParameter(format!(
                "noise sigma must be finite and non-negative, got {}",
                self.noise_sigma
            )));
        }
        let normal = Normal::new(0.0, self.noise_sigma).map_err(|e| {
            PhotometryError::InvalidParameter(format!(
                "noise sigma {}: {e}",
                self.noise_sigma
            ))
        })?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut science = self.model();
        if self.noise_sigma > 0.0 {
            science.mapv_inplace(|v| v + normal.sample(&mut rng));
        }
        let rms = Array2::from_elem(self.shape, self.noise_sigma);
        Ok((science, rms))
    }

    /// Rendered frame held in memory, with EXPTIME set.
    pub fn frame(&self) -> Result<ScienceFrame, PhotometryError> {
        let (science, rms) = self.render()?;
        let header = FitsHeader {
            exptime: Some(self.exptime),
            ..Default::default()
        };
        ScienceFrame::new(science, rms, header)
    }

    /// Write the science and RMS images as a FITS pair.
    pub fn write_fits<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        science_path: P,
        rms_path: Q,
    ) -> Result<(), PhotometryError> {
        let frame = self.frame()?;
        write_fits_image(&science_path, &frame.science.view(), &frame.header)?;
        write_fits_image(&rms_path, &frame.rms.view(), &FitsHeader::default())?;
        info!(
            "wrote synthetic field with {} sources to {}",
            self.sources.len(),
            science_path.as_ref().display()
        );
        Ok(())
    }

    pub fn positions(&self) -> Vec<PixelPosition> {
        self.sources.iter().map(|s| s.position).collect()
    }
}
