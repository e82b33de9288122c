//! FITS reading and writing for science and RMS images.
//!
//! Images are read into `Array2<f64>` with shape `(NAXIS2, NAXIS1)`. Rows
//! are kept in storage order (no vertical flip) so that array index
//! `[y, x]` matches the pixel coordinates used by source catalogs.

use fitsio::compat::fitsfile::FitsFile;
use fitsio::compat::images::{ImageDescription, ImageType, ReadImage, WriteImage};
use log::{debug, info, warn};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::PhotometryError;
use crate::error_map::{calc_total_error, EffectiveGain};
use crate::image::Image;

/// Header metadata needed by the photometry workflow.
///
/// World coordinate keywords are carried along for bookkeeping only; no
/// celestial transforms are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitsHeader {
    /// Exposure time in seconds (`EXPTIME`)
    pub exptime: Option<f64>,
    pub ctype1: Option<String>,
    pub ctype2: Option<String>,
    pub crval1: Option<f64>,
    pub crval2: Option<f64>,
    pub crpix1: Option<f64>,
    pub crpix2: Option<f64>,
    pub cdelt1: Option<f64>,
    pub cdelt2: Option<f64>,
}

impl FitsHeader {
    /// True when the header carries a celestial coordinate system
    pub fn has_wcs(&self) -> bool {
        self.ctype1.is_some() && self.ctype2.is_some()
    }
}

/// Read the first two-dimensional image HDU of a FITS file.
///
/// # Errors
/// * `PhotometryError::FitsIo` - the file cannot be opened or read
/// * `PhotometryError::InvalidFitsData` - no 2D image HDU is present
pub fn read_fits_image<P: AsRef<Path>>(
    path: P,
) -> Result<(Array2<f64>, FitsHeader), PhotometryError> {
    let path = path.as_ref();
    let fptr = FitsFile::open(path)?;

    let mut hdu_idx = 0;
    while let Ok(hdu) = fptr.hdu(hdu_idx) {
        let naxis = hdu.read_key::<i64>(&fptr, "NAXIS").unwrap_or(0);
        if naxis != 2 {
            hdu_idx += 1;
            continue;
        }

        let naxis1 = hdu.read_key::<i64>(&fptr, "NAXIS1").unwrap_or(0) as usize;
        let naxis2 = hdu.read_key::<i64>(&fptr, "NAXIS2").unwrap_or(0) as usize;
        let pixels = f64::read_image(&fptr, &hdu)?;
        let data = Array2::from_shape_vec((naxis2, naxis1), pixels).map_err(|_| {
            PhotometryError::InvalidFitsData(format!(
                "cannot reshape HDU {hdu_idx} of {} to {naxis2}x{naxis1}",
                path.display()
            ))
        })?;

        let header = FitsHeader {
            exptime: hdu.read_key::<f64>(&fptr, "EXPTIME").ok(),
            ctype1: hdu.read_key::<String>(&fptr, "CTYPE1").ok(),
            ctype2: hdu.read_key::<String>(&fptr, "CTYPE2").ok(),
            crval1: hdu.read_key::<f64>(&fptr, "CRVAL1").ok(),
            crval2: hdu.read_key::<f64>(&fptr, "CRVAL2").ok(),
            crpix1: hdu.read_key::<f64>(&fptr, "CRPIX1").ok(),
            crpix2: hdu.read_key::<f64>(&fptr, "CRPIX2").ok(),
            cdelt1: hdu.read_key::<f64>(&fptr, "CDELT1").ok(),
            cdelt2: hdu.read_key::<f64>(&fptr, "CDELT2").ok(),
        };

        debug!(
            "read {}x{} image from HDU {hdu_idx} of {}",
            naxis1,
            naxis2,
            path.display()
        );
        return Ok((data, header));
    }

    Err(PhotometryError::InvalidFitsData(format!(
        "no 2D image HDU found in {}",
        path.display()
    )))
}

/// Write a 2D image as a double-precision primary HDU.
///
/// Header fields that are `Some` are written as keywords.
pub fn write_fits_image<P: AsRef<Path>>(
    path: P,
    data: &ArrayView2<f64>,
    header: &FitsHeader,
) -> Result<(), PhotometryError> {
    let (height, width) = data.dim();
    let image_description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: vec![width, height],
    };

    let mut fptr = FitsFile::create(path.as_ref()).overwrite().open()?;
    let hdu = fptr.create_image("PRIMARY", &image_description)?;

    let flat: Vec<f64> = data.iter().copied().collect();
    f64::write_image(&mut fptr, &hdu, &flat)?;

    let float_keys = [
        ("EXPTIME", header.exptime),
        ("CRVAL1", header.crval1),
        ("CRVAL2", header.crval2),
        ("CRPIX1", header.crpix1),
        ("CRPIX2", header.crpix2),
        ("CDELT1", header.cdelt1),
        ("CDELT2", header.cdelt2),
    ];
    for (key, value) in float_keys {
        if let Some(value) = value {
            hdu.write_key(&mut fptr, key, &value)?;
        }
    }
    for (key, value) in [("CTYPE1", &header.ctype1), ("CTYPE2", &header.ctype2)] {
        if let Some(value) = value {
            hdu.write_key(&mut fptr, key, &value.clone())?;
        }
    }

    Ok(())
}

/// A science image with its background RMS map and header.
#[derive(Debug, Clone)]
pub struct ScienceFrame {
    pub science: Array2<f64>,
    pub rms: Array2<f64>,
    pub header: FitsHeader,
}

impl ScienceFrame {
    /// Build a frame from in-memory arrays.
    ///
    /// # Errors
    /// * `PhotometryError::ShapeMismatch` - RMS map differs in shape from the science image
    pub fn new(
        science: Array2<f64>,
        rms: Array2<f64>,
        header: FitsHeader,
    ) -> Result<Self, PhotometryError> {
        PhotometryError::check_shape("RMS image", science.dim(), rms.dim())?;
        Ok(Self {
            science,
            rms,
            header,
        })
    }

    /// Load a science image and its RMS map; the header comes from the
    /// science file.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        science_path: P,
        rms_path: Q,
    ) -> Result<Self, PhotometryError> {
        let (science, header) = read_fits_image(&science_path)?;
        let (rms, _) = read_fits_image(&rms_path)?;
        info!(
            "loaded science frame {} ({}x{}, EXPTIME={:?})",
            science_path.as_ref().display(),
            science.ncols(),
            science.nrows(),
            header.exptime
        );
        Self::new(science, rms, header)
    }

    /// Effective gain to use for shot noise: the override if given,
    /// otherwise the exposure time.
    pub fn effective_gain(&self, gain_override: Option<f64>) -> Result<f64, PhotometryError> {
        match (gain_override, self.header.exptime) {
            (Some(gain), _) => Ok(gain),
            (None, Some(exptime)) => Ok(exptime),
            (None, None) => Err(PhotometryError::InvalidGain(
                "no effective gain given and header has no EXPTIME".to_string(),
            )),
        }
    }

    /// Science image carrying the combined RMS + shot-noise error map.
    pub fn to_image(&self, gain_override: Option<f64>) -> Result<Image, PhotometryError> {
        let gain = self.effective_gain(gain_override)?;
        if !self.header.has_wcs() {
            warn!("science frame has no WCS keywords; positions are taken as pixel coordinates");
        }
        let total_error = calc_total_error(
            &self.science.view(),
            &self.rms.view(),
            &EffectiveGain::Scalar(gain),
        )?;
        Image::with_error(self.science.clone(), total_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    #[test]
    fn test_fits_roundtrip_preserves_orientation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("science.fits");

        let data = Array2::from_shape_fn((4, 6), |(i, j)| (i * 10 + j) as f64);
        let header = FitsHeader {
            exptime: Some(120.0),
            ctype1: Some("RA---TAN".to_string()),
            ctype2: Some("DEC--TAN".to_string()),
            crpix1: Some(3.0),
            ..Default::default()
        };
        write_fits_image(&path, &data.view(), &header).unwrap();

        let (read, read_header) = read_fits_image(&path).unwrap();
        assert_eq!(read.dim(), (4, 6));
        assert_eq!(read[[0, 0]], 0.0);
        assert_eq!(read[[3, 5]], 35.0);
        assert_relative_eq!(read_header.exptime.unwrap(), 120.0);
        assert_eq!(read_header.ctype1.as_deref(), Some("RA---TAN"));
        assert!(read_header.has_wcs());
    }

    #[test]
    fn test_frame_shape_mismatch() {
        let result = ScienceFrame::new(
            Array2::zeros((10, 10)),
            Array2::zeros((10, 11)),
            FitsHeader::default(),
        );
        assert!(matches!(result, Err(PhotometryError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_effective_gain_selection() {
        let mut frame = ScienceFrame::new(
            Array2::zeros((2, 2)),
            Array2::zeros((2, 2)),
            FitsHeader::default(),
        )
        .unwrap();
        assert!(matches!(
            frame.effective_gain(None),
            Err(PhotometryError::InvalidGain(_))
        ));
        assert_eq!(frame.effective_gain(Some(2.5)).unwrap(), 2.5);

        frame.header.exptime = Some(300.0);
        assert_eq!(frame.effective_gain(None).unwrap(), 300.0);
    }

    #[test]
    fn test_to_image_combines_errors() {
        let frame = ScienceFrame::new(
            Array2::from_elem((3, 3), 40.0),
            Array2::from_elem((3, 3), 3.0),
            FitsHeader {
                exptime: Some(10.0),
                ..Default::default()
            },
        )
        .unwrap();
        let image = frame.to_image(None).unwrap();
        let error = image.error().unwrap();
        assert_relative_eq!(error[[0, 0]], (9.0_f64 + 4.0).sqrt());
    }

    #[test]
    fn test_missing_file() {
        assert!(read_fits_image("/nonexistent/path/image.fits").is_err());
    }
}
