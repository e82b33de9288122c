//! Error type shared by every photometry stage.

use robust_stats::StatsError;
use thiserror::Error;

/// Errors that can occur while measuring sources
#[derive(Error, Debug)]
pub enum PhotometryError {
    #[error("Invalid aperture geometry: {0}")]
    InvalidGeometry(String),
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Shape mismatch: {what} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        what: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("Invalid effective gain: {0}")]
    InvalidGain(String),
    #[error("Aperture sets do not share the same positions: {0}")]
    PositionMismatch(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("FITS I/O error: {0}")]
    FitsIo(#[from] fitsio::compat::errors::Error),
    #[error("Invalid FITS data: {0}")]
    InvalidFitsData(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StatsError> for PhotometryError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::InsufficientData(msg) => PhotometryError::InsufficientData(msg),
            StatsError::InvalidParameter(msg) => PhotometryError::InvalidParameter(msg),
        }
    }
}

impl PhotometryError {
    /// Check that `actual` matches `expected`, naming the offending array.
    pub fn check_shape(
        what: &str,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Result<(), PhotometryError> {
        if expected != actual {
            return Err(PhotometryError::ShapeMismatch {
                what: what.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PhotometryError::InvalidGeometry("r_in >= r_out".to_string());
        assert!(error.to_string().contains("Invalid aperture geometry: r_in >= r_out"));

        let error = PhotometryError::ShapeMismatch {
            what: "error".to_string(),
            expected: (10, 10),
            actual: (10, 12),
        };
        assert!(error.to_string().contains("(10, 12)"));
    }

    #[test]
    fn test_stats_error_conversion() {
        let err: PhotometryError = StatsError::InsufficientData("empty".to_string()).into();
        assert!(matches!(err, PhotometryError::InsufficientData(_)));
    }

    #[test]
    fn test_check_shape() {
        assert!(PhotometryError::check_shape("rms", (3, 4), (3, 4)).is_ok());
        assert!(matches!(
            PhotometryError::check_shape("rms", (3, 4), (4, 3)),
            Err(PhotometryError::ShapeMismatch { .. })
        ));
    }
}
