//! In-memory science image with an optional per-pixel uncertainty map.

use ndarray::{Array2, ArrayView2};

use crate::error::PhotometryError;

/// Science data plus an optional co-registered error map of the same shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    data: Array2<f64>,
    error: Option<Array2<f64>>,
}

impl Image {
    pub fn new(data: Array2<f64>) -> Self {
        Self { data, error: None }
    }

    /// Attach a per-pixel 1σ uncertainty map.
    ///
    /// # Errors
    /// * `PhotometryError::ShapeMismatch` - error map and data differ in shape
    pub fn with_error(data: Array2<f64>, error: Array2<f64>) -> Result<Self, PhotometryError> {
        PhotometryError::check_shape("error map", data.dim(), error.dim())?;
        Ok(Self {
            data,
            error: Some(error),
        })
    }

    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn error(&self) -> Option<ArrayView2<'_, f64>> {
        self.error.as_ref().map(|e| e.view())
    }

    /// Image shape `(height, width)`
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Copy of this image with a constant added to every data pixel.
    ///
    /// The error map is carried over unchanged.
    pub fn add_background(&self, offset: f64) -> Image {
        Image {
            data: &self.data + offset,
            error: self.error.clone(),
        }
    }
}
