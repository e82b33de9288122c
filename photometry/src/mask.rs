//! Per-aperture overlap masks.
//!
//! An [`ApertureMask`] holds a small weight grid together with the
//! [`BoundingBox`] that places it in the full image. Every operation that
//! touches image pixels goes through [`BoundingBox::overlap_slices`], so
//! masks hanging over the image edge behave the same everywhere: pixels
//! outside the image never contribute.

use ndarray::{s, Array1, Array2, ArrayView2};

use crate::aperture::{ApertureShape, BoundingBox, OverlapMethod, PixelPosition};

/// Weight grid of one aperture plus its placement in the image.
#[derive(Debug, Clone, PartialEq)]
pub struct ApertureMask {
    weights: Array2<f64>,
    bbox: BoundingBox,
    center: PixelPosition,
    shape: ApertureShape,
    method: OverlapMethod,
}

impl ApertureMask {
    /// Build the mask of `shape` placed at `center`.
    pub fn from_shape(shape: ApertureShape, center: PixelPosition, method: OverlapMethod) -> Self {
        let bbox = shape.bbox(center);
        let weights = shape.weights(center, &bbox, method);
        Self {
            weights,
            bbox,
            center,
            shape,
            method,
        }
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Position of the aperture this mask was built from
    pub fn center(&self) -> PixelPosition {
        self.center
    }

    /// Geometry of the aperture this mask was built from
    pub fn aperture_shape(&self) -> ApertureShape {
        self.shape
    }

    pub fn method(&self) -> OverlapMethod {
        self.method
    }

    /// Unweighted image pixels under the bounding box.
    ///
    /// The result has the shape of the weight grid; pixels outside the image
    /// take `fill_value`. Returns `None` when the box misses the image.
    pub fn cutout(&self, image: &ArrayView2<f64>, fill_value: f64) -> Option<Array2<f64>> {
        let slices = self.bbox.overlap_slices(image.dim())?;
        let mut cutout = Array2::from_elem(self.weights.dim(), fill_value);
        cutout
            .slice_mut(s![slices.small_rows.clone(), slices.small_cols.clone()])
            .assign(&image.slice(s![slices.large_rows, slices.large_cols]));
        Some(cutout)
    }

    /// Weighted cutout: `weights * cutout`, with zero outside the image.
    pub fn multiply(&self, image: &ArrayView2<f64>) -> Option<Array2<f64>> {
        let slices = self.bbox.overlap_slices(image.dim())?;
        let weights = self
            .weights
            .slice(s![slices.small_rows.clone(), slices.small_cols.clone()]);
        let pixels = image.slice(s![slices.large_rows, slices.large_cols]);
        let mut product = Array2::zeros(self.weights.dim());
        product
            .slice_mut(s![slices.small_rows, slices.small_cols])
            .assign(&(&weights * &pixels));
        Some(product)
    }

    /// Scatter the weights into a zero image of `shape`, clipped at the edges.
    pub fn to_image(&self, shape: (usize, usize)) -> Option<Array2<f64>> {
        let slices = self.bbox.overlap_slices(shape)?;
        let mut image = Array2::zeros(shape);
        image
            .slice_mut(s![slices.large_rows, slices.large_cols])
            .assign(&self.weights.slice(s![slices.small_rows, slices.small_cols]));
        Some(image)
    }

    /// Weighted values of every in-image pixel with non-zero weight.
    ///
    /// For `Center` masks the weights are exactly one, so these are the raw
    /// pixel values of the aperture. The result is empty when the mask does
    /// not overlap the image.
    pub fn get_values(&self, image: &ArrayView2<f64>) -> Array1<f64> {
        let Some(slices) = self.bbox.overlap_slices(image.dim()) else {
            return Array1::zeros(0);
        };
        let weights = self.weights.slice(s![slices.small_rows, slices.small_cols]);
        let pixels = image.slice(s![slices.large_rows, slices.large_cols]);
        weights
            .iter()
            .zip(pixels.iter())
            .filter(|(&w, _)| w > 0.0)
            .map(|(&w, &v)| w * v)
            .collect()
    }

    /// Sum of the weights that land on an image of `shape`
    pub fn weight_sum_within(&self, shape: (usize, usize)) -> f64 {
        self.bbox
            .overlap_slices(shape)
            .map(|slices| {
                self.weights
                    .slice(s![slices.small_rows, slices.small_cols])
                    .sum()
            })
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(shape: (usize, usize)) -> Array2<f64> {
        Array2::from_shape_fn(shape, |(i, j)| (i * shape.1 + j) as f64)
    }

    #[test]
    fn test_cutout_inside_image() {
        let image = ramp((20, 20));
        let mask = ApertureMask::from_shape(
            ApertureShape::Circle { r: 2.0 },
            PixelPosition::new(10.0, 8.0),
            OverlapMethod::Center,
        );
        let cutout = mask.cutout(&image.view(), f64::NAN).unwrap();
        assert_eq!(cutout.dim(), mask.weights().dim());
        // bbox starts at column 8, row 6
        assert_eq!(cutout[[0, 0]], image[[6, 8]]);
        assert!(cutout.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_cutout_fill_outside_image() {
        let image = Array2::from_elem((10, 10), 3.0);
        let mask = ApertureMask::from_shape(
            ApertureShape::Circle { r: 2.0 },
            PixelPosition::new(0.0, 0.0),
            OverlapMethod::Exact,
        );
        let cutout = mask.cutout(&image.view(), -1.0).unwrap();
        assert_eq!(cutout[[0, 0]], -1.0);
        assert_eq!(cutout[[4, 4]], 3.0);
    }

    #[test]
    fn test_multiply_zero_outside_image() {
        let image = Array2::from_elem((10, 10), 2.0);
        let mask = ApertureMask::from_shape(
            ApertureShape::Circle { r: 3.0 },
            PixelPosition::new(9.0, 5.0),
            OverlapMethod::Exact,
        );
        let product = mask.multiply(&image.view()).unwrap();
        assert_eq!(product.dim(), mask.weights().dim());
        assert_relative_eq!(
            product.sum(),
            2.0 * mask.weight_sum_within((10, 10)),
            epsilon = 1e-12
        );
        assert!(mask.weight_sum_within((10, 10)) < mask.weights().sum());
    }

    #[test]
    fn test_to_image_places_weights() {
        let mask = ApertureMask::from_shape(
            ApertureShape::Annulus {
                r_in: 2.0,
                r_out: 4.0,
            },
            PixelPosition::new(15.0, 12.0),
            OverlapMethod::Center,
        );
        let full = mask.to_image((30, 30)).unwrap();
        assert_eq!(full.sum(), mask.weights().sum());
        assert_eq!(full[[12, 15]], 0.0); // hole of the annulus
        assert_eq!(full[[12, 18]], 1.0); // d = 3
        assert_eq!(full[[0, 0]], 0.0);
    }

    #[test]
    fn test_get_values_center_mask_returns_raw_pixels() {
        let image = ramp((30, 30));
        let mask = ApertureMask::from_shape(
            ApertureShape::Annulus {
                r_in: 3.0,
                r_out: 5.0,
            },
            PixelPosition::new(15.0, 15.0),
            OverlapMethod::Center,
        );
        let values = mask.get_values(&image.view());
        assert_eq!(values.len() as f64, mask.weights().sum());
        assert!(values.iter().all(|v| image.iter().any(|p| p == v)));
    }

    #[test]
    fn test_mask_outside_image() {
        let image = Array2::<f64>::ones((10, 10));
        let mask = ApertureMask::from_shape(
            ApertureShape::Annulus {
                r_in: 2.0,
                r_out: 4.0,
            },
            PixelPosition::new(-50.0, -50.0),
            OverlapMethod::Center,
        );
        assert!(mask.cutout(&image.view(), 0.0).is_none());
        assert!(mask.multiply(&image.view()).is_none());
        assert!(mask.to_image((10, 10)).is_none());
        assert!(mask.get_values(&image.view()).is_empty());
        assert_eq!(mask.weight_sum_within((10, 10)), 0.0);
    }
}
