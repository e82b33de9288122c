//! Integer pixel bounding boxes for apertures.
//!
//! Unlike detection boxes, aperture boxes may extend past the image edge (or
//! lie entirely outside it), so the bounds are signed. Bounds follow the
//! half-open convention: `ixmin..ixmax`, `iymin..iymax`.

use std::ops::Range;

/// Rectangular pixel region with signed, half-open bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    /// First column (inclusive)
    pub ixmin: isize,
    /// Last column (exclusive)
    pub ixmax: isize,
    /// First row (inclusive)
    pub iymin: isize,
    /// Last row (exclusive)
    pub iymax: isize,
}

/// Matching rectangles in the full image and in a bounding-box-sized array.
///
/// `large` indexes the image, `small` indexes the mask; both cover the same
/// number of rows and columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapSlices {
    pub large_rows: Range<usize>,
    pub large_cols: Range<usize>,
    pub small_rows: Range<usize>,
    pub small_cols: Range<usize>,
}

impl BoundingBox {
    pub fn new(ixmin: isize, ixmax: isize, iymin: isize, iymax: isize) -> Self {
        Self {
            ixmin,
            ixmax,
            iymin,
            iymax,
        }
    }

    /// Smallest box containing every pixel touched by the float extent.
    ///
    /// Pixel `i` covers `[i - 0.5, i + 0.5)`, so the box starts at
    /// `floor(xmin + 0.5)` and ends at `ceil(xmax + 0.5)`.
    pub fn from_float(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self {
            ixmin: (xmin + 0.5).floor() as isize,
            ixmax: (xmax + 0.5).ceil() as isize,
            iymin: (ymin + 0.5).floor() as isize,
            iymax: (ymax + 0.5).ceil() as isize,
        }
    }

    pub fn width(&self) -> usize {
        (self.ixmax - self.ixmin).max(0) as usize
    }

    pub fn height(&self) -> usize {
        (self.iymax - self.iymin).max(0) as usize
    }

    /// Array shape `(height, width)`
    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Clip the box against an image of `shape = (height, width)`.
    ///
    /// Returns `None` if the box does not overlap the image at all. This is
    /// the only place edge clipping is decided; every mask operation goes
    /// through it.
    pub fn overlap_slices(&self, shape: (usize, usize)) -> Option<OverlapSlices> {
        let (height, width) = (shape.0 as isize, shape.1 as isize);

        let x0 = self.ixmin.max(0);
        let x1 = self.ixmax.min(width);
        let y0 = self.iymin.max(0);
        let y1 = self.iymax.min(height);

        if x0 >= x1 || y0 >= y1 {
            return None;
        }

        Some(OverlapSlices {
            large_rows: y0 as usize..y1 as usize,
            large_cols: x0 as usize..x1 as usize,
            small_rows: (y0 - self.iymin) as usize..(y1 - self.iymin) as usize,
            small_cols: (x0 - self.ixmin) as usize..(x1 - self.ixmin) as usize,
        })
    }

    /// True if the box lies completely inside an image of the given shape
    pub fn is_within(&self, shape: (usize, usize)) -> bool {
        self.ixmin >= 0
            && self.iymin >= 0
            && self.ixmax <= shape.1 as isize
            && self.iymax <= shape.0 as isize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_float_centered_circle() {
        let bbox = BoundingBox::from_float(95.0, 105.0, 95.0, 105.0);
        assert_eq!(bbox, BoundingBox::new(95, 106, 95, 106));
        assert_eq!(bbox.shape(), (11, 11));
    }

    #[test]
    fn test_from_float_half_pixel_center() {
        let bbox = BoundingBox::from_float(5.5 - 2.0, 5.5 + 2.0, 0.0, 4.0);
        assert_eq!(bbox.ixmin, 4);
        assert_eq!(bbox.ixmax, 8);
        assert_eq!(bbox.width(), 4);
    }

    #[test]
    fn test_overlap_fully_inside() {
        let bbox = BoundingBox::new(2, 5, 3, 7);
        let slices = bbox.overlap_slices((10, 10)).unwrap();
        assert_eq!(slices.large_rows, 3..7);
        assert_eq!(slices.large_cols, 2..5);
        assert_eq!(slices.small_rows, 0..4);
        assert_eq!(slices.small_cols, 0..3);
        assert!(bbox.is_within((10, 10)));
    }

    #[test]
    fn test_overlap_clipped_at_corner() {
        let bbox = BoundingBox::new(-2, 3, 8, 12);
        let slices = bbox.overlap_slices((10, 10)).unwrap();
        assert_eq!(slices.large_rows, 8..10);
        assert_eq!(slices.large_cols, 0..3);
        assert_eq!(slices.small_rows, 0..2);
        assert_eq!(slices.small_cols, 2..5);
        assert!(!bbox.is_within((10, 10)));
    }

    #[test]
    fn test_no_overlap() {
        assert!(BoundingBox::new(-10, -2, 0, 5).overlap_slices((10, 10)).is_none());
        assert!(BoundingBox::new(0, 5, 10, 15).overlap_slices((10, 10)).is_none());
    }
}
