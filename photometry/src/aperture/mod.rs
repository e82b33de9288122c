//! Circular and annular apertures placed at source positions.
//!
//! An aperture set shares one geometry across many positions, so building a
//! set of N apertures is the same as building N single-position sets. The
//! geometric `area` is the continuous area of the shape and does not depend
//! on how the shape falls on the pixel grid.
//!
//! # Pixel convention
//! Pixel `(row i, col j)` has its centre at `x = j`, `y = i` and covers
//! `[j - 0.5, j + 0.5) x [i - 0.5, i + 0.5)`.
//!
//! # Example
//! ```rust
//! use photometry::aperture::{CircularAnnulus, CircularAperture, PixelAperture, PixelPosition};
//!
//! let positions = vec![PixelPosition::new(30.0, 30.0), PixelPosition::new(70.5, 42.2)];
//! let source = CircularAperture::new(positions.clone(), 5.0).unwrap();
//! let annulus = CircularAnnulus::new(positions, 10.0, 15.0).unwrap();
//!
//! assert_eq!(source.len(), 2);
//! assert!((annulus.area() - std::f64::consts::PI * 125.0).abs() < 1e-9);
//! ```

mod bbox;
pub mod overlap;

pub use bbox::{BoundingBox, OverlapSlices};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use crate::error::PhotometryError;
use crate::mask::ApertureMask;

/// Sub-pixel source position in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPosition {
    pub x: f64,
    pub y: f64,
}

impl PixelPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for PixelPosition {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for PixelPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// How pixel membership in an aperture is weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapMethod {
    /// Exact fraction of the pixel area inside the shape
    #[default]
    Exact,
    /// 1 if the pixel centre lies inside the shape, otherwise 0
    Center,
    /// Fraction of an n x n grid of subpixel centres inside the shape
    Subpixel(u32),
}

/// Geometry shared by every aperture of a set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApertureShape {
    Circle { r: f64 },
    Annulus { r_in: f64, r_out: f64 },
}

impl ApertureShape {
    /// Continuous geometric area
    pub fn area(&self) -> f64 {
        match *self {
            ApertureShape::Circle { r } => PI * r * r,
            ApertureShape::Annulus { r_in, r_out } => PI * (r_out * r_out - r_in * r_in),
        }
    }

    /// Radius of the outermost edge, which determines the bounding box
    pub fn outer_radius(&self) -> f64 {
        match *self {
            ApertureShape::Circle { r } => r,
            ApertureShape::Annulus { r_out, .. } => r_out,
        }
    }

    /// Bounding box of the shape placed at `center`
    pub fn bbox(&self, center: PixelPosition) -> BoundingBox {
        let r = self.outer_radius();
        BoundingBox::from_float(center.x - r, center.x + r, center.y - r, center.y + r)
    }

    /// Per-pixel overlap weights over `bbox`
    pub fn weights(
        &self,
        center: PixelPosition,
        bbox: &BoundingBox,
        method: OverlapMethod,
    ) -> Array2<f64> {
        match *self {
            ApertureShape::Circle { r } => overlap::circle_weights(center, r, bbox, method),
            ApertureShape::Annulus { r_in, r_out } => {
                overlap::annulus_weights(center, r_in, r_out, bbox, method)
            }
        }
    }

    fn validate(&self) -> Result<(), PhotometryError> {
        match *self {
            ApertureShape::Circle { r } => {
                if !r.is_finite() || r <= 0.0 {
                    return Err(PhotometryError::InvalidGeometry(format!(
                        "circle radius must be finite and positive, got {r}"
                    )));
                }
            }
            ApertureShape::Annulus { r_in, r_out } => {
                if !r_in.is_finite() || !r_out.is_finite() || r_in < 0.0 {
                    return Err(PhotometryError::InvalidGeometry(format!(
                        "annulus radii must be finite and non-negative, got r_in={r_in}, r_out={r_out}"
                    )));
                }
                if r_in >= r_out {
                    return Err(PhotometryError::InvalidGeometry(format!(
                        "annulus inner radius {r_in} must be smaller than outer radius {r_out}"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn validate_positions(positions: &[PixelPosition]) -> Result<(), PhotometryError> {
    if let Some(bad) = positions
        .iter()
        .find(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return Err(PhotometryError::InvalidGeometry(format!(
            "aperture position must be finite, got {bad}"
        )));
    }
    Ok(())
}

/// A set of same-shaped apertures, one per source position.
pub trait PixelAperture {
    /// Source positions, in input order
    fn positions(&self) -> &[PixelPosition];

    /// Shape shared by all apertures of the set
    fn shape(&self) -> ApertureShape;

    fn len(&self) -> usize {
        self.positions().len()
    }

    fn is_empty(&self) -> bool {
        self.positions().is_empty()
    }

    /// Geometric area of one aperture
    fn area(&self) -> f64 {
        self.shape().area()
    }

    /// Bounding boxes of every aperture
    fn bboxes(&self) -> Vec<BoundingBox> {
        let shape = self.shape();
        self.positions().iter().map(|&p| shape.bbox(p)).collect()
    }

    /// Overlap mask of every aperture
    fn to_masks(&self, method: OverlapMethod) -> Vec<ApertureMask> {
        let shape = self.shape();
        self.positions()
            .iter()
            .map(|&p| ApertureMask::from_shape(shape, p, method))
            .collect()
    }

    /// Mask-weighted area of each aperture that falls on an image of
    /// `image_shape`; equals [`PixelAperture::area`] for exact masks away from
    /// the edges.
    fn area_overlap(&self, image_shape: (usize, usize), method: OverlapMethod) -> Vec<f64> {
        self.to_masks(method)
            .iter()
            .map(|mask| mask.weight_sum_within(image_shape))
            .collect()
    }
}

/// Circular apertures of radius `r`.
#[derive(Debug, Clone, PartialEq)]
pub struct CircularAperture {
    positions: Vec<PixelPosition>,
    r: f64,
}

impl CircularAperture {
    /// # Errors
    /// * `PhotometryError::InvalidGeometry` - non-positive radius or non-finite position
    pub fn new(positions: Vec<PixelPosition>, r: f64) -> Result<Self, PhotometryError> {
        ApertureShape::Circle { r }.validate()?;
        validate_positions(&positions)?;
        Ok(Self { positions, r })
    }

    pub fn r(&self) -> f64 {
        self.r
    }
}

impl PixelAperture for CircularAperture {
    fn positions(&self) -> &[PixelPosition] {
        &self.positions
    }

    fn shape(&self) -> ApertureShape {
        ApertureShape::Circle { r: self.r }
    }
}

/// Circular annuli between `r_in` and `r_out`.
#[derive(Debug, Clone, PartialEq)]
pub struct CircularAnnulus {
    positions: Vec<PixelPosition>,
    r_in: f64,
    r_out: f64,
}

impl CircularAnnulus {
    /// # Errors
    /// * `PhotometryError::InvalidGeometry` - `r_in >= r_out`, negative or non-finite radii
    pub fn new(
        positions: Vec<PixelPosition>,
        r_in: f64,
        r_out: f64,
    ) -> Result<Self, PhotometryError> {
        ApertureShape::Annulus { r_in, r_out }.validate()?;
        validate_positions(&positions)?;
        Ok(Self {
            positions,
            r_in,
            r_out,
        })
    }

    pub fn r_in(&self) -> f64 {
        self.r_in
    }

    pub fn r_out(&self) -> f64 {
        self.r_out
    }
}

impl PixelAperture for CircularAnnulus {
    fn positions(&self) -> &[PixelPosition] {
        &self.positions
    }

    fn shape(&self) -> ApertureShape {
        ApertureShape::Annulus {
            r_in: self.r_in,
            r_out: self.r_out,
        }
    }
}
