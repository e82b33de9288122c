//! Pixel/circle overlap computation.
//!
//! The exact method integrates the circle analytically over each unit pixel.
//! With the circle centred on the origin, the signed area
//!
//! ```text
//! Q(x, y) = ∫₀ˣ ∫₀ʸ 1[u² + v² < r²] dv du
//! ```
//!
//! reduces by symmetry to a first-quadrant area, and the area inside any
//! rectangle is `Q(x1,y1) - Q(x0,y1) - Q(x1,y0) + Q(x0,y0)`.

use ndarray::Array2;

use super::bbox::BoundingBox;
use super::{OverlapMethod, PixelPosition};

/// Area of the circle inside `[0, a] x [0, b]` for `a, b >= 0`.
///
/// Outside the inscribed case the region is two triangles fanning from the
/// origin to the arc end points `(x_c, b)` and `(a, h_a)`, plus the circular
/// sector between them. Both end points are built from their two legs so the
/// sector angle comes from `atan2` and stays well conditioned near the edge.
fn quadrant_area(a: f64, b: f64, r: f64) -> f64 {
    let a = a.min(r);
    let b = b.min(r);
    if a * a + b * b <= r * r {
        return a * b;
    }
    // Where the circle crosses the top edge (y = b) and the right edge (x = a)
    let x_c = ((r - b) * (r + b)).max(0.0).sqrt();
    let h_a = ((r - a) * (r + a)).max(0.0).sqrt();
    let sector = (a * b - x_c * h_a).atan2(b * h_a + a * x_c);
    0.5 * (b * x_c + a * h_a + r * r * sector)
}

fn signed_corner_area(x: f64, y: f64, r: f64) -> f64 {
    if x == 0.0 || y == 0.0 {
        return 0.0;
    }
    x.signum() * y.signum() * quadrant_area(x.abs(), y.abs(), r)
}

/// Exact area of a radius-`r` circle centred on the origin inside the
/// rectangle `[xmin, xmax] x [ymin, ymax]`.
pub fn circle_rect_overlap(xmin: f64, xmax: f64, ymin: f64, ymax: f64, r: f64) -> f64 {
    if r <= 0.0 {
        return 0.0;
    }
    let area = signed_corner_area(xmax, ymax, r) - signed_corner_area(xmin, ymax, r)
        - signed_corner_area(xmax, ymin, r)
        + signed_corner_area(xmin, ymin, r);
    area.max(0.0)
}

/// Fraction of a unit pixel centred at `(dx, dy)` lying inside the circle
fn exact_fraction(dx: f64, dy: f64, r: f64) -> f64 {
    circle_rect_overlap(dx - 0.5, dx + 0.5, dy - 0.5, dy + 0.5, r).min(1.0)
}

/// Fraction of the `n x n` subpixel centres inside the circle
fn subpixel_fraction(dx: f64, dy: f64, r: f64, n: u32) -> f64 {
    let n = n.max(1);
    let step = 1.0 / n as f64;
    let r2 = r * r;
    let mut inside = 0u32;
    for sy in 0..n {
        let y = dy - 0.5 + (sy as f64 + 0.5) * step;
        for sx in 0..n {
            let x = dx - 0.5 + (sx as f64 + 0.5) * step;
            if x * x + y * y < r2 {
                inside += 1;
            }
        }
    }
    inside as f64 / (n * n) as f64
}

/// Overlap weights of a circle with every pixel of `bbox`.
///
/// Row `i`, column `j` of the result corresponds to image pixel
/// `(bbox.iymin + i, bbox.ixmin + j)`.
pub fn circle_weights(
    center: PixelPosition,
    r: f64,
    bbox: &BoundingBox,
    method: OverlapMethod,
) -> Array2<f64> {
    Array2::from_shape_fn(bbox.shape(), |(i, j)| {
        let dx = (bbox.ixmin + j as isize) as f64 - center.x;
        let dy = (bbox.iymin + i as isize) as f64 - center.y;
        match method {
            OverlapMethod::Exact => exact_fraction(dx, dy, r),
            OverlapMethod::Center => {
                if dx * dx + dy * dy < r * r {
                    1.0
                } else {
                    0.0
                }
            }
            OverlapMethod::Subpixel(n) => subpixel_fraction(dx, dy, r, n),
        }
    })
}

/// Overlap weights of an annulus, as the difference of two circles.
pub fn annulus_weights(
    center: PixelPosition,
    r_in: f64,
    r_out: f64,
    bbox: &BoundingBox,
    method: OverlapMethod,
) -> Array2<f64> {
    let outer = circle_weights(center, r_out, bbox, method);
    if r_in <= 0.0 {
        return outer;
    }
    let inner = circle_weights(center, r_in, bbox, method);
    (outer - inner).mapv(|w| w.max(0.0))
}
