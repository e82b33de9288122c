//! Source position lists.

use std::path::Path;

use crate::aperture::PixelPosition;
use crate::error::PhotometryError;

/// Read source positions from a CSV file with an `x,y` header.
///
/// Row order is preserved; it becomes the source id order of the output.
pub fn read_positions_csv<P: AsRef<Path>>(path: P) -> Result<Vec<PixelPosition>, PhotometryError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let positions = reader
        .deserialize::<PixelPosition>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(positions)
}
