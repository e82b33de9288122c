//! File I/O for science frames and source lists.

pub mod fits;
pub mod positions;

pub use fits::{read_fits_image, write_fits_image, FitsHeader, ScienceFrame};
pub use positions::read_positions_csv;
