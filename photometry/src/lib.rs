//! Aperture photometry with local annulus background subtraction.
//!
//! The workflow mirrors how point-source fluxes are measured on reduced
//! telescope frames:
//!
//! 1. Load a science image and its RMS map ([`io::fits`])
//! 2. Combine the RMS map with source shot noise ([`error_map`])
//! 3. Place a circular aperture and a concentric annulus on every source ([`aperture`])
//! 4. Sum the weighted aperture pixels ([`photometer`])
//! 5. Estimate the background per pixel from the annulus ([`background`])
//! 6. Scale the background to the aperture area and subtract it ([`flux`])
//!
//! [`pipeline::LocalBackgroundPipeline`] strings the steps together and
//! collects one [`table::PhotometryRecord`] per source.

pub mod aperture;
pub mod background;
pub mod error;
pub mod error_map;
pub mod flux;
pub mod image;
pub mod io;
pub mod mask;
pub mod photometer;
pub mod pipeline;
pub mod synthetic;
pub mod table;

pub use aperture::{
    ApertureShape, BoundingBox, CircularAnnulus, CircularAperture, OverlapMethod, PixelAperture,
    PixelPosition,
};
pub use background::{BackgroundEstimate, BackgroundStatistic, ClipCenter};
pub use error::PhotometryError;
pub use error_map::{calc_total_error, EffectiveGain};
pub use flux::{correct_flux, FluxCorrection};
pub use image::Image;
pub use mask::ApertureMask;
pub use photometer::{aperture_photometry, PhotometryOptions};
pub use pipeline::{LocalBackgroundPipeline, PipelineConfig};
pub use table::{PhotometryRecord, PhotometryTable, RecordFlags};
