#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Raster primitives for the fusion pipeline.
//!
//! Everything the topography and NDVI stages need to turn raw elevation and
//! band rasters into per-cell features: affine georeferencing, an
//! `ndarray`-backed raster grid, NaN-aware Gaussian smoothing, slope/aspect
//! derivation, NDVI band math, quadrant tiling of request bounding boxes,
//! and the ESRI ASCII grid exchange format the fetch collaborators write.
//!
//! NaN is the missing-value representation throughout; readers map nodata
//! sentinels to NaN at the boundary and nothing downstream ever sees a
//! sentinel.

use thiserror::Error;

pub mod ascii;
pub mod grid;
pub mod ndvi;
pub mod smooth;
pub mod terrain;
pub mod tiling;
pub mod transform;

pub use ascii::{read_ascii_grid, read_ascii_grid_file};
pub use grid::RasterGrid;
pub use ndvi::ndvi_from_bands;
pub use smooth::gaussian_smooth;
pub use terrain::{MAX_SLOPE_DEGREES, slope_aspect};
pub use tiling::{divide_bounding_box, merge_tile_samples};
pub use transform::GeoTransform;

/// Errors raised by raster parsing and processing. All are fatal for the
/// stage that hit them; missing pixels are NaN data, not errors.
#[derive(Debug, Error)]
pub enum RasterError {
    /// Underlying read failed.
    #[error("I/O error reading raster: {0}")]
    Io(#[from] std::io::Error),

    /// ASCII grid header is incomplete or malformed.
    #[error("Invalid ASCII grid header: {message}")]
    Header {
        /// What was wrong with the header.
        message: String,
    },

    /// ASCII grid body held a different number of values than the header
    /// promised.
    #[error("ASCII grid body size mismatch: expected {expected} values, found {found}")]
    Truncated {
        /// `nrows * ncols` from the header.
        expected: usize,
        /// Values actually present.
        found: usize,
    },

    /// A body token failed to parse as a number.
    #[error("Invalid raster value {value:?} at position {index}")]
    BadValue {
        /// The offending token.
        value: String,
        /// Zero-based position in the data body.
        index: usize,
    },

    /// Band rasters disagree on shape.
    #[error(
        "Band shape mismatch: red is {red_rows}x{red_cols}, near-infrared is {nir_rows}x{nir_cols}"
    )]
    BandShape {
        /// Red band rows.
        red_rows: usize,
        /// Red band columns.
        red_cols: usize,
        /// Near-infrared band rows.
        nir_rows: usize,
        /// Near-infrared band columns.
        nir_cols: usize,
    },

    /// Gaussian sigma was zero, negative, or non-finite.
    #[error("Smoothing sigma must be positive, got {sigma}")]
    InvalidSigma {
        /// The rejected sigma.
        sigma: f64,
    },
}
