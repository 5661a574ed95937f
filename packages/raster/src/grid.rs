use ndarray::Array2;

use crate::transform::GeoTransform;

/// A single-band raster with georeferencing.
///
/// Row 0 is the northernmost row. Missing cells hold `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    data: Array2<f64>,
    transform: GeoTransform,
}

impl RasterGrid {
    #[must_use]
    pub const fn new(data: Array2<f64>, transform: GeoTransform) -> Self {
        Self { data, transform }
    }

    #[must_use]
    pub const fn data(&self) -> &Array2<f64> {
        &self.data
    }

    #[must_use]
    pub const fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Value of the pixel covering the geographic point `(x, y)`.
    ///
    /// Returns `NaN` when the point falls outside the raster extent.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn value_at_geo(&self, x: f64, y: f64) -> f64 {
        let (row, col) = self.transform.geo_to_pixel(x, y);
        if row < 0.0 || col < 0.0 {
            return f64::NAN;
        }

        let (row, col) = (row.floor() as usize, col.floor() as usize);
        if row >= self.rows() || col >= self.cols() {
            return f64::NAN;
        }

        self.data[[row, col]]
    }

    /// Replace the band data, keeping the georeferencing.
    ///
    /// # Panics
    ///
    /// * If `data` has a different shape than the current band.
    #[must_use]
    pub fn with_data(&self, data: Array2<f64>) -> Self {
        assert_eq!(data.dim(), self.data.dim());
        Self {
            data,
            transform: self.transform,
        }
    }
}
