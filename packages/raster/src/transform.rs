use std::fmt::{Display, Formatter};

/// Affine mapping between pixel indices and geographic coordinates for a
/// north-up raster.
///
/// `pixel_width` is positive and `pixel_height` is negative: row indices grow
/// southward while y coordinates grow northward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    origin_x: f64,
    origin_y: f64,
    pixel_width: f64,
    pixel_height: f64,
}

impl GeoTransform {
    #[must_use]
    pub const fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// X coordinate of the upper-left corner of the raster.
    #[must_use]
    pub const fn origin_x(&self) -> f64 {
        self.origin_x
    }

    /// Y coordinate of the upper-left corner of the raster.
    #[must_use]
    pub const fn origin_y(&self) -> f64 {
        self.origin_y
    }

    #[must_use]
    pub const fn pixel_width(&self) -> f64 {
        self.pixel_width
    }

    #[must_use]
    pub const fn pixel_height(&self) -> f64 {
        self.pixel_height
    }

    /// Geographic coordinates of the center of the pixel at `(row, col)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pixel_to_geo(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }

    /// Fractional `(row, col)` indices of the pixel covering `(x, y)`.
    ///
    /// Callers floor the result to index the grid; values outside
    /// `[0, rows) x [0, cols)` mean the point falls off the raster.
    #[must_use]
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let col = (x - self.origin_x) / self.pixel_width;
        let row = (y - self.origin_y) / self.pixel_height;
        (row, col)
    }
}

impl Display for GeoTransform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "origin=({}, {}) pixel=({}, {})",
            self.origin_x, self.origin_y, self.pixel_width, self.pixel_height
        )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn north_up() -> GeoTransform {
        GeoTransform::new(-120.0, 50.0, 0.25, -0.25)
    }

    #[test]
    fn pixel_to_geo_returns_cell_centers() {
        let transform = north_up();

        let (x, y) = transform.pixel_to_geo(0, 0);

        assert_relative_eq!(x, -119.875, epsilon = 1e-12);
        assert_relative_eq!(y, 49.875, epsilon = 1e-12);
    }

    #[test]
    fn geo_to_pixel_inverts_pixel_to_geo() {
        let transform = north_up();

        let (x, y) = transform.pixel_to_geo(7, 3);
        let (row, col) = transform.geo_to_pixel(x, y);

        assert_relative_eq!(row, 7.5, epsilon = 1e-12);
        assert_relative_eq!(col, 3.5, epsilon = 1e-12);
    }

    #[test]
    fn geo_to_pixel_goes_negative_north_of_the_origin() {
        let transform = north_up();

        let (row, col) = transform.geo_to_pixel(-119.9, 50.1);

        assert!(row < 0.0);
        assert!(col > 0.0);
    }

    #[test]
    fn rows_grow_southward() {
        let transform = north_up();

        let (_, y_top) = transform.pixel_to_geo(0, 0);
        let (_, y_below) = transform.pixel_to_geo(1, 0);

        assert!(y_below < y_top);
    }
}
