use ndarray::Array2;

use crate::RasterError;
use crate::grid::RasterGrid;
use crate::smooth::gaussian_smooth;

/// Slopes steeper than this are reported as exactly this value.
pub const MAX_SLOPE_DEGREES: f64 = 35.0;

const SMOOTHING_SIGMA: f64 = 1.0;

/// Derive slope and aspect bands from an elevation raster.
///
/// The elevation band is smoothed with a Gaussian kernel first so that
/// single-pixel noise does not dominate the derivatives. Gradients are
/// central differences over the true pixel resolution, one-sided at the
/// raster edges.
///
/// Slope is in degrees, clamped to `[0, MAX_SLOPE_DEGREES]`. Aspect is the
/// downslope compass direction in degrees, `0` pointing north and growing
/// clockwise; flat cells report `0`. `NaN` elevations yield `NaN` in both
/// bands.
///
/// # Errors
///
/// * If the smoothing pass fails.
pub fn slope_aspect(raster: &RasterGrid) -> Result<(Array2<f64>, Array2<f64>), RasterError> {
    let smoothed = gaussian_smooth(raster.data(), SMOOTHING_SIGMA)?;
    let dx = raster.transform().pixel_width().abs();
    let dy = raster.transform().pixel_height().abs();

    let gx = gradient_along_cols(&smoothed, dx);
    let gy = gradient_along_rows(&smoothed, dy);

    let (rows, cols) = smoothed.dim();
    let mut slope = Array2::<f64>::zeros((rows, cols));
    let mut aspect = Array2::<f64>::zeros((rows, cols));

    for row in 0..rows {
        for col in 0..cols {
            let east = gx[[row, col]];
            let south = gy[[row, col]];

            slope[[row, col]] = east
                .hypot(south)
                .atan()
                .to_degrees()
                .clamp(0.0, MAX_SLOPE_DEGREES);
            aspect[[row, col]] = if east.is_nan() || south.is_nan() {
                f64::NAN
            } else {
                ((-east).atan2(south).to_degrees() + 360.0) % 360.0
            };
        }
    }

    Ok((slope, aspect))
}

/// Central-difference gradient along the column axis (west to east).
fn gradient_along_cols(data: &Array2<f64>, spacing: f64) -> Array2<f64> {
    let (rows, cols) = data.dim();
    let mut gradient = Array2::<f64>::zeros((rows, cols));
    if cols < 2 {
        return gradient;
    }

    for row in 0..rows {
        gradient[[row, 0]] = (data[[row, 1]] - data[[row, 0]]) / spacing;
        for col in 1..cols - 1 {
            gradient[[row, col]] =
                (data[[row, col + 1]] - data[[row, col - 1]]) / (2.0 * spacing);
        }
        gradient[[row, cols - 1]] = (data[[row, cols - 1]] - data[[row, cols - 2]]) / spacing;
    }

    gradient
}

/// Central-difference gradient along the row axis (north to south).
fn gradient_along_rows(data: &Array2<f64>, spacing: f64) -> Array2<f64> {
    let (rows, cols) = data.dim();
    let mut gradient = Array2::<f64>::zeros((rows, cols));
    if rows < 2 {
        return gradient;
    }

    for col in 0..cols {
        gradient[[0, col]] = (data[[1, col]] - data[[0, col]]) / spacing;
        for row in 1..rows - 1 {
            gradient[[row, col]] =
                (data[[row + 1, col]] - data[[row - 1, col]]) / (2.0 * spacing);
        }
        gradient[[rows - 1, col]] = (data[[rows - 1, col]] - data[[rows - 2, col]]) / spacing;
    }

    gradient
}
