use ndarray::{Array2, Zip};

use crate::RasterError;

/// Normalized difference vegetation index from red and near-infrared bands.
///
/// Computes `(nir - red) / (nir + red)` per pixel. Pixels where either band
/// is missing, or where the band sum is zero, come back as `NaN`.
///
/// # Errors
///
/// * If the two bands have different shapes.
pub fn ndvi_from_bands(red: &Array2<f64>, nir: &Array2<f64>) -> Result<Array2<f64>, RasterError> {
    if red.dim() != nir.dim() {
        let (red_rows, red_cols) = red.dim();
        let (nir_rows, nir_cols) = nir.dim();
        return Err(RasterError::BandShape {
            red_rows,
            red_cols,
            nir_rows,
            nir_cols,
        });
    }

    let index = Zip::from(red).and(nir).map_collect(|&red, &nir| {
        let denominator = nir + red;
        if denominator == 0.0 || !denominator.is_finite() {
            f64::NAN
        } else {
            (nir - red) / denominator
        }
    });

    Ok(index)
}
