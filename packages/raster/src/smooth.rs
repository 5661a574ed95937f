use ndarray::Array2;

use crate::RasterError;

/// Smooth a band with a Gaussian kernel of standard deviation `sigma`.
///
/// The kernel is truncated at four standard deviations. `NaN` cells are
/// skipped and the remaining weights renormalized, so isolated holes are
/// filled from their neighborhood; a pixel with no finite neighbor at all
/// stays `NaN`.
///
/// # Errors
///
/// * If `sigma` is not strictly positive.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn gaussian_smooth(data: &Array2<f64>, sigma: f64) -> Result<Array2<f64>, RasterError> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(RasterError::InvalidSigma { sigma });
    }

    let radius = (4.0 * sigma).ceil() as isize;
    let span = (2 * radius + 1) as usize;
    let mut kernel = Array2::<f64>::zeros((span, span));
    for dr in -radius..=radius {
        for dc in -radius..=radius {
            let dist_sq = (dr * dr + dc * dc) as f64;
            kernel[[(dr + radius) as usize, (dc + radius) as usize]] =
                (-dist_sq / (2.0 * sigma * sigma)).exp();
        }
    }

    let (rows, cols) = data.dim();
    let mut smoothed = Array2::<f64>::from_elem((rows, cols), f64::NAN);

    for row in 0..rows {
        for col in 0..cols {
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;

            for dr in -radius..=radius {
                for dc in -radius..=radius {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }

                    let value = data[[nr as usize, nc as usize]];
                    if !value.is_finite() {
                        continue;
                    }

                    let weight = kernel[[(dr + radius) as usize, (dc + radius) as usize]];
                    weighted_sum += value * weight;
                    weight_total += weight;
                }
            }

            if weight_total > 0.0 {
                smoothed[[row, col]] = weighted_sum / weight_total;
            }
        }
    }

    Ok(smoothed)
}
