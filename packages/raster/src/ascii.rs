use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;

use crate::RasterError;
use crate::grid::RasterGrid;
use crate::transform::GeoTransform;

/// Collected header fields of an ESRI ASCII grid.
#[derive(Debug, Default)]
struct Header {
    ncols: Option<f64>,
    nrows: Option<f64>,
    xllcorner: Option<f64>,
    xllcenter: Option<f64>,
    yllcorner: Option<f64>,
    yllcenter: Option<f64>,
    cellsize: Option<f64>,
    dx: Option<f64>,
    dy: Option<f64>,
    nodata: Option<f64>,
}

impl Header {
    fn set(&mut self, key: &str, value: f64) -> Result<(), RasterError> {
        match key {
            "ncols" => self.ncols = Some(value),
            "nrows" => self.nrows = Some(value),
            "xllcorner" => self.xllcorner = Some(value),
            "xllcenter" => self.xllcenter = Some(value),
            "yllcorner" => self.yllcorner = Some(value),
            "yllcenter" => self.yllcenter = Some(value),
            "cellsize" => self.cellsize = Some(value),
            "dx" => self.dx = Some(value),
            "dy" => self.dy = Some(value),
            "nodata_value" => self.nodata = Some(value),
            _ => {
                return Err(RasterError::Header {
                    message: format!("unrecognized field {key:?}"),
                });
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn dimension(value: Option<f64>, name: &str) -> Result<usize, RasterError> {
        let Some(value) = value else {
            return Err(RasterError::Header {
                message: format!("missing required field {name:?}"),
            });
        };
        if !value.is_finite() || value <= 0.0 || value.fract() != 0.0 {
            return Err(RasterError::Header {
                message: format!("field {name:?} must be a positive integer, got {value}"),
            });
        }
        Ok(value as usize)
    }

    fn cell_sizes(&self) -> Result<(f64, f64), RasterError> {
        let sizes = match (self.cellsize, self.dx, self.dy) {
            (Some(size), None, None) => (size, size),
            (None, Some(dx), Some(dy)) => (dx, dy),
            (Some(_), _, _) => {
                return Err(RasterError::Header {
                    message: "cellsize cannot be combined with dx/dy".to_string(),
                });
            }
            _ => {
                return Err(RasterError::Header {
                    message: "missing cellsize (or a dx/dy pair)".to_string(),
                });
            }
        };
        if sizes.0 <= 0.0 || sizes.1 <= 0.0 {
            return Err(RasterError::Header {
                message: format!("cell sizes must be positive, got {} x {}", sizes.0, sizes.1),
            });
        }
        Ok(sizes)
    }

    fn lower_left(
        corner: Option<f64>,
        center: Option<f64>,
        cell_size: f64,
        axis: &str,
    ) -> Result<f64, RasterError> {
        match (corner, center) {
            (Some(corner), None) => Ok(corner),
            (None, Some(center)) => Ok(center - cell_size / 2.0),
            (Some(_), Some(_)) => Err(RasterError::Header {
                message: format!("both {axis}llcorner and {axis}llcenter present"),
            }),
            (None, None) => Err(RasterError::Header {
                message: format!("missing {axis}llcorner (or {axis}llcenter)"),
            }),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn into_transform(self) -> Result<(usize, usize, Option<f64>, GeoTransform), RasterError> {
        let rows = Self::dimension(self.nrows, "nrows")?;
        let cols = Self::dimension(self.ncols, "ncols")?;
        let (width, height) = self.cell_sizes()?;
        let origin_x = Self::lower_left(self.xllcorner, self.xllcenter, width, "x")?;
        let lower_y = Self::lower_left(self.yllcorner, self.yllcenter, height, "y")?;
        let origin_y = lower_y + rows as f64 * height;

        Ok((
            rows,
            cols,
            self.nodata,
            GeoTransform::new(origin_x, origin_y, width, -height),
        ))
    }
}

/// Read an ESRI ASCII grid.
///
/// Accepts the `cellsize` and `dx`/`dy` header variants and both the
/// `llcorner` and `llcenter` origin conventions. The first data row of the
/// file is the northernmost row. Cells equal to the `NODATA_value` sentinel
/// come back as `NaN`.
///
/// # Errors
///
/// * If the underlying reader fails.
/// * If the header is incomplete, contradictory, or malformed.
/// * If a body token is not a number.
/// * If the body size disagrees with `nrows * ncols`.
pub fn read_ascii_grid<R: BufRead>(reader: R) -> Result<RasterGrid, RasterError> {
    let mut header = Header::default();
    let mut values: Vec<f64> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let starts_alphabetic = line.chars().next().is_some_and(char::is_alphabetic);
        if starts_alphabetic {
            if !values.is_empty() {
                return Err(RasterError::Header {
                    message: "header field after data body".to_string(),
                });
            }
            let mut tokens = line.split_whitespace();
            let key = tokens.next().unwrap_or_default().to_ascii_lowercase();
            let Some(raw) = tokens.next() else {
                return Err(RasterError::Header {
                    message: format!("field {key:?} has no value"),
                });
            };
            if tokens.next().is_some() {
                return Err(RasterError::Header {
                    message: format!("field {key:?} has trailing content"),
                });
            }
            let value = raw.parse::<f64>().map_err(|_| RasterError::Header {
                message: format!("field {key:?} has invalid value {raw:?}"),
            })?;
            header.set(&key, value)?;
        } else {
            for token in line.split_whitespace() {
                let value = token.parse::<f64>().map_err(|_| RasterError::BadValue {
                    value: token.to_string(),
                    index: values.len(),
                })?;
                values.push(value);
            }
        }
    }

    let (rows, cols, nodata, transform) = header.into_transform()?;
    let expected = rows * cols;
    if values.len() != expected {
        return Err(RasterError::Truncated {
            expected,
            found: values.len(),
        });
    }

    if let Some(nodata) = nodata {
        for value in &mut values {
            if (*value - nodata).abs() < f64::EPSILON {
                *value = f64::NAN;
            }
        }
    }

    let data = Array2::from_shape_vec((rows, cols), values).map_err(|_| RasterError::Truncated {
        expected,
        found: expected,
    })?;
    Ok(RasterGrid::new(data, transform))
}

/// Read an ESRI ASCII grid from a file path.
///
/// # Errors
///
/// * If the file cannot be opened or read.
/// * If the content is not a valid ASCII grid.
pub fn read_ascii_grid_file(path: &Path) -> Result<RasterGrid, RasterError> {
    let raster = read_ascii_grid(BufReader::new(File::open(path)?))?;
    log::debug!(
        "read raster path={} rows={} cols={}",
        path.display(),
        raster.rows(),
        raster.cols(),
    );
    Ok(raster)
}
