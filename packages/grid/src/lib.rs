#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Polygon grid index for the fusion pipeline.
//!
//! Loads a region's grid from a GeoJSON `FeatureCollection`, validates cell
//! identities, and derives the per-cell centroids every other stage samples
//! at. The grid is loaded once per run and read-only afterwards.
//!
//! Centroids are computed in the projected web-mercator frame and
//! reprojected back to WGS84. Centroiding directly in the geographic frame
//! shifts the result for non-square or high-latitude cells, which would
//! bias every raster sample taken at the centroid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use geo::{BoundingRect, Centroid as _, Coord, MapCoords, MultiPolygon};
use geojson::{FeatureCollection, GeoJson};
use serde_json::Value;
use thiserror::Error;

use firegrid_models::{BoundingBox, Centroid};

pub mod projection;

/// Errors raised while loading a grid. All are fatal for the run.
#[derive(Debug, Error)]
pub enum GridLoadError {
    /// Grid file could not be read.
    #[error("Failed to read grid file {path}: {source}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Input was not parseable GeoJSON.
    #[error("Invalid GeoJSON: {0}")]
    Geojson(#[from] geojson::Error),

    /// Input parsed, but was not a `FeatureCollection`.
    #[error("Grid input must be a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    /// The collection holds zero features.
    #[error("Grid contains no features")]
    Empty,

    /// A feature has no integer `grid_id` property.
    #[error("Feature {index} is missing an integer 'grid_id' property")]
    MissingGridId {
        /// Zero-based feature index in the collection.
        index: usize,
    },

    /// Two features share one `grid_id`.
    #[error("Duplicate grid_id {grid_id}")]
    DuplicateGridId {
        /// The repeated identifier.
        grid_id: i64,
    },

    /// A feature's geometry is missing or not a (multi)polygon.
    #[error("Feature {index} does not carry a polygonal geometry")]
    NotPolygonal {
        /// Zero-based feature index in the collection.
        index: usize,
    },

    /// The collection names a reference frame this crate cannot reproject.
    #[error("Unsupported grid reference frame '{name}'")]
    UnsupportedFrame {
        /// The frame name found in the legacy `crs` member.
        name: String,
    },

    /// Centroid computation failed (degenerate geometry).
    #[error("Failed to compute a centroid for grid_id {grid_id}")]
    Centroid {
        /// Cell whose geometry produced no centroid.
        grid_id: i64,
    },
}

/// One grid cell: a stable identifier and its WGS84 polygon.
#[derive(Debug, Clone)]
pub struct GridCell {
    grid_id: i64,
    polygon: MultiPolygon<f64>,
}

impl GridCell {
    /// Stable cell identifier, unique within the grid.
    #[must_use]
    pub const fn grid_id(&self) -> i64 {
        self.grid_id
    }

    /// Cell geometry in WGS84.
    #[must_use]
    pub const fn polygon(&self) -> &MultiPolygon<f64> {
        &self.polygon
    }
}

/// The loaded grid: cells plus derived centroids, read-only after load.
#[derive(Debug, Clone)]
pub struct GridIndex {
    cells: Vec<GridCell>,
    centroids: BTreeMap<i64, Centroid>,
}

impl GridIndex {
    /// Loads a grid from a GeoJSON file.
    ///
    /// # Errors
    ///
    /// Returns [`GridLoadError`] if the file cannot be read or fails any of
    /// the validations in [`Self::from_geojson`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GridLoadError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| GridLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_geojson(&raw)?;
        log::info!(
            "Loaded {} grid cells from {}",
            index.cells.len(),
            path.display()
        );
        Ok(index)
    }

    /// Builds a grid from a GeoJSON string.
    ///
    /// Geometries arriving in EPSG:3857 (per the collection's legacy `crs`
    /// member) are reprojected to WGS84 here, so every consumer sees one
    /// frame.
    ///
    /// # Errors
    ///
    /// Returns [`GridLoadError`] if the input is not a `FeatureCollection`,
    /// contains zero features, names an unsupported frame, or any feature
    /// lacks an integer `grid_id` or polygonal geometry. Duplicate
    /// `grid_id`s are rejected.
    pub fn from_geojson(raw: &str) -> Result<Self, GridLoadError> {
        let geojson: GeoJson = raw.parse()?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(GridLoadError::NotFeatureCollection);
        };
        if collection.features.is_empty() {
            return Err(GridLoadError::Empty);
        }

        let frame = source_frame(&collection)?;

        let mut cells = Vec::with_capacity(collection.features.len());
        let mut centroids = BTreeMap::new();

        for (index, feature) in collection.features.into_iter().enumerate() {
            let grid_id = integer_property(feature.properties.as_ref(), "grid_id")
                .ok_or(GridLoadError::MissingGridId { index })?;
            let geometry = feature
                .geometry
                .ok_or(GridLoadError::NotPolygonal { index })?;
            let mut polygon =
                multipolygon_from_geojson(geometry).ok_or(GridLoadError::NotPolygonal { index })?;

            if frame == SourceFrame::WebMercator {
                polygon = polygon.map_coords(|coord| {
                    let (x, y) = projection::from_web_mercator(coord.x, coord.y);
                    Coord { x, y }
                });
            }

            let centroid =
                projected_centroid(&polygon).ok_or(GridLoadError::Centroid { grid_id })?;
            if centroids.insert(grid_id, centroid).is_some() {
                return Err(GridLoadError::DuplicateGridId { grid_id });
            }
            cells.push(GridCell { grid_id, polygon });
        }

        Ok(Self { cells, centroids })
    }

    /// All cells in input order.
    #[must_use]
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Number of cells in the grid.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid holds no cells. Never true for a loaded grid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Per-cell centroids in WGS84, keyed by `grid_id`.
    #[must_use]
    pub const fn centroids(&self) -> &BTreeMap<i64, Centroid> {
        &self.centroids
    }

    /// Extrema over every cell geometry, in (north, west, south, east)
    /// order regardless of how the source file orders its bounds.
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        let mut north = f64::NEG_INFINITY;
        let mut south = f64::INFINITY;
        let mut west = f64::INFINITY;
        let mut east = f64::NEG_INFINITY;

        for cell in &self.cells {
            if let Some(rect) = cell.polygon.bounding_rect() {
                north = north.max(rect.max().y);
                south = south.min(rect.min().y);
                west = west.min(rect.min().x);
                east = east.max(rect.max().x);
            }
        }

        BoundingBox {
            north,
            west,
            south,
            east,
        }
    }
}

/// Reference frame declared by the grid file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFrame {
    Wgs84,
    WebMercator,
}

/// Reads the collection's legacy `crs` member. No member means WGS84, the
/// GeoJSON default.
fn source_frame(collection: &FeatureCollection) -> Result<SourceFrame, GridLoadError> {
    let Some(name) = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(Value::as_object)
        .and_then(|crs| crs.get("properties"))
        .and_then(Value::as_object)
        .and_then(|properties| properties.get("name"))
        .and_then(Value::as_str)
    else {
        return Ok(SourceFrame::Wgs84);
    };

    if name.contains("3857") {
        Ok(SourceFrame::WebMercator)
    } else if name.contains("4326") || name.contains("CRS84") {
        Ok(SourceFrame::Wgs84)
    } else {
        Err(GridLoadError::UnsupportedFrame {
            name: name.to_string(),
        })
    }
}

/// Reads an integer property, accepting JSON floats with no fractional part
/// (shapefile conversions often emit `7.0` for integer attributes).
#[allow(clippy::cast_possible_truncation)]
fn integer_property(properties: Option<&geojson::JsonObject>, key: &str) -> Option<i64> {
    let value = properties?.get(key)?;
    if let Some(id) = value.as_i64() {
        return Some(id);
    }
    let float = value.as_f64()?;
    if float.fract() == 0.0 && float.abs() < 9.007_199_254_740_992e15 {
        Some(float as i64)
    } else {
        None
    }
}

/// Converts a GeoJSON geometry into a [`MultiPolygon`], wrapping bare
/// polygons. Anything else is rejected.
fn multipolygon_from_geojson(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Projects the polygon to web mercator, centroids there, and reprojects
/// the centroid back to WGS84.
fn projected_centroid(polygon: &MultiPolygon<f64>) -> Option<Centroid> {
    let projected = polygon.map_coords(|coord| {
        let (x, y) = projection::to_web_mercator(coord.x, coord.y);
        Coord { x, y }
    });
    let point = projected.centroid()?;
    let (longitude, latitude) = projection::from_web_mercator(point.x(), point.y());
    Some(Centroid {
        latitude,
        longitude,
    })
}
