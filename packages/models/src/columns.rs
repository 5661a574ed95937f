//! Canonical column names for the fused output schema and the per-stage
//! checkpoint files.
//!
//! Source tables arrive with vendor spellings (ERA5 short names, CNFDB
//! uppercase headers); the source adapters rename them to these constants
//! exactly once, at the stage boundary. Everything downstream, including
//! the checkpoint readers and the fusion engine, matches on these names.

/// Grid cell identity column.
pub const GRID_ID: &str = "grid_id";
/// Cell centroid latitude column.
pub const LATITUDE: &str = "latitude";
/// Cell centroid longitude column.
pub const LONGITUDE: &str = "longitude";
/// Calendar date column (`YYYY-MM-DD`).
pub const DATE: &str = "date";

/// 10 m wind, U component.
pub const WIND_U_10M: &str = "wind_u_10m";
/// 10 m wind, V component.
pub const WIND_V_10M: &str = "wind_v_10m";
/// 2 m dewpoint temperature.
pub const DEWPOINT_2M: &str = "dewpoint_2m";
/// 2 m air temperature.
pub const TEMPERATURE_2M: &str = "temperature_2m";
/// Surface pressure.
pub const SURFACE_PRESSURE: &str = "surface_pressure";
/// Total precipitation (extensive; summed, never averaged).
pub const TOTAL_PRECIPITATION: &str = "total_precipitation";

/// Total fire size for the key.
pub const FIRE_SIZE: &str = "fire_size";
/// Fire occurrence flag, 0 or 1.
pub const FIRE_OCCURRED: &str = "fire_occurred";
/// Fire cause label.
pub const FIRE_CAUSE: &str = "fire_cause";

/// Interpolated vegetation index.
pub const NDVI: &str = "ndvi";
/// Centroid elevation.
pub const ELEVATION: &str = "elevation";
/// Terrain slope, degrees.
pub const SLOPE: &str = "slope";
/// Terrain aspect, degrees.
pub const ASPECT: &str = "aspect";

/// Climate variables in output order.
pub const CLIMATE_VARIABLES: &[&str] = &[
    WIND_U_10M,
    WIND_V_10M,
    DEWPOINT_2M,
    TEMPERATURE_2M,
    SURFACE_PRESSURE,
    TOTAL_PRECIPITATION,
];

/// Fixed column order of the fused output file.
///
/// Climate variables absent from every backbone record are omitted at write
/// time; the fill-policy columns (fire, NDVI, topography) are always
/// present.
pub const FUSED_ORDER: &[&str] = &[
    GRID_ID,
    LATITUDE,
    LONGITUDE,
    DATE,
    WIND_U_10M,
    WIND_V_10M,
    DEWPOINT_2M,
    TEMPERATURE_2M,
    SURFACE_PRESSURE,
    TOTAL_PRECIPITATION,
    FIRE_SIZE,
    FIRE_OCCURRED,
    FIRE_CAUSE,
    NDVI,
    ELEVATION,
    SLOPE,
    ASPECT,
];
