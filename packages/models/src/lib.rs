#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shared data model for the firegrid fusion pipeline.
//!
//! This crate defines the canonical vocabulary used across the entire
//! system: the source taxonomy, the observation/record types that flow
//! between stages, and the fixed column names of the fused output schema.
//! Every stage normalizes its source-specific columns into these names at
//! its boundary, so downstream code never sees vendor spellings.
//!
//! Missing numeric values are represented as `f64::NAN` everywhere; absence
//! of a key means the variable was never observed for that record.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub mod columns;

/// The four data sources fused by the pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Source {
    /// Gridded weather reanalysis points (the temporal backbone).
    Climate,
    /// Point fire-incident records.
    Fire,
    /// Satellite vegetation-index rasters, sampled every few days.
    Ndvi,
    /// Elevation rasters and derived terrain features (no date dimension).
    Topo,
}

impl Source {
    /// All sources in fusion order (backbone first).
    pub const ALL: &[Self] = &[Self::Climate, Self::Fire, Self::Ndvi, Self::Topo];

    /// Human-readable name for log output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Climate => "climate reanalysis",
            Self::Fire => "fire history",
            Self::Ndvi => "vegetation index",
            Self::Topo => "topography",
        }
    }

    /// Whether records from this source carry a date.
    ///
    /// Topography is static per cell; everything else is keyed by
    /// (`grid_id`, `date`).
    #[must_use]
    pub const fn is_temporal(self) -> bool {
        !matches!(self, Self::Topo)
    }
}

/// Sentinel fire-cause value for backbone rows with no matching fire record.
///
/// A fire-absence row is a valid, fully populated record, not a gap, so the
/// cause column gets this literal string rather than an empty field.
pub const FIRE_CAUSE_NONE: &str = "None";

/// One raw observation after source normalization, before (or after) the
/// spatial join.
///
/// `grid_id` is `None` until the spatial join assigns the containing cell;
/// observations that land outside every cell are dropped by the join, so
/// aggregation only ever sees `Some` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Which source produced this observation.
    pub source: Source,
    /// Containing grid cell, assigned by the spatial join.
    pub grid_id: Option<i64>,
    /// Geographic position of the raw row (WGS84).
    pub latitude: f64,
    /// Geographic position of the raw row (WGS84).
    pub longitude: f64,
    /// Observation date; `None` for static sources.
    pub date: Option<NaiveDate>,
    /// Canonical variable name to numeric value. NaN means missing.
    pub values: BTreeMap<String, f64>,
}

impl Observation {
    /// Creates an unjoined observation at a geographic position.
    #[must_use]
    pub const fn new(
        source: Source,
        latitude: f64,
        longitude: f64,
        date: Option<NaiveDate>,
        values: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            source,
            grid_id: None,
            latitude,
            longitude,
            date,
            values,
        }
    }
}

/// One aggregated record per (`grid_id`, `date`) key (or per `grid_id` for
/// static sources), produced by the aggregation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    /// Grid cell this record belongs to.
    pub grid_id: i64,
    /// Record date; `None` for static sources.
    pub date: Option<NaiveDate>,
    /// Canonical variable name to reduced value. NaN means every input for
    /// the key was missing.
    pub values: BTreeMap<String, f64>,
}

/// One fire-history record per (`grid_id`, `date`), aggregated from the
/// individual incidents that burned in that cell on that day.
#[derive(Debug, Clone, PartialEq)]
pub struct FireRecord {
    /// Grid cell the incidents were joined to.
    pub grid_id: i64,
    /// Report date shared by the grouped incidents.
    pub date: NaiveDate,
    /// Total burned size across the group (source units, typically ha).
    pub size: f64,
    /// Cause of the largest incident in the group.
    pub cause: String,
}

/// Static terrain features for one grid cell. NaN fields mean the cell's
/// centroid fell outside every fetched elevation tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TopoRecord {
    /// Grid cell the features were sampled for.
    pub grid_id: i64,
    /// Elevation sampled at the cell centroid (source units).
    pub elevation: f64,
    /// Terrain slope in degrees, clamped to [0, 35].
    pub slope: f64,
    /// Terrain aspect in degrees, [0, 360), 0 = north, clockwise.
    pub aspect: f64,
}

/// Cell centroid in the geographic frame (WGS84).
///
/// Always computed in a projected frame and reprojected back; see the grid
/// crate for the construction invariant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// One row of the terminal fused dataset, keyed by (`grid_id`, `date`).
#[derive(Debug, Clone, PartialEq)]
pub struct FusedRecord {
    /// Grid cell identity.
    pub grid_id: i64,
    /// Cell centroid latitude.
    pub latitude: f64,
    /// Cell centroid longitude.
    pub longitude: f64,
    /// Backbone date.
    pub date: NaiveDate,
    /// Climate variables carried over from the backbone record.
    pub climate: BTreeMap<String, f64>,
    /// Total fire size for the key, 0 when no fire matched.
    pub fire_size: f64,
    /// 1 when a fire record matched the key, else 0.
    pub fire_occurred: u8,
    /// Fire cause, [`FIRE_CAUSE_NONE`] when no fire matched.
    pub fire_cause: String,
    /// Interpolated vegetation index, NaN when missing.
    pub ndvi: f64,
    /// Centroid elevation, NaN when missing.
    pub elevation: f64,
    /// Terrain slope in degrees, NaN when missing.
    pub slope: f64,
    /// Terrain aspect in degrees, NaN when missing.
    pub aspect: f64,
}

/// Geographic bounding box in (north, west, south, east) order.
///
/// The ordering matches the request convention of the external fetch
/// collaborators, regardless of how the source data orders its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Maximum latitude.
    pub north: f64,
    /// Minimum longitude.
    pub west: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum longitude.
    pub east: f64,
}

impl BoundingBox {
    /// Whether the box contains the coordinate, bounds inclusive.
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.south
            && latitude <= self.north
            && longitude >= self.west
            && longitude <= self.east
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "N {:.6} W {:.6} S {:.6} E {:.6}",
            self.north, self.west, self.south, self.east
        )
    }
}

/// Inclusive calendar date range for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First date in range.
    pub start: NaiveDate,
    /// Last date in range.
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting a start after the end.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDateRangeError`] if `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidDateRangeError> {
        if start > end {
            return Err(InvalidDateRangeError { start, end });
        }
        Ok(Self { start, end })
    }

    /// Whether the date falls inside the range, both ends inclusive.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Error returned when constructing a [`DateRange`] whose start is after its
/// end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidDateRangeError {
    /// The offending start date.
    pub start: NaiveDate,
    /// The offending end date.
    pub end: NaiveDate,
}

impl std::fmt::Display for InvalidDateRangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid date range: start {} is after end {}",
            self.start, self.end
        )
    }
}

impl std::error::Error for InvalidDateRangeError {}
