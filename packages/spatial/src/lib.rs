#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index over the grid backbone.
//!
//! Builds an R-tree over the grid cell polygons once per run and provides
//! fast point-in-cell lookups. Used by the climate and fire stages to
//! attribute point observations to grid cells, and by the raster stages to
//! sample bands at cell centroids.

use std::collections::BTreeMap;

use geo::{Intersects, MultiPolygon};
use rayon::prelude::*;
use rstar::{AABB, RTree, RTreeObject};

use firegrid_grid::GridIndex;
use firegrid_models::{Centroid, Observation};
use firegrid_raster::RasterGrid;

/// A grid cell polygon stored in the R-tree.
struct CellEntry {
    grid_id: i64,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for CellEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built R-tree over the grid cells.
///
/// Constructed once per run and shared across all stages that attribute
/// points to cells.
pub struct CellIndex {
    cells: RTree<CellEntry>,
}

impl CellIndex {
    /// Builds the R-tree from a loaded grid.
    #[must_use]
    pub fn new(grid: &GridIndex) -> Self {
        let entries = grid
            .cells()
            .iter()
            .map(|cell| CellEntry {
                grid_id: cell.grid_id(),
                envelope: compute_envelope(cell.polygon()),
                polygon: cell.polygon().clone(),
            })
            .collect();

        let cells = RTree::bulk_load(entries);
        log::info!("Built spatial index over {} grid cells", cells.size());
        Self { cells }
    }

    /// Look up the grid cell containing a point, cell edges included.
    ///
    /// Cell interiors tile the grid without overlap. A point exactly on a
    /// shared edge matches more than one cell; the first candidate in R-tree
    /// order wins, which is stable for a fixed grid and point.
    #[must_use]
    pub fn locate(&self, longitude: f64, latitude: f64) -> Option<i64> {
        let point = geo::Point::new(longitude, latitude);
        let query_env = AABB::from_point([longitude, latitude]);

        for entry in self.cells.locate_in_envelope_intersecting(&query_env) {
            if entry.polygon.intersects(&point) {
                return Some(entry.grid_id);
            }
        }
        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.size() == 0
    }
}

/// Result of attributing a batch of observations to grid cells.
pub struct JoinOutcome {
    /// Observations that landed in a cell, input order preserved, with
    /// `grid_id` filled in.
    pub observations: Vec<Observation>,
    /// How many observations fell outside every cell.
    pub dropped: usize,
}

/// Attribute each observation to the grid cell containing its coordinate.
///
/// Observations outside every cell are dropped and counted. Lookups run in
/// parallel; the surviving observations keep their input order.
#[must_use]
pub fn join_points(observations: Vec<Observation>, index: &CellIndex) -> JoinOutcome {
    let total = observations.len();
    let observations: Vec<Observation> = observations
        .into_par_iter()
        .filter_map(|mut observation| {
            index
                .locate(observation.longitude, observation.latitude)
                .map(|grid_id| {
                    observation.grid_id = Some(grid_id);
                    observation
                })
        })
        .collect();

    let dropped = total - observations.len();
    if dropped > 0 {
        log::warn!("Dropped {dropped} of {total} observations outside the grid");
    }

    JoinOutcome {
        observations,
        dropped,
    }
}

/// Sample a raster band at every cell centroid.
///
/// Every centroid gets an entry; centroids off the raster extent, or over
/// masked pixels, sample as `NaN`.
#[must_use]
pub fn sample_at_centroids(
    raster: &RasterGrid,
    centroids: &BTreeMap<i64, Centroid>,
) -> BTreeMap<i64, f64> {
    centroids
        .iter()
        .map(|(&grid_id, centroid)| {
            let value = raster.value_at_geo(centroid.longitude, centroid.latitude);
            (grid_id, value)
        })
        .collect()
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    use geo::BoundingRect;

    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
