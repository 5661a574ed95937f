use std::collections::BTreeMap;

use firegrid_models::BoundingBox;

/// Split a bounding box into four equal quadrants.
///
/// Quadrants are returned north-west, north-east, south-west, south-east.
/// Neighboring quadrants share their midpoint edges, so a point on an
/// interior edge belongs to more than one quadrant.
#[must_use]
pub fn divide_bounding_box(area: &BoundingBox) -> [BoundingBox; 4] {
    let mid_latitude = f64::midpoint(area.north, area.south);
    let mid_longitude = f64::midpoint(area.west, area.east);

    [
        BoundingBox {
            north: area.north,
            west: area.west,
            south: mid_latitude,
            east: mid_longitude,
        },
        BoundingBox {
            north: area.north,
            west: mid_longitude,
            south: mid_latitude,
            east: area.east,
        },
        BoundingBox {
            north: mid_latitude,
            west: area.west,
            south: area.south,
            east: mid_longitude,
        },
        BoundingBox {
            north: mid_latitude,
            west: mid_longitude,
            south: area.south,
            east: area.east,
        },
    ]
}

/// Merge per-tile centroid samples into one map.
///
/// Cells sampled by several overlapping tiles take the mean of their finite
/// samples. A cell that only ever sampled as missing stays present with a
/// `NaN` value, so downstream code can tell "off every tile" from "on a tile
/// but masked out".
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn merge_tile_samples(tiles: &[BTreeMap<i64, f64>]) -> BTreeMap<i64, f64> {
    let mut sums: BTreeMap<i64, (f64, usize)> = BTreeMap::new();

    for tile in tiles {
        for (&grid_id, &value) in tile {
            let entry = sums.entry(grid_id).or_insert((0.0, 0));
            if value.is_finite() {
                entry.0 += value;
                entry.1 += 1;
            }
        }
    }

    sums.into_iter()
        .map(|(grid_id, (sum, count))| {
            let merged = if count == 0 { f64::NAN } else { sum / count as f64 };
            (grid_id, merged)
        })
        .collect()
}
