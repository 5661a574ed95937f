#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Fusion engine: builds the terminal dataset from the per-source records.
//!
//! The climate records define the (`grid_id`, `date`) backbone; every other
//! source left-joins onto it. Fire absence is a fully populated row (size
//! zero, flag zero, cause sentinel), while missing NDVI and topography stay
//! missing, because neither has a defensible zero-fill. Climate is the one
//! hard requirement; any other absent source degrades the output instead of
//! failing the run.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

use firegrid_models::{
    AggregatedRecord, Centroid, DateRange, FIRE_CAUSE_NONE, FireRecord, FusedRecord, TopoRecord,
};

pub mod writer;

pub use writer::write_fused_csv;

/// Errors that abort fusion.
#[derive(Debug, Error)]
pub enum FusionError {
    /// The climate backbone was empty or never produced.
    #[error("climate backbone is absent; nothing to fuse")]
    MissingBackbone,

    /// A backbone record references a cell the grid does not contain.
    #[error("backbone references grid cell {grid_id} not present in the grid")]
    UnknownCell {
        /// The unknown cell.
        grid_id: i64,
    },

    /// A backbone record carries no date.
    #[error("backbone record for grid cell {grid_id} has no date")]
    UndatedBackbone {
        /// The cell whose record was undated.
        grid_id: i64,
    },

    /// Writing the fused table failed.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Flushing the fused table failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Fuse the per-source records into the terminal table.
///
/// Rows come back sorted by (`grid_id`, `date`) and filtered to the
/// inclusive date range. Every backbone key inside the range yields exactly
/// one row; sources other than climate can only decorate rows, never add
/// or remove them.
///
/// # Errors
///
/// * If `climate` is empty.
/// * If a backbone record is undated or references an unknown cell.
pub fn fuse(
    climate: &[AggregatedRecord],
    fire: &[FireRecord],
    ndvi: &BTreeMap<(i64, NaiveDate), f64>,
    topo: &BTreeMap<i64, TopoRecord>,
    centroids: &BTreeMap<i64, Centroid>,
    range: DateRange,
) -> Result<Vec<FusedRecord>, FusionError> {
    if climate.is_empty() {
        return Err(FusionError::MissingBackbone);
    }

    let mut backbone: BTreeMap<(i64, NaiveDate), &AggregatedRecord> = BTreeMap::new();
    for record in climate {
        let Some(date) = record.date else {
            return Err(FusionError::UndatedBackbone {
                grid_id: record.grid_id,
            });
        };
        if !centroids.contains_key(&record.grid_id) {
            return Err(FusionError::UnknownCell {
                grid_id: record.grid_id,
            });
        }
        if !range.contains(date) {
            continue;
        }
        if backbone.insert((record.grid_id, date), record).is_some() {
            log::debug!(
                "Duplicate backbone key ({}, {date}); keeping the last record",
                record.grid_id
            );
        }
    }

    let fire_by_key: BTreeMap<(i64, NaiveDate), &FireRecord> = fire
        .iter()
        .map(|record| ((record.grid_id, record.date), record))
        .collect();

    let mut fused = Vec::with_capacity(backbone.len());
    for ((grid_id, date), record) in backbone {
        // Checked above; every backbone cell has a centroid.
        let Some(centroid) = centroids.get(&grid_id) else {
            return Err(FusionError::UnknownCell { grid_id });
        };

        let (fire_size, fire_occurred, fire_cause) = fire_by_key.get(&(grid_id, date)).map_or_else(
            || (0.0, 0, FIRE_CAUSE_NONE.to_owned()),
            |fire| (fire.size, 1, fire.cause.clone()),
        );

        let (elevation, slope, aspect) = topo.get(&grid_id).map_or(
            (f64::NAN, f64::NAN, f64::NAN),
            |topo| (topo.elevation, topo.slope, topo.aspect),
        );

        fused.push(FusedRecord {
            grid_id,
            latitude: centroid.latitude,
            longitude: centroid.longitude,
            date,
            climate: record.values.clone(),
            fire_size,
            fire_occurred,
            fire_cause,
            ndvi: ndvi.get(&(grid_id, date)).copied().unwrap_or(f64::NAN),
            elevation,
            slope,
            aspect,
        });
    }

    log::info!(
        "Fused {} rows over {} to {}",
        fused.len(),
        range.start,
        range.end
    );
    Ok(fused)
}

#[cfg(test)]
mod tests {
    use firegrid_models::columns;

    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 8, day).unwrap()
    }

    fn range(start: u32, end: u32) -> DateRange {
        DateRange::new(date(start), date(end)).unwrap()
    }

    fn climate_record(grid_id: i64, day: u32, temperature: f64) -> AggregatedRecord {
        AggregatedRecord {
            grid_id,
            date: Some(date(day)),
            values: BTreeMap::from([(columns::TEMPERATURE_2M.to_string(), temperature)]),
        }
    }

    fn centroids() -> BTreeMap<i64, Centroid> {
        BTreeMap::from([
            (
                7,
                Centroid {
                    latitude: 51.5,
                    longitude: -116.5,
                },
            ),
            (
                8,
                Centroid {
                    latitude: 51.5,
                    longitude: -115.5,
                },
            ),
        ])
    }

    #[test]
    fn fire_presence_and_absence_rows_are_both_fully_populated() {
        let climate = vec![climate_record(7, 1, 290.0), climate_record(7, 2, 291.0)];
        let fire = vec![FireRecord {
            grid_id: 7,
            date: date(2),
            size: 42.0,
            cause: "L".to_string(),
        }];

        let fused = fuse(
            &climate,
            &fire,
            &BTreeMap::new(),
            &BTreeMap::new(),
            &centroids(),
            range(1, 31),
        )
        .unwrap();

        assert_eq!(fused.len(), 2);
        let absence = &fused[0];
        assert!((absence.fire_size - 0.0).abs() < f64::EPSILON);
        assert_eq!(absence.fire_occurred, 0);
        assert_eq!(absence.fire_cause, FIRE_CAUSE_NONE);

        let presence = &fused[1];
        assert!((presence.fire_size - 42.0).abs() < f64::EPSILON);
        assert_eq!(presence.fire_occurred, 1);
        assert_eq!(presence.fire_cause, "L");
    }

    #[test]
    fn empty_backbone_is_a_hard_stop() {
        let err = fuse(
            &[],
            &[],
            &BTreeMap::new(),
            &BTreeMap::new(),
            &centroids(),
            range(1, 31),
        )
        .unwrap_err();

        assert!(matches!(err, FusionError::MissingBackbone));
    }

    #[test]
    fn missing_ndvi_and_topography_stay_missing() {
        let climate = vec![climate_record(7, 1, 290.0)];

        let fused = fuse(
            &climate,
            &[],
            &BTreeMap::new(),
            &BTreeMap::new(),
            &centroids(),
            range(1, 31),
        )
        .unwrap();

        assert!(fused[0].ndvi.is_nan());
        assert!(fused[0].elevation.is_nan());
        assert!(fused[0].slope.is_nan());
        assert!(fused[0].aspect.is_nan());
    }

    #[test]
    fn topography_broadcasts_across_every_date_of_the_cell() {
        let climate = vec![climate_record(7, 1, 290.0), climate_record(7, 2, 291.0)];
        let topo = BTreeMap::from([(
            7,
            TopoRecord {
                grid_id: 7,
                elevation: 1400.0,
                slope: 12.0,
                aspect: 270.0,
            },
        )]);

        let fused = fuse(
            &climate,
            &[],
            &BTreeMap::new(),
            &topo,
            &centroids(),
            range(1, 31),
        )
        .unwrap();

        for row in &fused {
            assert!((row.elevation - 1400.0).abs() < f64::EPSILON);
            assert!((row.slope - 12.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ndvi_joins_by_cell_and_date() {
        let climate = vec![climate_record(7, 1, 290.0), climate_record(8, 1, 292.0)];
        let ndvi = BTreeMap::from([((7, date(1)), 0.61)]);

        let fused = fuse(
            &climate,
            &[],
            &ndvi,
            &BTreeMap::new(),
            &centroids(),
            range(1, 31),
        )
        .unwrap();

        assert!((fused[0].ndvi - 0.61).abs() < f64::EPSILON);
        assert!(fused[1].ndvi.is_nan());
    }

    #[test]
    fn partial_overlays_decorate_the_backbone_without_resizing_it() {
        // Two backbone days for one cell; no fire at all, NDVI on the first
        // day only, one static topo row. The overlays decorate the two rows
        // and nothing else changes.
        let climate = vec![climate_record(7, 1, 290.0), climate_record(7, 2, 291.0)];
        let ndvi = BTreeMap::from([((7, date(1)), 0.44)]);
        let topo = BTreeMap::from([(
            7,
            TopoRecord {
                grid_id: 7,
                elevation: 1180.0,
                slope: 7.5,
                aspect: 135.0,
            },
        )]);

        let fused = fuse(&climate, &[], &ndvi, &topo, &centroids(), range(1, 31)).unwrap();

        assert_eq!(fused.len(), 2);
        for row in &fused {
            assert!((row.fire_size - 0.0).abs() < f64::EPSILON);
            assert_eq!(row.fire_occurred, 0);
            assert_eq!(row.fire_cause, FIRE_CAUSE_NONE);
            assert!((row.elevation - 1180.0).abs() < f64::EPSILON);
            assert!((row.aspect - 135.0).abs() < f64::EPSILON);
        }
        assert!((fused[0].ndvi - 0.44).abs() < f64::EPSILON);
        assert!(fused[1].ndvi.is_nan());
    }

    #[test]
    fn date_range_filter_is_inclusive() {
        let climate = vec![
            climate_record(7, 1, 290.0),
            climate_record(7, 2, 291.0),
            climate_record(7, 3, 292.0),
            climate_record(7, 4, 293.0),
        ];

        let fused = fuse(
            &climate,
            &[],
            &BTreeMap::new(),
            &BTreeMap::new(),
            &centroids(),
            range(2, 3),
        )
        .unwrap();

        let dates: Vec<NaiveDate> = fused.iter().map(|row| row.date).collect();
        assert_eq!(dates, vec![date(2), date(3)]);
    }

    #[test]
    fn rows_sort_by_cell_then_date() {
        let climate = vec![
            climate_record(8, 1, 292.0),
            climate_record(7, 2, 291.0),
            climate_record(7, 1, 290.0),
        ];

        let fused = fuse(
            &climate,
            &[],
            &BTreeMap::new(),
            &BTreeMap::new(),
            &centroids(),
            range(1, 31),
        )
        .unwrap();

        let keys: Vec<(i64, NaiveDate)> = fused.iter().map(|row| (row.grid_id, row.date)).collect();
        assert_eq!(keys, vec![(7, date(1)), (7, date(2)), (8, date(1))]);
    }

    #[test]
    fn unknown_backbone_cell_is_rejected() {
        let climate = vec![climate_record(99, 1, 290.0)];

        let err = fuse(
            &climate,
            &[],
            &BTreeMap::new(),
            &BTreeMap::new(),
            &centroids(),
            range(1, 31),
        )
        .unwrap_err();

        assert!(matches!(err, FusionError::UnknownCell { grid_id: 99 }));
    }

    #[test]
    fn undated_backbone_record_is_rejected() {
        let climate = vec![AggregatedRecord {
            grid_id: 7,
            date: None,
            values: BTreeMap::new(),
        }];

        let err = fuse(
            &climate,
            &[],
            &BTreeMap::new(),
            &BTreeMap::new(),
            &centroids(),
            range(1, 31),
        )
        .unwrap_err();

        assert!(matches!(err, FusionError::UndatedBackbone { grid_id: 7 }));
    }

    #[test]
    fn centroid_coordinates_flow_into_the_rows() {
        let climate = vec![climate_record(8, 1, 292.0)];

        let fused = fuse(
            &climate,
            &[],
            &BTreeMap::new(),
            &BTreeMap::new(),
            &centroids(),
            range(1, 31),
        )
        .unwrap();

        assert!((fused[0].latitude - 51.5).abs() < f64::EPSILON);
        assert!((fused[0].longitude - -115.5).abs() < f64::EPSILON);
    }
}
