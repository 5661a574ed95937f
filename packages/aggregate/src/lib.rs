#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Keyed reduction of joined observations into one record per group.
//!
//! Groups observations by grid cell (and date, for temporal sources) and
//! collapses each variable with a per-variable reducer. Reducers skip NaN
//! inputs; a variable whose every input is NaN reduces to NaN, never zero.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use firegrid_models::{AggregatedRecord, Observation, columns};

/// Per-variable reduction function.
///
/// A variable must use the same reducer for the whole run: means for
/// intensive quantities (temperature, pressure, wind), sums for extensive
/// ones (precipitation).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Reducer {
    /// Arithmetic mean of the non-NaN inputs.
    Mean,
    /// Sum of the non-NaN inputs.
    Sum,
}

impl Reducer {
    /// Reduce a sample set, skipping NaN inputs.
    ///
    /// Returns NaN when no non-NaN input exists, so an all-missing group
    /// stays missing instead of collapsing to zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn apply(self, values: &[f64]) -> f64 {
        let (sum, count) = values
            .iter()
            .filter(|value| !value.is_nan())
            .fold((0.0, 0_usize), |(sum, count), value| {
                (sum + value, count + 1)
            });

        if count == 0 {
            return f64::NAN;
        }
        match self {
            Self::Mean => sum / count as f64,
            Self::Sum => sum,
        }
    }
}

/// Which fields form the grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFields {
    /// Group by (`grid_id`, `date`); temporal sources.
    CellAndDate,
    /// Group by `grid_id` alone; static sources and whole-run rollups.
    Cell,
}

/// The standard reducer assignment for the climate variables.
///
/// Precipitation is a flux and sums across the observations of a day;
/// everything else is intensive and averages.
#[must_use]
pub fn climate_reducers() -> BTreeMap<String, Reducer> {
    columns::CLIMATE_VARIABLES
        .iter()
        .map(|&name| {
            let reducer = if name == columns::TOTAL_PRECIPITATION {
                Reducer::Sum
            } else {
                Reducer::Mean
            };
            (name.to_string(), reducer)
        })
        .collect()
}

/// Collapse observations into one [`AggregatedRecord`] per key.
///
/// Observations still missing a `grid_id` are skipped; the spatial join
/// drops those before aggregation in the normal flow. A key that never saw
/// a given variable has no entry for it in the output record at all, which
/// is distinct from an all-NaN entry. Variables without a reducer
/// assignment fall back to [`Reducer::Mean`].
#[must_use]
pub fn aggregate(
    observations: &[Observation],
    key_fields: KeyFields,
    reducers: &BTreeMap<String, Reducer>,
) -> Vec<AggregatedRecord> {
    let mut groups: BTreeMap<(i64, Option<NaiveDate>), BTreeMap<String, Vec<f64>>> =
        BTreeMap::new();
    let mut unjoined = 0_usize;

    for observation in observations {
        let Some(grid_id) = observation.grid_id else {
            unjoined += 1;
            continue;
        };
        let date = match key_fields {
            KeyFields::CellAndDate => observation.date,
            KeyFields::Cell => None,
        };

        let group = groups.entry((grid_id, date)).or_default();
        for (name, &value) in &observation.values {
            group.entry(name.clone()).or_default().push(value);
        }
    }

    if unjoined > 0 {
        log::debug!("Skipped {unjoined} observations with no grid cell");
    }

    groups
        .into_iter()
        .map(|((grid_id, date), variables)| {
            let values = variables
                .into_iter()
                .map(|(name, samples)| {
                    let reducer = reducers.get(&name).copied().unwrap_or(Reducer::Mean);
                    let reduced = reducer.apply(&samples);
                    (name, reduced)
                })
                .collect();
            AggregatedRecord {
                grid_id,
                date,
                values,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use firegrid_models::Source;

    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 6, day).unwrap()
    }

    fn observation(grid_id: i64, day: u32, values: &[(&str, f64)]) -> Observation {
        Observation {
            source: Source::Climate,
            grid_id: Some(grid_id),
            latitude: 0.0,
            longitude: 0.0,
            date: Some(date(day)),
            values: values
                .iter()
                .map(|&(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    #[test]
    fn mean_skips_missing_values() {
        assert_relative_eq!(Reducer::Mean.apply(&[1.0, f64::NAN, 3.0]), 2.0);
    }

    #[test]
    fn all_missing_reduces_to_missing() {
        assert!(Reducer::Sum.apply(&[f64::NAN, f64::NAN]).is_nan());
        assert!(Reducer::Mean.apply(&[]).is_nan());
    }

    #[test]
    fn reducer_ids_round_trip_through_strum() {
        for reducer in [Reducer::Mean, Reducer::Sum] {
            let parsed: Reducer = reducer.to_string().parse().unwrap();
            assert_eq!(parsed, reducer);
        }
    }

    #[test]
    fn groups_by_cell_and_date() {
        let observations = vec![
            observation(1, 1, &[("temperature_2m", 280.0)]),
            observation(1, 1, &[("temperature_2m", 284.0)]),
            observation(1, 2, &[("temperature_2m", 290.0)]),
            observation(2, 1, &[("temperature_2m", 275.0)]),
        ];

        let records = aggregate(&observations, KeyFields::CellAndDate, &climate_reducers());

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].grid_id, 1);
        assert_eq!(records[0].date, Some(date(1)));
        assert_relative_eq!(records[0].values["temperature_2m"], 282.0);
        assert_relative_eq!(records[1].values["temperature_2m"], 290.0);
        assert_relative_eq!(records[2].values["temperature_2m"], 275.0);
    }

    #[test]
    fn single_observation_groups_reduce_to_the_observation() {
        let observations = vec![observation(
            3,
            5,
            &[("temperature_2m", 281.5), ("total_precipitation", 0.004)],
        )];

        let records = aggregate(&observations, KeyFields::CellAndDate, &climate_reducers());

        assert_eq!(records.len(), 1);
        assert_relative_eq!(records[0].values["temperature_2m"], 281.5);
        assert_relative_eq!(records[0].values["total_precipitation"], 0.004);
    }

    #[test]
    fn precipitation_sums_while_temperature_averages() {
        let observations = vec![
            observation(
                1,
                1,
                &[("temperature_2m", 280.0), ("total_precipitation", 0.001)],
            ),
            observation(
                1,
                1,
                &[("temperature_2m", 290.0), ("total_precipitation", 0.003)],
            ),
        ];

        let records = aggregate(&observations, KeyFields::CellAndDate, &climate_reducers());

        assert_relative_eq!(records[0].values["temperature_2m"], 285.0);
        assert_relative_eq!(records[0].values["total_precipitation"], 0.004);
    }

    #[test]
    fn cell_key_collapses_dates() {
        let observations = vec![
            observation(1, 1, &[("ndvi", 0.2)]),
            observation(1, 9, &[("ndvi", 0.6)]),
        ];

        let records = aggregate(&observations, KeyFields::Cell, &BTreeMap::new());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, None);
        assert_relative_eq!(records[0].values["ndvi"], 0.4);
    }

    #[test]
    fn unjoined_observations_are_skipped() {
        let mut stray = observation(1, 1, &[("temperature_2m", 280.0)]);
        stray.grid_id = None;

        let records = aggregate(&[stray], KeyFields::CellAndDate, &climate_reducers());

        assert!(records.is_empty());
    }

    #[test]
    fn unseen_variables_have_no_entry() {
        let observations = vec![observation(1, 1, &[("temperature_2m", 280.0)])];

        let records = aggregate(&observations, KeyFields::CellAndDate, &climate_reducers());

        assert!(!records[0].values.contains_key("total_precipitation"));
    }

    #[test]
    fn all_missing_variables_stay_present_but_missing() {
        let observations = vec![
            observation(1, 1, &[("surface_pressure", f64::NAN)]),
            observation(1, 1, &[("surface_pressure", f64::NAN)]),
        ];

        let records = aggregate(&observations, KeyFields::CellAndDate, &climate_reducers());

        assert!(records[0].values["surface_pressure"].is_nan());
    }
}
