#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Daily densification of sparse per-cell time series.
//!
//! Satellite vegetation indexes arrive every few days per cell. This crate
//! pivots those samples into one series per cell and fills the calendar
//! days in between by linear interpolation. It never extrapolates: days
//! before a cell's first sample or after its last stay absent, because an
//! invented leading or trailing value has no observational basis.

use std::collections::BTreeMap;

use chrono::NaiveDate;

/// One dated value of a per-cell series, both the input and output unit of
/// the interpolator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSample {
    /// Grid cell the sample belongs to.
    pub grid_id: i64,
    /// Sample date.
    pub date: NaiveDate,
    /// Sample value. NaN inputs are treated as not observed.
    pub value: f64,
}

/// Densify sparse samples into one value per cell per calendar day.
///
/// Output covers, for each cell, every day from its first to its last
/// non-NaN sample inclusive, sorted by cell then date. Observed days keep
/// their value exactly; the days between two observations are linear in
/// the day offset. Duplicate (cell, date) samples keep the last one seen.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn interpolate_daily(samples: &[SeriesSample]) -> Vec<SeriesSample> {
    let mut by_cell: BTreeMap<i64, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    let mut duplicates = 0_usize;

    for sample in samples {
        if sample.value.is_nan() {
            continue;
        }
        let series = by_cell.entry(sample.grid_id).or_default();
        if series.insert(sample.date, sample.value).is_some() {
            duplicates += 1;
        }
    }
    if duplicates > 0 {
        log::debug!("Kept the last of {duplicates} duplicated sample dates");
    }

    let mut output = Vec::new();
    for (grid_id, series) in by_cell {
        let mut previous: Option<(NaiveDate, f64)> = None;
        for (date, value) in series {
            if let Some((previous_date, previous_value)) = previous {
                let span = (date - previous_date).num_days();
                let gap_days = usize::try_from(span - 1).unwrap_or(0);
                for (step, day) in previous_date.iter_days().skip(1).take(gap_days).enumerate() {
                    let fraction = (step + 1) as f64 / span as f64;
                    output.push(SeriesSample {
                        grid_id,
                        date: day,
                        value: previous_value + (value - previous_value) * fraction,
                    });
                }
            }
            output.push(SeriesSample {
                grid_id,
                date,
                value,
            });
            previous = Some((date, value));
        }
    }

    output
}
