//! Adapter for gridded reanalysis extracts.
//!
//! The climate collaborator writes one CSV row per reanalysis grid point
//! per timestep, with ERA5 short variable names. This adapter renames them
//! to the canonical schema and keeps the values untouched; unit handling is
//! the consumer's business, not the pipeline's.

use std::collections::BTreeMap;
use std::io::Read;

use firegrid_models::{Observation, Source, columns};

use crate::SchemaError;
use crate::parsing::parse_table_date;

/// ERA5 short name to canonical column.
const VARIABLE_RENAMES: &[(&str, &str)] = &[
    ("u10", columns::WIND_U_10M),
    ("v10", columns::WIND_V_10M),
    ("d2m", columns::DEWPOINT_2M),
    ("t2m", columns::TEMPERATURE_2M),
    ("sp", columns::SURFACE_PRESSURE),
    ("tp", columns::TOTAL_PRECIPITATION),
];

const LATITUDE: &str = "latitude";
const LONGITUDE: &str = "longitude";
const VALID_TIME: &str = "valid_time";

/// Read a climate table into unjoined observations.
///
/// Requires the `latitude`, `longitude` and `valid_time` columns plus at
/// least one recognized ERA5 variable column. Unrecognized columns are
/// ignored. An empty variable field is a missing value (NaN); empty or
/// malformed coordinates and timestamps are errors, because the climate
/// table is the backbone and a silently dropped backbone row would shrink
/// the output keyset.
///
/// # Errors
///
/// * If a required column is missing or no variable column is present.
/// * If a coordinate, timestamp, or non-empty variable field fails to
///   parse.
/// * If the CSV itself is malformed.
pub fn read_climate_table<R: Read>(reader: R) -> Result<Vec<Observation>, SchemaError> {
    let mut reader = csv::ReaderBuilder::new().from_reader(reader);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let position = |column: &str| -> Result<usize, SchemaError> {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| SchemaError::MissingColumn {
                source: Source::Climate,
                column: column.to_owned(),
            })
    };
    let latitude_index = position(LATITUDE)?;
    let longitude_index = position(LONGITUDE)?;
    let valid_time_index = position(VALID_TIME)?;

    let variables: Vec<(usize, &str)> = VARIABLE_RENAMES
        .iter()
        .filter_map(|&(vendor, canonical)| {
            headers
                .iter()
                .position(|h| h == vendor)
                .map(|index| (index, canonical))
        })
        .collect();
    if variables.is_empty() {
        return Err(SchemaError::NoVariables {
            source: Source::Climate,
        });
    }

    let mut observations = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);
        let field = |index: usize| record.get(index).unwrap_or("").trim();

        let latitude: f64 = field(latitude_index)
            .parse()
            .map_err(|_| bad_field(LATITUDE, line, field(latitude_index)))?;
        let longitude: f64 = field(longitude_index)
            .parse()
            .map_err(|_| bad_field(LONGITUDE, line, field(longitude_index)))?;
        let date = parse_table_date(field(valid_time_index))
            .ok_or_else(|| bad_field(VALID_TIME, line, field(valid_time_index)))?;

        let mut values = BTreeMap::new();
        for &(index, canonical) in &variables {
            let raw = field(index);
            let value = if raw.is_empty() {
                f64::NAN
            } else {
                raw.parse::<f64>()
                    .map_err(|_| bad_field(canonical, line, raw))?
            };
            values.insert(canonical.to_owned(), value);
        }

        observations.push(Observation::new(
            Source::Climate,
            latitude,
            longitude,
            Some(date),
            values,
        ));
    }

    log::info!("Read {} climate observations", observations.len());
    Ok(observations)
}

fn bad_field(column: &str, line: u64, value: &str) -> SchemaError {
    SchemaError::BadField {
        source: Source::Climate,
        line,
        column: column.to_owned(),
        value: value.to_owned(),
    }
}
