//! Adapter for the national fire-incident point database export.

use std::io::Read;

use chrono::NaiveDate;

use firegrid_models::Source;

use crate::SchemaError;
use crate::parsing::parse_table_date;

const LATITUDE: &str = "LATITUDE";
const LONGITUDE: &str = "LONGITUDE";
const REP_DATE: &str = "REP_DATE";
const CAUSE: &str = "CAUSE";
const SIZE_HA: &str = "SIZE_HA";

/// One fire incident, canonicalized but not yet attributed to a grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct FireIncident {
    /// Incident latitude (WGS84).
    pub latitude: f64,
    /// Incident longitude (WGS84).
    pub longitude: f64,
    /// Report date.
    pub date: NaiveDate,
    /// Cause label, passed through from the source.
    pub cause: String,
    /// Burned area in hectares. Zero when the source left it blank.
    pub size: f64,
}

/// Read a fire-history table into incidents.
///
/// Requires the uppercase `LATITUDE`, `LONGITUDE`, `REP_DATE`, `CAUSE` and
/// `SIZE_HA` columns. An empty burned-area field means zero hectares, per
/// the source's convention for unsized incidents. Rows without a report
/// date or coordinates are skipped: fire history is an optional overlay,
/// and an unplaceable incident cannot join the grid anyway. Non-empty
/// malformed fields are still errors.
///
/// # Errors
///
/// * If a required column is missing.
/// * If a non-empty coordinate, date, or size field fails to parse.
/// * If the CSV itself is malformed.
pub fn read_fire_table<R: Read>(reader: R) -> Result<Vec<FireIncident>, SchemaError> {
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
                source: Source::Fire,
                column: column.to_owned(),
            })
    };
    let latitude_index = position(LATITUDE)?;
    let longitude_index = position(LONGITUDE)?;
    let date_index = position(REP_DATE)?;
    let cause_index = position(CAUSE)?;
    let size_index = position(SIZE_HA)?;

    let mut incidents = Vec::new();
    let mut skipped = 0_usize;
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);
        let field = |index: usize| record.get(index).unwrap_or("").trim();

        let raw_latitude = field(latitude_index);
        let raw_longitude = field(longitude_index);
        let raw_date = field(date_index);
        if raw_latitude.is_empty() || raw_longitude.is_empty() || raw_date.is_empty() {
            skipped += 1;
            continue;
        }

        let latitude: f64 = raw_latitude
            .parse()
            .map_err(|_| bad_field(LATITUDE, line, raw_latitude))?;
        let longitude: f64 = raw_longitude
            .parse()
            .map_err(|_| bad_field(LONGITUDE, line, raw_longitude))?;
        let date =
            parse_table_date(raw_date).ok_or_else(|| bad_field(REP_DATE, line, raw_date))?;

        let raw_size = field(size_index);
        let size: f64 = if raw_size.is_empty() {
            0.0
        } else {
            raw_size
                .parse()
                .map_err(|_| bad_field(SIZE_HA, line, raw_size))?
        };

        incidents.push(FireIncident {
            latitude,
            longitude,
            date,
            cause: field(cause_index).to_owned(),
            size,
        });
    }

    if skipped > 0 {
        log::debug!("Skipped {skipped} fire rows without a date or coordinates");
    }
    log::info!("Read {} fire incidents", incidents.len());
    Ok(incidents)
}

fn bad_field(column: &str, line: u64, value: &str) -> SchemaError {
    SchemaError::BadField {
        source: Source::Fire,
        line,
        column: column.to_owned(),
        value: value.to_owned(),
    }
}
