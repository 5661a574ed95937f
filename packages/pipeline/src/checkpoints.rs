//! Canonical per-stage checkpoint tables.
//!
//! Each stage persists its output as a small CSV in the run directory so a
//! later stage (or a rerun) can pick it up without recomputing. The files
//! use canonical column names only, NaN round-trips as an empty field, and
//! the readers validate the exact schema the writers produce: a checkpoint
//! with an unknown column was written by something else and is rejected
//! rather than guessed at.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use chrono::NaiveDate;

use firegrid_interpolate::SeriesSample;
use firegrid_models::{AggregatedRecord, FireRecord, Source, TopoRecord, columns};
use firegrid_source::SchemaError;
use firegrid_source::parsing::parse_table_date;

/// Write the climate backbone checkpoint.
///
/// Columns are `grid_id`, `date`, then every canonical climate variable
/// present in at least one record, in canonical order.
///
/// # Errors
///
/// * If writing or flushing the underlying stream fails.
pub fn write_climate<W: Write>(records: &[AggregatedRecord], writer: W) -> Result<(), csv::Error> {
    let variables: Vec<&str> = columns::CLIMATE_VARIABLES
        .iter()
        .copied()
        .filter(|name| {
            records
                .iter()
                .any(|record| record.values.contains_key(*name))
        })
        .collect();

    let mut writer = csv::Writer::from_writer(writer);
    let mut header = vec![columns::GRID_ID, columns::DATE];
    header.extend(&variables);
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.grid_id.to_string(),
            record
                .date
                .map_or_else(String::new, |date| date.format("%Y-%m-%d").to_string()),
        ];
        for name in &variables {
            let value = record.values.get(*name).copied().unwrap_or(f64::NAN);
            row.push(number_field(value));
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Read the climate backbone checkpoint.
///
/// Every row must carry a grid id and a date; the backbone is what gives
/// the fused table its keyset, so an undated backbone row is an error, not
/// a gap. Empty variable fields read back as NaN.
///
/// # Errors
///
/// * If a required column is missing or an unknown column is present.
/// * If a grid id, date, or non-empty variable field fails to parse.
/// * If the CSV itself is malformed.
pub fn read_climate<R: Read>(reader: R) -> Result<Vec<AggregatedRecord>, SchemaError> {
    let mut reader = csv::ReaderBuilder::new().from_reader(reader);
    let headers = trimmed_headers(&mut reader)?;

    let mut known: Vec<&str> = vec![columns::GRID_ID, columns::DATE];
    known.extend(columns::CLIMATE_VARIABLES);
    reject_unknown_columns(Source::Climate, &headers, &known)?;

    let position = required_position(Source::Climate, &headers);
    let grid_id_index = position(columns::GRID_ID)?;
    let date_index = position(columns::DATE)?;
    let variables: Vec<(usize, &str)> = columns::CLIMATE_VARIABLES
        .iter()
        .filter_map(|&name| {
            headers
                .iter()
                .position(|h| h == name)
                .map(|index| (index, name))
        })
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);
        let field = |index: usize| record.get(index).unwrap_or("").trim();

        let grid_id = parse_grid_id(Source::Climate, field(grid_id_index), line)?;
        let date = parse_date(Source::Climate, field(date_index), line)?;

        let mut values = BTreeMap::new();
        for &(index, name) in &variables {
            let value = parse_number(Source::Climate, name, field(index), line)?;
            values.insert(name.to_owned(), value);
        }

        records.push(AggregatedRecord {
            grid_id,
            date: Some(date),
            values,
        });
    }

    log::debug!("Read {} climate checkpoint records", records.len());
    Ok(records)
}

/// Write the fire history checkpoint.
///
/// # Errors
///
/// * If writing or flushing the underlying stream fails.
pub fn write_fire<W: Write>(records: &[FireRecord], writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record([
        columns::GRID_ID,
        columns::DATE,
        columns::FIRE_SIZE,
        columns::FIRE_CAUSE,
    ])?;
    for record in records {
        writer.write_record([
            record.grid_id.to_string(),
            record.date.format("%Y-%m-%d").to_string(),
            number_field(record.size),
            record.cause.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Read the fire history checkpoint.
///
/// # Errors
///
/// * If a required column is missing or an unknown column is present.
/// * If a grid id, date, or non-empty size field fails to parse.
/// * If the CSV itself is malformed.
pub fn read_fire<R: Read>(reader: R) -> Result<Vec<FireRecord>, SchemaError> {
    let mut reader = csv::ReaderBuilder::new().from_reader(reader);
    let headers = trimmed_headers(&mut reader)?;

    let known = [
        columns::GRID_ID,
        columns::DATE,
        columns::FIRE_SIZE,
        columns::FIRE_CAUSE,
    ];
    reject_unknown_columns(Source::Fire, &headers, &known)?;

    let position = required_position(Source::Fire, &headers);
    let grid_id_index = position(columns::GRID_ID)?;
    let date_index = position(columns::DATE)?;
    let size_index = position(columns::FIRE_SIZE)?;
    let cause_index = position(columns::FIRE_CAUSE)?;

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);
        let field = |index: usize| record.get(index).unwrap_or("").trim();

        records.push(FireRecord {
            grid_id: parse_grid_id(Source::Fire, field(grid_id_index), line)?,
            date: parse_date(Source::Fire, field(date_index), line)?,
            size: parse_number(Source::Fire, columns::FIRE_SIZE, field(size_index), line)?,
            cause: field(cause_index).to_owned(),
        });
    }

    log::debug!("Read {} fire checkpoint records", records.len());
    Ok(records)
}

/// Write the daily vegetation-index checkpoint.
///
/// # Errors
///
/// * If writing or flushing the underlying stream fails.
pub fn write_ndvi<W: Write>(samples: &[SeriesSample], writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record([columns::GRID_ID, columns::DATE, columns::NDVI])?;
    for sample in samples {
        writer.write_record([
            sample.grid_id.to_string(),
            sample.date.format("%Y-%m-%d").to_string(),
            number_field(sample.value),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Read the vegetation-index checkpoint into the fusion lookup map.
///
/// # Errors
///
/// * If a required column is missing or an unknown column is present.
/// * If a grid id, date, or non-empty value field fails to parse.
/// * If the CSV itself is malformed.
pub fn read_ndvi<R: Read>(reader: R) -> Result<BTreeMap<(i64, NaiveDate), f64>, SchemaError> {
    let mut reader = csv::ReaderBuilder::new().from_reader(reader);
    let headers = trimmed_headers(&mut reader)?;

    let known = [columns::GRID_ID, columns::DATE, columns::NDVI];
    reject_unknown_columns(Source::Ndvi, &headers, &known)?;

    let position = required_position(Source::Ndvi, &headers);
    let grid_id_index = position(columns::GRID_ID)?;
    let date_index = position(columns::DATE)?;
    let value_index = position(columns::NDVI)?;

    let mut values = BTreeMap::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);
        let field = |index: usize| record.get(index).unwrap_or("").trim();

        let grid_id = parse_grid_id(Source::Ndvi, field(grid_id_index), line)?;
        let date = parse_date(Source::Ndvi, field(date_index), line)?;
        let value = parse_number(Source::Ndvi, columns::NDVI, field(value_index), line)?;
        values.insert((grid_id, date), value);
    }

    log::debug!("Read {} vegetation-index checkpoint values", values.len());
    Ok(values)
}

/// Write the static topography checkpoint.
///
/// # Errors
///
/// * If writing or flushing the underlying stream fails.
pub fn write_topo<W: Write>(records: &[TopoRecord], writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record([
        columns::GRID_ID,
        columns::ELEVATION,
        columns::SLOPE,
        columns::ASPECT,
    ])?;
    for record in records {
        writer.write_record([
            record.grid_id.to_string(),
            number_field(record.elevation),
            number_field(record.slope),
            number_field(record.aspect),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Read the topography checkpoint, keyed by grid cell.
///
/// Empty feature fields read back as NaN; a cell whose centroid missed
/// every elevation tile is represented that way.
///
/// # Errors
///
/// * If a required column is missing or an unknown column is present.
/// * If a grid id or non-empty feature field fails to parse.
/// * If the CSV itself is malformed.
pub fn read_topo<R: Read>(reader: R) -> Result<BTreeMap<i64, TopoRecord>, SchemaError> {
    let mut reader = csv::ReaderBuilder::new().from_reader(reader);
    let headers = trimmed_headers(&mut reader)?;

    let known = [
        columns::GRID_ID,
        columns::ELEVATION,
        columns::SLOPE,
        columns::ASPECT,
    ];
    reject_unknown_columns(Source::Topo, &headers, &known)?;

    let position = required_position(Source::Topo, &headers);
    let grid_id_index = position(columns::GRID_ID)?;
    let elevation_index = position(columns::ELEVATION)?;
    let slope_index = position(columns::SLOPE)?;
    let aspect_index = position(columns::ASPECT)?;

    let mut records = BTreeMap::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);
        let field = |index: usize| record.get(index).unwrap_or("").trim();

        let grid_id = parse_grid_id(Source::Topo, field(grid_id_index), line)?;
        records.insert(
            grid_id,
            TopoRecord {
                grid_id,
                elevation: parse_number(
                    Source::Topo,
                    columns::ELEVATION,
                    field(elevation_index),
                    line,
                )?,
                slope: parse_number(Source::Topo, columns::SLOPE, field(slope_index), line)?,
                aspect: parse_number(Source::Topo, columns::ASPECT, field(aspect_index), line)?,
            },
        );
    }

    log::debug!("Read {} topography checkpoint records", records.len());
    Ok(records)
}

fn trimmed_headers<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<String>, SchemaError> {
    Ok(reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect())
}

fn reject_unknown_columns(
    source: Source,
    headers: &[String],
    known: &[&str],
) -> Result<(), SchemaError> {
    for header in headers {
        if !known.contains(&header.as_str()) {
            return Err(SchemaError::UnexpectedColumn {
                source,
                column: header.clone(),
            });
        }
    }
    Ok(())
}

fn required_position<'a>(
    source: Source,
    headers: &'a [String],
) -> impl Fn(&str) -> Result<usize, SchemaError> + 'a {
    move |column: &str| {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| SchemaError::MissingColumn {
                source,
                column: column.to_owned(),
            })
    }
}

fn parse_grid_id(source: Source, raw: &str, line: u64) -> Result<i64, SchemaError> {
    raw.parse().map_err(|_| SchemaError::BadField {
        source,
        line,
        column: columns::GRID_ID.to_owned(),
        value: raw.to_owned(),
    })
}

fn parse_date(source: Source, raw: &str, line: u64) -> Result<NaiveDate, SchemaError> {
    parse_table_date(raw).ok_or_else(|| SchemaError::BadField {
        source,
        line,
        column: columns::DATE.to_owned(),
        value: raw.to_owned(),
    })
}

fn parse_number(source: Source, column: &str, raw: &str, line: u64) -> Result<f64, SchemaError> {
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse().map_err(|_| SchemaError::BadField {
        source,
        line,
        column: column.to_owned(),
        value: raw.to_owned(),
    })
}

fn number_field(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}
