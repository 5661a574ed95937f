//! Fixed-order CSV writer for the fused table.
//!
//! Column order is caller-independent: keys, climate variables, fire
//! variables, NDVI, topography. A climate variable absent from every row is
//! omitted entirely rather than emitted as an empty column; the fill-policy
//! columns are always present. NaN writes as an empty field.

use std::io::Write;

use firegrid_models::{FusedRecord, columns};

use crate::FusionError;

/// Write the fused table as CSV.
///
/// # Errors
///
/// * If writing or flushing the underlying stream fails.
pub fn write_fused_csv<W: Write>(records: &[FusedRecord], writer: W) -> Result<(), FusionError> {
    let climate_columns: Vec<&str> = columns::CLIMATE_VARIABLES
        .iter()
        .copied()
        .filter(|name| {
            records
                .iter()
                .any(|record| record.climate.contains_key(*name))
        })
        .collect();

    let mut writer = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = vec![
        columns::GRID_ID,
        columns::LATITUDE,
        columns::LONGITUDE,
        columns::DATE,
    ];
    header.extend(&climate_columns);
    header.extend([
        columns::FIRE_SIZE,
        columns::FIRE_OCCURRED,
        columns::FIRE_CAUSE,
        columns::NDVI,
        columns::ELEVATION,
        columns::SLOPE,
        columns::ASPECT,
    ]);
    writer.write_record(&header)?;

    for record in records {
        let mut row: Vec<String> = vec![
            record.grid_id.to_string(),
            number_field(record.latitude),
            number_field(record.longitude),
            record.date.format("%Y-%m-%d").to_string(),
        ];
        for name in &climate_columns {
            let value = record.climate.get(*name).copied().unwrap_or(f64::NAN);
            row.push(number_field(value));
        }
        row.push(number_field(record.fire_size));
        row.push(record.fire_occurred.to_string());
        row.push(record.fire_cause.clone());
        row.push(number_field(record.ndvi));
        row.push(number_field(record.elevation));
        row.push(number_field(record.slope));
        row.push(number_field(record.aspect));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

fn number_field(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;

    fn record(grid_id: i64, climate: &[(&str, f64)]) -> FusedRecord {
        FusedRecord {
            grid_id,
            latitude: 51.5,
            longitude: -116.5,
            date: NaiveDate::from_ymd_opt(2019, 8, 2).unwrap(),
            climate: climate
                .iter()
                .map(|&(name, value)| (name.to_string(), value))
                .collect(),
            fire_size: 0.0,
            fire_occurred: 0,
            fire_cause: "None".to_string(),
            ndvi: 0.61,
            elevation: 1400.0,
            slope: 12.0,
            aspect: 270.0,
        }
    }

    fn written(records: &[FusedRecord]) -> String {
        let mut buffer = Vec::new();
        write_fused_csv(records, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn writes_rows_in_the_fixed_column_order() {
        let records = vec![record(7, &[("temperature_2m", 290.4)])];

        let output = written(&records);

        assert_eq!(
            output,
            "grid_id,latitude,longitude,date,temperature_2m,fire_size,fire_occurred,\
             fire_cause,ndvi,elevation,slope,aspect\n\
             7,51.5,-116.5,2019-08-02,290.4,0,0,None,0.61,1400,12,270\n"
        );
    }

    #[test]
    fn header_matches_the_canonical_order_when_all_variables_are_present() {
        let climate: Vec<(&str, f64)> = columns::CLIMATE_VARIABLES
            .iter()
            .map(|&name| (name, 1.0))
            .collect();
        let records = vec![record(7, &climate)];

        let output = written(&records);
        let header: Vec<&str> = output.lines().next().unwrap().split(',').collect();

        assert_eq!(header, columns::FUSED_ORDER);
    }

    #[test]
    fn climate_columns_absent_from_every_row_are_omitted() {
        let records = vec![
            record(7, &[("temperature_2m", 290.4)]),
            record(8, &[("temperature_2m", 291.0)]),
        ];

        let output = written(&records);

        assert!(!output.contains("surface_pressure"));
        assert!(output.contains("temperature_2m"));
    }

    #[test]
    fn a_variable_present_in_any_row_is_a_column_for_all_rows() {
        let records = vec![
            record(7, &[("temperature_2m", 290.4)]),
            record(8, &[("surface_pressure", 87000.0)]),
        ];

        let output = written(&records);
        let lines: Vec<&str> = output.lines().collect();

        assert!(lines[0].contains("temperature_2m"));
        assert!(lines[0].contains("surface_pressure"));
        // Row 8 never saw temperature; its field is empty, not zero.
        assert!(lines[2].contains(",,"));
    }

    #[test]
    fn nan_fields_write_as_empty() {
        let mut missing = record(7, &[("temperature_2m", f64::NAN)]);
        missing.ndvi = f64::NAN;
        missing.elevation = f64::NAN;

        let output = written(&[missing]);
        let row = output.lines().nth(1).unwrap();

        assert_eq!(
            row,
            "7,51.5,-116.5,2019-08-02,,0,0,None,,,12,270"
        );
    }
}
