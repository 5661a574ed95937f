//! Shared parsing utilities for source tables.
//!
//! Date columns arrive in whichever shape the vendor export produced:
//! ISO 8601 timestamps with or without fractional seconds, space-separated
//! timestamps, or bare dates. Everything collapses to a calendar date.

use chrono::{NaiveDate, NaiveDateTime};

/// Parses a table date string down to its calendar date.
#[must_use]
pub fn parse_table_date(s: &str) -> Option<NaiveDate> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.date());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.date());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
