#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Adapters from vendor source tables to the canonical schema.
//!
//! Each source arrives with its own column spellings: reanalysis extracts
//! use ERA5 short names (`u10`, `t2m`, ...), the fire-history database uses
//! uppercase headers (`LATITUDE`, `REP_DATE`, ...). The adapters here do
//! the renaming exactly once, at the boundary, and validate the fixed
//! schema each stage expects on entry. Everything downstream works with
//! canonical names only.

use firegrid_models::Source;

pub mod climate;
pub mod fire;
pub mod parsing;

pub use climate::read_climate_table;
pub use fire::{FireIncident, read_fire_table};

/// A source table failed schema validation at a stage boundary.
///
/// `Display`, `Error`, and `From<csv::Error>` are written by hand because
/// the `source` fields hold the data-source label, which a derive would
/// mistake for an error cause.
#[derive(Debug)]
pub enum SchemaError {
    /// A required column is absent from the header row.
    MissingColumn {
        /// Source whose table was malformed.
        source: Source,
        /// The absent column.
        column: String,
    },

    /// No recognized variable column was present at all.
    NoVariables {
        /// Source whose table was malformed.
        source: Source,
    },

    /// A column the canonical schema does not define was present.
    UnexpectedColumn {
        /// Source whose table was malformed.
        source: Source,
        /// The extra column.
        column: String,
    },

    /// A field failed to parse under the column's expected type.
    BadField {
        /// Source whose table was malformed.
        source: Source,
        /// 1-based line of the offending record.
        line: u64,
        /// Column the bad value was in.
        column: String,
        /// The raw value.
        value: String,
    },

    /// The underlying CSV was structurally invalid.
    Csv(csv::Error),
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColumn { source, column } => {
                write!(f, "{source} table is missing required column {column:?}")
            }
            Self::NoVariables { source } => {
                write!(f, "{source} table has no recognized variable columns")
            }
            Self::UnexpectedColumn { source, column } => {
                write!(f, "{source} table has unexpected column {column:?}")
            }
            Self::BadField {
                source,
                line,
                column,
                value,
            } => write!(
                f,
                "{source} table line {line}: column {column:?} has unparseable value {value:?}"
            ),
            Self::Csv(error) => std::fmt::Display::fmt(error, f),
        }
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Csv(error) => std::error::Error::source(error),
            _ => None,
        }
    }
}

impl From<csv::Error> for SchemaError {
    fn from(error: csv::Error) -> Self {
        Self::Csv(error)
    }
}
