#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Run orchestration for the dataset-generation pipeline.
//!
//! A run turns one region's source files into a fused per-cell, per-day
//! table under `<output_dir>/<region>/`. Each stage writes its canonical
//! output as a checkpoint CSV in that directory, so stages can be rerun
//! individually and the fusion stage works entirely from checkpoints. The
//! stage order is climate, fire, NDVI, topography, fusion; only climate is
//! mandatory for fusion to proceed.

use std::path::PathBuf;

use thiserror::Error;

use firegrid_fuse::FusionError;
use firegrid_grid::GridLoadError;
use firegrid_models::InvalidDateRangeError;
use firegrid_raster::RasterError;
use firegrid_source::SchemaError;

pub mod checkpoints;
pub mod config;
pub mod runner;

pub use config::RunConfig;
pub use runner::{Runner, StageSummary};

/// The stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Aggregate the climate table into the backbone checkpoint.
    Climate,
    /// Attribute and group fire incidents.
    Fire,
    /// Derive and interpolate the vegetation index.
    Ndvi,
    /// Sample elevation tiles into terrain features.
    Topo,
    /// Fuse the checkpoints into the terminal table.
    Fuse,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: &[Self] = &[Self::Climate, Self::Fire, Self::Ndvi, Self::Topo, Self::Fuse];

    /// Human-readable name for log output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Climate => "climate",
            Self::Fire => "fire history",
            Self::Ndvi => "vegetation index",
            Self::Topo => "topography",
            Self::Fuse => "fusion",
        }
    }
}

/// Errors that abort a stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage failed; wraps the underlying error with the stage name.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// Label of the stage that failed.
        stage: &'static str,
        /// The error the stage hit.
        #[source]
        source: Box<PipelineError>,
    },

    /// Reading or writing a run file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory the operation was against.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The run config failed to parse.
    #[error("invalid run config {path}: {message}")]
    Config {
        /// Config file path.
        path: PathBuf,
        /// What the TOML parser rejected.
        message: String,
    },

    /// The configured dates are reversed.
    #[error(transparent)]
    InvalidDateRange(#[from] InvalidDateRangeError),

    /// The grid failed to load.
    #[error(transparent)]
    Grid(#[from] GridLoadError),

    /// A source table or checkpoint failed schema validation.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A raster failed to read or process.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Fusion failed.
    #[error(transparent)]
    Fusion(#[from] FusionError),

    /// A checkpoint write failed.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_ends_with_fusion() {
        assert_eq!(Stage::ALL.len(), 5);
        assert_eq!(Stage::ALL[0], Stage::Climate);
        assert_eq!(Stage::ALL[4], Stage::Fuse);
    }

    #[test]
    fn stage_labels_are_distinct() {
        for (i, a) in Stage::ALL.iter().enumerate() {
            for b in &Stage::ALL[i + 1..] {
                assert_ne!(a.label(), b.label());
            }
        }
    }
}
