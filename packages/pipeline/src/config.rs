//! Run configuration, loaded from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use firegrid_models::{DateRange, Source};

use crate::PipelineError;

/// Everything a run needs: the region name, where its source files live,
/// the date window, and where the outputs go.
///
/// Dates are written as `YYYY-MM-DD` TOML strings. All stage outputs land
/// under [`RunConfig::run_dir`], one directory per region.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Region name; becomes the run directory under `output_dir`.
    pub region: String,
    /// Grid definition file (GeoJSON `FeatureCollection`).
    pub grid: PathBuf,
    /// Climate reanalysis table (CSV).
    pub climate: PathBuf,
    /// Fire incident table (CSV).
    pub fire: PathBuf,
    /// Directory of per-date spectral band rasters.
    pub ndvi_dir: PathBuf,
    /// Directory of elevation tile rasters.
    pub dem_dir: PathBuf,
    /// First backbone date, inclusive.
    pub start_date: NaiveDate,
    /// Last backbone date, inclusive.
    pub end_date: NaiveDate,
    /// Root directory for run outputs.
    pub output_dir: PathBuf,
}

impl RunConfig {
    /// Reads and parses a run config file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the file cannot be read and
    /// [`PipelineError::Config`] if it is not valid TOML for this shape.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::de::from_str(&raw).map_err(|e| PipelineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        log::info!(
            "Loaded run config for region '{}' ({} to {})",
            config.region,
            config.start_date,
            config.end_date
        );
        Ok(config)
    }

    /// The configured date window as a validated range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDateRange`] if `start_date` is after
    /// `end_date`.
    pub fn date_range(&self) -> Result<DateRange, PipelineError> {
        Ok(DateRange::new(self.start_date, self.end_date)?)
    }

    /// Directory all of this run's outputs are written under.
    #[must_use]
    pub fn run_dir(&self) -> PathBuf {
        self.output_dir.join(&self.region)
    }

    /// Checkpoint file for one source stage.
    #[must_use]
    pub fn checkpoint_path(&self, source: Source) -> PathBuf {
        self.run_dir().join(format!("{source}.csv"))
    }

    /// The terminal fused output file.
    #[must_use]
    pub fn fused_path(&self) -> PathBuf {
        self.run_dir().join("fused.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
region = "alberta"
grid = "data/alberta/grid.geojson"
climate = "data/alberta/era5.csv"
fire = "data/alberta/cnfdb.csv"
ndvi_dir = "data/alberta/ndvi"
dem_dir = "data/alberta/dem"
start_date = "2019-05-01"
end_date = "2019-09-30"
output_dir = "runs"
"#;

    #[test]
    fn full_config_parses() {
        let config: RunConfig = toml::de::from_str(FULL).unwrap();
        assert_eq!(config.region, "alberta");
        assert_eq!(config.grid, PathBuf::from("data/alberta/grid.geojson"));
        assert_eq!(
            config.start_date,
            NaiveDate::from_ymd_opt(2019, 5, 1).unwrap()
        );
        assert_eq!(
            config.end_date,
            NaiveDate::from_ymd_opt(2019, 9, 30).unwrap()
        );
    }

    #[test]
    fn reversed_dates_are_rejected() {
        let mut config: RunConfig = toml::de::from_str(FULL).unwrap();
        config.start_date = NaiveDate::from_ymd_opt(2019, 10, 1).unwrap();
        assert!(matches!(
            config.date_range(),
            Err(PipelineError::InvalidDateRange(_))
        ));
    }

    #[test]
    fn paths_are_rooted_in_the_region_run_dir() {
        let config: RunConfig = toml::de::from_str(FULL).unwrap();
        assert_eq!(config.run_dir(), PathBuf::from("runs/alberta"));
        assert_eq!(
            config.checkpoint_path(Source::Climate),
            PathBuf::from("runs/alberta/climate.csv")
        );
        assert_eq!(
            config.checkpoint_path(Source::Ndvi),
            PathBuf::from("runs/alberta/ndvi.csv")
        );
        assert_eq!(config.fused_path(), PathBuf::from("runs/alberta/fused.csv"));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let path = Path::new("/nonexistent/firegrid.toml");
        let err = RunConfig::load(path).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/firegrid.toml"));
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let raw = format!("{FULL}\nextra_key = \"ignored\"\n");
        let config: RunConfig = toml::de::from_str(&raw).unwrap();
        assert_eq!(config.region, "alberta");
    }
}
