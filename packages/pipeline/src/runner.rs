//! Stage execution over a loaded grid.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use firegrid_aggregate::{KeyFields, aggregate, climate_reducers};
use firegrid_fuse::{FusionError, fuse, write_fused_csv};
use firegrid_grid::GridIndex;
use firegrid_interpolate::{SeriesSample, interpolate_daily};
use firegrid_models::{FireRecord, Source, TopoRecord};
use firegrid_raster::{merge_tile_samples, ndvi_from_bands, read_ascii_grid_file, slope_aspect};
use firegrid_source::{FireIncident, read_climate_table, read_fire_table};
use firegrid_spatial::{CellIndex, join_points, sample_at_centroids};

use crate::checkpoints;
use crate::config::RunConfig;
use crate::{PipelineError, Stage};

/// The elevation source delivers a region as four quadrant tiles, named
/// `dem_tile_1.asc` through `dem_tile_4.asc`.
const DEM_TILE_COUNT: usize = 4;

/// Red band file suffix (before `.asc`).
const RED_SUFFIX: &str = "_B04";
/// Near-infrared band file suffix (before `.asc`).
const NIR_SUFFIX: &str = "_B08";

/// What one stage did: record counts and wall time.
#[derive(Debug, Clone, Copy)]
pub struct StageSummary {
    /// Which stage ran.
    pub stage: Stage,
    /// Records read from the stage's input.
    pub records_in: usize,
    /// Records written to the stage's checkpoint.
    pub records_out: usize,
    /// Inputs discarded along the way (outside the grid, masked pixels,
    /// cells with no raster coverage).
    pub dropped: usize,
    /// Wall time the stage took.
    pub elapsed: Duration,
}

impl StageSummary {
    /// Log the summary at info level.
    pub fn log(&self) {
        log::info!(
            "{} stage finished: {} in, {} out, {} dropped in {:.1}s",
            self.stage.label(),
            self.records_in,
            self.records_out,
            self.dropped,
            self.elapsed.as_secs_f64()
        );
    }
}

/// Executes stages for one run: a config, its loaded grid, and the spatial
/// index built over it.
///
/// Stages communicate only through checkpoint files in the run directory,
/// so any stage can be rerun on its own as long as the checkpoints it
/// consumes exist.
pub struct Runner {
    config: RunConfig,
    grid: GridIndex,
    index: CellIndex,
}

impl Runner {
    /// Load the grid, build the spatial index, and create the run
    /// directory.
    ///
    /// # Errors
    ///
    /// * If the grid file fails to load.
    /// * If the run directory cannot be created.
    pub fn new(config: RunConfig) -> Result<Self, PipelineError> {
        let grid = GridIndex::load(&config.grid)?;
        let index = CellIndex::new(&grid);
        let run_dir = config.run_dir();
        fs::create_dir_all(&run_dir).map_err(|source| PipelineError::Io {
            path: run_dir,
            source,
        })?;
        Ok(Self {
            config,
            grid,
            index,
        })
    }

    /// The run's configuration.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The loaded grid.
    #[must_use]
    pub const fn grid(&self) -> &GridIndex {
        &self.grid
    }

    /// Run one stage and log its summary.
    ///
    /// # Errors
    ///
    /// Returns the first error the stage hits, wrapped with the stage
    /// name; the stage's checkpoint is not written in that case.
    pub fn run_stage(&self, stage: Stage) -> Result<StageSummary, PipelineError> {
        log::info!("Running {} stage", stage.label());
        let started = Instant::now();
        let (records_in, records_out, dropped) =
            self.dispatch(stage).map_err(|source| PipelineError::Stage {
                stage: stage.label(),
                source: Box::new(source),
            })?;
        let summary = StageSummary {
            stage,
            records_in,
            records_out,
            dropped,
            elapsed: started.elapsed(),
        };
        summary.log();
        Ok(summary)
    }

    fn dispatch(&self, stage: Stage) -> Result<(usize, usize, usize), PipelineError> {
        match stage {
            Stage::Climate => self.run_climate(),
            Stage::Fire => self.run_fire(),
            Stage::Ndvi => self.run_ndvi(),
            Stage::Topo => self.run_topo(),
            Stage::Fuse => self.run_fuse(),
        }
    }

    /// Run every stage in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first stage error.
    pub fn run_all(&self) -> Result<Vec<StageSummary>, PipelineError> {
        Stage::ALL
            .iter()
            .map(|&stage| self.run_stage(stage))
            .collect()
    }

    fn run_climate(&self) -> Result<(usize, usize, usize), PipelineError> {
        let observations = read_climate_table(open(&self.config.climate)?)?;
        let records_in = observations.len();

        let outcome = join_points(observations, &self.index);
        let records = aggregate(
            &outcome.observations,
            KeyFields::CellAndDate,
            &climate_reducers(),
        );

        if records.is_empty() {
            log::warn!("Climate stage produced no records; checkpoint not written");
            return Ok((records_in, 0, outcome.dropped));
        }
        checkpoints::write_climate(
            &records,
            create(&self.config.checkpoint_path(Source::Climate))?,
        )?;
        Ok((records_in, records.len(), outcome.dropped))
    }

    fn run_fire(&self) -> Result<(usize, usize, usize), PipelineError> {
        let incidents = read_fire_table(open(&self.config.fire)?)?;
        let records_in = incidents.len();
        let range = self.config.date_range()?;

        let mut joined = Vec::new();
        let mut dropped = 0_usize;
        let mut out_of_range = 0_usize;
        for incident in incidents {
            if !range.contains(incident.date) {
                out_of_range += 1;
                continue;
            }
            match self.index.locate(incident.longitude, incident.latitude) {
                Some(grid_id) => joined.push((grid_id, incident)),
                None => dropped += 1,
            }
        }
        if out_of_range > 0 {
            log::debug!("Skipped {out_of_range} incidents outside the run date window");
        }

        let records = group_fire_records(joined);
        if records.is_empty() {
            log::warn!("Fire stage produced no records; checkpoint not written");
            return Ok((records_in, 0, dropped));
        }
        checkpoints::write_fire(&records, create(&self.config.checkpoint_path(Source::Fire))?)?;
        Ok((records_in, records.len(), dropped))
    }

    fn run_ndvi(&self) -> Result<(usize, usize, usize), PipelineError> {
        let pairs = collect_band_pairs(&self.config.ndvi_dir)?;
        let centroids = self.grid.centroids();

        let mut samples = Vec::new();
        let mut masked = 0_usize;
        for (date, red_path, nir_path) in &pairs {
            let red = read_ascii_grid_file(red_path)?;
            let nir = read_ascii_grid_file(nir_path)?;
            let values = ndvi_from_bands(red.data(), nir.data())?;
            let raster = red.with_data(values);
            for (&grid_id, &value) in &sample_at_centroids(&raster, centroids) {
                if value.is_nan() {
                    masked += 1;
                    continue;
                }
                samples.push(SeriesSample {
                    grid_id,
                    date: *date,
                    value,
                });
            }
        }

        let records_in = samples.len();
        let daily = interpolate_daily(&samples);
        if daily.is_empty() {
            log::warn!("Vegetation index stage produced no records; checkpoint not written");
            return Ok((records_in, 0, masked));
        }
        checkpoints::write_ndvi(&daily, create(&self.config.checkpoint_path(Source::Ndvi))?)?;
        Ok((records_in, daily.len(), masked))
    }

    fn run_topo(&self) -> Result<(usize, usize, usize), PipelineError> {
        let centroids = self.grid.centroids();

        let mut elevation_tiles = Vec::new();
        let mut slope_tiles = Vec::new();
        let mut aspect_tiles = Vec::new();
        for tile in 1..=DEM_TILE_COUNT {
            let path = self.config.dem_dir.join(format!("dem_tile_{tile}.asc"));
            if !path.exists() {
                log::warn!("Elevation tile {} not found; skipping", path.display());
                continue;
            }
            let dem = read_ascii_grid_file(&path)?;
            let (slope, aspect) = slope_aspect(&dem)?;
            elevation_tiles.push(sample_at_centroids(&dem, centroids));
            slope_tiles.push(sample_at_centroids(&dem.with_data(slope), centroids));
            aspect_tiles.push(sample_at_centroids(&dem.with_data(aspect), centroids));
        }

        let elevation = merge_tile_samples(&elevation_tiles);
        let slope = merge_tile_samples(&slope_tiles);
        let aspect = merge_tile_samples(&aspect_tiles);

        let mut records = Vec::new();
        let mut dropped = 0_usize;
        for &grid_id in centroids.keys() {
            let record = TopoRecord {
                grid_id,
                elevation: elevation.get(&grid_id).copied().unwrap_or(f64::NAN),
                slope: slope.get(&grid_id).copied().unwrap_or(f64::NAN),
                aspect: aspect.get(&grid_id).copied().unwrap_or(f64::NAN),
            };
            // A cell whose centroid missed every tile stays absent rather
            // than carrying an all-NaN row.
            if record.elevation.is_nan() && record.slope.is_nan() && record.aspect.is_nan() {
                dropped += 1;
                continue;
            }
            records.push(record);
        }

        if records.is_empty() {
            log::warn!("Topography stage produced no records; checkpoint not written");
            return Ok((centroids.len(), 0, dropped));
        }
        checkpoints::write_topo(&records, create(&self.config.checkpoint_path(Source::Topo))?)?;
        Ok((centroids.len(), records.len(), dropped))
    }

    fn run_fuse(&self) -> Result<(usize, usize, usize), PipelineError> {
        let climate_path = self.config.checkpoint_path(Source::Climate);
        if !climate_path.exists() {
            return Err(PipelineError::Fusion(FusionError::MissingBackbone));
        }
        let climate = checkpoints::read_climate(open(&climate_path)?)?;

        let fire = match self.optional_checkpoint(Source::Fire)? {
            Some(reader) => checkpoints::read_fire(reader)?,
            None => Vec::new(),
        };
        let ndvi = match self.optional_checkpoint(Source::Ndvi)? {
            Some(reader) => checkpoints::read_ndvi(reader)?,
            None => BTreeMap::new(),
        };
        let topo = match self.optional_checkpoint(Source::Topo)? {
            Some(reader) => checkpoints::read_topo(reader)?,
            None => BTreeMap::new(),
        };

        let fused = fuse(
            &climate,
            &fire,
            &ndvi,
            &topo,
            self.grid.centroids(),
            self.config.date_range()?,
        )?;
        write_fused_csv(&fused, create(&self.config.fused_path())?)?;
        Ok((climate.len(), fused.len(), 0))
    }

    fn optional_checkpoint(
        &self,
        source: Source,
    ) -> Result<Option<BufReader<File>>, PipelineError> {
        let path = self.config.checkpoint_path(source);
        if path.exists() {
            Ok(Some(open(&path)?))
        } else {
            log::warn!("{} checkpoint missing; fusing without it", source.label());
            Ok(None)
        }
    }
}

/// Group joined incidents into one record per (cell, date).
///
/// Sizes sum across the group; the cause comes from the group's largest
/// incident, first one read winning ties.
fn group_fire_records(joined: Vec<(i64, FireIncident)>) -> Vec<FireRecord> {
    struct FireGroup {
        total: f64,
        largest: f64,
        cause: String,
    }

    let mut groups: BTreeMap<(i64, NaiveDate), FireGroup> = BTreeMap::new();
    for (grid_id, incident) in joined {
        let group = groups
            .entry((grid_id, incident.date))
            .or_insert_with(|| FireGroup {
                total: 0.0,
                largest: f64::NEG_INFINITY,
                cause: String::new(),
            });
        group.total += incident.size;
        if incident.size > group.largest {
            group.largest = incident.size;
            group.cause = incident.cause;
        }
    }

    groups
        .into_iter()
        .map(|((grid_id, date), group)| FireRecord {
            grid_id,
            date,
            size: group.total,
            cause: group.cause,
        })
        .collect()
}

/// Find complete red/near-infrared band pairs under the raster directory.
///
/// Band files are named `<date>_B04.asc` (red) and `<date>_B08.asc`
/// (near-infrared). Dates with only one band are skipped with a warning;
/// anything else in the directory is ignored.
fn collect_band_pairs(dir: &Path) -> Result<Vec<(NaiveDate, PathBuf, PathBuf)>, PipelineError> {
    let entries = fs::read_dir(dir).map_err(|source| PipelineError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut by_date: BTreeMap<NaiveDate, (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|source| PipelineError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(stem) = name.strip_suffix(".asc") else {
            log::debug!("Ignoring non-raster file {name}");
            continue;
        };
        let (date_part, is_red) = if let Some(date_part) = stem.strip_suffix(RED_SUFFIX) {
            (date_part, true)
        } else if let Some(date_part) = stem.strip_suffix(NIR_SUFFIX) {
            (date_part, false)
        } else {
            log::debug!("Ignoring raster without a band suffix: {name}");
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") else {
            log::debug!("Ignoring raster with an unparseable date: {name}");
            continue;
        };

        let slots = by_date.entry(date).or_default();
        if is_red {
            slots.0 = Some(entry.path());
        } else {
            slots.1 = Some(entry.path());
        }
    }

    let mut pairs = Vec::new();
    for (date, slots) in by_date {
        match slots {
            (Some(red), Some(nir)) => pairs.push((date, red, nir)),
            _ => log::warn!("Ignoring incomplete band pair for {date}"),
        }
    }
    Ok(pairs)
}

fn open(path: &Path) -> Result<BufReader<File>, PipelineError> {
    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

fn create(path: &Path) -> Result<BufWriter<File>, PipelineError> {
    let file = File::create(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID_GEOJSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"grid_id": 1}, "geometry":
                {"type": "Polygon", "coordinates": [[[10,46],[11,46],[11,47],[10,47],[10,46]]]}},
            {"type": "Feature", "properties": {"grid_id": 2}, "geometry":
                {"type": "Polygon", "coordinates": [[[11,46],[12,46],[12,47],[11,47],[11,46]]]}},
            {"type": "Feature", "properties": {"grid_id": 3}, "geometry":
                {"type": "Polygon", "coordinates": [[[10,45],[11,45],[11,46],[10,46],[10,45]]]}},
            {"type": "Feature", "properties": {"grid_id": 4}, "geometry":
                {"type": "Polygon", "coordinates": [[[11,45],[12,45],[12,46],[11,46],[11,45]]]}}
        ]
    }"#;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 8, day).unwrap()
    }

    fn incident(latitude: f64, longitude: f64, day: u32, cause: &str, size: f64) -> FireIncident {
        FireIncident {
            latitude,
            longitude,
            date: date(day),
            cause: cause.to_owned(),
            size,
        }
    }

    #[test]
    fn fire_groups_sum_sizes_and_keep_the_largest_cause() {
        let joined = vec![
            (1, incident(46.5, 10.5, 2, "H", 3.0)),
            (1, incident(46.4, 10.6, 2, "L", 10.0)),
            (1, incident(46.6, 10.4, 2, "U", 1.0)),
        ];

        let records = group_fire_records(joined);

        assert_eq!(records.len(), 1);
        assert!((records[0].size - 14.0).abs() < f64::EPSILON);
        assert_eq!(records[0].cause, "L");
    }

    #[test]
    fn fire_cause_ties_keep_the_first_incident_read() {
        let joined = vec![
            (1, incident(46.5, 10.5, 2, "H", 5.0)),
            (1, incident(46.4, 10.6, 2, "L", 5.0)),
        ];

        let records = group_fire_records(joined);

        assert_eq!(records[0].cause, "H");
    }

    #[test]
    fn fire_groups_split_by_cell_and_date() {
        let joined = vec![
            (1, incident(46.5, 10.5, 2, "H", 1.0)),
            (1, incident(46.5, 10.5, 3, "H", 2.0)),
            (2, incident(46.5, 11.5, 2, "L", 4.0)),
        ];

        let records = group_fire_records(joined);

        assert_eq!(records.len(), 3);
        assert_eq!((records[0].grid_id, records[0].date), (1, date(2)));
        assert_eq!((records[1].grid_id, records[1].date), (1, date(3)));
        assert_eq!((records[2].grid_id, records[2].date), (2, date(2)));
    }

    #[test]
    fn zero_sized_incidents_still_register_occurrence() {
        let joined = vec![(1, incident(46.5, 10.5, 2, "U", 0.0))];

        let records = group_fire_records(joined);

        assert_eq!(records.len(), 1);
        assert!(records[0].size.abs() < f64::EPSILON);
        assert_eq!(records[0].cause, "U");
    }

    #[test]
    fn band_pairs_require_both_bands() {
        let dir = std::env::temp_dir().join(format!("firegrid_ndvi_pairs_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        for name in [
            "2019-08-01_B04.asc",
            "2019-08-01_B08.asc",
            "2019-08-06_B04.asc",
            "junk.txt",
        ] {
            fs::write(dir.join(name), "").unwrap();
        }

        let pairs = collect_band_pairs(&dir).unwrap();

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, date(1));
        assert!(pairs[0].1.ends_with("2019-08-01_B04.asc"));
        assert!(pairs[0].2.ends_with("2019-08-01_B08.asc"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn run_all_fuses_the_checkpoint_outputs() {
        let base = std::env::temp_dir().join(format!("firegrid_run_all_{}", std::process::id()));
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(base.join("ndvi")).unwrap();
        fs::create_dir_all(base.join("dem")).unwrap();

        fs::write(base.join("grid.geojson"), GRID_GEOJSON).unwrap();
        fs::write(
            base.join("climate.csv"),
            "latitude,longitude,valid_time,t2m,tp\n\
             46.5,10.5,2019-08-01T00:00:00,290.0,0.001\n\
             46.5,10.5,2019-08-02T00:00:00,291.0,0.000\n\
             45.5,11.5,2019-08-01T00:00:00,289.0,0.002\n",
        )
        .unwrap();
        fs::write(
            base.join("fire.csv"),
            "LATITUDE,LONGITUDE,REP_DATE,CAUSE,SIZE_HA\n\
             46.5,10.5,2019-08-02,L,12.5\n",
        )
        .unwrap();

        let config = RunConfig {
            region: "test".to_owned(),
            grid: base.join("grid.geojson"),
            climate: base.join("climate.csv"),
            fire: base.join("fire.csv"),
            ndvi_dir: base.join("ndvi"),
            dem_dir: base.join("dem"),
            start_date: date(1),
            end_date: date(31),
            output_dir: base.join("runs"),
        };

        let runner = Runner::new(config).unwrap();
        let summaries = runner.run_all().unwrap();
        assert_eq!(summaries.len(), Stage::ALL.len());

        let fused = fs::read_to_string(runner.config().fused_path()).unwrap();
        let lines: Vec<&str> = fused.lines().collect();
        assert_eq!(
            lines[0],
            "grid_id,latitude,longitude,date,temperature_2m,total_precipitation,\
             fire_size,fire_occurred,fire_cause,ndvi,elevation,slope,aspect"
        );
        assert_eq!(lines.len(), 4);

        // Sorted by cell then date; cell 1 has both days, cell 4 one.
        assert!(lines[1].starts_with("1,") && lines[1].contains(",2019-08-01,"));
        assert!(lines[2].starts_with("1,") && lines[2].contains(",2019-08-02,"));
        assert!(lines[3].starts_with("4,") && lines[3].contains(",2019-08-01,"));

        let fire_row: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(fire_row[6], "12.5");
        assert_eq!(fire_row[7], "1");
        assert_eq!(fire_row[8], "L");
        // Overlays with no checkpoint stay empty rather than zero-filled.
        assert_eq!(fire_row[9], "");
        assert_eq!(fire_row[12], "");

        let absence_row: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(absence_row[6], "0");
        assert_eq!(absence_row[7], "0");
        assert_eq!(absence_row[8], "None");
        let latitude: f64 = absence_row[1].parse().unwrap();
        assert!((latitude - 46.5).abs() < 0.01);

        fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn fuse_without_a_climate_checkpoint_is_a_hard_stop() {
        let base = std::env::temp_dir().join(format!("firegrid_no_backbone_{}", std::process::id()));
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("grid.geojson"), GRID_GEOJSON).unwrap();

        let config = RunConfig {
            region: "test".to_owned(),
            grid: base.join("grid.geojson"),
            climate: base.join("climate.csv"),
            fire: base.join("fire.csv"),
            ndvi_dir: base.join("ndvi"),
            dem_dir: base.join("dem"),
            start_date: date(1),
            end_date: date(31),
            output_dir: base.join("runs"),
        };

        let runner = Runner::new(config).unwrap();
        let err = runner.run_stage(Stage::Fuse).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Stage { stage: "fusion", ref source }
                if matches!(**source, PipelineError::Fusion(FusionError::MissingBackbone))
        ));
        assert!(!runner.config().fused_path().exists());

        fs::remove_dir_all(&base).unwrap();
    }
}
