#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the wildfire dataset pipeline.
//!
//! Runs the full pipeline by default, or a single stage by name so a
//! failed run can be resumed from its last checkpoint. The `bbox`
//! subcommand prints the grid extent and the four quadrant boxes the
//! elevation tiles are fetched against.

use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use firegrid_grid::GridIndex;
use firegrid_pipeline::{PipelineError, RunConfig, Runner, Stage};
use firegrid_raster::divide_bounding_box;

#[derive(Parser)]
#[command(name = "firegrid", about = "Wildfire dataset generation pipeline")]
struct Cli {
    /// Path to the run config file.
    #[arg(long, default_value = "firegrid.toml")]
    config: PathBuf,

    /// Override the configured region name.
    #[arg(long)]
    region: Option<String>,

    /// Override the configured grid file.
    #[arg(long)]
    grid: Option<PathBuf>,

    /// Override the configured climate table.
    #[arg(long)]
    climate: Option<PathBuf>,

    /// Override the configured fire table.
    #[arg(long)]
    fire: Option<PathBuf>,

    /// Override the configured band raster directory.
    #[arg(long)]
    ndvi_dir: Option<PathBuf>,

    /// Override the configured elevation tile directory.
    #[arg(long)]
    dem_dir: Option<PathBuf>,

    /// Override the configured output directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Override the configured start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Override the configured end date (YYYY-MM-DD).
    #[arg(long)]
    end: Option<NaiveDate>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    /// Fold the command-line overrides into the loaded config.
    fn apply_overrides(&self, config: &mut RunConfig) {
        if let Some(region) = &self.region {
            config.region.clone_from(region);
        }
        if let Some(grid) = &self.grid {
            config.grid.clone_from(grid);
        }
        if let Some(climate) = &self.climate {
            config.climate.clone_from(climate);
        }
        if let Some(fire) = &self.fire {
            config.fire.clone_from(fire);
        }
        if let Some(ndvi_dir) = &self.ndvi_dir {
            config.ndvi_dir.clone_from(ndvi_dir);
        }
        if let Some(dem_dir) = &self.dem_dir {
            config.dem_dir.clone_from(dem_dir);
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir.clone_from(output_dir);
        }
        if let Some(start) = self.start {
            config.start_date = start;
        }
        if let Some(end) = self.end {
            config.end_date = end;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage in order (the default).
    Run,
    /// Aggregate the climate table into the backbone checkpoint.
    Climate,
    /// Attribute and group fire incidents.
    Fire,
    /// Derive and interpolate the vegetation index.
    Ndvi,
    /// Sample elevation tiles into terrain features.
    Topo,
    /// Fuse the checkpoints into the final table.
    Fuse,
    /// Print the grid bounding box and its four fetch quadrants.
    Bbox,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let mut config = RunConfig::load(&cli.config)?;
    cli.apply_overrides(&mut config);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_all_stages(config)?,
        Commands::Climate => run_single_stage(config, Stage::Climate)?,
        Commands::Fire => run_single_stage(config, Stage::Fire)?,
        Commands::Ndvi => run_single_stage(config, Stage::Ndvi)?,
        Commands::Topo => run_single_stage(config, Stage::Topo)?,
        Commands::Fuse => run_single_stage(config, Stage::Fuse)?,
        Commands::Bbox => print_quadrants(&config)?,
    }

    Ok(())
}

fn run_all_stages(config: RunConfig) -> Result<(), PipelineError> {
    let started = Instant::now();
    let runner = Runner::new(config)?;
    let summaries = runner.run_all()?;
    let fused = summaries.last().map_or(0, |summary| summary.records_out);
    log::info!(
        "Run finished: {fused} fused records in {:.1}s",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn run_single_stage(config: RunConfig, stage: Stage) -> Result<(), PipelineError> {
    Runner::new(config)?.run_stage(stage)?;
    Ok(())
}

fn print_quadrants(config: &RunConfig) -> Result<(), PipelineError> {
    let grid = GridIndex::load(&config.grid)?;
    let bbox = grid.bounding_box();
    println!("Region bounding box: {bbox}");
    println!("Fetch quadrants:");
    for (tile, quadrant) in divide_bounding_box(&bbox).iter().enumerate() {
        println!("  dem_tile_{}: {quadrant}", tile + 1);
    }
    Ok(())
}
