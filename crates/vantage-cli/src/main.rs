//! vantage - terrain visibility and site optimization from the command line.
//!
//! Results are printed as JSON on stdout; logs go to stderr.

mod config;
mod error;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vantage_dem::{GeoTiffSource, TerrainPipeline, TileBounds};
use vantage_optimizer::{cells_for_region, expand_cells, parse_resolution, CoverageStrategy, TerrainOptimizer};
use vantage_viewshed::{ProfileRequest, ViewshedCalculator, ViewshedRequest};

use crate::config::CliConfig;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "vantage", version)]
#[command(about = "Terrain visibility and site optimization", long_about = None)]
struct Cli {
    /// YAML file with `pipeline`, `viewshed`, and `optimizer` sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of USGS-named GeoTIFF tiles to use as the primary source
    #[arg(long, global = true)]
    dem_dir: Option<PathBuf>,

    /// Seed for the stochastic searches
    #[arg(long, global = true, default_value_t = 42)]
    seed: u64,

    /// Fail instead of falling back to synthetic terrain
    #[arg(long, global = true)]
    strict: bool,

    /// More logging (-v debug, -vv trace); overrides RUST_LOG
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Emit single-line JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Elevation at one or more LAT,LON points
    #[command(allow_negative_numbers = true)]
    Elevation {
        #[arg(required = true, value_parser = parse_point, allow_hyphen_values = true)]
        points: Vec<(f64, f64)>,
    },

    /// Slope, aspect, and relief statistics for a region
    #[command(allow_negative_numbers = true)]
    Metrics {
        #[command(flatten)]
        area: AreaArgs,

        /// Sampling resolution in arc-seconds
        #[arg(long, default_value_t = 30.0)]
        resolution_arcsec: f64,
    },

    /// Radial viewshed around a site
    #[command(allow_negative_numbers = true)]
    Viewshed {
        #[command(flatten)]
        site: SiteArgs,

        /// Target height above ground in meters
        #[arg(long, default_value_t = 0.0)]
        target_height: f64,

        #[arg(long, default_value_t = 1.0)]
        azimuth_step: f64,
    },

    /// Horizon elevation angle on every azimuth
    #[command(allow_negative_numbers = true)]
    Horizon {
        #[command(flatten)]
        site: SiteArgs,

        #[arg(long, default_value_t = 1.0)]
        azimuth_step: f64,
    },

    /// Elevation profile and Fresnel clearance between two points
    #[command(allow_negative_numbers = true)]
    Profile {
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        from: (f64, f64),

        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        to: (f64, f64),

        #[arg(long, default_value_t = 100)]
        points: usize,

        /// Antenna height at the start in meters
        #[arg(long, default_value_t = 10.0)]
        start_height: f64,

        /// Antenna height at the end in meters
        #[arg(long, default_value_t = 10.0)]
        end_height: f64,

        /// Overrides the configured Fresnel frequency
        #[arg(long)]
        frequency_mhz: Option<f64>,
    },

    /// Pareto search for the best individual sites
    #[command(allow_negative_numbers = true)]
    Optimize {
        #[command(flatten)]
        area: AreaArgs,

        /// Only print the first-rank front
        #[arg(long)]
        frontier_only: bool,
    },

    /// Place several sites for maximum combined coverage
    #[command(allow_negative_numbers = true)]
    Coverage {
        #[command(flatten)]
        area: AreaArgs,

        #[arg(long, default_value_t = 3)]
        sites: usize,

        #[arg(long, value_enum, default_value = "annealing")]
        strategy: StrategyArg,
    },

    /// Score H3 cells covering a region
    #[command(allow_negative_numbers = true)]
    Hexgrid {
        #[command(flatten)]
        area: AreaArgs,

        /// H3 resolution (0-15)
        #[arg(long, default_value_t = 7)]
        resolution: u8,

        /// Grow the cell set by this many rings
        #[arg(long, default_value_t = 0)]
        rings: u32,

        /// Keep only the best N cells
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Args)]
struct AreaArgs {
    #[arg(long)]
    min_lat: f64,
    #[arg(long)]
    max_lat: f64,
    #[arg(long)]
    min_lon: f64,
    #[arg(long)]
    max_lon: f64,
}

impl AreaArgs {
    fn bounds(&self) -> Result<TileBounds> {
        Ok(TileBounds::new(self.min_lat, self.max_lat, self.min_lon, self.max_lon)?)
    }
}

#[derive(Args)]
struct SiteArgs {
    #[arg(long)]
    lat: f64,
    #[arg(long)]
    lon: f64,

    /// Analysis radius in km
    #[arg(long, default_value_t = 20.0)]
    range_km: f64,

    /// Observer height above ground in meters
    #[arg(long, default_value_t = 10.0)]
    height: f64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Simulated annealing
    Annealing,
    /// Greedy pick over a candidate grid
    Greedy,
}

impl From<StrategyArg> for CoverageStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Annealing => CoverageStrategy::Annealing,
            StrategyArg::Greedy => CoverageStrategy::Greedy,
        }
    }
}

fn parse_point(s: &str) -> std::result::Result<(f64, f64), String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{s}'"))?;
    let lat = lat.trim().parse::<f64>().map_err(|e| format!("latitude '{lat}': {e}"))?;
    let lon = lon.trim().parse::<f64>().map_err(|e| format!("longitude '{lon}': {e}"))?;
    Ok((lat, lon))
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_pipeline(cli: &Cli, config: &CliConfig) -> Result<Arc<TerrainPipeline>> {
    let strict = cli.strict || config.pipeline.strict;
    let mut pipeline = TerrainPipeline::new(config.pipeline.clone().with_strict(strict));
    match &cli.dem_dir {
        Some(dir) => {
            let source = GeoTiffSource::from_directory("geotiff", dir)?;
            info!(dir = %dir.display(), "Added GeoTIFF source");
            pipeline.add_source(Box::new(source));
        }
        None if !strict => warn!("No --dem-dir given; elevations come from synthetic terrain"),
        None => {}
    }
    Ok(Arc::new(pipeline))
}

/// Cancel flag raised by Ctrl-C so long searches return what they have.
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })?;
    Ok(flag)
}

fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    Ok(if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    })
}

fn run(cli: &Cli) -> Result<String> {
    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    let pipeline = build_pipeline(cli, &config)?;
    let calculator = ViewshedCalculator::with_params(pipeline.clone(), config.viewshed.clone());
    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);

    match &cli.command {
        Command::Elevation { points } => to_json(&pipeline.get_elevation_batch(points)?, cli.compact),
        Command::Metrics { area, resolution_arcsec } => {
            let metrics = pipeline.calculate_terrain_metrics(&area.bounds()?, *resolution_arcsec)?;
            to_json(&metrics, cli.compact)
        }
        Command::Viewshed {
            site,
            target_height,
            azimuth_step,
        } => {
            let request = ViewshedRequest::new(site.lat, site.lon, site.range_km)
                .with_observer_height(site.height)
                .with_target_height(*target_height)
                .with_azimuth_step(*azimuth_step);
            to_json(&calculator.calculate_viewshed(&request)?, cli.compact)
        }
        Command::Horizon { site, azimuth_step } => {
            let mask =
                calculator.calculate_horizon_mask(site.lat, site.lon, site.height, site.range_km, *azimuth_step)?;
            to_json(&mask, cli.compact)
        }
        Command::Profile {
            from,
            to,
            points,
            start_height,
            end_height,
            frequency_mhz,
        } => {
            let mut request = ProfileRequest::new(*from, *to)
                .with_points(*points)
                .with_heights(*start_height, *end_height);
            if let Some(mhz) = frequency_mhz {
                request = request.with_frequency(*mhz);
            }
            to_json(&calculator.calculate_elevation_profile(&request)?, cli.compact)
        }
        Command::Optimize { area, frontier_only } => {
            let optimizer =
                TerrainOptimizer::new(calculator, config.optimizer.clone())?.with_cancel_flag(interrupt_flag()?);
            let result = optimizer.optimize_site_selection(&area.bounds()?, &mut rng)?;
            if *frontier_only {
                to_json(&result.pareto_frontier, cli.compact)
            } else {
                to_json(&result, cli.compact)
            }
        }
        Command::Coverage { area, sites, strategy } => {
            let optimizer =
                TerrainOptimizer::new(calculator, config.optimizer.clone())?.with_cancel_flag(interrupt_flag()?);
            let result = optimizer.optimize_spatial_coverage(&area.bounds()?, *sites, (*strategy).into(), &mut rng)?;
            to_json(&result, cli.compact)
        }
        Command::Hexgrid {
            area,
            resolution,
            rings,
            limit,
        } => {
            let optimizer = TerrainOptimizer::new(calculator, config.optimizer.clone())?;
            let mut cells = cells_for_region(&area.bounds()?, parse_resolution(*resolution)?)?;
            if *rings > 0 {
                cells = expand_cells(&cells, *rings);
            }
            info!(cells = cells.len(), resolution, "Scoring hex cells");
            let mut scored = optimizer.optimize_h3_grid(&cells)?;
            if let Some(limit) = limit {
                scored.truncate(*limit);
            }
            to_json(&scored, cli.compact)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    vantage_metrics::describe_metrics();

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
