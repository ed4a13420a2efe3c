//! CoralSurf CLI - per-year coral bleaching surfaces and their time series

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use coralsurf_core::io::read_geotiff;
use coralsurf_core::{distinct_site_names, Field, Surface, CRS};
use coralsurf_parallel::{num_cpus, ProcessingMode};
use coralsurf_pipeline::{
    build_surfaces_with, summarize_store, write_series_csv_file, CancelToken, CsvSampleStore,
    GeoTiffSurfaceStore, PipelineConfig, PointQuery, ResultSeries, SampleStore, SeriesQuery,
    SiteQuery, YearOutcome, YearRange, DEFAULT_MISSING_TOKEN,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "coralsurf")]
#[command(author, version, about = "Coral bleaching surfaces from survey points", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one masked surface per year
    Surfaces {
        /// Observation table (CSV)
        #[arg(short, long)]
        observations: PathBuf,
        /// Output directory for GeoTIFF surfaces
        #[arg(long)]
        out: PathBuf,
        /// YAML configuration; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// First year (inclusive)
        #[arg(long)]
        start: Option<i32>,
        /// Last year (inclusive)
        #[arg(long)]
        end: Option<i32>,
        /// Cell size in map units
        #[arg(long)]
        cell_size: Option<f64>,
        /// Spline smoothing weight (0 = exact)
        #[arg(long)]
        smoothing: Option<f64>,
        /// Physical floor of the surface values
        #[arg(long)]
        lower_bound: Option<f64>,
        /// Field to interpolate: bleaching or thermal_stress
        #[arg(long)]
        field: Option<String>,
        /// EPSG code of the observation coordinates
        #[arg(long)]
        crs: Option<u32>,
        /// Largest grid built for one year
        #[arg(long)]
        max_cells: Option<usize>,
        /// Also write the raw spline and corrected surfaces
        #[arg(long)]
        keep_intermediate: bool,
        /// Worker threads (default: all cores)
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Time series for a named site
    Site {
        /// Observation table (CSV)
        #[arg(short, long)]
        observations: PathBuf,
        /// Directory of surfaces written by `surfaces`
        #[arg(long)]
        surfaces: PathBuf,
        /// Site name
        #[arg(long)]
        site: String,
        /// Buffer radius around the site's observations (0 = the locations themselves)
        #[arg(long)]
        buffer: f64,
        #[arg(long)]
        start: i32,
        #[arg(long)]
        end: i32,
        /// Write the series as CSV
        #[arg(long)]
        output: Option<PathBuf>,
        /// Token written for years without a value
        #[arg(long, default_value = DEFAULT_MISSING_TOKEN)]
        missing: String,
    },
    /// Time series at a coordinate
    Point {
        /// Directory of surfaces written by `surfaces`
        #[arg(long)]
        surfaces: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        /// Spatial reference of the coordinate, e.g. EPSG:4326
        #[arg(long)]
        crs: Option<String>,
        #[arg(long)]
        start: i32,
        #[arg(long)]
        end: i32,
        /// Write the series as CSV
        #[arg(long)]
        output: Option<PathBuf>,
        /// Token written for years without a value
        #[arg(long, default_value = DEFAULT_MISSING_TOKEN)]
        missing: String,
    },
    /// List distinct site names
    Sites {
        /// Observation table (CSV)
        #[arg(short, long)]
        observations: PathBuf,
    },
    /// Show information about a surface file
    Info {
        /// Input GeoTIFF
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn year_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

fn read_observations(path: &PathBuf) -> Result<CsvSampleStore> {
    let pb = spinner("Reading observations...");
    let store = CsvSampleStore::open(path)
        .with_context(|| format!("Failed to read observations from {}", path.display()))?;
    pb.finish_and_clear();
    info!("Observations: {}", store.len());
    Ok(store)
}

fn surface_dir(path: &PathBuf) -> Result<GeoTiffSurfaceStore> {
    if !path.is_dir() {
        bail!("Surface directory not found: {}", path.display());
    }
    Ok(GeoTiffSurfaceStore::open(path))
}

#[allow(clippy::too_many_arguments)]
fn resolve_config(
    config: Option<PathBuf>,
    start: Option<i32>,
    end: Option<i32>,
    cell_size: Option<f64>,
    smoothing: Option<f64>,
    lower_bound: Option<f64>,
    field: Option<String>,
    crs: Option<u32>,
    max_cells: Option<usize>,
    keep_intermediate: bool,
    threads: Option<usize>,
) -> Result<PipelineConfig> {
    let mut cfg = match config {
        Some(path) => PipelineConfig::load(&path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => match (start, end) {
            (Some(start), Some(end)) => PipelineConfig::new(YearRange { start, end }),
            _ => bail!("--start and --end are required without --config"),
        },
    };

    if let Some(start) = start {
        cfg.years.start = start;
    }
    if let Some(end) = end {
        cfg.years.end = end;
    }
    if let Some(v) = cell_size {
        cfg.cell_size = v;
    }
    if let Some(v) = smoothing {
        cfg.smoothing = v;
    }
    if let Some(v) = lower_bound {
        cfg.lower_bound = v;
    }
    if let Some(v) = field {
        cfg.field = v.parse::<Field>()?;
    }
    if crs.is_some() {
        cfg.crs = crs;
    }
    if let Some(v) = max_cells {
        cfg.max_cells = v;
    }
    if keep_intermediate {
        cfg.keep_intermediate = true;
    }
    if threads.is_some() {
        cfg.threads = threads;
    }

    cfg.validate().context("Invalid configuration")?;
    Ok(cfg)
}

fn print_outcome(outcome: &YearOutcome) {
    match outcome {
        YearOutcome::Built {
            year,
            observations,
            valid_cells,
        } => println!("  {}  built    {} observations, {} cells", year, observations, valid_cells),
        YearOutcome::Failed { year, reason, message } => {
            println!("  {}  no data  {} ({})", year, reason, message)
        }
    }
}

fn report_series(title: &str, series: &ResultSeries, output: Option<PathBuf>, missing: &str) -> Result<()> {
    println!("\n{}", title);
    print!("{}", series.to_table(missing));
    if let Some(path) = output {
        write_series_csv_file(series, &path, missing)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Series saved to: {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Surfaces ─────────────────────────────────────────────────
        Commands::Surfaces {
            observations,
            out,
            config,
            start,
            end,
            cell_size,
            smoothing,
            lower_bound,
            field,
            crs,
            max_cells,
            keep_intermediate,
            threads,
        } => {
            let cfg = resolve_config(
                config,
                start,
                end,
                cell_size,
                smoothing,
                lower_bound,
                field,
                crs,
                max_cells,
                keep_intermediate,
                threads,
            )?;
            let samples = read_observations(&observations)?;
            let surfaces = GeoTiffSurfaceStore::create(&out)
                .with_context(|| format!("Failed to create {}", out.display()))?;

            let threads = match cfg.processing_mode() {
                ProcessingMode::Sequential => 1,
                ProcessingMode::Parallel => num_cpus(),
                ProcessingMode::ParallelWith(n) => n,
            };
            info!("Years {} on {} thread(s)", cfg.years, threads);
            let start = Instant::now();
            let pb = year_bar(cfg.years.len());
            let report = build_surfaces_with(&samples, &surfaces, &cfg, &CancelToken::new(), |outcome| {
                pb.set_message(outcome.year().to_string());
                pb.inc(1);
            })
            .context("Failed to build surfaces")?;
            pb.finish_and_clear();

            println!("Surfaces {} ({}):", cfg.years, cfg.field.as_str());
            for outcome in report.outcomes() {
                print_outcome(outcome);
            }
            println!(
                "{} of {} years built, saved to: {}",
                report.built(),
                report.len(),
                out.display()
            );
            println!("  Processing time: {:.2?}", start.elapsed());
        }

        // ── Site ─────────────────────────────────────────────────────
        Commands::Site {
            observations,
            surfaces,
            site,
            buffer,
            start,
            end,
            output,
            missing,
        } => {
            let years = YearRange::new(start, end).context("Invalid year range")?;
            let query = SiteQuery::new(site, buffer).context("Invalid site query")?;
            let samples = read_observations(&observations)?;
            let store = surface_dir(&surfaces)?;

            let site_obs = samples.observations_for_site(&query.name)?;
            if site_obs.is_empty() {
                eprintln!("No observations for site '{}'", query.name);
            }
            let series_query = SeriesQuery::site(&site_obs, &query)?;
            let series = summarize_store(years, &series_query, &store);
            report_series(
                &format!("Value by year (site {}, buffer {})", query.name, query.buffer_radius),
                &series,
                output,
                &missing,
            )?;
        }

        // ── Point ────────────────────────────────────────────────────
        Commands::Point {
            surfaces,
            x,
            y,
            crs,
            start,
            end,
            output,
            missing,
        } => {
            let years = YearRange::new(start, end).context("Invalid year range")?;
            let crs = crs
                .map(|s| s.parse::<CRS>())
                .transpose()
                .context("Invalid --crs")?;
            let query = PointQuery::new(x, y, crs).context("Invalid coordinate")?;
            let store = surface_dir(&surfaces)?;

            let series = summarize_store(years, &SeriesQuery::point(&query)?, &store);
            report_series(&format!("Value by year at ({}, {})", x, y), &series, output, &missing)?;
        }

        // ── Sites ────────────────────────────────────────────────────
        Commands::Sites { observations } => {
            let samples = read_observations(&observations)?;
            let names = distinct_site_names(&samples.all()?);
            for name in &names {
                println!("{}", name);
            }
            info!("{} sites", names.len());
        }

        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let pb = spinner("Reading surface...");
            let raster: Surface = read_geotiff(&input).context("Failed to read raster")?;
            pb.finish_and_clear();

            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }
    }

    Ok(())
}
