//cargo run --bin marigold --release -- solve --config config/marigold.ron --facilities sites.geojson --demand voters.geojson --boundary county.geojson --network roads.geojson --output out

use anyhow::{Context, Result};
use clap::Parser;
use precinct::PipelineConfig;
use precinct::config::Connectivity;
use precinct::features::{FeatureSink, GeoJsonSink, GeoJsonSource};
use precinct::pipeline::{Pipeline, PipelineInputs};
use std::path::{Path, PathBuf};
use tracing::info;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RON pipeline configuration. Falls back to MARIGOLD_CONFIG, then to the
    /// built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Select polling places and write precincts.
    Solve {
        #[arg(long)]
        facilities: PathBuf,
        #[arg(long)]
        demand: PathBuf,
        #[arg(long)]
        boundary: PathBuf,
        #[arg(long)]
        network: PathBuf,
        /// Directory for the GeoJSON layers and run summary.
        #[arg(long, default_value = "output")]
        output: PathBuf,
        #[arg(long)]
        cutoff: Option<f64>,
        #[arg(long)]
        cell_size: Option<f64>,
        #[arg(long)]
        simplify: Option<f64>,
        /// Group diagonal raster cells into one precinct.
        #[arg(long)]
        eight_connected: bool,
    },
    /// Print the effective configuration.
    ShowConfig,
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("MARIGOLD_CONFIG").map(PathBuf::from));

    match path {
        Some(path) => PipelineConfig::load(&path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::ShowConfig => {
            let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default())
                .context("serialising configuration")?;
            println!("{}", text);
        }
        Commands::Solve {
            facilities,
            demand,
            boundary,
            network,
            output,
            cutoff,
            cell_size,
            simplify,
            eight_connected,
        } => {
            if let Some(cutoff) = cutoff {
                config.impedance_cutoff = cutoff;
            }
            if let Some(cell_size) = cell_size {
                config.cell_size = cell_size;
            }
            if let Some(tolerance) = simplify {
                config.simplification_tolerance = tolerance;
            }
            if eight_connected {
                config.connectivity = Connectivity::Eight;
            }

            let pipeline = Pipeline::new(config).context("invalid configuration")?;
            let source = GeoJsonSource {
                facilities,
                demand,
                boundary,
                network,
            };
            let inputs = PipelineInputs::from_source(&source).context("reading inputs")?;
            let result = pipeline.run(inputs).context("running pipeline")?;

            let mut sink = GeoJsonSink::new(&output);
            sink.write(&result)
                .with_context(|| format!("writing results to {}", output.display()))?;

            let summary = result.summary();
            info!(
                "{} of {} facilities selected; {} demand points assigned, {} unassigned",
                summary.selected_facilities,
                summary.candidate_facilities,
                summary.assigned_demand,
                summary.unassigned_demand
            );
        }
    }

    Ok(())
}
