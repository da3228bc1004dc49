//! TEMPO NO2 tileset publisher.
//!
//! Turns daily TEMPO L3 NetCDF granules into clipped 8-bit GeoTIFFs and
//! publishes each one as a hosted raster-array tileset. Re-running over the
//! same dates is safe: existing tilesets are skipped.

mod boundary;
mod config;
mod run;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use geo_common::CrsCode;
use netcdf_parser::{ReaderConfig, DEFAULT_VARIABLE};
use raster_pipeline::{PipelineConfig, RasterPipeline};
use storage::{ObjectFilter, ObjectStorage, ObjectStorageConfig};
use tileset_publisher::{
    HttpTilesetClient, PollConfig, Publisher, RecipeConfig, RetryPolicy, TilesetServiceConfig,
    DEFAULT_BASE_URL,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::{RunSettings, LOUISIANA_BOUNDARY_URL};
use run::{GranuleEncoder, Runner};

#[derive(Parser, Debug)]
#[command(name = "tempo-publisher")]
#[command(about = "Publish daily TEMPO NO2 composites as raster tilesets")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Storage bucket holding granules and GeoTIFFs
    #[arg(long, env = "GCS_BUCKET", global = true)]
    bucket: Option<String>,

    /// Local directory used instead of a bucket
    #[arg(long, env = "TEMPO_DATA_DIR", global = true, conflicts_with = "bucket")]
    data_dir: Option<PathBuf>,

    /// Prefix of source NetCDF granules
    #[arg(long, env = "GCS_BLOB_PREFIX", default_value = "", global = true)]
    input_prefix: String,

    /// Prefix of encoded GeoTIFFs
    #[arg(long, env = "GCS_BLOB_OUTPUT_PREFIX", default_value = "cogs", global = true)]
    output_prefix: String,

    /// Only dates on or after this day (YYYY-MM-DD)
    #[arg(long, global = true)]
    from: Option<NaiveDate>,

    /// Only dates on or before this day (YYYY-MM-DD)
    #[arg(long, global = true)]
    to: Option<NaiveDate>,

    /// Maximum number of artifacts in this run
    #[arg(long, global = true)]
    limit: Option<usize>,

    /// Artifacts processed concurrently
    #[arg(long, default_value = "4", global = true)]
    concurrency: usize,

    /// Tileset account
    #[arg(long, env = "MAPBOX_USERNAME", global = true)]
    mapbox_username: Option<String>,

    /// Tileset access token
    #[arg(long, env = "MAPBOX_TOKEN", hide_env_values = true, global = true)]
    mapbox_token: Option<String>,

    /// Tilesets API root
    #[arg(long, env = "MAPBOX_API_URL", default_value = DEFAULT_BASE_URL, global = true)]
    mapbox_api_url: String,

    /// Seconds between job status checks
    #[arg(long, default_value = "10", global = true)]
    poll_interval_secs: u64,

    /// Give up on a publish job after this many seconds
    #[arg(long, default_value = "3600", global = true)]
    poll_timeout_secs: u64,

    /// Retries of rate-limited requests
    #[arg(long, default_value = "5", global = true)]
    max_retries: u32,

    /// Exit non-zero when any artifact fails
    #[arg(long, global = true)]
    fail_on_error: bool,

    /// Expose Prometheus metrics on this port
    #[arg(long, env = "METRICS_PORT", global = true)]
    metrics_port: Option<u16>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "json", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// NetCDF granules to GeoTIFFs, then publish
    Process {
        /// Boundary GeoJSON (URL or file) the composite is clipped to
        #[arg(long, env = "TEMPO_BOUNDARY", default_value = LOUISIANA_BOUNDARY_URL)]
        boundary: String,

        /// Data variable, optionally inside one group
        #[arg(long, env = "TEMPO_VARIABLE", default_value = DEFAULT_VARIABLE)]
        variable: String,

        /// CRS assigned to the granule grid
        #[arg(long, default_value = "EPSG:4269")]
        crs: String,

        /// Write GeoTIFFs only
        #[arg(long)]
        skip_publish: bool,
    },

    /// Publish GeoTIFFs already under the output prefix
    Publish,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format)?;

    if let Some(port) = args.metrics_port {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(port, "Prometheus metrics exporter initialized");
    }

    info!("Starting TEMPO tileset publisher");

    let storage = ObjectStorage::new(&storage_config(&args)?)?;
    let settings = RunSettings {
        input_prefix: args.input_prefix.clone(),
        output_prefix: args.output_prefix.clone(),
        filter: ObjectFilter {
            from: args.from,
            to: args.to,
            limit: args.limit,
            ..Default::default()
        },
        concurrency: args.concurrency,
    };
    settings.validate()?;

    let summary = match &args.command {
        Command::Process {
            boundary,
            variable,
            crs,
            skip_publish,
        } => {
            netcdf_parser::silence_hdf5_errors();

            let reader = ReaderConfig {
                variable: variable.clone(),
                crs: CrsCode::from_epsg_string(crs)
                    .with_context(|| format!("Unsupported CRS {}", crs))?,
                ..Default::default()
            };
            reader.validate()?;
            let pipeline_config = PipelineConfig::from_env()?;
            info!(config = ?pipeline_config, "Pipeline configuration");
            let pipeline = RasterPipeline::new(pipeline_config, boundary::load_boundary(boundary).await?)?;

            let publisher = if *skip_publish {
                None
            } else {
                Some(build_publisher(&args)?)
            };
            Runner::new(storage, publisher, settings)
                .run_process(&GranuleEncoder::new(pipeline, reader))
                .await?
        }
        Command::Publish => {
            Runner::new(storage, Some(build_publisher(&args)?), settings)
                .run_publish()
                .await?
        }
    };

    summary.log();
    if args.fail_on_error && summary.has_failures() {
        bail!("{} of {} artifacts failed", summary.failed, summary.total);
    }
    Ok(())
}

fn init_tracing(log_level: &str, format: LogFormat) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);

    match format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }
    Ok(())
}

fn storage_config(args: &Args) -> Result<ObjectStorageConfig> {
    match (&args.bucket, &args.data_dir) {
        (Some(bucket), _) if bucket.contains("://") => Ok(ObjectStorageConfig::parse(bucket)?),
        (Some(bucket), _) => Ok(ObjectStorageConfig::Gcs {
            bucket: bucket.clone(),
        }),
        (None, Some(dir)) => Ok(ObjectStorageConfig::Local { root: dir.clone() }),
        (None, None) => bail!("set --bucket (GCS_BUCKET) or --data-dir (TEMPO_DATA_DIR)"),
    }
}

fn build_publisher(args: &Args) -> Result<Publisher<HttpTilesetClient>> {
    let (Some(username), Some(token)) = (&args.mapbox_username, &args.mapbox_token) else {
        bail!("publishing needs MAPBOX_USERNAME and MAPBOX_TOKEN (or --skip-publish)");
    };

    let client = HttpTilesetClient::new(TilesetServiceConfig {
        base_url: args.mapbox_api_url.clone(),
        ..TilesetServiceConfig::new(username.clone(), token.clone())
    })?;
    let retry = RetryPolicy {
        max_retries: args.max_retries,
        ..Default::default()
    };
    let poll = PollConfig {
        interval: Duration::from_secs(args.poll_interval_secs),
        timeout: Duration::from_secs(args.poll_timeout_secs),
    };

    Ok(Publisher::new(client, retry, poll, RecipeConfig::default())?)
}
