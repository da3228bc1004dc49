//! Per-artifact processing and publishing with bounded concurrency.
//!
//! Every listed object becomes one [`ArtifactReport`]; a failure in one
//! artifact is recorded and never stops the others.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use geo_common::{ArtifactId, DEFAULT_PRODUCT};
use netcdf_parser::{read_cube_from_bytes, ReaderConfig};
use raster_pipeline::{RasterCube, RasterPipeline, TileStatistics};
use serde::Serialize;
use storage::{ObjectInfo, ObjectStorage};
use tileset_publisher::{PublishReport, PublishState, Publisher, TilesetApi};
use tracing::{error, info, instrument, warn};

use crate::config::RunSettings;

/// Final disposition of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Published,
    AlreadyPublished,
    /// Encoded and stored; publishing disabled.
    Encoded,
    /// No date in the object name.
    Skipped,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Published => "published",
            Outcome::AlreadyPublished => "already_published",
            Outcome::Encoded => "encoded",
            Outcome::Skipped => "skipped",
            Outcome::Failed => "failed",
        }
    }
}

/// What happened to one source object.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactReport {
    pub source: String,
    pub date: Option<NaiveDate>,
    pub outcome: Outcome,
    /// Stage that decided a `Failed` or `Skipped` outcome.
    pub stage: Option<String>,
    pub error: Option<String>,
    pub output: Option<String>,
    pub valid_pixels: Option<usize>,
    pub publish: Option<PublishReport>,
}

impl ArtifactReport {
    fn new(source: &str, date: Option<NaiveDate>, outcome: Outcome) -> Self {
        Self {
            source: source.to_string(),
            date,
            outcome,
            stage: None,
            error: None,
            output: None,
            valid_pixels: None,
            publish: None,
        }
    }

    fn failed(source: &str, date: Option<NaiveDate>, stage: &str, error: impl ToString) -> Self {
        Self {
            stage: Some(stage.to_string()),
            error: Some(error.to_string()),
            ..Self::new(source, date, Outcome::Failed)
        }
    }

    fn with_publish(mut self, report: PublishReport) -> Self {
        self.outcome = match report.state {
            PublishState::Published => Outcome::Published,
            PublishState::AlreadyPublished => Outcome::AlreadyPublished,
            PublishState::Failed { stage } => {
                self.stage = Some(stage.as_str().to_string());
                self.error = report.error.clone();
                Outcome::Failed
            }
            _ => Outcome::Failed,
        };
        self.publish = Some(report);
        self
    }
}

/// Totals over a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub published: usize,
    pub already_published: usize,
    pub encoded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub reports: Vec<ArtifactReport>,
}

impl RunSummary {
    pub fn from_reports(mut reports: Vec<ArtifactReport>) -> Self {
        reports.sort_by(|a, b| a.source.cmp(&b.source));
        let count = |o: Outcome| reports.iter().filter(|r| r.outcome == o).count();
        Self {
            total: reports.len(),
            published: count(Outcome::Published),
            already_published: count(Outcome::AlreadyPublished),
            encoded: count(Outcome::Encoded),
            skipped: count(Outcome::Skipped),
            failed: count(Outcome::Failed),
            reports,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn log(&self) {
        for report in self.reports.iter().filter(|r| r.outcome == Outcome::Failed) {
            error!(
                source = %report.source,
                stage = report.stage.as_deref().unwrap_or("unknown"),
                error = report.error.as_deref().unwrap_or(""),
                "Artifact failed"
            );
        }
        info!(
            total = self.total,
            published = self.published,
            already_published = self.already_published,
            encoded = self.encoded,
            skipped = self.skipped,
            failed = self.failed,
            "Run complete"
        );
    }
}

fn record_outcome(report: &ArtifactReport) {
    metrics::counter!("tempo_artifacts_total", "outcome" => report.outcome.as_str()).increment(1);
}

/// Granule → GeoTIFF conversion settings.
#[derive(Clone)]
pub struct GranuleEncoder {
    pipeline: Arc<RasterPipeline>,
    reader: ReaderConfig,
}

impl GranuleEncoder {
    pub fn new(pipeline: RasterPipeline, reader: ReaderConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            reader,
        }
    }

    /// Read, transform and serialize one granule on the blocking pool.
    ///
    /// Errors carry the name of the stage that failed.
    async fn encode(&self, data: Bytes) -> Result<(Vec<u8>, TileStatistics), (&'static str, String)> {
        let encoder = self.clone();
        tokio::task::spawn_blocking(move || encoder.encode_blocking(&data))
            .await
            .map_err(|e| ("encode", e.to_string()))?
    }

    fn encode_blocking(&self, data: &[u8]) -> Result<(Vec<u8>, TileStatistics), (&'static str, String)> {
        let window = self.pipeline.config().read_window;
        let grid = read_cube_from_bytes(data, &self.reader, window.as_ref())
            .map_err(|e| ("read", e.to_string()))?;
        let cube = RasterCube::new(grid.planes, grid.width, grid.height, grid.georef, grid.nodata)
            .map_err(|e| ("read", e.to_string()))?;

        let tile = self
            .pipeline
            .run(&cube)
            .map_err(|e| (e.stage.as_str(), e.error.to_string()))?;
        let stats = tile.statistics();
        let bytes = tile
            .to_geotiff_bytes()
            .map_err(|e| ("encode", e.to_string()))?;
        Ok((bytes, stats))
    }
}

/// Shared, read-only state of one run.
pub struct Runner<A> {
    storage: ObjectStorage,
    publisher: Option<Publisher<A>>,
    settings: RunSettings,
}

impl<A: TilesetApi> Runner<A> {
    /// `publisher` is `None` when only GeoTIFFs should be produced.
    pub fn new(storage: ObjectStorage, publisher: Option<Publisher<A>>, settings: RunSettings) -> Self {
        Self {
            storage,
            publisher,
            settings,
        }
    }

    /// NetCDF granules → GeoTIFFs in storage → tilesets.
    pub async fn run_process(&self, encoder: &GranuleEncoder) -> anyhow::Result<RunSummary> {
        let mut filter = self.settings.filter.clone();
        filter.suffix = Some(".nc".to_string());
        let objects = self.storage.list(&self.settings.input_prefix, &filter).await?;
        info!(count = objects.len(), prefix = %self.settings.input_prefix, "Processing granules");

        let reports = stream::iter(objects)
            .map(|object| self.process_one(encoder, object))
            .buffer_unordered(self.settings.concurrency)
            .inspect(record_outcome)
            .collect::<Vec<_>>()
            .await;

        Ok(RunSummary::from_reports(reports))
    }

    /// Already-encoded GeoTIFFs in storage → tilesets.
    pub async fn run_publish(&self) -> anyhow::Result<RunSummary> {
        if self.publisher.is_none() {
            anyhow::bail!("publish mode needs tileset service credentials");
        }

        let mut filter = self.settings.filter.clone();
        filter.suffix = Some(".tif".to_string());
        let objects = self.storage.list(&self.settings.output_prefix, &filter).await?;
        info!(count = objects.len(), prefix = %self.settings.output_prefix, "Publishing rasters");

        let reports = stream::iter(objects)
            .map(|object| self.publish_one(object))
            .buffer_unordered(self.settings.concurrency)
            .inspect(record_outcome)
            .collect::<Vec<_>>()
            .await;

        Ok(RunSummary::from_reports(reports))
    }

    #[instrument(skip(self, encoder, object), fields(source = %object.path))]
    async fn process_one(&self, encoder: &GranuleEncoder, object: ObjectInfo) -> ArtifactReport {
        let start = Instant::now();
        let source = object.path.as_str();
        let Some(artifact) = ArtifactId::from_name(object.file_name(), DEFAULT_PRODUCT) else {
            warn!("Could not extract date, skipping");
            return ArtifactReport {
                stage: Some("date".to_string()),
                ..ArtifactReport::new(source, None, Outcome::Skipped)
            };
        };
        let date = Some(artifact.date);

        if let Some(publisher) = &self.publisher {
            match publisher.check_existing(&artifact).await {
                Ok(true) => {
                    info!(artifact = %artifact, "Tileset already exists, skipping");
                    return ArtifactReport::new(source, date, Outcome::AlreadyPublished);
                }
                Ok(false) => {}
                Err(e) => return ArtifactReport::failed(source, date, "existence_check", e),
            }
        }

        let data = match self.storage.get(source).await {
            Ok(data) => data,
            Err(e) => return ArtifactReport::failed(source, date, "fetch", e),
        };

        let (tiff, stats) = match encoder.encode(data).await {
            Ok(result) => result,
            Err((stage, message)) => return ArtifactReport::failed(source, date, stage, message),
        };

        let output = self.settings.output_path(&artifact.output_name(object.file_name()));
        let tiff = Bytes::from(tiff);
        if let Err(e) = self.storage.put(&output, tiff.clone()).await {
            return ArtifactReport::failed(source, date, "store", e);
        }
        info!(
            output = %output,
            bytes = tiff.len(),
            valid_pixels = stats.valid_pixels,
            max_value = ?stats.max_value,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Stored GeoTIFF"
        );

        let report = ArtifactReport {
            output: Some(output),
            valid_pixels: Some(stats.valid_pixels),
            ..ArtifactReport::new(source, date, Outcome::Encoded)
        };
        match &self.publisher {
            Some(publisher) => report.with_publish(publisher.publish(&artifact, tiff).await),
            None => report,
        }
    }

    #[instrument(skip(self, object), fields(source = %object.path))]
    async fn publish_one(&self, object: ObjectInfo) -> ArtifactReport {
        let source = object.path.as_str();
        let Some(publisher) = &self.publisher else {
            return ArtifactReport::failed(source, None, "publish", "publishing disabled");
        };
        let Some(artifact) = ArtifactId::from_name(object.file_name(), DEFAULT_PRODUCT) else {
            warn!("Could not extract date, skipping");
            return ArtifactReport {
                stage: Some("date".to_string()),
                ..ArtifactReport::new(source, None, Outcome::Skipped)
            };
        };
        let date = Some(artifact.date);

        match publisher.check_existing(&artifact).await {
            Ok(true) => {
                info!(artifact = %artifact, "Tileset already exists, skipping");
                return ArtifactReport::new(source, date, Outcome::AlreadyPublished);
            }
            Ok(false) => {}
            Err(e) => return ArtifactReport::failed(source, date, "existence_check", e),
        }

        let data = match self.storage.get(source).await {
            Ok(data) => data,
            Err(e) => return ArtifactReport::failed(source, date, "fetch", e),
        };

        ArtifactReport::new(source, date, Outcome::Encoded)
            .with_publish(publisher.publish(&artifact, data).await)
    }
}
