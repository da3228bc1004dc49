//! Per-artifact publish state machine.
//!
//! ```text
//! NotStarted → SourceUploaded → TilesetCreated → PublishTriggered → Polling → Published
//!      │                                                              └──→ Failed
//!      └──→ AlreadyPublished
//! ```
//!
//! The existence check is the only recovery mechanism across runs: it detects
//! a fully created tileset, not an orphaned source from an interrupted run.
//! Re-running after such a crash uploads the source again.
//!
//! An upload succeeds only on 200. Create and publish accept 200 or 201.
//! Any other status ends the attempt, apart from a 400 "already exists" on
//! create and the rate limiting handled by [`RetryPolicy`].

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use geo_common::ArtifactId;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::client::{ApiResponse, TilesetApi};
use crate::config::PollConfig;
use crate::error::{PublishError, Result};
use crate::recipe::{Recipe, RecipeConfig};
use crate::retry::RetryPolicy;

/// Remote step an attempt can fail in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStage {
    ExistenceCheck,
    Upload,
    CreateTileset,
    Publish,
    Polling,
}

impl PublishStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStage::ExistenceCheck => "existence_check",
            PublishStage::Upload => "upload",
            PublishStage::CreateTileset => "create_tileset",
            PublishStage::Publish => "publish",
            PublishStage::Polling => "polling",
        }
    }
}

/// Progress of one publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PublishState {
    NotStarted,
    SourceUploaded,
    TilesetCreated,
    PublishTriggered,
    Polling,
    Published,
    AlreadyPublished,
    Failed { stage: PublishStage },
}

impl PublishState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PublishState::Published | PublishState::AlreadyPublished | PublishState::Failed { .. }
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PublishState::Published | PublishState::AlreadyPublished)
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishState::NotStarted => f.write_str("not_started"),
            PublishState::SourceUploaded => f.write_str("source_uploaded"),
            PublishState::TilesetCreated => f.write_str("tileset_created"),
            PublishState::PublishTriggered => f.write_str("publish_triggered"),
            PublishState::Polling => f.write_str("polling"),
            PublishState::Published => f.write_str("published"),
            PublishState::AlreadyPublished => f.write_str("already_published"),
            PublishState::Failed { stage } => write!(f, "failed at {}", stage.as_str()),
        }
    }
}

/// Outcome of one publish attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishReport {
    /// Account-qualified tileset id.
    pub tileset_id: String,
    pub state: PublishState,
    pub job_id: Option<String>,
    /// Status of the response that ended a failed attempt, if any.
    pub status: Option<u16>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl PublishReport {
    fn new(tileset_id: String) -> Self {
        Self {
            tileset_id,
            state: PublishState::NotStarted,
            job_id: None,
            status: None,
            error: None,
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }
}

/// Why a step ended the attempt.
#[derive(Debug)]
struct StepFailure {
    stage: PublishStage,
    status: Option<u16>,
    message: String,
}

impl StepFailure {
    fn response(stage: PublishStage, response: &ApiResponse) -> Self {
        Self {
            stage,
            status: Some(response.status),
            message: format!("HTTP {}: {}", response.status, response.body.trim()),
        }
    }

    fn error(stage: PublishStage, err: PublishError) -> Self {
        Self {
            stage,
            status: None,
            message: err.to_string(),
        }
    }
}

/// Create and publish answer 200 or 201; upload only ever 200.
fn is_accepted(response: &ApiResponse) -> bool {
    matches!(response.status, 200 | 201)
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(rename = "jobId")]
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    stage: String,
}

/// Drives artifacts through the remote tileset lifecycle.
///
/// Holds only immutable configuration; one instance serves many artifacts
/// concurrently.
pub struct Publisher<A> {
    api: A,
    retry: RetryPolicy,
    poll: PollConfig,
    recipe: RecipeConfig,
}

impl<A: TilesetApi> Publisher<A> {
    pub fn new(api: A, retry: RetryPolicy, poll: PollConfig, recipe: RecipeConfig) -> Result<Self> {
        retry.validate()?;
        poll.validate()?;
        recipe.validate()?;
        Ok(Self {
            api,
            retry,
            poll,
            recipe,
        })
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Whether the artifact's tileset already exists remotely.
    ///
    /// Statuses other than 200 and 404 are logged and read as "absent", so a
    /// flaky probe costs a redundant upload rather than a skipped artifact.
    pub async fn check_existing(&self, artifact: &ArtifactId) -> Result<bool> {
        let tileset = artifact.source_id();
        let response = self.api.get_tileset(&tileset).await?;
        match response.status {
            200 => Ok(true),
            404 => Ok(false),
            status => {
                warn!(tileset_id = %tileset, status, "Could not check tileset status, assuming absent");
                Ok(false)
            }
        }
    }

    /// Run one artifact to a terminal state.
    ///
    /// Never returns an error: every failure is captured in the report with
    /// the stage it happened in.
    #[instrument(skip(self, artifact, data), fields(tileset_id = %artifact.tileset_id(self.api.username()), bytes = data.len()))]
    pub async fn publish(&self, artifact: &ArtifactId, data: Bytes) -> PublishReport {
        let start = Instant::now();
        let mut report = PublishReport::new(artifact.tileset_id(self.api.username()));

        let outcome = match self.check_existing(artifact).await {
            Ok(true) => {
                info!("Tileset already exists, skipping");
                report.state = PublishState::AlreadyPublished;
                Ok(())
            }
            Ok(false) => self.run_steps(artifact, data, &mut report).await,
            Err(e) => Err(StepFailure::error(PublishStage::ExistenceCheck, e)),
        };

        if let Err(failure) = outcome {
            warn!(
                stage = failure.stage.as_str(),
                status = ?failure.status,
                error = %failure.message,
                "Publish failed"
            );
            report.state = PublishState::Failed {
                stage: failure.stage,
            };
            report.status = failure.status;
            report.error = Some(failure.message);
        }

        report.duration = start.elapsed();
        report
    }

    async fn run_steps(
        &self,
        artifact: &ArtifactId,
        data: Bytes,
        report: &mut PublishReport,
    ) -> std::result::Result<(), StepFailure> {
        let id = artifact.source_id();

        self.upload(&id, data).await?;
        report.state = PublishState::SourceUploaded;

        self.create(&id, &artifact.display_name()).await?;
        report.state = PublishState::TilesetCreated;

        let job_id = self.trigger(&id).await?;
        report.job_id = Some(job_id.clone());
        report.state = PublishState::PublishTriggered;

        report.state = PublishState::Polling;
        self.poll_job(&id, &job_id).await?;
        report.state = PublishState::Published;

        info!(job_id = %job_id, "Tileset published");
        Ok(())
    }

    async fn upload(&self, source_id: &str, data: Bytes) -> std::result::Result<(), StepFailure> {
        let stage = PublishStage::Upload;
        let response = self
            .retry
            .run(stage.as_str(), || self.api.upload_source(source_id, data.clone()))
            .await
            .map_err(|e| StepFailure::error(stage, e))?;

        if response.status != 200 {
            return Err(StepFailure::response(stage, &response));
        }
        debug!("Uploaded tileset source");
        Ok(())
    }

    async fn create(&self, tileset_id: &str, name: &str) -> std::result::Result<(), StepFailure> {
        let stage = PublishStage::CreateTileset;
        let body = Recipe::new(self.api.username(), tileset_id, name, &self.recipe)
            .to_request_body()
            .map_err(|e| StepFailure::error(stage, e))?;

        let response = self
            .retry
            .run(stage.as_str(), || self.api.create_tileset(tileset_id, &body))
            .await
            .map_err(|e| StepFailure::error(stage, e))?;

        if is_accepted(&response) {
            debug!("Created tileset");
            Ok(())
        } else if response.status == 400 && response.body.contains("already exists") {
            info!("Tileset already exists, continuing");
            Ok(())
        } else {
            Err(StepFailure::response(stage, &response))
        }
    }

    async fn trigger(&self, tileset_id: &str) -> std::result::Result<String, StepFailure> {
        let stage = PublishStage::Publish;
        let response = self
            .retry
            .run(stage.as_str(), || self.api.publish_tileset(tileset_id))
            .await
            .map_err(|e| StepFailure::error(stage, e))?;

        if !is_accepted(&response) {
            return Err(StepFailure::response(stage, &response));
        }
        let accepted: PublishResponse = response
            .json()
            .map_err(|e| StepFailure::error(stage, e))?;
        debug!(job_id = %accepted.job_id, "Publish job accepted");
        Ok(accepted.job_id)
    }

    /// Poll until the job reports `success` or `failed`, or the timeout runs out.
    ///
    /// Rate limiting and server errors while polling are not terminal.
    async fn poll_job(&self, tileset_id: &str, job_id: &str) -> std::result::Result<(), StepFailure> {
        let stage = PublishStage::Polling;
        let deadline = Instant::now() + self.poll.timeout;

        loop {
            let response = self
                .api
                .get_job(tileset_id, job_id)
                .await
                .map_err(|e| StepFailure::error(stage, e))?;

            if response.is_success() {
                let job: JobStatus = response
                    .json()
                    .map_err(|e| StepFailure::error(stage, e))?;
                match job.stage.as_str() {
                    "success" => return Ok(()),
                    "failed" => {
                        return Err(StepFailure {
                            stage,
                            status: Some(response.status),
                            message: format!("job {} failed: {}", job_id, response.body.trim()),
                        })
                    }
                    other => debug!(job_stage = other, "Job still running"),
                }
            } else if response.is_rate_limited() || response.status >= 500 {
                warn!(status = response.status, "Transient job status error");
            } else {
                return Err(StepFailure::response(stage, &response));
            }

            if Instant::now() + self.poll.interval > deadline {
                return Err(StepFailure {
                    stage,
                    status: None,
                    message: format!(
                        "job {} not finished after {}s",
                        job_id,
                        self.poll.timeout.as_secs()
                    ),
                });
            }
            tokio::time::sleep(self.poll.interval).await;
        }
    }
}
