//! Remote tileset service access.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::TilesetServiceConfig;
use crate::error::{PublishError, Result};

/// Status and body of one remote call.
///
/// Non-2xx statuses are ordinary values here; the caller decides whether a
/// 404 or a 429 means failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS.as_u16()
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND.as_u16()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Operations of the remote tileset service used by the publisher.
///
/// Ids are unqualified (`2024-01-15-no2`); implementations add the account.
#[async_trait]
pub trait TilesetApi: Send + Sync {
    /// Existence probe for a tileset.
    async fn get_tileset(&self, tileset_id: &str) -> Result<ApiResponse>;

    /// Upload one GeoTIFF into a tileset source slot.
    async fn upload_source(&self, source_id: &str, data: Bytes) -> Result<ApiResponse>;

    /// Create a tileset from a JSON recipe body.
    async fn create_tileset(&self, tileset_id: &str, body: &Value) -> Result<ApiResponse>;

    /// Start asynchronous processing of a created tileset.
    async fn publish_tileset(&self, tileset_id: &str) -> Result<ApiResponse>;

    /// Status of one processing job.
    async fn get_job(&self, tileset_id: &str, job_id: &str) -> Result<ApiResponse>;

    /// Account that owns the tilesets.
    fn username(&self) -> &str;
}

/// [`TilesetApi`] over HTTPS with a token passed as `access_token`.
pub struct HttpTilesetClient {
    client: Client,
    config: TilesetServiceConfig,
}

impl HttpTilesetClient {
    pub fn new(config: TilesetServiceConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PublishError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn tileset_url(&self, tileset_id: &str) -> String {
        format!(
            "{}/{}.{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.username,
            tileset_id
        )
    }

    fn source_url(&self, source_id: &str) -> String {
        format!(
            "{}/sources/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.username,
            source_id
        )
    }

    /// Authenticate, send and buffer the response body.
    async fn send(&self, request: RequestBuilder) -> Result<ApiResponse> {
        let response = request
            .query(&[("access_token", self.config.access_token.as_str())])
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, body_len = body.len(), "Tileset API response");
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl TilesetApi for HttpTilesetClient {
    #[instrument(skip(self))]
    async fn get_tileset(&self, tileset_id: &str) -> Result<ApiResponse> {
        self.send(self.client.get(self.tileset_url(tileset_id))).await
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn upload_source(&self, source_id: &str, data: Bytes) -> Result<ApiResponse> {
        let length = data.len() as u64;
        let part = multipart::Part::stream_with_length(data, length)
            .file_name("file.tif")
            .mime_str("image/tiff")?;
        let form = multipart::Form::new().part("file", part);

        self.send(self.client.post(self.source_url(source_id)).multipart(form))
            .await
    }

    #[instrument(skip(self, body))]
    async fn create_tileset(&self, tileset_id: &str, body: &Value) -> Result<ApiResponse> {
        self.send(self.client.post(self.tileset_url(tileset_id)).json(body))
            .await
    }

    #[instrument(skip(self))]
    async fn publish_tileset(&self, tileset_id: &str) -> Result<ApiResponse> {
        let url = format!("{}/publish", self.tileset_url(tileset_id));
        self.send(self.client.post(url)).await
    }

    #[instrument(skip(self))]
    async fn get_job(&self, tileset_id: &str, job_id: &str) -> Result<ApiResponse> {
        let url = format!("{}/jobs/{}", self.tileset_url(tileset_id), job_id);
        self.send(self.client.get(url)).await
    }

    fn username(&self) -> &str {
        &self.config.username
    }
}
