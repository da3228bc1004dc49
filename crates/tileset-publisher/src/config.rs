//! Tileset service and polling configuration.

use std::time::Duration;

use crate::error::{PublishError, Result};

/// Public Mapbox Tilesets API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.mapbox.com/tilesets/v1";

/// Connection settings for the remote tileset service.
#[derive(Debug, Clone)]
pub struct TilesetServiceConfig {
    /// API root, without trailing slash.
    pub base_url: String,

    /// Account that owns sources and tilesets.
    pub username: String,

    /// Secret token with tileset read/write scopes.
    pub access_token: String,

    /// Per-request timeout (uploads included).
    pub request_timeout: Duration,
}

impl Default for TilesetServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: String::new(),
            access_token: String::new(),
            request_timeout: Duration::from_secs(300),
        }
    }
}

impl TilesetServiceConfig {
    pub fn new(username: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(PublishError::Config("tileset username is empty".to_string()));
        }
        if self.access_token.trim().is_empty() {
            return Err(PublishError::Config("tileset access token is empty".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(PublishError::Config(format!(
                "base URL '{}' is not an http(s) URL",
                self.base_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(PublishError::Config("request timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Job status polling cadence and bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait between two status queries.
    pub interval: Duration,

    /// Overall wall-clock limit for one job.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(3600),
        }
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(PublishError::Config("poll interval must be positive".to_string()));
        }
        if self.timeout < self.interval {
            return Err(PublishError::Config(format!(
                "poll timeout {:?} is shorter than the interval {:?}",
                self.timeout, self.interval
            )));
        }
        Ok(())
    }
}
