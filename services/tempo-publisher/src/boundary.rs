//! One-time boundary fetch.

use std::time::Duration;

use anyhow::{Context, Result};
use raster_pipeline::BoundaryPolygon;
use tracing::info;

/// Load a GeoJSON boundary from an http(s) URL or a local file.
pub async fn load_boundary(source: &str) -> Result<BoundaryPolygon> {
    let text = if source.starts_with("http://") || source.starts_with("https://") {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;
        client
            .get(source)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to fetch boundary from {}", source))?
            .text()
            .await
            .context("Failed to read boundary response")?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read boundary file {}", source))?
    };

    let boundary = BoundaryPolygon::from_geojson_str(&text)
        .with_context(|| format!("Invalid boundary GeoJSON from {}", source))?;

    info!(
        polygons = boundary.polygons().len(),
        bbox = %boundary.bbox(),
        crs = %boundary.crs(),
        "Loaded boundary"
    );
    Ok(boundary)
}
