//! Configuration for the raster pipeline.

use geo_common::BoundingBox;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::quantize::QuantizationProfile;
use crate::reduce::ReduceMethod;

/// Default GeoTIFF block edge, in pixels.
pub const DEFAULT_BLOCK_SIZE: u32 = 512;

/// Settings shared read-only by every artifact in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Temporal aggregation.
    pub reduce: ReduceMethod,

    /// Physical → code mapping.
    pub profile: QuantizationProfile,

    /// Square tile edge of the output GeoTIFF.
    pub block_size: u32,

    /// Lon/lat window the cube is cropped to before reduction.
    pub read_window: Option<BoundingBox>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reduce: ReduceMethod::Max,
            profile: QuantizationProfile::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            read_window: Some(BoundingBox::louisiana()),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TEMPO_REDUCE") {
            config.reduce = ReduceMethod::from_str(&val)
                .ok_or_else(|| PipelineError::Config(format!("unknown reduce method '{}'", val)))?;
        }

        if let Ok(val) = std::env::var("TEMPO_PHYSICAL_MAX") {
            config.profile.physical_max = val
                .parse()
                .map_err(|_| PipelineError::Config(format!("invalid TEMPO_PHYSICAL_MAX '{}'", val)))?;
        }

        if let Ok(val) = std::env::var("TEMPO_BLOCK_SIZE") {
            config.block_size = val
                .parse()
                .map_err(|_| PipelineError::Config(format!("invalid TEMPO_BLOCK_SIZE '{}'", val)))?;
        }

        if let Ok(val) = std::env::var("TEMPO_READ_WINDOW") {
            config.read_window = parse_window(&val)?;
        }

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.profile.validate()?;

        if self.block_size == 0 || self.block_size % 16 != 0 {
            return Err(PipelineError::Config(format!(
                "block_size {} must be a positive multiple of 16",
                self.block_size
            )));
        }

        if let Some(window) = &self.read_window {
            if window.width() <= 0.0 || window.height() <= 0.0 {
                return Err(PipelineError::Config(format!(
                    "read window {} has no area",
                    window
                )));
            }
        }

        Ok(())
    }
}

/// `none` disables the window; otherwise `minx,miny,maxx,maxy`.
pub fn parse_window(s: &str) -> Result<Option<BoundingBox>> {
    if s.trim().eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    Ok(Some(BoundingBox::from_list(s)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.block_size, 512);
        assert_eq!(config.read_window, Some(BoundingBox::louisiana()));
    }

    #[test]
    fn test_validate_rejects_bad_block_size() {
        let config = PipelineConfig {
            block_size: 500,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_parse_window() {
        assert_eq!(parse_window("none").unwrap(), None);
        assert_eq!(
            parse_window("-94.043,28.925,-88.817,33.019").unwrap(),
            Some(BoundingBox::louisiana())
        );
        assert!(parse_window("1,2,3").is_err());
    }
}
