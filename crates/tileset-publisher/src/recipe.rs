//! Raster-array tileset recipe.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{PublishError, Result};

/// Rendering parameters applied to every tileset of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeConfig {
    pub minzoom: u8,
    pub maxzoom: u8,
    pub layer_name: String,
    pub tilesize: u32,
    pub resampling: String,
    pub buffer: u32,
    pub units: String,
    /// 1-based source band exposed by the layer.
    pub band: u32,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            minzoom: 3,
            maxzoom: 5,
            layer_name: "no2".to_string(),
            tilesize: 256,
            resampling: "nearest".to_string(),
            buffer: 1,
            units: "molecules/cm^2".to_string(),
            band: 1,
        }
    }
}

impl RecipeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.minzoom > self.maxzoom {
            return Err(PublishError::Config(format!(
                "minzoom {} exceeds maxzoom {}",
                self.minzoom, self.maxzoom
            )));
        }
        if self.maxzoom > 22 {
            return Err(PublishError::Config(format!("maxzoom {} > 22", self.maxzoom)));
        }
        if !matches!(self.tilesize, 256 | 512) {
            return Err(PublishError::Config(format!(
                "tilesize {} must be 256 or 512",
                self.tilesize
            )));
        }
        if self.layer_name.is_empty() {
            return Err(PublishError::Config("layer name is empty".to_string()));
        }
        if self.band == 0 {
            return Err(PublishError::Config("band index is 1-based".to_string()));
        }
        Ok(())
    }
}

/// Request body for tileset creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub recipe: RecipeBody,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeBody {
    pub version: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub sources: Vec<RecipeSource>,
    pub minzoom: u8,
    pub maxzoom: u8,
    pub layers: BTreeMap<String, LayerRecipe>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeSource {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerRecipe {
    pub tilesize: u32,
    pub resampling: String,
    pub buffer: u32,
    pub units: String,
    pub source_rules: SourceRules,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRules {
    pub filter: Value,
}

impl Recipe {
    /// Recipe reading `source_id` from the account's source namespace.
    pub fn new(username: &str, source_id: &str, name: &str, config: &RecipeConfig) -> Self {
        let layer = LayerRecipe {
            tilesize: config.tilesize,
            resampling: config.resampling.clone(),
            buffer: config.buffer,
            units: config.units.clone(),
            source_rules: SourceRules {
                filter: json!(["all", ["in", ["bandindex"], ["literal", [config.band]]]]),
            },
        };

        Self {
            recipe: RecipeBody {
                version: 1,
                kind: "rasterarray".to_string(),
                sources: vec![RecipeSource {
                    uri: format!("mapbox://tileset-source/{}/{}", username, source_id),
                }],
                minzoom: config.minzoom,
                maxzoom: config.maxzoom,
                layers: BTreeMap::from([(config.layer_name.clone(), layer)]),
            },
            name: name.to_string(),
        }
    }

    pub fn to_request_body(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| PublishError::Config(format!("unserializable recipe: {}", e)))
    }
}
