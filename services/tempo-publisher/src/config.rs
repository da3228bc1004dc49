//! Run-level settings shared by every artifact.

use anyhow::{bail, Result};
use storage::ObjectFilter;

/// Louisiana state outline from the Census TIGERweb service, in EPSG:4326.
pub const LOUISIANA_BOUNDARY_URL: &str = "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/State_County/MapServer/0/query?where=NAME='Louisiana'&outFields=*&outSR=4326&f=geojson";

/// Where artifacts come from and go to, and how many run at once.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Prefix holding source granules (`process`).
    pub input_prefix: String,

    /// Prefix holding encoded GeoTIFFs (written by `process`, read by `publish`).
    pub output_prefix: String,

    /// Selection applied to listed objects; the suffix is set per mode.
    pub filter: ObjectFilter,

    /// Artifacts in flight at once.
    pub concurrency: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            input_prefix: String::new(),
            output_prefix: "cogs".to_string(),
            filter: ObjectFilter::default(),
            concurrency: 4,
        }
    }
}

impl RunSettings {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if let (Some(from), Some(to)) = (self.filter.from, self.filter.to) {
            if from > to {
                bail!("--from {} is after --to {}", from, to);
            }
        }
        if self.filter.limit == Some(0) {
            bail!("--limit must be at least 1");
        }
        Ok(())
    }

    /// Object name for an encoded raster under the output prefix.
    pub fn output_path(&self, file_name: &str) -> String {
        let prefix = self.output_prefix.trim_matches('/');
        if prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", prefix, file_name)
        }
    }
}
