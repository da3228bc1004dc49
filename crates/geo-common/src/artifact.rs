//! Artifact identity: one daily composite, keyed by its date.
//!
//! Every remote name is a pure function of the date, so artifacts processed
//! concurrently never collide in the tileset namespace.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Product suffix used in source/tileset identifiers.
pub const DEFAULT_PRODUCT: &str = "no2";

/// Extract the first `YYYY-MM-DD` date embedded in a file or object name.
pub fn extract_date(name: &str) -> Option<NaiveDate> {
    let bytes = name.as_bytes();
    if bytes.len() < 10 {
        return None;
    }

    (0..=bytes.len() - 10).find_map(|start| {
        let window = &bytes[start..start + 10];
        let shape_ok = window.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
        if !shape_ok {
            return None;
        }
        // window is pure ASCII at this point
        let text = std::str::from_utf8(window).ok()?;
        NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
    })
}

/// Identity of one daily artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactId {
    pub date: NaiveDate,
    pub product: String,
}

impl ArtifactId {
    pub fn new(date: NaiveDate, product: impl Into<String>) -> Self {
        Self {
            date,
            product: product.into(),
        }
    }

    /// Identity for the default product.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::new(date, DEFAULT_PRODUCT)
    }

    /// Build the identity from an object name, if it carries a date.
    pub fn from_name(name: &str, product: &str) -> Option<Self> {
        extract_date(name).map(|date| Self::new(date, product))
    }

    /// Tileset source slot id, e.g. `2024-01-15-no2`.
    pub fn source_id(&self) -> String {
        format!("{}-{}", self.date.format("%Y-%m-%d"), self.product)
    }

    /// Account-qualified tileset id, e.g. `alice.2024-01-15-no2`.
    pub fn tileset_id(&self, username: &str) -> String {
        format!("{}.{}", username, self.source_id())
    }

    /// Human-readable tileset name, e.g. `2024-01-15 NO2`.
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.date.format("%Y-%m-%d"),
            self.product.to_uppercase()
        )
    }

    /// Object name for the encoded GeoTIFF derived from a source file name.
    ///
    /// `tempo_2024-01-15.nc` becomes `2024-01-15_NO2.tif`.
    pub fn output_name(&self, source_name: &str) -> String {
        let file_name = source_name.rsplit('/').next().unwrap_or(source_name);
        let stem = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(file_name);
        let stem = stem.replace("tempo_", "");
        format!("{}_{}.tif", stem, self.product.to_uppercase())
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source_id())
    }
}
