//! Coordinate Reference System codes and point transforms.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GeoError, GeoResult};

/// Web Mercator sphere radius (meters).
const WEB_MERCATOR_RADIUS: f64 = 6378137.0;

/// Latitude limit of the Web Mercator square.
const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// CRS codes the pipeline can read, clip in, and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// NAD83 Geographic (TEMPO L3 grids)
    Epsg4269,
    /// Web Mercator (meters)
    Epsg3857,
}

impl CrsCode {
    /// Parse a CRS identifier.
    ///
    /// Accepts "EPSG:4326", "epsg:4269", "CRS:84", "OGC:CRS84" and the
    /// `urn:ogc:def:crs:` forms GeoJSON payloads sometimes carry.
    pub fn from_epsg_string(s: &str) -> GeoResult<Self> {
        let normalized = s.trim().to_uppercase();
        let normalized = normalized
            .strip_prefix("URN:OGC:DEF:CRS:")
            .unwrap_or(&normalized)
            .replace("::", ":");

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" | "OGC:CRS84" | "OGC:1.3:CRS84" => Ok(CrsCode::Epsg4326),
            "EPSG:4269" => Ok(CrsCode::Epsg4269),
            "EPSG:3857" | "EPSG:900913" => Ok(CrsCode::Epsg3857),
            _ => Err(GeoError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Numeric EPSG code.
    pub fn epsg(&self) -> u16 {
        match self {
            CrsCode::Epsg4326 => 4326,
            CrsCode::Epsg4269 => 4269,
            CrsCode::Epsg3857 => 3857,
        }
    }

    /// Check if this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4269)
    }

    /// Transform a point from this CRS into `target`.
    ///
    /// NAD83 and WGS84 are treated as the same frame; their offset over
    /// North America is well below one TEMPO pixel.
    pub fn transform_point_to(&self, target: CrsCode, x: f64, y: f64) -> GeoResult<(f64, f64)> {
        match (self.is_geographic(), target.is_geographic()) {
            (true, true) => Ok((x, y)),
            (false, false) => Ok((x, y)),
            (true, false) => lonlat_to_web_mercator(x, y),
            (false, true) => Ok(web_mercator_to_lonlat(x, y)),
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

fn lonlat_to_web_mercator(lon: f64, lat: f64) -> GeoResult<(f64, f64)> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(GeoError::ProjectionError(format!(
            "non-finite coordinate ({}, {})",
            lon, lat
        )));
    }
    let lat = lat.clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT);
    let x = WEB_MERCATOR_RADIUS * lon.to_radians();
    let y = WEB_MERCATOR_RADIUS * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    Ok((x, y))
}

fn web_mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = (2.0 * (y / WEB_MERCATOR_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}
