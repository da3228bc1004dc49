//! Clip boundary polygons loaded from GeoJSON.
//!
//! Accepts a `FeatureCollection`, a single `Feature`, or a bare `Polygon` /
//! `MultiPolygon` / `GeometryCollection` geometry, which covers the payloads
//! returned by ArcGIS REST `f=geojson` queries (e.g. TIGERweb state shapes).
//! Non-areal geometries are ignored.

use geo_common::{BoundingBox, CrsCode};
use serde_json::Value;

use crate::error::{PipelineError, Result};

/// Closed ring of `(x, y)` vertices.
pub type Ring = Vec<(f64, f64)>;

/// One or more polygons (exterior ring followed by holes) in a single CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryPolygon {
    polygons: Vec<Vec<Ring>>,
    crs: CrsCode,
    bbox: BoundingBox,
}

impl BoundaryPolygon {
    /// Build from polygons given as ring lists.
    pub fn new(polygons: Vec<Vec<Ring>>, crs: CrsCode) -> Result<Self> {
        let polygons: Vec<Vec<Ring>> = polygons
            .into_iter()
            .map(|rings| rings.into_iter().filter(|r| r.len() >= 3).collect::<Vec<_>>())
            .filter(|rings: &Vec<Ring>| !rings.is_empty())
            .collect();

        let bbox = BoundingBox::from_points(
            polygons
                .iter()
                .flat_map(|p| p.iter())
                .flat_map(|r| r.iter().copied()),
        )
        .ok_or_else(|| PipelineError::invalid_boundary("no polygon with at least 3 vertices"))?;

        Ok(Self {
            polygons,
            crs,
            bbox,
        })
    }

    pub fn from_geojson_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_geojson_value(&value)
    }

    pub fn from_geojson_value(value: &Value) -> Result<Self> {
        // RFC 7946 GeoJSON is always lon/lat WGS84; legacy payloads name a CRS.
        let crs = match value.pointer("/crs/properties/name").and_then(Value::as_str) {
            Some(name) => CrsCode::from_epsg_string(name)?,
            None => CrsCode::Epsg4326,
        };

        let mut polygons = Vec::new();
        collect_polygons(value, &mut polygons)?;
        Self::new(polygons, crs)
    }

    pub fn polygons(&self) -> &[Vec<Ring>] {
        &self.polygons
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    /// Extent of all vertices, in the boundary's CRS.
    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Even-odd point-in-polygon test over every ring.
    ///
    /// Holes and overlapping parts of a multipolygon cancel out the same way
    /// a rasterizer's even-odd fill does.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if !self.bbox.contains_point(x, y) {
            return false;
        }
        let mut inside = false;
        for ring in self.polygons.iter().flatten() {
            if ring_crossings_odd(ring, x, y) {
                inside = !inside;
            }
        }
        inside
    }

    /// Reproject every vertex into `target`.
    pub fn transform_to(&self, target: CrsCode) -> Result<BoundaryPolygon> {
        if self.crs == target
            || (self.crs.is_geographic() && target.is_geographic())
        {
            return Ok(BoundaryPolygon {
                crs: target,
                ..self.clone()
            });
        }

        let polygons = self
            .polygons
            .iter()
            .map(|rings| {
                rings
                    .iter()
                    .map(|ring| {
                        ring.iter()
                            .map(|&(x, y)| self.crs.transform_point_to(target, x, y))
                            .collect::<geo_common::GeoResult<Ring>>()
                    })
                    .collect::<geo_common::GeoResult<Vec<Ring>>>()
            })
            .collect::<geo_common::GeoResult<Vec<_>>>()?;

        BoundaryPolygon::new(polygons, target)
    }
}

/// Ray cast to +x; true when the ray crosses the ring an odd number of times.
#[inline]
pub(crate) fn ring_crossings_odd(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    let mut odd = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            odd = !odd;
        }
        j = i;
    }
    odd
}

fn collect_polygons(value: &Value, out: &mut Vec<Vec<Ring>>) -> Result<()> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| PipelineError::invalid_boundary("missing GeoJSON \"type\""))?;

    match kind {
        "FeatureCollection" => {
            let features = value
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| PipelineError::invalid_boundary("FeatureCollection without features"))?;
            for feature in features {
                collect_polygons(feature, out)?;
            }
        }
        "Feature" => {
            if let Some(geometry) = value.get("geometry").filter(|g| !g.is_null()) {
                collect_polygons(geometry, out)?;
            }
        }
        "GeometryCollection" => {
            let geometries = value
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| PipelineError::invalid_boundary("GeometryCollection without geometries"))?;
            for geometry in geometries {
                collect_polygons(geometry, out)?;
            }
        }
        "Polygon" => {
            let coords: Vec<Vec<Vec<f64>>> = coordinates(value)?;
            out.push(to_rings(coords)?);
        }
        "MultiPolygon" => {
            let coords: Vec<Vec<Vec<Vec<f64>>>> = coordinates(value)?;
            for polygon in coords {
                out.push(to_rings(polygon)?);
            }
        }
        // Points and lines carry no area.
        _ => {}
    }
    Ok(())
}

fn coordinates<T: serde::de::DeserializeOwned>(geometry: &Value) -> Result<T> {
    let coords = geometry
        .get("coordinates")
        .ok_or_else(|| PipelineError::invalid_boundary("geometry without coordinates"))?;
    Ok(T::deserialize(coords)?)
}

fn to_rings(coords: Vec<Vec<Vec<f64>>>) -> Result<Vec<Ring>> {
    coords
        .into_iter()
        .map(|ring| {
            ring.into_iter()
                .map(|pos| match pos.as_slice() {
                    [x, y, ..] => Ok((*x, *y)),
                    _ => Err(PipelineError::invalid_boundary(format!(
                        "position with {} ordinates",
                        pos.len()
                    ))),
                })
                .collect()
        })
        .collect()
}
