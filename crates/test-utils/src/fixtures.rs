//! Common test fixtures: boundary payloads and extents.

/// Common bounding boxes as `(min_x, min_y, max_x, max_y)`.
pub mod bbox {
    /// Default TEMPO read window around Louisiana
    pub const LOUISIANA: (f64, f64, f64, f64) = (-94.043, 28.925, -88.817, 33.019);

    /// TEMPO L3 field of regard (North America)
    pub const TEMPO_DOMAIN: (f64, f64, f64, f64) = (-170.0, 10.0, -10.0, 80.0);

    /// Somewhere over the North Atlantic, far from any test boundary
    pub const OFFSHORE: (f64, f64, f64, f64) = (-40.0, 40.0, -30.0, 45.0);
}

/// Simplified Louisiana outline shaped like a TIGERweb `f=geojson` response.
pub const LOUISIANA_BOUNDARY_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "id": 22,
      "geometry": {
        "type": "Polygon",
        "coordinates": [[
          [-94.043, 33.019], [-91.166, 33.004], [-91.064, 32.470],
          [-91.424, 31.700], [-91.636, 31.000], [-89.733, 31.000],
          [-89.530, 30.180], [-89.390, 30.050], [-88.990, 29.200],
          [-90.000, 28.925], [-91.300, 29.300], [-92.300, 29.550],
          [-93.840, 29.700], [-93.700, 30.300], [-93.530, 31.000],
          [-94.043, 31.990], [-94.043, 33.019]
        ]]
      },
      "properties": {"STATE": "22", "NAME": "Louisiana", "STUSAB": "LA"}
    }
  ]
}"#;

/// 10x10 degree square at the origin with a 2x2 hole in its middle.
pub const SQUARE_WITH_HOLE_GEOJSON: &str = r#"{
  "type": "Polygon",
  "coordinates": [
    [[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]],
    [[4, 4], [6, 4], [6, 6], [4, 6], [4, 4]]
  ]
}"#;

/// GeoJSON Feature holding an axis-aligned rectangle.
pub fn rectangle_geojson(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> String {
    format!(
        r#"{{"type": "Feature", "properties": {{}}, "geometry": {{"type": "Polygon", "coordinates": [[[{min_x}, {min_y}], [{max_x}, {min_y}], [{max_x}, {max_y}], [{min_x}, {max_y}], [{min_x}, {min_y}]]]}}}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_geojson_shape() {
        let json = rectangle_geojson(-1.5, 2.0, 3.0, 4.25);
        assert!(json.starts_with(r#"{"type": "Feature""#));
        assert!(json.contains("[-1.5, 2], [3, 2], [3, 4.25], [-1.5, 4.25], [-1.5, 2]"));
    }

    #[test]
    fn test_louisiana_ring_is_closed() {
        let first = "[-94.043, 33.019]";
        assert_eq!(LOUISIANA_BOUNDARY_GEOJSON.matches(first).count(), 2);
    }
}
