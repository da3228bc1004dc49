//! Tests combining bounding boxes, CRS transforms and geotransforms.

use geo_common::{ArtifactId, BoundingBox, CrsCode, GeoTransform};

// ============================================================================
// Bounding boxes against grid footprints
// ============================================================================

#[test]
fn test_tempo_grid_extent_covers_louisiana() {
    // 0.02 degree cells, 400 x 300 from the Gulf coast north
    let transform = GeoTransform::north_up(-96.0, 35.0, 0.02, 0.02);
    let extent = transform.extent(400, 300);

    assert!((extent.min_x - -96.0).abs() < 1e-9);
    assert!((extent.max_x - -88.0).abs() < 1e-9);
    assert!((extent.min_y - 29.0).abs() < 1e-9);

    let window = BoundingBox::louisiana();
    assert!(extent.intersects(&window));
    let overlap = extent.intersection(&window).unwrap();
    assert_eq!(overlap.min_x, window.min_x);
    assert_eq!(overlap.max_x, window.max_x);
    assert!((overlap.min_y - 29.0).abs() < 1e-9);
}

#[test]
fn test_disjoint_extent_has_no_intersection() {
    let transform = GeoTransform::north_up(-40.0, 45.0, 0.02, 0.02);
    let extent = transform.extent(100, 100);
    assert!(!extent.intersects(&BoundingBox::louisiana()));
    assert!(extent.intersection(&BoundingBox::louisiana()).is_none());
}

#[test]
fn test_inverse_maps_pixel_centers_back() {
    let transform = GeoTransform::north_up(-94.0, 33.0, 0.02, 0.02);
    let inverse = transform.inverse().unwrap();

    let (x, y) = transform.pixel_center(17, 42);
    let (col, row) = inverse.apply(x, y);
    assert!((col - 17.5).abs() < 1e-6);
    assert!((row - 42.5).abs() < 1e-6);
}

#[test]
fn test_gdal_coefficients_round_trip() {
    let coeffs = [-94.0, 0.02, 0.0, 33.0, 0.0, -0.02];
    let transform = GeoTransform::from_gdal(coeffs);
    assert!(transform.is_north_up());
    assert_eq!(transform.to_gdal(), coeffs);
}

// ============================================================================
// CRS transforms
// ============================================================================

#[test]
fn test_nad83_and_wgs84_are_interchangeable() {
    let (x, y) = CrsCode::Epsg4269
        .transform_point_to(CrsCode::Epsg4326, -91.15, 30.45)
        .unwrap();
    assert_eq!((x, y), (-91.15, 30.45));
}

#[test]
fn test_web_mercator_round_trip() {
    let (x, y) = CrsCode::Epsg4326
        .transform_point_to(CrsCode::Epsg3857, -91.15, 30.45)
        .unwrap();
    assert!(x < -10_000_000.0 && y > 3_000_000.0);

    let (lon, lat) = CrsCode::Epsg3857
        .transform_point_to(CrsCode::Epsg4326, x, y)
        .unwrap();
    assert!((lon - -91.15).abs() < 1e-9);
    assert!((lat - 30.45).abs() < 1e-9);
}

#[test]
fn test_unknown_crs_rejected() {
    assert!(CrsCode::from_epsg_string("EPSG:32615").is_err());
    assert_eq!(
        CrsCode::from_epsg_string("urn:ogc:def:crs:EPSG::4269").unwrap(),
        CrsCode::Epsg4269
    );
}

// ============================================================================
// Artifact identity
// ============================================================================

#[test]
fn test_artifact_names_follow_date() {
    let id = ArtifactId::from_name("raw/2024/tempo_2024-01-15.nc", "no2").unwrap();
    assert_eq!(id.source_id(), "2024-01-15-no2");
    assert_eq!(id.tileset_id("alice"), "alice.2024-01-15-no2");
    assert_eq!(id.display_name(), "2024-01-15 NO2");
    assert_eq!(id.output_name("raw/2024/tempo_2024-01-15.nc"), "2024-01-15_NO2.tif");

    // the encoded GeoTIFF maps back to the same identity
    let again = ArtifactId::from_name(&id.output_name("tempo_2024-01-15.nc"), "no2").unwrap();
    assert_eq!(again, id);
}
