//! Reads real TEMPO L3 granules when they are available locally.
//!
//! Drop `tempo_2024-01-15.nc` into `testdata/` or point `TEMPO_TEST_DATA`
//! at a directory holding it; otherwise these tests skip.

use geo_common::{BoundingBox, CrsCode};
use netcdf_parser::{read_cube, read_cube_from_bytes, NetCdfError, ReaderConfig};
use test_utils::require_granule;

const GRANULE: &str = "tempo_2024-01-15.nc";

#[test]
fn test_read_louisiana_window() {
    let path = require_granule!(GRANULE);
    let window = BoundingBox::louisiana();

    let cube = read_cube(&path, &ReaderConfig::default(), Some(&window)).unwrap();
    assert!(cube.time_slots() >= 1);
    assert!(cube.planes.iter().all(|p| p.len() == cube.width * cube.height));
    assert_eq!(cube.georef.crs, CrsCode::Epsg4269);
    assert!(cube.georef.transform.is_north_up());

    // one cell of slack on each side of the requested window
    let extent = cube.georef.transform.extent(cube.width, cube.height);
    let cell = cube.georef.transform.pixel_width;
    assert!(extent.min_x >= window.min_x - cell && extent.max_x <= window.max_x + cell);
    assert!(extent.min_y >= window.min_y - cell && extent.max_y <= window.max_y + cell);

    // fill values were replaced by NaN
    if let Some(fill) = cube.nodata {
        assert!(cube.planes.iter().flatten().all(|v| *v != fill));
    }
}

#[test]
fn test_bytes_and_path_reads_agree() {
    let path = require_granule!(GRANULE);
    let window = BoundingBox::louisiana();
    let config = ReaderConfig::default();

    let from_path = read_cube(&path, &config, Some(&window)).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    let from_bytes = read_cube_from_bytes(&bytes, &config, Some(&window)).unwrap();

    assert_eq!((from_bytes.width, from_bytes.height), (from_path.width, from_path.height));
    assert_eq!(from_bytes.georef, from_path.georef);
    assert_eq!(from_bytes.time_slots(), from_path.time_slots());
}

#[test]
fn test_unknown_variable_is_missing() {
    let path = require_granule!(GRANULE);
    let config = ReaderConfig {
        variable: "product/not_a_variable".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        read_cube(&path, &config, None),
        Err(NetCdfError::Missing(_))
    ));
}
