//! End-to-end tests for the reduce → clip → encode pipeline.

use std::io::Cursor;

use geo_common::BoundingBox;
use raster_pipeline::{
    clip, encode, reduce, BoundaryPolygon, PipelineConfig, PipelineError, QuantizationProfile,
    RasterCube, RasterPipeline, ReduceMethod, Stage,
};
use test_utils::{
    assert_rel_eq, create_cube_planes, create_no2_grid, rectangle_geojson, tempo_georef,
    LOUISIANA_BOUNDARY_GEOJSON,
};
use tiff::decoder::{Decoder, DecodingResult};

fn louisiana() -> BoundaryPolygon {
    BoundaryPolygon::from_geojson_str(LOUISIANA_BOUNDARY_GEOJSON).unwrap()
}

/// 350 x 300 cube at TEMPO resolution covering -95..-88, 28..34.
fn gulf_cube(slots: usize) -> RasterCube {
    let (width, height) = (350, 300);
    let base = create_no2_grid(width, height, 2.0e16);
    let planes = create_cube_planes(&base, slots, 7);
    RasterCube::new(planes, width, height, tempo_georef(-95.0, 34.0), None).unwrap()
}

fn decode_codes(bytes: Vec<u8>) -> (u32, u32, Vec<u8>) {
    let mut decoder = Decoder::new(Cursor::new(bytes)).unwrap();
    let (width, height) = decoder.dimensions().unwrap();
    match decoder.read_image().unwrap() {
        DecodingResult::U8(codes) => (width, height, codes),
        _ => panic!("expected 8-bit GeoTIFF"),
    }
}

#[test]
fn test_reduce_all_absent_pixel_encodes_as_nodata() {
    let nan = f32::NAN;
    let cube = RasterCube::new(
        vec![vec![nan, nan], vec![5.0, nan], vec![8.0, nan]],
        2,
        1,
        tempo_georef(0.0, 1.0),
        None,
    )
    .unwrap();

    let reduced = reduce(&cube, ReduceMethod::Max).unwrap();
    assert_eq!(reduced.values, vec![Some(8.0), None]);

    let boundary = BoundaryPolygon::from_geojson_str(&rectangle_geojson(-1.0, -1.0, 2.0, 2.0)).unwrap();
    let clipped = clip(&reduced, &boundary).unwrap();
    let tile = encode(&clipped, &QuantizationProfile::default(), 16).unwrap();
    assert_eq!(tile.codes[1], 0);
    assert_eq!(tile.codes[0], 1); // 8 molecules/cm^2 is effectively zero
}

#[test]
fn test_quantization_reference_values() {
    let profile = QuantizationProfile::default();
    assert_eq!(profile.encode(Some(5.0e15)), 128);
    assert_eq!(profile.encode(Some(2.0e16)), 255);
    assert_eq!(profile.encode(None), 0);
}

#[test]
fn test_clip_outside_boundary_extent_is_no_overlap() {
    let cube = gulf_cube(2);
    let reduced = reduce(&cube, ReduceMethod::Max).unwrap();
    let offshore = BoundaryPolygon::from_geojson_str(&rectangle_geojson(-40.0, 40.0, -30.0, 45.0)).unwrap();

    assert!(matches!(
        clip(&reduced, &offshore),
        Err(PipelineError::NoOverlap { .. })
    ));
}

#[test]
fn test_clip_preserves_interior_and_blanks_exterior() {
    let cube = gulf_cube(3);
    let reduced = reduce(&cube, ReduceMethod::Max).unwrap();
    let boundary = louisiana();
    let clipped = clip(&reduced, &boundary).unwrap();

    assert_eq!((clipped.width, clipped.height), (reduced.width, reduced.height));
    let transform = reduced.georef.transform;
    for row in (0..reduced.height).step_by(7) {
        for col in (0..reduced.width).step_by(5) {
            let (x, y) = transform.pixel_center(col, row);
            if boundary.contains(x, y) {
                assert_eq!(clipped.get(col, row), reduced.get(col, row));
            } else {
                assert_eq!(clipped.get(col, row), None);
            }
        }
    }
}

#[test]
fn test_mean_reduction_uses_present_values_only() {
    let cube = gulf_cube(4);
    let mean = reduce(&cube, ReduceMethod::Mean).unwrap();

    let i = 1234;
    let present: Vec<f64> = cube
        .slots()
        .iter()
        .map(|s| s[i])
        .filter(|v| !v.is_nan())
        .map(|v| v as f64)
        .collect();
    let expected = present.iter().sum::<f64>() / present.len() as f64;
    assert_rel_eq!(mean.values[i].unwrap(), expected, 1e-6);
}

#[test]
fn test_louisiana_geotiff_end_to_end() {
    let pipeline = RasterPipeline::new(PipelineConfig::default(), louisiana()).unwrap();
    let tile = pipeline.run(&gulf_cube(3)).unwrap();

    // cropped to the Louisiana read window
    let extent = tile.georef.transform.extent(tile.width, tile.height);
    let window = BoundingBox::louisiana();
    assert!(extent.min_x >= window.min_x - 0.02 && extent.max_x <= window.max_x + 0.02);
    assert!(extent.min_y >= window.min_y - 0.02 && extent.max_y <= window.max_y + 0.02);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("2024-01-15_NO2.tif");
    tile.write(&path).unwrap();
    let (width, height, codes) = decode_codes(std::fs::read(&path).unwrap());
    assert_eq!((width as usize, height as usize), (tile.width, tile.height));
    assert_eq!(codes, tile.codes);

    let inverse = tile.georef.transform.inverse().unwrap();
    let code_at = |lon: f64, lat: f64| {
        let (col, row) = inverse.apply(lon, lat);
        codes[row as usize * tile.width + col as usize]
    };
    // Baton Rouge inside, Gulf of Mexico south of the delta outside
    assert_ne!(code_at(-91.15, 30.45), 0);
    assert_eq!(code_at(-89.5, 29.0), 0);
    // Jackson, MS lies in the window but outside the state
    assert_eq!(code_at(-90.5, 32.3), 0);

    assert!(codes.iter().all(|&c| c == 0 || (1..=255).contains(&c)));
    let stats = tile.statistics();
    assert!(stats.valid_pixels > 0);
    assert_eq!(stats.valid_pixels + stats.nodata_pixels, codes.len());
}

#[test]
fn test_pipeline_reports_failing_stage() {
    let config = PipelineConfig {
        read_window: None,
        ..Default::default()
    };
    let offshore = BoundaryPolygon::from_geojson_str(&rectangle_geojson(-40.0, 40.0, -30.0, 45.0)).unwrap();
    let pipeline = RasterPipeline::new(config, offshore).unwrap();

    let err = pipeline.run(&gulf_cube(1)).unwrap_err();
    assert_eq!(err.stage, Stage::Clip);

    let empty = RasterCube::new(Vec::new(), 4, 4, tempo_georef(0.0, 0.0), None).unwrap();
    let err = pipeline.run(&empty).unwrap_err();
    assert_eq!(err.stage, Stage::Reduce);
    assert!(matches!(err.error, PipelineError::EmptyInput));
}
