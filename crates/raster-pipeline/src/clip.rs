//! Geographic clipping of a reduced raster against a boundary polygon.
//!
//! A pixel is kept when its center falls inside the boundary under the
//! even-odd rule; everything else becomes nodata. North-up rasters are
//! filled one scanline at a time; rotated ones fall back to a per-pixel
//! ray cast.

use geo_common::GeoTransform;
use rayon::prelude::*;
use tracing::debug;

use crate::boundary::BoundaryPolygon;
use crate::error::{PipelineError, Result};
use crate::types::{ClippedRaster, ReducedRaster};

/// Mask `reduced` with `boundary`, reprojecting the boundary to the raster CRS.
///
/// Fails with `NoOverlap` when the boundary's extent misses the raster
/// extent. Overlap with zero interior pixel centers is a valid all-nodata
/// result.
pub fn clip(reduced: &ReducedRaster, boundary: &BoundaryPolygon) -> Result<ClippedRaster> {
    let boundary = boundary.transform_to(reduced.georef.crs)?;
    let extent = reduced.extent();
    if !boundary.bbox().intersects(&extent) {
        return Err(PipelineError::no_overlap(boundary.bbox(), extent));
    }

    let mask = inside_mask(&boundary, &reduced.georef.transform, reduced.width, reduced.height);
    let values: Vec<Option<f32>> = reduced
        .values
        .iter()
        .zip(&mask)
        .map(|(v, inside)| if *inside { *v } else { None })
        .collect();

    debug!(
        inside = mask.iter().filter(|m| **m).count(),
        total = mask.len(),
        "Clipped raster to boundary"
    );

    Ok(ClippedRaster {
        values,
        width: reduced.width,
        height: reduced.height,
        georef: reduced.georef,
    })
}

/// Row-major inside/outside flag per pixel center.
pub fn inside_mask(
    boundary: &BoundaryPolygon,
    transform: &GeoTransform,
    width: usize,
    height: usize,
) -> Vec<bool> {
    if transform.is_north_up() {
        (0..height)
            .into_par_iter()
            .flat_map_iter(|row| {
                let (_, y) = transform.pixel_center(0, row);
                let crossings = scanline_crossings(boundary, y);
                (0..width).map(move |col| {
                    let (x, _) = transform.pixel_center(col, row);
                    let to_the_right = crossings.len() - crossings.partition_point(|c| *c <= x);
                    to_the_right % 2 == 1
                })
            })
            .collect()
    } else {
        (0..width * height)
            .into_par_iter()
            .map(|i| {
                let (x, y) = transform.pixel_center(i % width, i / width);
                boundary.contains(x, y)
            })
            .collect()
    }
}

/// Sorted x positions where the horizontal line at `y` crosses any ring edge.
fn scanline_crossings(boundary: &BoundaryPolygon, y: f64) -> Vec<f64> {
    let mut crossings = Vec::new();
    for ring in boundary.polygons().iter().flatten() {
        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            let (xi, yi) = ring[i];
            let (xj, yj) = ring[j];
            if (yi > y) != (yj > y) {
                crossings.push((xj - xi) * (y - yi) / (yj - yi) + xi);
            }
            j = i;
        }
    }
    crossings.sort_by(|a, b| a.total_cmp(b));
    crossings
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_common::{CrsCode, GeoReference};

    fn reduced(width: usize, height: usize, transform: GeoTransform) -> ReducedRaster {
        ReducedRaster {
            values: (0..width * height).map(|i| Some(i as f32)).collect(),
            width,
            height,
            georef: GeoReference::new(transform, CrsCode::Epsg4269),
        }
    }

    /// |x - 5| + |y - 5| <= 4.7, no pixel center on an edge.
    fn diamond() -> BoundaryPolygon {
        BoundaryPolygon::from_geojson_str(
            r#"{"type": "Polygon", "coordinates": [[
                [5, 0.3], [9.7, 5], [5, 9.7], [0.3, 5], [5, 0.3]
            ]]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_clip_matches_point_in_polygon() {
        let raster = reduced(10, 10, GeoTransform::north_up(0.0, 10.0, 1.0, 1.0));
        let boundary = diamond();
        let clipped = clip(&raster, &boundary).unwrap();

        for row in 0..10 {
            for col in 0..10 {
                let (x, y) = raster.georef.transform.pixel_center(col, row);
                let expected = if boundary.contains(x, y) {
                    raster.get(col, row)
                } else {
                    None
                };
                assert_eq!(clipped.get(col, row), expected, "pixel ({}, {})", col, row);
            }
        }
        assert!(clipped.get(0, 0).is_none());
        assert_eq!(clipped.get(5, 5), Some(55.0));
    }

    #[test]
    fn test_rotated_path_agrees_with_scanline() {
        let boundary = diamond();
        let north_up = GeoTransform::north_up(0.0, 10.0, 1.0, 1.0);
        let tiny_rotation = GeoTransform {
            row_rotation: 1e-12,
            ..north_up
        };
        assert_eq!(
            inside_mask(&boundary, &north_up, 10, 10),
            inside_mask(&boundary, &tiny_rotation, 10, 10)
        );
    }

    #[test]
    fn test_no_overlap() {
        let raster = reduced(4, 4, GeoTransform::north_up(50.0, 60.0, 1.0, 1.0));
        assert!(matches!(
            clip(&raster, &diamond()),
            Err(PipelineError::NoOverlap { .. })
        ));
    }

    #[test]
    fn test_overlap_without_interior_pixels_is_all_nodata() {
        // one coarse pixel whose center misses a thin sliver
        let raster = reduced(1, 1, GeoTransform::north_up(0.0, 10.0, 10.0, 10.0));
        let sliver = BoundaryPolygon::from_geojson_str(
            r#"{"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]}"#,
        )
        .unwrap();
        let clipped = clip(&raster, &sliver).unwrap();
        assert_eq!(clipped.valid_count(), 0);
    }

    #[test]
    fn test_nodata_stays_nodata_inside() {
        let mut raster = reduced(10, 10, GeoTransform::north_up(0.0, 10.0, 1.0, 1.0));
        raster.values[55] = None;
        let clipped = clip(&raster, &diamond()).unwrap();
        assert_eq!(clipped.get(5, 5), None);
        assert_eq!(clipped.get(4, 5), Some(54.0));
    }
}
