//! Synthetic TEMPO-like planes and cubes.
//!
//! Values are tropospheric NO2 columns in molecules/cm^2, so they sit in the
//! same 1e14..1e16 range as real data and exercise quantization realistically.

use geo_common::{CrsCode, GeoReference, GeoTransform};

/// TEMPO L3 grid spacing in degrees.
pub const TEMPO_RESOLUTION: f64 = 0.02;

/// Plane where each value encodes its position: `col * 1000 + row`.
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Smooth west→east NO2 gradient from 1e14 to `peak`.
pub fn create_no2_grid(width: usize, height: usize, peak: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for _row in 0..height {
        for col in 0..width {
            let t = col as f32 / (width.max(2) - 1) as f32;
            data.push(1.0e14 + t * (peak - 1.0e14));
        }
    }
    data
}

/// `slots` copies of `base`, each scaled by `(slot + 1) / slots` and with
/// every `gap_every`-th pixel (offset by slot) set to NaN.
///
/// The maximum over slots is therefore `base` wherever the last slot is
/// present.
pub fn create_cube_planes(base: &[f32], slots: usize, gap_every: usize) -> Vec<Vec<f32>> {
    (0..slots)
        .map(|slot| {
            let scale = (slot + 1) as f32 / slots as f32;
            base.iter()
                .enumerate()
                .map(|(i, v)| {
                    if gap_every > 0 && (i + slot) % gap_every == 0 {
                        f32::NAN
                    } else {
                        v * scale
                    }
                })
                .collect()
        })
        .collect()
}

/// NAD83 georeference of a TEMPO-resolution grid with its top-left corner
/// at `(west, north)`.
pub fn tempo_georef(west: f64, north: f64) -> GeoReference {
    GeoReference::new(
        GeoTransform::north_up(west, north, TEMPO_RESOLUTION, TEMPO_RESOLUTION),
        CrsCode::Epsg4269,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_grid() {
        let grid = create_test_grid(10, 5);
        assert_eq!(grid.len(), 50);
        assert_eq!(grid[1], 1000.0);
        assert_eq!(grid[10], 1.0);
    }

    #[test]
    fn test_no2_grid_range() {
        let grid = create_no2_grid(11, 3, 2.0e16);
        assert_eq!(grid[0], 1.0e14);
        assert!((grid[10] - 2.0e16).abs() / 2.0e16 < 1e-6);
    }

    #[test]
    fn test_cube_planes_gaps() {
        let planes = create_cube_planes(&[1.0, 2.0, 3.0, 4.0], 2, 3);
        assert_eq!(planes.len(), 2);
        assert!(planes[0][0].is_nan());
        assert_eq!(planes[0][1], 1.0);
        assert!(planes[1][2].is_nan());
        assert_eq!(planes[1][3], 4.0);
    }
}
