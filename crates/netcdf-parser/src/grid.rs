//! Coordinate-axis handling for regular lat/lon grids.
//!
//! Kept free of any NetCDF handles so the index math can be tested without
//! fixture files.

use std::ops::Range;

use geo_common::{BoundingBox, GeoTransform};

use crate::error::{NetCdfError, NetCdfResult};

/// Where to read inside the file's lat/lon grid and how to place it.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    /// Latitude indices to read, in file order.
    pub rows: Range<usize>,
    /// Longitude indices to read.
    pub cols: Range<usize>,
    /// File stores latitude south to north; rows must be reversed.
    pub flip_rows: bool,
    /// North-up transform of the selected sub-grid.
    pub transform: GeoTransform,
}

impl GridLayout {
    pub fn width(&self) -> usize {
        self.cols.len()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }
}

/// Signed step between consecutive cell centers.
pub fn axis_step(name: &str, values: &[f64]) -> NetCdfResult<f64> {
    if values.len() < 2 {
        return Err(NetCdfError::Layout(format!(
            "{} axis needs at least 2 values, got {}",
            name,
            values.len()
        )));
    }
    let step = (values[values.len() - 1] - values[0]) / (values.len() - 1) as f64;
    if step == 0.0 || !step.is_finite() {
        return Err(NetCdfError::Layout(format!(
            "{} axis is not strictly monotonic",
            name
        )));
    }
    Ok(step)
}

/// Contiguous index range of axis values inside `[min, max]`.
///
/// Works for ascending and descending axes.
pub fn index_range(values: &[f64], min: f64, max: f64) -> Option<Range<usize>> {
    let first = values.iter().position(|v| *v >= min && *v <= max)?;
    let last = values.iter().rposition(|v| *v >= min && *v <= max)?;
    Some(first..last + 1)
}

/// Work out the sub-grid to read and its north-up transform.
pub fn layout(lat: &[f64], lon: &[f64], window: Option<&BoundingBox>) -> NetCdfResult<GridLayout> {
    let dx = axis_step("longitude", lon)?;
    let dy = axis_step("latitude", lat)?;
    if dx < 0.0 {
        return Err(NetCdfError::Layout(
            "longitude axis must increase eastwards".to_string(),
        ));
    }

    let (rows, cols) = match window {
        Some(bbox) => {
            let empty = || NetCdfError::EmptyWindow(bbox.to_string());
            let cols = index_range(lon, bbox.min_x, bbox.max_x).ok_or_else(empty)?;
            let rows = index_range(lat, bbox.min_y, bbox.max_y).ok_or_else(empty)?;
            (rows, cols)
        }
        None => (0..lat.len(), 0..lon.len()),
    };

    let flip_rows = dy > 0.0;
    let north = if flip_rows {
        lat[rows.end - 1]
    } else {
        lat[rows.start]
    };
    let transform = GeoTransform::north_up(
        lon[cols.start] - dx / 2.0,
        north + dy.abs() / 2.0,
        dx,
        dy.abs(),
    );

    Ok(GridLayout {
        rows,
        cols,
        flip_rows,
        transform,
    })
}

/// Per-variable value decoding: fill detection then scale/offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueCoding {
    pub fill_value: Option<f64>,
    pub scale_factor: f64,
    pub add_offset: f64,
}

impl Default for ValueCoding {
    fn default() -> Self {
        Self {
            fill_value: None,
            scale_factor: 1.0,
            add_offset: 0.0,
        }
    }
}

impl ValueCoding {
    /// Physical value for one stored value; fill and NaN become NaN.
    pub fn decode(&self, raw: f64) -> f32 {
        if raw.is_nan() || self.fill_value == Some(raw) {
            return f32::NAN;
        }
        (raw * self.scale_factor + self.add_offset) as f32
    }
}

/// Convert one raw slab (file row order) into a north-up plane.
pub fn to_plane(raw: &[f64], layout: &GridLayout, coding: &ValueCoding) -> Vec<f32> {
    let width = layout.width();
    let mut plane: Vec<f32> = Vec::with_capacity(raw.len());
    if layout.flip_rows {
        for row in raw.chunks(width).rev() {
            plane.extend(row.iter().map(|v| coding.decode(*v)));
        }
    } else {
        plane.extend(raw.iter().map(|v| coding.decode(*v)));
    }
    plane
}
