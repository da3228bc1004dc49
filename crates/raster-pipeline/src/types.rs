//! Raster values flowing between pipeline stages.

use geo_common::{BoundingBox, GeoReference};

use crate::error::{PipelineError, Result};
use crate::quantize::QuantizationProfile;

/// Stack of equally shaped planes (time slot × row × column).
///
/// Planes are row-major with row 0 at the top of the georeference.
#[derive(Debug, Clone)]
pub struct RasterCube {
    slots: Vec<Vec<f32>>,
    width: usize,
    height: usize,
    georef: GeoReference,
    nodata: Option<f32>,
}

impl RasterCube {
    /// Build a cube, checking every slot against `width * height`.
    pub fn new(
        slots: Vec<Vec<f32>>,
        width: usize,
        height: usize,
        georef: GeoReference,
        nodata: Option<f32>,
    ) -> Result<Self> {
        check_slot_shapes(&slots, width * height)?;
        Ok(Self {
            slots,
            width,
            height,
            georef,
            nodata,
        })
    }

    pub fn slots(&self) -> &[Vec<f32>] {
        &self.slots
    }

    pub fn time_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn georef(&self) -> &GeoReference {
        &self.georef
    }

    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    /// True for NaN or the source nodata sentinel.
    #[inline]
    pub fn is_absent(&self, value: f32) -> bool {
        value.is_nan() || self.nodata == Some(value)
    }

    pub fn extent(&self) -> BoundingBox {
        self.georef.transform.extent(self.width, self.height)
    }

    /// Crop to the whole pixels whose centers fall inside `window`.
    ///
    /// `window` is in the cube's CRS.
    pub fn crop_to(&self, window: &BoundingBox) -> Result<RasterCube> {
        let inverse = self.georef.transform.inverse()?;
        let corners = [
            inverse.apply(window.min_x, window.min_y),
            inverse.apply(window.min_x, window.max_y),
            inverse.apply(window.max_x, window.min_y),
            inverse.apply(window.max_x, window.max_y),
        ];
        let pixel_box = BoundingBox::from_points(corners)
            .ok_or_else(|| PipelineError::no_overlap(window, self.extent()))?;

        let cols = center_range(pixel_box.min_x, pixel_box.max_x, self.width);
        let rows = center_range(pixel_box.min_y, pixel_box.max_y, self.height);
        let (cols, rows) = match (cols, rows) {
            (Some(cols), Some(rows)) => (cols, rows),
            _ => return Err(PipelineError::no_overlap(window, self.extent())),
        };

        let new_width = cols.len();
        let slots = self
            .slots
            .iter()
            .map(|plane| {
                let mut cropped = Vec::with_capacity(new_width * rows.len());
                for row in rows.clone() {
                    let start = row * self.width;
                    cropped.extend_from_slice(&plane[start + cols.start..start + cols.end]);
                }
                cropped
            })
            .collect();

        Ok(RasterCube {
            slots,
            width: new_width,
            height: rows.len(),
            georef: GeoReference::new(
                self.georef.transform.offset(cols.start, rows.start),
                self.georef.crs,
            ),
            nodata: self.nodata,
        })
    }
}

/// Pixel indices in `0..len` whose centers lie in `[min, max]` (pixel units).
fn center_range(min: f64, max: f64, len: usize) -> Option<std::ops::Range<usize>> {
    let first = (min - 0.5).ceil().max(0.0);
    let last = (max - 0.5).floor().min(len as f64 - 1.0);
    if !first.is_finite() || !last.is_finite() || last < first {
        return None;
    }
    Some(first as usize..last as usize + 1)
}

pub(crate) fn check_slot_shapes(slots: &[Vec<f32>], expected: usize) -> Result<()> {
    match slots.iter().position(|s| s.len() != expected) {
        Some(slot) => Err(PipelineError::ShapeMismatch {
            slot,
            expected,
            actual: slots[slot].len(),
        }),
        None => Ok(()),
    }
}

/// One plane after temporal reduction; `None` marks nodata.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedRaster {
    pub values: Vec<Option<f32>>,
    pub width: usize,
    pub height: usize,
    pub georef: GeoReference,
}

impl ReducedRaster {
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        self.values.get(row * self.width + col).copied().flatten()
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn extent(&self) -> BoundingBox {
        self.georef.transform.extent(self.width, self.height)
    }
}

/// Reduced raster with every pixel outside the boundary set to nodata.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedRaster {
    pub values: Vec<Option<f32>>,
    pub width: usize,
    pub height: usize,
    pub georef: GeoReference,
}

impl ClippedRaster {
    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        self.values.get(row * self.width + col).copied().flatten()
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Final 8-bit raster, ready to be written as a tiled GeoTIFF.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTile {
    pub codes: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub georef: GeoReference,
    /// Square block edge in pixels.
    pub block_size: u32,
    pub profile: QuantizationProfile,
}

/// Summary of an encoded tile for run logs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileStatistics {
    pub valid_pixels: usize,
    pub nodata_pixels: usize,
    pub min_code: Option<u8>,
    pub max_code: Option<u8>,
    /// Physical values represented by `min_code` / `max_code`.
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl EncodedTile {
    pub fn nodata_code(&self) -> u8 {
        self.profile.nodata_code
    }

    pub fn get(&self, col: usize, row: usize) -> Option<u8> {
        self.codes.get(row * self.width + col).copied()
    }

    pub fn statistics(&self) -> TileStatistics {
        let nodata = self.nodata_code();
        let (mut valid, mut min, mut max) = (0usize, None::<u8>, None::<u8>);
        for &code in self.codes.iter().filter(|c| **c != nodata) {
            valid += 1;
            min = Some(min.map_or(code, |m| m.min(code)));
            max = Some(max.map_or(code, |m| m.max(code)));
        }

        TileStatistics {
            valid_pixels: valid,
            nodata_pixels: self.codes.len() - valid,
            min_code: min,
            max_code: max,
            min_value: min.and_then(|c| self.profile.decode(c)),
            max_value: max.and_then(|c| self.profile.decode(c)),
        }
    }

    /// Serialize as a single-band tiled, DEFLATE-compressed GeoTIFF.
    pub fn to_geotiff_bytes(&self) -> Result<Vec<u8>> {
        crate::geotiff::write_geotiff(self)
    }

    /// Write the GeoTIFF to `path`.
    pub fn write(&self, path: &std::path::Path) -> Result<()> {
        let bytes = self.to_geotiff_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}
