//! Tiled, DEFLATE-compressed single-band 8-bit GeoTIFF encoding.
//!
//! Classic little-endian TIFF laid out as
//!
//! ```text
//! header | IFD | out-of-line tag values | tile 0 | tile 1 | ...
//! ```
//!
//! The IFD sits ahead of the pixel data so range-reading clients can fetch
//! all metadata with one small request. Edge tiles are padded with the
//! nodata code. Georeferencing uses ModelPixelScale + ModelTiepoint for
//! north-up grids and ModelTransformation otherwise.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use geo_common::{CrsCode, GeoTransform};
use rayon::prelude::*;

use crate::error::{PipelineError, Result};
use crate::types::EncodedTile;

// Baseline TIFF tags
const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_BITS_PER_SAMPLE: u16 = 258;
const TAG_COMPRESSION: u16 = 259;
const TAG_PHOTOMETRIC: u16 = 262;
const TAG_SAMPLES_PER_PIXEL: u16 = 277;
const TAG_PLANAR_CONFIG: u16 = 284;
const TAG_TILE_WIDTH: u16 = 322;
const TAG_TILE_LENGTH: u16 = 323;
const TAG_TILE_OFFSETS: u16 = 324;
const TAG_TILE_BYTE_COUNTS: u16 = 325;
const TAG_SAMPLE_FORMAT: u16 = 339;

// GeoTIFF tags
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_MODEL_TRANSFORMATION: u16 = 34264;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;

/// GDAL's per-band nodata annotation, ASCII.
const TAG_GDAL_NODATA: u16 = 42113;

// Field types
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_DOUBLE: u16 = 12;

/// Adobe-style DEFLATE (zlib stream).
const COMPRESSION_DEFLATE: u16 = 8;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

const HEADER_LEN: usize = 8;

struct IfdEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    /// Little-endian value bytes.
    data: Vec<u8>,
}

impl IfdEntry {
    fn shorts(tag: u16, values: &[u16]) -> Self {
        Self {
            tag,
            field_type: TYPE_SHORT,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn short(tag: u16, value: u16) -> Self {
        Self::shorts(tag, &[value])
    }

    fn longs(tag: u16, values: &[u32]) -> Self {
        Self {
            tag,
            field_type: TYPE_LONG,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn long(tag: u16, value: u32) -> Self {
        Self::longs(tag, &[value])
    }

    fn doubles(tag: u16, values: &[f64]) -> Self {
        Self {
            tag,
            field_type: TYPE_DOUBLE,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn ascii(tag: u16, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Self {
            tag,
            field_type: TYPE_ASCII,
            count: data.len() as u32,
            data,
        }
    }

    fn is_inline(&self) -> bool {
        self.data.len() <= 4
    }

    /// Out-of-line size, word aligned.
    fn external_len(&self) -> usize {
        if self.is_inline() {
            0
        } else {
            self.data.len() + (self.data.len() & 1)
        }
    }
}

/// Encode `tile` as GeoTIFF bytes.
pub fn write_geotiff(tile: &EncodedTile) -> Result<Vec<u8>> {
    if tile.width == 0 || tile.height == 0 {
        return Err(PipelineError::Encode("empty raster".to_string()));
    }
    if tile.codes.len() != tile.width * tile.height {
        return Err(PipelineError::Encode(format!(
            "{} codes for a {}x{} raster",
            tile.codes.len(),
            tile.width,
            tile.height
        )));
    }

    let blocks = compress_tiles(tile)?;
    let byte_counts: Vec<u32> = blocks.iter().map(|b| b.len() as u32).collect();

    let mut entries = vec![
        IfdEntry::long(TAG_IMAGE_WIDTH, tile.width as u32),
        IfdEntry::long(TAG_IMAGE_LENGTH, tile.height as u32),
        IfdEntry::short(TAG_BITS_PER_SAMPLE, 8),
        IfdEntry::short(TAG_COMPRESSION, COMPRESSION_DEFLATE),
        IfdEntry::short(TAG_PHOTOMETRIC, 1), // BlackIsZero
        IfdEntry::short(TAG_SAMPLES_PER_PIXEL, 1),
        IfdEntry::short(TAG_PLANAR_CONFIG, 1),
        IfdEntry::long(TAG_TILE_WIDTH, tile.block_size),
        IfdEntry::long(TAG_TILE_LENGTH, tile.block_size),
        IfdEntry::longs(TAG_TILE_OFFSETS, &vec![0; blocks.len()]),
        IfdEntry::longs(TAG_TILE_BYTE_COUNTS, &byte_counts),
        IfdEntry::short(TAG_SAMPLE_FORMAT, 1), // unsigned integer
        IfdEntry::shorts(TAG_GEO_KEY_DIRECTORY, &geokey_directory(tile.georef.crs)),
        IfdEntry::ascii(TAG_GDAL_NODATA, &tile.nodata_code().to_string()),
    ];
    entries.extend(georeference_entries(&tile.georef.transform));
    entries.sort_by_key(|e| e.tag);

    let ifd_len = 2 + 12 * entries.len() + 4;
    let external_len: usize = entries.iter().map(IfdEntry::external_len).sum();
    let tiles_start = HEADER_LEN + ifd_len + external_len;
    let total_len = tiles_start + blocks.iter().map(Vec::len).sum::<usize>();
    if total_len > u32::MAX as usize {
        return Err(PipelineError::Encode(format!(
            "{} bytes exceeds the classic TIFF 4 GiB limit",
            total_len
        )));
    }

    let mut offset = tiles_start as u32;
    let tile_offsets: Vec<u32> = byte_counts
        .iter()
        .map(|count| {
            let start = offset;
            offset += count;
            start
        })
        .collect();
    if let Some(entry) = entries.iter_mut().find(|e| e.tag == TAG_TILE_OFFSETS) {
        *entry = IfdEntry::longs(TAG_TILE_OFFSETS, &tile_offsets);
    }

    let mut out = Vec::with_capacity(total_len);

    // Header: little-endian, magic 42, first IFD right after
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&(HEADER_LEN as u32).to_le_bytes());

    // IFD
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    let mut external_offset = (HEADER_LEN + ifd_len) as u32;
    for entry in &entries {
        out.extend_from_slice(&entry.tag.to_le_bytes());
        out.extend_from_slice(&entry.field_type.to_le_bytes());
        out.extend_from_slice(&entry.count.to_le_bytes());
        if entry.is_inline() {
            let mut value = [0u8; 4];
            value[..entry.data.len()].copy_from_slice(&entry.data);
            out.extend_from_slice(&value);
        } else {
            out.extend_from_slice(&external_offset.to_le_bytes());
            external_offset += entry.external_len() as u32;
        }
    }
    out.extend_from_slice(&0u32.to_le_bytes()); // no next IFD

    for entry in entries.iter().filter(|e| !e.is_inline()) {
        out.extend_from_slice(&entry.data);
        if entry.data.len() & 1 == 1 {
            out.push(0);
        }
    }

    for block in &blocks {
        out.extend_from_slice(block);
    }

    Ok(out)
}

/// Cut the raster into padded square blocks and deflate each one.
fn compress_tiles(tile: &EncodedTile) -> Result<Vec<Vec<u8>>> {
    let block = tile.block_size as usize;
    let across = tile.width.div_ceil(block);
    let down = tile.height.div_ceil(block);
    let nodata = tile.nodata_code();

    (0..across * down)
        .into_par_iter()
        .map(|index| -> Result<Vec<u8>> {
            let (tile_col, tile_row) = (index % across, index / across);
            let x0 = tile_col * block;
            let y0 = tile_row * block;
            let copy_width = block.min(tile.width - x0);
            let copy_height = block.min(tile.height - y0);

            let mut raw = vec![nodata; block * block];
            for row in 0..copy_height {
                let src = (y0 + row) * tile.width + x0;
                raw[row * block..row * block + copy_width]
                    .copy_from_slice(&tile.codes[src..src + copy_width]);
            }

            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&raw)?;
            Ok(encoder.finish()?)
        })
        .collect()
}

fn georeference_entries(transform: &GeoTransform) -> Vec<IfdEntry> {
    if transform.is_north_up() {
        vec![
            IfdEntry::doubles(
                TAG_MODEL_PIXEL_SCALE,
                &[transform.pixel_width, -transform.pixel_height, 0.0],
            ),
            IfdEntry::doubles(
                TAG_MODEL_TIEPOINT,
                &[0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0],
            ),
        ]
    } else {
        #[rustfmt::skip]
        let matrix = [
            transform.pixel_width, transform.row_rotation, 0.0, transform.origin_x,
            transform.col_rotation, transform.pixel_height, 0.0, transform.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        vec![IfdEntry::doubles(TAG_MODEL_TRANSFORMATION, &matrix)]
    }
}

/// GeoKeyDirectory: header then `(key, location, count, value)` quads.
fn geokey_directory(crs: CrsCode) -> Vec<u16> {
    let mut keys = vec![
        1, // KeyDirectoryVersion
        1, // KeyRevision
        0, // MinorRevision
        3, // NumberOfKeys
    ];

    if crs.is_geographic() {
        keys.extend_from_slice(&[GT_MODEL_TYPE_GEO_KEY, 0, 1, MODEL_TYPE_GEOGRAPHIC]);
        keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);
        keys.extend_from_slice(&[GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, crs.epsg()]);
    } else {
        keys.extend_from_slice(&[GT_MODEL_TYPE_GEO_KEY, 0, 1, MODEL_TYPE_PROJECTED]);
        keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);
        keys.extend_from_slice(&[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, crs.epsg()]);
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantize::QuantizationProfile;
    use geo_common::GeoReference;
    use std::io::{Cursor, Read};
    use tiff::decoder::{Decoder, DecodingResult};

    fn tile(width: usize, height: usize, block_size: u32, crs: CrsCode) -> EncodedTile {
        EncodedTile {
            codes: (0..width * height).map(|i| (i % 256) as u8).collect(),
            width,
            height,
            georef: GeoReference::new(GeoTransform::north_up(-94.0, 33.0, 0.02, 0.02), crs),
            block_size,
            profile: QuantizationProfile::default(),
        }
    }

    /// `(tag, type, count, value/offset bytes)` for each IFD entry.
    fn ifd_entries(bytes: &[u8]) -> Vec<(u16, u16, u32, [u8; 4])> {
        let u16_at = |p: usize| u16::from_le_bytes([bytes[p], bytes[p + 1]]);
        let u32_at = |p: usize| u32::from_le_bytes([bytes[p], bytes[p + 1], bytes[p + 2], bytes[p + 3]]);
        let ifd = u32_at(4) as usize;
        (0..u16_at(ifd) as usize)
            .map(|i| {
                let p = ifd + 2 + i * 12;
                let value = [bytes[p + 8], bytes[p + 9], bytes[p + 10], bytes[p + 11]];
                (u16_at(p), u16_at(p + 2), u32_at(p + 4), value)
            })
            .collect()
    }

    #[test]
    fn test_roundtrip_through_tiff_decoder() {
        let tile = tile(700, 530, 512, CrsCode::Epsg4269);
        let bytes = write_geotiff(&tile).unwrap();

        let mut decoder = Decoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (700, 530));
        assert_eq!(decoder.chunk_dimensions(), (512, 512));
        match decoder.read_image().unwrap() {
            DecodingResult::U8(pixels) => assert_eq!(pixels, tile.codes),
            _ => panic!("expected 8-bit pixels"),
        }
    }

    #[test]
    fn test_edge_tiles_padded_with_nodata() {
        let tile = tile(20, 20, 16, CrsCode::Epsg4326);
        let blocks = compress_tiles(&tile).unwrap();
        assert_eq!(blocks.len(), 4);

        // last block holds a 4x4 corner of real data
        let mut raw = Vec::new();
        flate2::read::ZlibDecoder::new(blocks[3].as_slice())
            .read_to_end(&mut raw)
            .unwrap();
        assert_eq!(raw.len(), 16 * 16);
        assert_eq!(raw[0], tile.get(16, 16).unwrap());
        assert_eq!(raw[3], tile.get(19, 16).unwrap());
        assert_eq!(raw[4], tile.nodata_code());
        assert_eq!(raw[15 * 16 + 15], tile.nodata_code());
    }

    #[test]
    fn test_metadata_tags() {
        let tile = tile(64, 32, 16, CrsCode::Epsg4269);
        let bytes = write_geotiff(&tile).unwrap();
        let entries = ifd_entries(&bytes);

        let tags: Vec<u16> = entries.iter().map(|e| e.0).collect();
        let mut sorted = tags.clone();
        sorted.sort_unstable();
        assert_eq!(tags, sorted, "IFD entries must be sorted by tag");

        let find = |tag: u16| entries.iter().find(|e| e.0 == tag).unwrap();
        assert_eq!(find(TAG_COMPRESSION).3[..2], COMPRESSION_DEFLATE.to_le_bytes());
        assert_eq!(find(TAG_TILE_WIDTH).3, 16u32.to_le_bytes());
        assert_eq!(find(TAG_TILE_OFFSETS).2, 8);
        assert_eq!(find(TAG_GDAL_NODATA).3, *b"0\0\0\0");
        assert!(entries.iter().all(|e| e.0 != TAG_MODEL_TRANSFORMATION));

        // pixel data follows all metadata
        let first_tile = u32::from_le_bytes(find(TAG_TILE_OFFSETS).3) as usize;
        let first_tile_offset = u32::from_le_bytes(
            bytes[first_tile..first_tile + 4].try_into().unwrap(),
        ) as usize;
        assert!(first_tile_offset > first_tile);
    }

    #[test]
    fn test_geokeys() {
        let geographic = geokey_directory(CrsCode::Epsg4269);
        assert_eq!(geographic[3], 3);
        assert_eq!(&geographic[4..8], &[GT_MODEL_TYPE_GEO_KEY, 0, 1, MODEL_TYPE_GEOGRAPHIC]);
        assert_eq!(&geographic[12..16], &[GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, 4269]);

        let projected = geokey_directory(CrsCode::Epsg3857);
        assert_eq!(&projected[4..8], &[GT_MODEL_TYPE_GEO_KEY, 0, 1, MODEL_TYPE_PROJECTED]);
        assert_eq!(&projected[12..16], &[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, 3857]);
    }

    #[test]
    fn test_rotated_uses_model_transformation() {
        let mut tile = tile(16, 16, 16, CrsCode::Epsg4326);
        tile.georef.transform.row_rotation = 0.001;
        let bytes = write_geotiff(&tile).unwrap();
        let entries = ifd_entries(&bytes);

        let transformation = entries
            .iter()
            .find(|e| e.0 == TAG_MODEL_TRANSFORMATION)
            .unwrap();
        assert_eq!(transformation.2, 16);
        assert!(entries.iter().all(|e| e.0 != TAG_MODEL_TIEPOINT));
    }

    #[test]
    fn test_rejects_mismatched_codes() {
        let mut tile = tile(4, 4, 16, CrsCode::Epsg4326);
        tile.codes.pop();
        assert!(matches!(write_geotiff(&tile), Err(PipelineError::Encode(_))));
    }
}
