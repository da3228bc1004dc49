//! Raster transformation pipeline for TEMPO NO2 composites.
//!
//! # Architecture
//!
//! ```text
//! RasterCube (time × rows × cols, f32, NaN / sentinel = absent)
//!      │
//!      ├─► RasterCube::crop_to(read_window)
//!      │
//!      ├─► reduce(method)          NaN-aware max / mean  → ReducedRaster
//!      │
//!      ├─► clip(boundary)          even-odd pixel-center → ClippedRaster
//!      │
//!      └─► encode(profile, block)  affine 8-bit codes    → EncodedTile
//!               │
//!               ▼
//!          tiled DEFLATE GeoTIFF bytes
//! ```
//!
//! Nodata is carried as `None` from reduction onward and becomes
//! `nodata_code` only at encoding, which is the single place a physical
//! value turns into a code.
//!
//! # Example
//!
//! ```ignore
//! use raster_pipeline::{BoundaryPolygon, PipelineConfig, RasterPipeline};
//!
//! let boundary = BoundaryPolygon::from_geojson_str(&geojson)?;
//! let pipeline = RasterPipeline::new(PipelineConfig::default(), boundary)?;
//! let tile = pipeline.run(&cube)?;
//! tile.write(Path::new("2024-01-15_NO2.tif"))?;
//! ```

pub mod boundary;
pub mod clip;
pub mod config;
pub mod error;
pub mod geotiff;
pub mod pipeline;
pub mod quantize;
pub mod reduce;
pub mod types;

// Re-export commonly used types at crate root
pub use boundary::{BoundaryPolygon, Ring};
pub use clip::clip;
pub use config::{PipelineConfig, DEFAULT_BLOCK_SIZE};
pub use error::{PipelineError, Result};
pub use geotiff::write_geotiff;
pub use pipeline::{RasterPipeline, Stage, StageError};
pub use quantize::{encode, QuantizationProfile};
pub use reduce::{reduce, ReduceMethod};
pub use types::{ClippedRaster, EncodedTile, RasterCube, ReducedRaster, TileStatistics};
