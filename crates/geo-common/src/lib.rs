//! Common types and utilities shared across the TEMPO tileset crates.
//!
//! - [`BoundingBox`]: axis-aligned extents in a CRS's native units
//! - [`CrsCode`]: the small set of coordinate systems the pipeline understands
//! - [`GeoTransform`] / [`GeoReference`]: affine pixel ↔ world mapping
//! - [`ArtifactId`]: deterministic identity of one daily composite

pub mod artifact;
pub mod bbox;
pub mod crs;
pub mod error;
pub mod transform;

pub use artifact::{extract_date, ArtifactId, DEFAULT_PRODUCT};
pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{GeoError, GeoResult};
pub use transform::{GeoReference, GeoTransform};
