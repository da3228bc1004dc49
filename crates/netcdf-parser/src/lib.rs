//! NetCDF reader for TEMPO Level-3 gridded products.
//!
//! Reads one data variable laid out as `time × latitude × longitude` (or a
//! single `latitude × longitude` plane) together with its 1-D coordinate
//! variables, and returns the stack of planes in north-up row order with a
//! geotransform derived from the coordinate axes.
//!
//! # TEMPO L3 layout
//!
//! ```text
//! latitude(latitude)                         root group, cell centers
//! longitude(longitude)                       root group, cell centers
//! product/vertical_column_troposphere(time, latitude, longitude)
//!     _FillValue, units = "molecules/cm^2"
//! ```
//!
//! The files carry no usable CRS metadata, so the CRS is assigned from
//! [`ReaderConfig::crs`].

pub mod error;
pub mod grid;
pub mod native;

pub use error::{NetCdfError, NetCdfResult};
pub use native::{read_cube, read_cube_from_bytes, silence_hdf5_errors};

use geo_common::{CrsCode, GeoReference};

/// Default TEMPO tropospheric NO2 column variable.
pub const DEFAULT_VARIABLE: &str = "product/vertical_column_troposphere";

/// Which variable to read and how to georeference it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    /// Variable path; one optional group level, e.g. `product/name`.
    pub variable: String,
    pub lat_name: String,
    pub lon_name: String,
    /// CRS assigned to the output grid.
    pub crs: CrsCode,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            variable: DEFAULT_VARIABLE.to_string(),
            lat_name: "latitude".to_string(),
            lon_name: "longitude".to_string(),
            crs: CrsCode::Epsg4269,
        }
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> NetCdfResult<()> {
        if self.lat_name.is_empty() || self.lon_name.is_empty() {
            return Err(NetCdfError::Config("coordinate names must be set".to_string()));
        }
        let parts: Vec<&str> = self.variable.split('/').collect();
        if parts.len() > 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(NetCdfError::Config(format!(
                "variable '{}' must be 'name' or 'group/name'",
                self.variable
            )));
        }
        Ok(())
    }
}

/// Planes read from one file, before they become a pipeline cube.
#[derive(Debug, Clone)]
pub struct CubeGrid {
    /// One row-major plane per time slot; fill values are NaN.
    pub planes: Vec<Vec<f32>>,
    pub width: usize,
    pub height: usize,
    pub georef: GeoReference,
    /// The variable's `_FillValue`, if declared.
    pub nodata: Option<f32>,
}

impl CubeGrid {
    pub fn time_slots(&self) -> usize {
        self.planes.len()
    }
}
