//! Native NetCDF cube reading using the netcdf library.
//!
//! The netcdf library requires a file path (it wraps libnetcdf/HDF5 which need
//! file handles). When reading from bytes, we write to a temp file first, on
//! Linux under `/dev/shm` (memory-backed tmpfs) to minimize I/O latency.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;

use geo_common::{BoundingBox, GeoReference};
use tracing::{debug, instrument};

use crate::error::{NetCdfError, NetCdfResult};
use crate::grid::{self, GridLayout, ValueCoding};
use crate::{CubeGrid, ReaderConfig};

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully (e.g. when probing for optional attributes).
/// Call early in `main()`; safe to call multiple times.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way to disable error output.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Read a time × lat × lon cube from a NetCDF file.
///
/// `window` optionally restricts the read to cells whose centers fall inside
/// it; only that hyperslab is pulled from disk.
#[instrument(skip(config), fields(variable = %config.variable))]
pub fn read_cube(
    path: &Path,
    config: &ReaderConfig,
    window: Option<&BoundingBox>,
) -> NetCdfResult<CubeGrid> {
    config.validate()?;
    silence_hdf5_errors();

    let nc_file = netcdf::open(path)
        .map_err(|e| NetCdfError::Layout(format!("Failed to open NetCDF: {}", e)))?;

    let lat = read_axis(&nc_file, &config.lat_name)?;
    let lon = read_axis(&nc_file, &config.lon_name)?;
    let layout = grid::layout(&lat, &lon, window)?;

    let planes = match config.variable.split_once('/') {
        Some((group_name, var_name)) => {
            let group = nc_file
                .group(group_name)
                .map_err(|e| NetCdfError::Layout(format!("group {}: {}", group_name, e)))?
                .ok_or_else(|| NetCdfError::Missing(format!("{} group", group_name)))?;
            let var = group
                .variable(var_name)
                .ok_or_else(|| NetCdfError::Missing(format!("{} variable", config.variable)))?;
            read_planes(&var, &layout, lat.len(), lon.len())?
        }
        None => {
            let var = nc_file
                .variable(&config.variable)
                .ok_or_else(|| NetCdfError::Missing(format!("{} variable", config.variable)))?;
            read_planes(&var, &layout, lat.len(), lon.len())?
        }
    };

    debug!(
        time_slots = planes.planes.len(),
        width = layout.width(),
        height = layout.height(),
        "Read NetCDF cube"
    );

    Ok(CubeGrid {
        planes: planes.planes,
        width: layout.width(),
        height: layout.height(),
        georef: GeoReference::new(layout.transform, config.crs),
        nodata: planes.fill_value.map(|v| v as f32),
    })
}

/// Read a cube from in-memory NetCDF bytes (e.g. fetched from object storage).
pub fn read_cube_from_bytes(
    data: &[u8],
    config: &ReaderConfig,
    window: Option<&BoundingBox>,
) -> NetCdfResult<CubeGrid> {
    read_cube_from_bytes_in(&get_optimal_temp_dir(), data, config, window)
}

/// Stage `data` as a file under `dir` and read it; the file is removed on
/// every path, including a failed write.
fn read_cube_from_bytes_in(
    dir: &Path,
    data: &[u8],
    config: &ReaderConfig,
    window: Option<&BoundingBox>,
) -> NetCdfResult<CubeGrid> {
    let mut staged = tempfile::Builder::new()
        .prefix("tempo_cube_")
        .suffix(".nc")
        .tempfile_in(dir)?;
    staged.write_all(data)?;
    staged.flush()?;

    read_cube(staged.path(), config, window)
}

struct PlaneSet {
    planes: Vec<Vec<f32>>,
    fill_value: Option<f64>,
}

fn read_planes(
    var: &netcdf::Variable,
    layout: &GridLayout,
    n_lat: usize,
    n_lon: usize,
) -> NetCdfResult<PlaneSet> {
    let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let spatial = &dims[dims.len().saturating_sub(2)..];
    if spatial != [n_lat, n_lon] {
        return Err(NetCdfError::Layout(format!(
            "{} has shape {:?}, expected (.., {}, {})",
            var.name(),
            dims,
            n_lat,
            n_lon
        )));
    }

    let coding = ValueCoding {
        fill_value: get_f64_attr(var, "_FillValue"),
        scale_factor: get_f64_attr(var, "scale_factor").unwrap_or(1.0),
        add_offset: get_f64_attr(var, "add_offset").unwrap_or(0.0),
    };

    let rows = layout.rows.clone();
    let cols = layout.cols.clone();
    let read_err = |e: netcdf::Error| {
        NetCdfError::Layout(format!("Failed to read {}: {}", var.name(), e))
    };

    let planes = match dims.len() {
        2 => {
            let raw: Vec<f64> = var.get_values((rows, cols)).map_err(read_err)?;
            vec![grid::to_plane(&raw, layout, &coding)]
        }
        3 => (0..dims[0])
            .map(|t| {
                let raw: Vec<f64> = var
                    .get_values((t..t + 1, rows.clone(), cols.clone()))
                    .map_err(read_err)?;
                Ok(grid::to_plane(&raw, layout, &coding))
            })
            .collect::<NetCdfResult<Vec<_>>>()?,
        n => {
            return Err(NetCdfError::Layout(format!(
                "{} has {} dimensions, expected 2 or 3",
                var.name(),
                n
            )))
        }
    };

    Ok(PlaneSet {
        planes,
        fill_value: coding.fill_value,
    })
}

fn read_axis(nc_file: &netcdf::File, name: &str) -> NetCdfResult<Vec<f64>> {
    let var = nc_file
        .variable(name)
        .ok_or_else(|| NetCdfError::Missing(format!("{} variable", name)))?;
    var.get_values(..)
        .map_err(|e| NetCdfError::Layout(format!("Failed to read {}: {}", name, e)))
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Get the optimal temp directory for NetCDF file operations.
///
/// On Linux, uses /dev/shm (memory-backed tmpfs) if writable.
fn get_optimal_temp_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let shm_path = Path::new("/dev/shm");
        if shm_path.is_dir() {
            let test_path = shm_path.join(format!(".tempo_test_{}", std::process::id()));
            if std::fs::write(&test_path, b"test").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return shm_path.to_path_buf();
            }
        }
    }

    std::env::temp_dir()
}

/// Check for an attribute without triggering HDF5 error spam.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimal_temp_dir() {
        let dir = get_optimal_temp_dir();
        assert!(dir.exists(), "Temp dir should exist");
    }

    #[test]
    fn test_staged_file_removed_after_failed_read() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_cube_from_bytes_in(
            dir.path(),
            b"not a netcdf file",
            &ReaderConfig::default(),
            None,
        );
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_staging_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("absent");
        let result = read_cube_from_bytes_in(&gone, b"bytes", &ReaderConfig::default(), None);
        assert!(matches!(result, Err(NetCdfError::Io(_))));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let result = read_cube_from_bytes(b"not a netcdf file", &ReaderConfig::default(), None);
        assert!(matches!(result, Err(NetCdfError::Layout(_))));
    }
}
