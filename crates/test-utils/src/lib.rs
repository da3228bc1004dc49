//! Shared test utilities for the tempo-tiles workspace.
//!
//! Synthetic NO2 cubes, boundary fixtures, float assertions and a
//! skip-if-absent helper for real granules.

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Path of a named granule, or return from the calling test.
///
/// ```ignore
/// let path = require_granule!("tempo_2024-01-15.nc");
/// ```
#[macro_export]
macro_rules! require_granule {
    ($name:expr) => {{
        match $crate::find_granule($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "skipping: granule {} not found (set {})",
                    $name,
                    $crate::GRANULE_DIR_ENV
                );
                return;
            }
        }
    }};
}

/// Absolute floating-point equality within `epsilon`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (left, right, epsilon) = ($left as f64, $right as f64, $epsilon as f64);
        assert!(
            (left - right).abs() <= epsilon,
            "assertion failed: {} != {} within {}",
            left,
            right,
            epsilon
        );
    }};
}

/// Relative equality, for values spanning many orders of magnitude.
///
/// ```ignore
/// assert_rel_eq!(1.0000001e16, 1.0e16, 1e-6);
/// ```
#[macro_export]
macro_rules! assert_rel_eq {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let scale = left.abs().max(right.abs()).max(f64::MIN_POSITIVE);
        $crate::assert_approx_eq!(left / scale, right / scale, $tolerance);
    }};
}
