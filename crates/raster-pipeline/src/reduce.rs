//! Temporal reduction of a cube to a single daily composite.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{check_slot_shapes, RasterCube, ReducedRaster};

/// Per-pixel aggregation over time slots.
///
/// Both methods ignore absent observations (NaN or the cube's nodata
/// sentinel); a pixel with no present observation becomes nodata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReduceMethod {
    /// Largest present value - daily peak column
    #[default]
    Max,
    /// Mean of present values
    Mean,
}

impl ReduceMethod {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "max" => Some(Self::Max),
            "mean" | "avg" => Some(Self::Mean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Mean => "mean",
        }
    }
}

/// Collapse the time axis of `cube` into one plane.
pub fn reduce(cube: &RasterCube, method: ReduceMethod) -> Result<ReducedRaster> {
    if cube.time_slots() == 0 {
        return Err(PipelineError::EmptyInput);
    }
    let pixels = cube.width() * cube.height();
    check_slot_shapes(cube.slots(), pixels)?;

    let values: Vec<Option<f32>> = (0..pixels)
        .into_par_iter()
        .map(|i| {
            let present = cube
                .slots()
                .iter()
                .map(|slot| slot[i])
                .filter(|v| !cube.is_absent(*v));
            match method {
                ReduceMethod::Max => max_of(present),
                ReduceMethod::Mean => mean_of(present),
            }
        })
        .collect();

    Ok(ReducedRaster {
        values,
        width: cube.width(),
        height: cube.height(),
        georef: *cube.georef(),
    })
}

#[inline]
fn max_of(values: impl Iterator<Item = f32>) -> Option<f32> {
    values.fold(None, |acc, v| match acc {
        Some(m) if m >= v => Some(m),
        _ => Some(v),
    })
}

/// Accumulates in f64; column densities are ~1e16 and f32 sums drift.
#[inline]
fn mean_of(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, count) = values.fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
    if count == 0 {
        None
    } else {
        Some((sum / count as f64) as f32)
    }
}
