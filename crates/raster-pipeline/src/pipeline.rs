//! Stage driver: crop → reduce → clip → encode.

use std::time::Instant;

use geo_common::{BoundingBox, CrsCode};
use tracing::{debug, info, instrument};

use crate::boundary::BoundaryPolygon;
use crate::clip::clip;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::quantize::encode;
use crate::reduce::reduce;
use crate::types::{EncodedTile, RasterCube};

/// Stage that failed, for per-artifact reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Crop,
    Reduce,
    Clip,
    Encode,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Crop => "crop",
            Stage::Reduce => "reduce",
            Stage::Clip => "clip",
            Stage::Encode => "encode",
        }
    }
}

/// Pipeline failure tagged with the stage it happened in.
#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub error: PipelineError,
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} stage failed: {}", self.stage.as_str(), self.error)
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageError>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: Stage) -> std::result::Result<T, StageError> {
        self.map_err(|error| StageError { stage, error })
    }
}

/// Runs one cube through every transformation stage.
///
/// Holds only immutable configuration, so one instance can serve many
/// artifacts concurrently.
#[derive(Debug, Clone)]
pub struct RasterPipeline {
    config: PipelineConfig,
    boundary: BoundaryPolygon,
}

impl RasterPipeline {
    pub fn new(config: PipelineConfig, boundary: BoundaryPolygon) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, boundary })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn boundary(&self) -> &BoundaryPolygon {
        &self.boundary
    }

    #[instrument(skip(self, cube), fields(time_slots = cube.time_slots(), width = cube.width(), height = cube.height()))]
    pub fn run(&self, cube: &RasterCube) -> std::result::Result<EncodedTile, StageError> {
        let start = Instant::now();

        let cropped;
        let cube = match &self.config.read_window {
            Some(window) => {
                let window = window_in_crs(window, cube.georef().crs).at(Stage::Crop)?;
                cropped = cube.crop_to(&window).at(Stage::Crop)?;
                &cropped
            }
            None => cube,
        };

        let reduced = reduce(cube, self.config.reduce).at(Stage::Reduce)?;
        debug!(valid = reduced.valid_count(), "Reduced time slots");

        let clipped = clip(&reduced, &self.boundary).at(Stage::Clip)?;
        debug!(valid = clipped.valid_count(), "Clipped to boundary");

        let tile = encode(&clipped, &self.config.profile, self.config.block_size)
            .at(Stage::Encode)?;

        let stats = tile.statistics();
        info!(
            width = tile.width,
            height = tile.height,
            valid_pixels = stats.valid_pixels,
            min_value = ?stats.min_value,
            max_value = ?stats.max_value,
            duration_ms = start.elapsed().as_millis() as u64,
            "Encoded raster"
        );

        Ok(tile)
    }
}

/// Lon/lat window expressed in `crs`.
fn window_in_crs(window: &BoundingBox, crs: CrsCode) -> Result<BoundingBox> {
    if crs.is_geographic() {
        return Ok(*window);
    }
    let corners = [
        (window.min_x, window.min_y),
        (window.min_x, window.max_y),
        (window.max_x, window.min_y),
        (window.max_x, window.max_y),
    ];
    let projected = corners
        .iter()
        .map(|&(x, y)| CrsCode::Epsg4326.transform_point_to(crs, x, y))
        .collect::<geo_common::GeoResult<Vec<_>>>()?;
    BoundingBox::from_points(projected)
        .ok_or_else(|| PipelineError::Config(format!("cannot project window {}", window)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_common::{GeoReference, GeoTransform};

    fn boundary() -> BoundaryPolygon {
        BoundaryPolygon::from_geojson_str(
            r#"{"type": "Polygon", "coordinates": [[[0, 0], [4, 0], [4, 4], [0, 4], [0, 0]]]}"#,
        )
        .unwrap()
    }

    fn cube(origin_x: f64) -> RasterCube {
        let georef = GeoReference::new(
            GeoTransform::north_up(origin_x, 4.0, 1.0, 1.0),
            CrsCode::Epsg4269,
        );
        RasterCube::new(vec![vec![5.0e15; 16], vec![f32::NAN; 16]], 4, 4, georef, None).unwrap()
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            block_size: 16,
            read_window: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_run_produces_expected_codes() {
        let pipeline = RasterPipeline::new(config(), boundary()).unwrap();
        let tile = pipeline.run(&cube(0.0)).unwrap();
        assert_eq!(tile.codes, vec![128; 16]);
        assert_eq!(tile.statistics().valid_pixels, 16);
    }

    #[test]
    fn test_failure_reports_stage() {
        let pipeline = RasterPipeline::new(config(), boundary()).unwrap();
        let err = pipeline.run(&cube(100.0)).unwrap_err();
        assert_eq!(err.stage, Stage::Clip);
        assert!(matches!(err.error, PipelineError::NoOverlap { .. }));
    }

    #[test]
    fn test_read_window_outside_cube() {
        let config = PipelineConfig {
            read_window: Some(BoundingBox::louisiana()),
            ..config()
        };
        let pipeline = RasterPipeline::new(config, boundary()).unwrap();
        let err = pipeline.run(&cube(0.0)).unwrap_err();
        assert_eq!(err.stage, Stage::Crop);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config();
        config.profile.nodata_code = 10;
        assert!(matches!(
            RasterPipeline::new(config, boundary()),
            Err(PipelineError::InvalidProfile(_))
        ));
    }
}
