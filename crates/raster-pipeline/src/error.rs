//! Error types for the raster pipeline.

use thiserror::Error;

/// Errors that end processing of one artifact.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The cube has no time slots.
    #[error("raster cube has no time slots")]
    EmptyInput,

    /// A plane does not match the declared grid shape.
    #[error("shape mismatch: expected {expected} values, time slot {slot} has {actual}")]
    ShapeMismatch {
        slot: usize,
        expected: usize,
        actual: usize,
    },

    /// Clip polygon or read window does not overlap the raster extent.
    #[error("region {region} does not overlap raster extent {raster}")]
    NoOverlap { region: String, raster: String },

    /// Quantization profile is unusable.
    #[error("invalid quantization profile: {0}")]
    InvalidProfile(String),

    /// Boundary payload could not be interpreted as polygons.
    #[error("invalid boundary: {0}")]
    InvalidBoundary(String),

    /// CRS not supported for clipping or writing.
    #[error("unsupported CRS: {0}")]
    UnsupportedCrs(String),

    /// Output encoding failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create a NoOverlap error.
    pub fn no_overlap(region: impl ToString, raster: impl ToString) -> Self {
        Self::NoOverlap {
            region: region.to_string(),
            raster: raster.to_string(),
        }
    }

    /// Create an InvalidBoundary error.
    pub fn invalid_boundary(msg: impl Into<String>) -> Self {
        Self::InvalidBoundary(msg.into())
    }

    /// Short stage label used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::ShapeMismatch { .. } => "shape_mismatch",
            Self::NoOverlap { .. } => "no_overlap",
            Self::InvalidProfile(_) => "invalid_profile",
            Self::InvalidBoundary(_) => "invalid_boundary",
            Self::UnsupportedCrs(_) => "unsupported_crs",
            Self::Encode(_) => "encode",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }
}

impl From<geo_common::GeoError> for PipelineError {
    fn from(err: geo_common::GeoError) -> Self {
        use geo_common::GeoError;
        match err {
            GeoError::UnsupportedCrs(crs) => Self::UnsupportedCrs(crs),
            GeoError::ProjectionError(msg) => Self::InvalidBoundary(msg),
            GeoError::InvalidBbox(_) | GeoError::InvalidTransform(_) => {
                Self::Config(err.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidBoundary(err.to_string())
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
