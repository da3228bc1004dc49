//! Errors raised while reading a granule.

use thiserror::Error;

pub type NetCdfResult<T> = Result<T, NetCdfError>;

#[derive(Error, Debug)]
pub enum NetCdfError {
    #[error("granule I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A variable, group or coordinate the reader was told to use is absent.
    #[error("{0} not found in granule")]
    Missing(String),

    /// The file opened but its dimensions, coordinates or values are unusable.
    #[error("unusable granule layout: {0}")]
    Layout(String),

    #[error("invalid reader configuration: {0}")]
    Config(String),

    #[error("read window {0} selects no grid cells")]
    EmptyWindow(String),
}
