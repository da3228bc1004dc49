//! Publishing of encoded rasters as hosted raster-array tilesets.
//!
//! Each artifact moves through source upload, tileset creation, publish and
//! job polling. Rate-limited writes are retried with [`RetryPolicy`]; an
//! existing tileset short-circuits the whole sequence.

pub mod client;
pub mod config;
pub mod error;
pub mod publisher;
pub mod recipe;
pub mod retry;

pub use client::{ApiResponse, HttpTilesetClient, TilesetApi};
pub use config::{PollConfig, TilesetServiceConfig, DEFAULT_BASE_URL};
pub use error::{PublishError, Result};
pub use publisher::{PublishReport, PublishStage, PublishState, Publisher};
pub use recipe::{Recipe, RecipeConfig};
pub use retry::RetryPolicy;
