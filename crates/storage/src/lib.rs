//! Storage access for the TEMPO tileset services.
//!
//! A thin layer over `object_store`: the same listing, filtering and
//! byte-level get/put work against Google Cloud Storage, S3 or a local
//! directory.

pub mod error;
pub mod filter;
pub mod object_store;

pub use self::object_store::{ObjectInfo, ObjectStorage, ObjectStorageConfig};
pub use error::{StorageError, StorageResult};
pub use filter::ObjectFilter;
