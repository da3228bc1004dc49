//! Storage error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    /// Network or service-side failure; the same call may succeed later.
    #[error("transient storage error: {0}")]
    Transient(String),

    /// Rejected request (bad path, permissions, unsupported operation).
    #[error("storage error: {0}")]
    Permanent(String),

    #[error("storage configuration error: {0}")]
    Config(String),
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }

    /// Classify an `object_store` failure for `path`.
    pub(crate) fn from_store(path: &str, err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => StorageError::NotFound(path.to_string()),
            object_store::Error::Generic { store, source } => {
                StorageError::Transient(format!("{} ({}): {}", path, store, source))
            }
            other => StorageError::Permanent(format!("{}: {}", path, other)),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
