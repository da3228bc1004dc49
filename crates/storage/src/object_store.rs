//! Object storage for source granules and encoded rasters (GCS, S3 or local).

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::{path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{StorageError, StorageResult};
use crate::filter::ObjectFilter;

/// Where objects live.
///
/// Cloud credentials are taken from the environment the way each SDK
/// expects (`GOOGLE_APPLICATION_CREDENTIALS`, `AWS_ACCESS_KEY_ID`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ObjectStorageConfig {
    Gcs {
        bucket: String,
    },
    S3 {
        bucket: String,
        /// Custom endpoint for S3-compatible services.
        endpoint: Option<String>,
        region: Option<String>,
        allow_http: bool,
    },
    Local {
        root: PathBuf,
    },
}

impl ObjectStorageConfig {
    /// `gs://bucket`, `s3://bucket` or a local directory.
    pub fn parse(location: &str) -> StorageResult<Self> {
        let location = location.trim();
        if let Some(bucket) = location.strip_prefix("gs://") {
            return Ok(Self::Gcs {
                bucket: bucket_name(bucket)?,
            });
        }
        if let Some(bucket) = location.strip_prefix("s3://") {
            return Ok(Self::S3 {
                bucket: bucket_name(bucket)?,
                endpoint: None,
                region: None,
                allow_http: false,
            });
        }
        if location.is_empty() || location.contains("://") {
            return Err(StorageError::Config(format!(
                "unsupported storage location '{}'",
                location
            )));
        }
        Ok(Self::Local {
            root: PathBuf::from(location),
        })
    }

    fn label(&self) -> String {
        match self {
            Self::Gcs { bucket } => format!("gs://{}", bucket),
            Self::S3 { bucket, .. } => format!("s3://{}", bucket),
            Self::Local { root } => root.display().to_string(),
        }
    }
}

fn bucket_name(s: &str) -> StorageResult<String> {
    let bucket = s.trim_end_matches('/');
    if bucket.is_empty() || bucket.contains('/') {
        return Err(StorageError::Config(format!(
            "expected a bare bucket name, got '{}'",
            s
        )));
    }
    Ok(bucket.to_string())
}

/// One listed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub path: String,
    pub size: usize,
    pub last_modified: DateTime<Utc>,
}

impl ObjectInfo {
    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Object storage client.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    label: String,
}

impl ObjectStorage {
    pub fn new(config: &ObjectStorageConfig) -> StorageResult<Self> {
        let store: Arc<dyn ObjectStore> = match config {
            ObjectStorageConfig::Gcs { bucket } => Arc::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|e| {
                        StorageError::Config(format!("Failed to create GCS client: {}", e))
                    })?,
            ),
            ObjectStorageConfig::S3 {
                bucket,
                endpoint,
                region,
                allow_http,
            } => {
                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_allow_http(*allow_http);
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                Arc::new(builder.build().map_err(|e| {
                    StorageError::Config(format!("Failed to create S3 client: {}", e))
                })?)
            }
            ObjectStorageConfig::Local { root } => {
                std::fs::create_dir_all(root).map_err(|e| {
                    StorageError::Config(format!("cannot create {}: {}", root.display(), e))
                })?;
                Arc::new(LocalFileSystem::new_with_prefix(root).map_err(|e| {
                    StorageError::Config(format!("invalid local root {}: {}", root.display(), e))
                })?)
            }
        };

        let label = config.label();
        info!(storage = %label, "Object storage ready");
        Ok(Self { store, label })
    }

    /// Wrap an existing store, e.g. `object_store::memory::InMemory`.
    pub fn from_store(store: Arc<dyn ObjectStore>, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Objects under `prefix` that pass `filter`, in name order.
    #[instrument(skip(self, filter), fields(storage = %self.label))]
    pub async fn list(&self, prefix: &str, filter: &ObjectFilter) -> StorageResult<Vec<ObjectInfo>> {
        let prefix_path = Path::from(prefix);
        let prefix_ref = if prefix.is_empty() {
            None
        } else {
            Some(&prefix_path)
        };

        let mut objects = Vec::new();
        let mut stream = self.store.list(prefix_ref);
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| StorageError::from_store(prefix, e))?
        {
            objects.push(ObjectInfo {
                path: meta.location.to_string(),
                size: meta.size,
                last_modified: meta.last_modified,
            });
        }

        let listed = objects.len();
        let objects = filter.apply(objects, |o| o.path.as_str());
        debug!(listed, selected = objects.len(), "Listed objects");
        Ok(objects)
    }

    /// Read a whole object.
    #[instrument(skip(self), fields(storage = %self.label))]
    pub async fn get(&self, path: &str) -> StorageResult<Bytes> {
        let location = Path::from(path);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| StorageError::from_store(path, e))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::from_store(path, e))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Write a whole object, replacing any previous version.
    #[instrument(skip(self, data), fields(storage = %self.label, size = data.len()))]
    pub async fn put(&self, path: &str, data: Bytes) -> StorageResult<()> {
        let location = Path::from(path);

        self.store
            .put(&location, data)
            .await
            .map_err(|e| StorageError::from_store(path, e))?;

        debug!("Wrote object");
        Ok(())
    }

    pub async fn exists(&self, path: &str) -> StorageResult<bool> {
        let location = Path::from(path);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::from_store(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn memory() -> ObjectStorage {
        ObjectStorage::from_store(Arc::new(InMemory::new()), "memory")
    }

    #[test]
    fn test_parse_locations() {
        assert_eq!(
            ObjectStorageConfig::parse("gs://tempo-data").unwrap(),
            ObjectStorageConfig::Gcs {
                bucket: "tempo-data".to_string()
            }
        );
        assert!(matches!(
            ObjectStorageConfig::parse("s3://tempo-data/").unwrap(),
            ObjectStorageConfig::S3 { bucket, .. } if bucket == "tempo-data"
        ));
        assert_eq!(
            ObjectStorageConfig::parse("/data/tempo").unwrap(),
            ObjectStorageConfig::Local {
                root: PathBuf::from("/data/tempo")
            }
        );
        assert!(ObjectStorageConfig::parse("gs://bucket/with/path").is_err());
        assert!(ObjectStorageConfig::parse("ftp://host").is_err());
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let storage = memory();
        storage
            .put("cogs/2024-01-15_NO2.tif", Bytes::from_static(b"tiff"))
            .await
            .unwrap();

        assert_eq!(
            storage.get("cogs/2024-01-15_NO2.tif").await.unwrap(),
            Bytes::from_static(b"tiff")
        );
        assert!(storage.exists("cogs/2024-01-15_NO2.tif").await.unwrap());
        assert!(!storage.exists("cogs/missing.tif").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let err = memory().get("nope.nc").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_list_with_prefix_and_filter() {
        let storage = memory();
        for name in [
            "raw/tempo_2024-01-16.nc",
            "raw/tempo_2024-01-15.nc",
            "raw/readme.txt",
            "cogs/2024-01-15_NO2.tif",
        ] {
            storage.put(name, Bytes::from_static(b"x")).await.unwrap();
        }

        let listed = storage
            .list("raw", &ObjectFilter::with_suffix(".nc"))
            .await
            .unwrap();
        let names: Vec<&str> = listed.iter().map(|o| o.file_name()).collect();
        assert_eq!(names, vec!["tempo_2024-01-15.nc", "tempo_2024-01-16.nc"]);

        let everything = storage.list("", &ObjectFilter::default()).await.unwrap();
        assert_eq!(everything.len(), 4);
    }

    #[tokio::test]
    async fn test_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ObjectStorage::new(&ObjectStorageConfig::Local {
            root: dir.path().join("bucket"),
        })
        .unwrap();

        storage
            .put("out/2024-01-15_NO2.tif", Bytes::from_static(b"II*\0"))
            .await
            .unwrap();
        assert!(dir.path().join("bucket/out/2024-01-15_NO2.tif").exists());

        let listed = storage.list("out", &ObjectFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size, 4);
    }
}
