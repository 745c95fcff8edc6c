use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};

use crate::application::ports::{ObjectStorage, ObjectStorageError};
use crate::domain::ObjectKey;

/// `ObjectStorage` over any `object_store` backend.
pub struct ObjectStoreStorage {
    inner: Arc<dyn ObjectStore>,
}

impl ObjectStoreStorage {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    pub fn local(base_path: PathBuf) -> Result<Self, ObjectStorageError> {
        std::fs::create_dir_all(&base_path)
            .map_err(|e| ObjectStorageError::Configuration(e.to_string()))?;
        let fs = object_store::local::LocalFileSystem::new_with_prefix(base_path)
            .map_err(|e| ObjectStorageError::Configuration(e.to_string()))?;
        Ok(Self::new(Arc::new(fs)))
    }

    pub fn azure(account: &str, access_key: &str, container: &str) -> Result<Self, ObjectStorageError> {
        let store = object_store::azure::MicrosoftAzureBuilder::new()
            .with_account(account)
            .with_access_key(access_key)
            .with_container_name(container)
            .build()
            .map_err(|e| ObjectStorageError::Configuration(e.to_string()))?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Credentials and region come from the standard AWS environment variables.
    pub fn s3(bucket: &str) -> Result<Self, ObjectStorageError> {
        let store = object_store::aws::AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| ObjectStorageError::Configuration(e.to_string()))?;
        Ok(Self::new(Arc::new(store)))
    }
}

fn store_path(key: &ObjectKey) -> StorePath {
    StorePath::from(key.as_str())
}

fn is_not_found(e: &object_store::Error) -> bool {
    matches!(e, object_store::Error::NotFound { .. })
}

#[async_trait::async_trait]
impl ObjectStorage for ObjectStoreStorage {
    async fn put(&self, key: &ObjectKey, data: Bytes) -> Result<(), ObjectStorageError> {
        self.inner
            .put(&store_path(key), PutPayload::from(data))
            .await
            .map(|_| ())
            .map_err(|e| ObjectStorageError::UploadFailed(e.to_string()))
    }

    async fn fetch(&self, key: &ObjectKey) -> Result<Bytes, ObjectStorageError> {
        let result = self.inner.get(&store_path(key)).await.map_err(|e| {
            if is_not_found(&e) {
                ObjectStorageError::NotFound(key.to_string())
            } else {
                ObjectStorageError::DownloadFailed(e.to_string())
            }
        })?;

        result
            .bytes()
            .await
            .map_err(|e| ObjectStorageError::DownloadFailed(e.to_string()))
    }

    async fn head(&self, key: &ObjectKey) -> Result<u64, ObjectStorageError> {
        let meta = self.inner.head(&store_path(key)).await.map_err(|e| {
            if is_not_found(&e) {
                ObjectStorageError::NotFound(key.to_string())
            } else {
                ObjectStorageError::DownloadFailed(e.to_string())
            }
        })?;
        Ok(meta.size)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), ObjectStorageError> {
        self.inner.delete(&store_path(key)).await.map_err(|e| {
            if is_not_found(&e) {
                ObjectStorageError::NotFound(key.to_string())
            } else {
                ObjectStorageError::DeleteFailed(e.to_string())
            }
        })
    }

    async fn list(&self, prefix: &ObjectKey) -> Result<Vec<ObjectKey>, ObjectStorageError> {
        self.inner
            .list(Some(&store_path(prefix)))
            .map_ok(|meta| ObjectKey::from_raw(meta.location.to_string()))
            .try_collect()
            .await
            .map_err(|e| ObjectStorageError::ListFailed(e.to_string()))
    }
}
