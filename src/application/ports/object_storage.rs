use bytes::Bytes;

use crate::domain::ObjectKey;

#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &ObjectKey, data: Bytes) -> Result<(), ObjectStorageError>;

    async fn fetch(&self, key: &ObjectKey) -> Result<Bytes, ObjectStorageError>;

    /// Size in bytes. `NotFound` when the object is absent.
    async fn head(&self, key: &ObjectKey) -> Result<u64, ObjectStorageError>;

    async fn delete(&self, key: &ObjectKey) -> Result<(), ObjectStorageError>;

    async fn list(&self, prefix: &ObjectKey) -> Result<Vec<ObjectKey>, ObjectStorageError>;

    async fn exists(&self, key: &ObjectKey) -> Result<bool, ObjectStorageError> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(ObjectStorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ObjectStorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("list failed: {0}")]
    ListFailed(String),
    #[error("configuration: {0}")]
    Configuration(String),
}
