use std::path::PathBuf;
use std::sync::Arc;

use crate::application::ports::{ObjectStorage, ObjectStorageError};
use crate::presentation::config::{BucketSettings, StorageProviderSetting, StorageSettings};

use super::ObjectStoreStorage;

pub struct StorageFactory;

impl StorageFactory {
    /// Store holding uploads and extraction artifacts.
    pub fn live(settings: &StorageSettings) -> Result<Arc<dyn ObjectStorage>, ObjectStorageError> {
        Self::create(settings, &settings.live)
    }

    /// Cold store receiving archived jobs.
    pub fn archive(settings: &StorageSettings) -> Result<Arc<dyn ObjectStorage>, ObjectStorageError> {
        Self::create(settings, &settings.archive)
    }

    fn create(
        settings: &StorageSettings,
        bucket: &BucketSettings,
    ) -> Result<Arc<dyn ObjectStorage>, ObjectStorageError> {
        let store = match settings.provider {
            StorageProviderSetting::Memory => ObjectStoreStorage::in_memory(),
            StorageProviderSetting::Local => {
                ObjectStoreStorage::local(PathBuf::from(&bucket.local_path))?
            }
            StorageProviderSetting::Azure => {
                let account = settings.azure_account.as_deref().ok_or_else(|| {
                    ObjectStorageError::Configuration("azure_account required".into())
                })?;
                let key = settings.azure_access_key.as_deref().ok_or_else(|| {
                    ObjectStorageError::Configuration("azure_access_key required".into())
                })?;
                let container = bucket.container.as_deref().ok_or_else(|| {
                    ObjectStorageError::Configuration("container required".into())
                })?;
                ObjectStoreStorage::azure(account, key, container)?
            }
            StorageProviderSetting::S3 => {
                let bucket_name = bucket.container.as_deref().ok_or_else(|| {
                    ObjectStorageError::Configuration("container required".into())
                })?;
                ObjectStoreStorage::s3(bucket_name)?
            }
        };
        Ok(Arc::new(store))
    }
}
