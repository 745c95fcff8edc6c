mod object_store_storage;
mod storage_factory;

pub use object_store_storage::ObjectStoreStorage;
pub use storage_factory::StorageFactory;
