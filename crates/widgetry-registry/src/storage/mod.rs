//! Storage abstraction for registry data

pub mod blob_storage;
pub mod filesystem;

pub use blob_storage::{BlobStorage, MemoryStorage, StorageError};
pub use filesystem::FileSystemStorage;
