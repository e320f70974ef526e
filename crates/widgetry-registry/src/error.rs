//! Error types for the widgetry registry

use thiserror::Error;
use widgetry::ItemKey;

use crate::special_files::SpecialFileError;
use crate::storage::StorageError;

/// Registry-specific errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Core(#[from] widgetry::WidgetryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to (de)serialize {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The persisted index was written for another schema; a configuration error
    #[error("Expected API version {expected}, but current API version is {found}")]
    ApiVersionMismatch { expected: String, found: String },

    #[error("{item} {source}")]
    SpecialFile {
        item: ItemKey,
        #[source]
        source: SpecialFileError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Whether the error stems from inconsistent inputs rather than a failed step
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            RegistryError::ApiVersionMismatch { .. }
                | RegistryError::Core(widgetry::WidgetryError::Config(_))
        )
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
