//! Error handling for the command line entry points

use thiserror::Error;
use widgetry::{ExternalError, WidgetryError};
use widgetry_registry::RegistryError;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] WidgetryError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExternalError> for CliError {
    fn from(err: ExternalError) -> Self {
        CliError::Core(err.into())
    }
}
