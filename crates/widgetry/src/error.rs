//! Error types for the widgetry core
//!
//! Errors are grouped by the stage that raises them, so an operator can tell
//! a failed security gate from a malformed declaration or a broken tool.
//! Every variant is fatal for the run that produced it.

use std::fmt;
use thiserror::Error;

use crate::authz::DenyReason;
use crate::collection::ItemKey;
use crate::license::LicenseError;

/// Main error type for the widgetry core
#[derive(Error, Debug)]
pub enum WidgetryError {
    /// Missing or inconsistent inputs, detected before any work starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// A publisher declaration change was not authorized
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// A declared change is illegal
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A declaration, manifest or plan document is malformed
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// An external tool (git, packager, lookup service) failed
    #[error(transparent)]
    External(#[from] ExternalError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A publisher transition was denied
#[derive(Error, Debug)]
#[error("[{publisher}] {reason}")]
pub struct AuthorizationError {
    pub publisher: String,
    pub reason: DenyReason,
}

/// Illegal changes between the base and head declarations
///
/// Every variant carries the item it was raised for, rendered as the usual
/// `[publisher/slug] [collection]` prefix.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("{item} Cannot delete published item")]
    IllegalDeletion { item: ItemKey },

    #[error("{item} Invalid semver: {version}")]
    InvalidVersion { item: ItemKey, version: String },

    #[error("{item} Version must be incremented: {base} -> {head}")]
    VersionNotIncremented {
        item: ItemKey,
        base: String,
        head: String,
    },

    #[error("{item} Version mismatch: {manifest} (manifest) vs. {declared} (declared)")]
    VersionMismatch {
        item: ItemKey,
        manifest: String,
        declared: String,
    },

    #[error("{item} License validation failed: {reason}")]
    License { item: ItemKey, reason: LicenseError },

    #[error("{item} Invalid manifest: {source}")]
    Manifest {
        item: ItemKey,
        #[source]
        source: SchemaError,
    },
}

/// Malformed documents and identifiers
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error(
        "Invalid identifier '{value}'; expected lowercase letters and digits separated by single '-' or '_'"
    )]
    InvalidIdentifier { value: String },

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Invalid publisher declaration: {reason}")]
    InvalidPublisher { reason: String },

    #[error("Missing file: {file}")]
    MissingFile { file: String },

    #[error("Failed to parse YAML in {file}: {source}")]
    Yaml {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to parse JSON in {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SchemaError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failure of an external command, with its diagnostic output attached
#[derive(Error, Debug)]
pub struct ExternalError {
    /// Program that was run
    pub program: String,
    /// What went wrong (exit status or spawn failure)
    pub message: String,
    pub stdout: String,
    pub stderr: String,
}

impl ExternalError {
    pub fn new(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            message: message.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn with_output(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }
}

impl fmt::Display for ExternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to execute {}: {}", self.program, self.message)?;
        if !self.stdout.is_empty() || !self.stderr.is_empty() {
            write!(
                f,
                "\n\n----------\n\nStdout:\n{}\n\n----------\n\nStderr:\n{}",
                self.stdout, self.stderr
            )?;
        }
        Ok(())
    }
}

/// Shorthand result type for widgetry operations
pub type Result<T> = std::result::Result<T, WidgetryError>;
