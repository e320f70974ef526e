//! Source records: where an item's upstream code lives

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::identifier::Slug;

/// Declared upstream location, commit and version of one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Repository URL
    pub repo: String,

    /// Commit identifier (SHA-1 or SHA-256, hex)
    pub commit: String,

    /// Subdirectory of the repository holding the item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Declared semantic version; must match the manifest at `commit`
    pub version: String,
}

impl SourceRecord {
    /// Validate repository URL, commit hash and subpath
    ///
    /// The version is checked by the change validator so that its error can
    /// carry the item prefix.
    pub fn validate(&self) -> Result<(), SchemaError> {
        url::Url::parse(&self.repo)
            .map_err(|e| SchemaError::invalid_field("repo", format!("{}: {e}", self.repo)))?;

        let is_hex = self.commit.chars().all(|c| c.is_ascii_hexdigit());
        if !is_hex || !matches!(self.commit.len(), 40 | 64) {
            return Err(SchemaError::invalid_field(
                "commit",
                format!("expected a SHA-1 or SHA-256 hex digest, got '{}'", self.commit),
            ));
        }

        if let Some(path) = &self.path {
            validate_relative_path(path).map_err(|reason| SchemaError::invalid_field("path", reason))?;
        }

        Ok(())
    }
}

/// Source records of one publisher within one collection, in file order
pub type SourceMap = IndexMap<Slug, SourceRecord>;

/// Parse a `<collection>/<publisher>.yaml` document
///
/// Keys are validated as safe identifiers while deserializing.
pub fn parse_sources(content: &str, file: &str) -> Result<SourceMap, SchemaError> {
    if content.trim().is_empty() {
        return Ok(SourceMap::new());
    }

    let sources: Option<SourceMap> =
        serde_yaml::from_str(content).map_err(|source| SchemaError::Yaml {
            file: file.to_string(),
            source,
        })?;
    let sources = sources.unwrap_or_default();

    for (slug, record) in &sources {
        record.validate().map_err(|err| {
            SchemaError::invalid_field(format!("{file}: {slug}"), err.to_string())
        })?;
    }

    Ok(sources)
}

/// Reject absolute paths and `..` segments
pub(crate) fn validate_relative_path(path: &str) -> Result<(), String> {
    if path.trim().is_empty() {
        return Err("path cannot be empty".into());
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(format!("path cannot be absolute: {path}"));
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(format!("path cannot contain '..' segments: {path}"));
    }
    Ok(())
}
