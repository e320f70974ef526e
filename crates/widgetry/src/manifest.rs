//! Item manifests: the self-declared metadata inside an item's source tree

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::collection::Collection;
use crate::error::{Result, SchemaError};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));

const NAME_MAX_CHARS: usize = 80;
const DESCRIPTION_MAX_CHARS: usize = 160;

/// An author, either a bare name or a structured record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Author {
    Name(String),
    Detailed {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl Author {
    pub fn name(&self) -> &str {
        match self {
            Author::Name(name) => name,
            Author::Detailed { name, .. } => name,
        }
    }

    fn validate(&self) -> std::result::Result<(), SchemaError> {
        if self.name().trim().is_empty() {
            return Err(SchemaError::invalid_field("authors", "author name cannot be empty"));
        }
        if let Author::Detailed { email, url, .. } = self {
            if let Some(email) = email {
                if !EMAIL.is_match(email) {
                    return Err(SchemaError::invalid_field(
                        "authors",
                        format!("invalid email '{email}'"),
                    ));
                }
            }
            if let Some(url) = url {
                url::Url::parse(url).map_err(|e| {
                    SchemaError::invalid_field("authors", format!("invalid url '{url}': {e}"))
                })?;
            }
        }
        Ok(())
    }
}

/// Readme/changelog selection in the manifest
///
/// Absent means auto-detect and skip when nothing is found; `true` means
/// auto-detect and fail when nothing is found; `false` disables capture; a
/// string names the file explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecialFile {
    Toggle(bool),
    Path(String),
}

/// Metadata embedded in an item's source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub authors: Vec<Author>,
    /// SPDX license expression
    pub license: String,
    pub description: String,
    pub homepage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<SpecialFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<SpecialFile>,
}

impl Manifest {
    /// Deserialize and validate a manifest
    pub fn from_bytes(bytes: &[u8], file: &str) -> std::result::Result<Self, SchemaError> {
        let manifest: Manifest =
            serde_json::from_slice(bytes).map_err(|source| SchemaError::Json {
                file: file.to_string(),
                source,
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check field constraints
    ///
    /// The version is only checked for being present here; semver syntax and
    /// agreement with the source record are the change validator's job.
    pub fn validate(&self) -> std::result::Result<(), SchemaError> {
        check_length("name", &self.name, NAME_MAX_CHARS)?;
        check_length("description", &self.description, DESCRIPTION_MAX_CHARS)?;

        if self.version.trim().is_empty() {
            return Err(SchemaError::invalid_field("version", "cannot be empty"));
        }
        if crate::version::parse(&self.version).is_err() {
            return Err(SchemaError::invalid_field(
                "version",
                format!("'{}' is not a semantic version", self.version),
            ));
        }

        if self.authors.is_empty() {
            return Err(SchemaError::invalid_field("authors", "at least one author is required"));
        }
        for author in &self.authors {
            author.validate()?;
        }

        if self.license.trim().is_empty() {
            return Err(SchemaError::invalid_field("license", "cannot be empty"));
        }

        url::Url::parse(&self.homepage).map_err(|e| {
            SchemaError::invalid_field("homepage", format!("'{}': {e}", self.homepage))
        })?;

        for (field, selection) in [("readme", &self.readme), ("changelog", &self.changelog)] {
            if let Some(SpecialFile::Path(path)) = selection {
                crate::source::validate_relative_path(path)
                    .map_err(|reason| SchemaError::invalid_field(field, reason))?;
            }
        }

        Ok(())
    }

    /// Author names as they appear in the registry index
    pub fn author_names(&self) -> Vec<String> {
        self.authors.iter().map(|a| a.name().to_string()).collect()
    }
}

fn check_length(field: &str, value: &str, max: usize) -> std::result::Result<(), SchemaError> {
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(SchemaError::invalid_field(
            field,
            format!("must be 1 to {max} characters, got {len}"),
        ));
    }
    Ok(())
}

/// Read the manifest of a checked-out item
///
/// Always reads from disk: the tree at the declared commit is the authority.
pub async fn read_manifest(dir: &Path, collection: Collection) -> Result<Manifest> {
    let file = collection.manifest_file();
    let path = dir.join(file);
    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SchemaError::MissingFile {
                file: file.to_string(),
            }
            .into());
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Manifest::from_bytes(&bytes, file)?)
}
