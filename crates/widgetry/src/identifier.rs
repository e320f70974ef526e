//! Safe identifiers for publishers and items

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SchemaError;

// Lowercase letters and digits; no leading, trailing or doubled separators.
static SAFE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:[_-][a-z0-9]+)*$").expect("static regex"));

/// A publisher slug or an item slug
///
/// Slugs are used verbatim as path segments and artifact reference segments,
/// so the only way to build one is through [`Slug::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub fn parse(value: impl Into<String>) -> Result<Self, SchemaError> {
        let value = value.into();
        if SAFE_IDENTIFIER.is_match(&value) {
            Ok(Slug(value))
        } else {
            Err(SchemaError::InvalidIdentifier { value })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Slug {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Slug::parse(value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
