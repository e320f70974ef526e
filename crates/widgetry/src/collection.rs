//! Collections partition published items by type

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SchemaError;
use crate::identifier::Slug;

/// The type partition of published items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Widgets,
    Plugins,
}

/// How items of a collection are turned into artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packaging {
    /// Packaged into an OCI artifact of the given artifact type
    Artifact { artifact_type: &'static str },
    /// Metadata is validated but nothing is packaged or published yet
    Unsupported,
}

impl Collection {
    /// All collections, in validation order
    pub const ALL: [Collection; 2] = [Collection::Widgets, Collection::Plugins];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Widgets => "widgets",
            Collection::Plugins => "plugins",
        }
    }

    /// Name of the manifest file at the root of an item's source tree
    pub fn manifest_file(&self) -> &'static str {
        match self {
            Collection::Widgets => "widgetry.widget.json",
            Collection::Plugins => "widgetry.plugin.json",
        }
    }

    pub fn packaging(&self) -> Packaging {
        match self {
            Collection::Widgets => Packaging::Artifact {
                artifact_type: "application/vnd.widgetry.widget.v1",
            },
            Collection::Plugins => Packaging::Unsupported,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "widgets" => Ok(Collection::Widgets),
            "plugins" => Ok(Collection::Plugins),
            other => Err(SchemaError::invalid_field(
                "collection",
                format!("unknown collection '{other}'"),
            )),
        }
    }
}

/// Identifies one published item: `(collection, publisher, slug)`
///
/// Its `Display` form is the log/error prefix used throughout the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub collection: Collection,
    pub publisher: Slug,
    pub slug: Slug,
}

impl ItemKey {
    pub fn new(collection: Collection, publisher: Slug, slug: Slug) -> Self {
        Self {
            collection,
            publisher,
            slug,
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] [{}]", self.publisher, self.slug, self.collection)
    }
}
