//! Declaration Store: typed access to the declaration files at a revision
//!
//! The store never touches the working tree. Every read is addressed by a
//! revision identifier, so the same store answers for both sides of a
//! `(base, head)` comparison.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::collection::Collection;
use crate::error::Result;
use crate::identifier::Slug;
use crate::publisher::{PublisherIdentity, parse_publisher};
use crate::source::{SourceMap, parse_sources};

/// Read-only file access into the declaration repository's history
#[async_trait]
pub trait DeclarationSource: Send + Sync {
    /// Whether `path` exists at `revision`
    async fn file_exists(&self, path: &str, revision: &str) -> Result<bool>;

    /// Contents of `path` at `revision`
    async fn read_file(&self, path: &str, revision: &str) -> Result<String>;
}

/// The base and head revisions of a proposed change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRange {
    pub base: String,
    pub head: String,
}

impl RevisionRange {
    pub fn new(base: impl Into<String>, head: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            head: head.into(),
        }
    }
}

/// Typed reader over a [`DeclarationSource`]
#[derive(Clone)]
pub struct DeclarationStore {
    source: Arc<dyn DeclarationSource>,
}

impl DeclarationStore {
    pub fn new(source: Arc<dyn DeclarationSource>) -> Self {
        Self { source }
    }

    /// Path of a publisher's identity declaration
    pub fn publisher_path(publisher: &Slug) -> String {
        format!("publishers/{publisher}.yaml")
    }

    /// Path of a publisher's source declarations in one collection
    pub fn sources_path(collection: Collection, publisher: &Slug) -> String {
        format!("{collection}/{publisher}.yaml")
    }

    /// Publisher identity at `revision`, `None` when undeclared
    pub async fn publisher(
        &self,
        publisher: &Slug,
        revision: &str,
    ) -> Result<Option<PublisherIdentity>> {
        let path = Self::publisher_path(publisher);
        if !self.source.file_exists(&path, revision).await? {
            debug!("{path} absent at {revision}");
            return Ok(None);
        }

        let content = self.source.read_file(&path, revision).await?;
        Ok(Some(parse_publisher(&content, &path)?))
    }

    /// Source declarations at `revision`; an absent file yields an empty map
    pub async fn sources(
        &self,
        collection: Collection,
        publisher: &Slug,
        revision: &str,
    ) -> Result<SourceMap> {
        let path = Self::sources_path(collection, publisher);
        if !self.source.file_exists(&path, revision).await? {
            debug!("{path} absent at {revision}");
            return Ok(SourceMap::new());
        }

        let content = self.source.read_file(&path, revision).await?;
        Ok(parse_sources(&content, &path)?)
    }
}
