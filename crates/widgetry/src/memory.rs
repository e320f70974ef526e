//! In-memory collaborators for testing and development

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;

use crate::artifact::{Archive, PackageRequest, PackagedArtifact, provenance_annotations};
use crate::collection::Packaging;
use crate::declarations::DeclarationSource;
use crate::error::{ExternalError, Result};
use crate::external::{CheckedOutTree, LicenseDetector, MembershipLookup, Packager, SourceCheckout};
use crate::publisher::AccountId;
use crate::reference::ArtifactReference;
use crate::source::SourceRecord;

/// Declaration files keyed by `(revision, path)`
#[derive(Debug, Default)]
pub struct MemoryDeclarations {
    files: Mutex<HashMap<(String, String), String>>,
}

impl MemoryDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_file(self, revision: &str, path: &str, content: &str) -> Self {
        self.insert(revision, path, content);
        self
    }

    pub fn insert(&self, revision: &str, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert((revision.to_string(), path.to_string()), content.to_string());
    }
}

#[async_trait]
impl DeclarationSource for MemoryDeclarations {
    async fn file_exists(&self, path: &str, revision: &str) -> Result<bool> {
        let files = self.files.lock().unwrap();
        Ok(files.contains_key(&(revision.to_string(), path.to_string())))
    }

    async fn read_file(&self, path: &str, revision: &str) -> Result<String> {
        let files = self.files.lock().unwrap();
        files
            .get(&(revision.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| {
                ExternalError::new("git", format!("path '{path}' does not exist in '{revision}'"))
                    .into()
            })
    }
}

/// Upstream repositories keyed by `(repo, commit)`, each a map of relative
/// file path to contents
#[derive(Debug, Default)]
pub struct MemoryCheckout {
    trees: Mutex<HashMap<(String, String), BTreeMap<String, Vec<u8>>>>,
    checkouts: Mutex<usize>,
}

impl MemoryCheckout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the tree of `repo` at `commit`
    pub fn insert(&self, repo: &str, commit: &str, path: &str, content: impl Into<Vec<u8>>) {
        self.trees
            .lock()
            .unwrap()
            .entry((repo.to_string(), commit.to_string()))
            .or_default()
            .insert(path.to_string(), content.into());
    }

    /// Number of trees materialized so far
    pub fn checkout_count(&self) -> usize {
        *self.checkouts.lock().unwrap()
    }
}

#[async_trait]
impl SourceCheckout for MemoryCheckout {
    async fn materialize(&self, source: &SourceRecord) -> Result<CheckedOutTree> {
        let files = self
            .trees
            .lock()
            .unwrap()
            .get(&(source.repo.clone(), source.commit.clone()))
            .cloned()
            .ok_or_else(|| {
                ExternalError::new(
                    "git",
                    format!("couldn't find remote ref {} in {}", source.commit, source.repo),
                )
            })?;

        let scratch = tempfile::tempdir()?;
        for (path, content) in files {
            let target = scratch.path().join(path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(target, content).await?;
        }

        *self.checkouts.lock().unwrap() += 1;
        Ok(CheckedOutTree::new(scratch, source.path.as_deref()))
    }
}

/// Packager that archives in memory and records pushes
///
/// The artifact digest is the archive digest; `created_at` is attached as
/// the creation annotation when set.
#[derive(Debug, Default)]
pub struct MemoryPackager {
    created_at: Option<String>,
    pushed: Mutex<Vec<(String, String)>>,
}

impl MemoryPackager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    /// `(reference, digest)` pairs in push order
    pub fn pushed(&self) -> Vec<(String, String)> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Packager for MemoryPackager {
    async fn package(&self, request: PackageRequest<'_>) -> Result<PackagedArtifact> {
        if request.collection.packaging() == Packaging::Unsupported {
            return Err(crate::WidgetryError::Config(format!(
                "{} cannot be packaged",
                request.collection
            )));
        }

        let archive = Archive::from_dir(request.tree)?;
        let mut annotations = provenance_annotations(request.manifest, request.source, "Widgetry");
        if let Some(created_at) = &self.created_at {
            annotations.insert(crate::artifact::ANNOTATION_CREATED.into(), created_at.clone());
        }

        Ok(PackagedArtifact {
            digest: archive.digest.clone(),
            layer_digest: archive.digest,
            annotations,
            staged: None,
        })
    }

    async fn push(&self, artifact: &PackagedArtifact, reference: &ArtifactReference) -> Result<()> {
        self.pushed
            .lock()
            .unwrap()
            .push((reference.to_string(), artifact.digest.clone()));
        Ok(())
    }
}

/// Fixed organization membership table
#[derive(Debug, Default)]
pub struct StaticMembership {
    members: HashMap<AccountId, BTreeSet<String>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, organization: AccountId, login: &str) -> Self {
        self.members
            .entry(organization)
            .or_default()
            .insert(login.to_string());
        self
    }
}

#[async_trait]
impl MembershipLookup for StaticMembership {
    async fn is_member(&self, organization: AccountId, login: &str) -> Result<bool> {
        Ok(self
            .members
            .get(&organization)
            .is_some_and(|logins| logins.contains(login)))
    }
}

/// Detector returning a fixed set of license ids for every tree
#[derive(Debug, Clone, Default)]
pub struct StaticLicenseDetector {
    detected: BTreeSet<String>,
}

impl StaticLicenseDetector {
    pub fn new<I, S>(detected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            detected: detected.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl LicenseDetector for StaticLicenseDetector {
    async fn detect(&self, _tree: &Path) -> Result<Option<BTreeSet<String>>> {
        Ok(Some(self.detected.clone()))
    }
}
