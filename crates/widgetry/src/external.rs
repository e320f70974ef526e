//! Collaborator capabilities the pipeline depends on
//!
//! The core never runs git, talks to an artifact store or queries a hosting
//! service itself. Each of those is a trait here, implemented by the binary
//! with process-backed adapters and by [`crate::memory`] for tests.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::artifact::{PackageRequest, PackagedArtifact};
use crate::error::Result;
use crate::publisher::AccountId;
use crate::reference::ArtifactReference;
use crate::source::SourceRecord;

/// A source tree materialized at a declared commit
///
/// Owns its scratch directory; the directory is removed when the tree is
/// dropped, on success and on every error path alike.
#[derive(Debug)]
pub struct CheckedOutTree {
    scratch: TempDir,
    subpath: Option<PathBuf>,
}

impl CheckedOutTree {
    pub fn new(scratch: TempDir, subpath: Option<&str>) -> Self {
        Self {
            scratch,
            subpath: subpath.map(PathBuf::from),
        }
    }

    /// Root of the repository checkout
    pub fn checkout_root(&self) -> &Path {
        self.scratch.path()
    }

    /// Directory of the item (the checkout root joined with the declared path)
    pub fn path(&self) -> PathBuf {
        match &self.subpath {
            Some(subpath) => self.scratch.path().join(subpath),
            None => self.scratch.path().to_path_buf(),
        }
    }
}

/// Fetches an upstream repository at an exact commit
#[async_trait]
pub trait SourceCheckout: Send + Sync {
    async fn materialize(&self, source: &SourceRecord) -> Result<CheckedOutTree>;
}

/// Builds artifacts and pushes them to the artifact store
#[async_trait]
pub trait Packager: Send + Sync {
    /// Build the artifact locally; must not touch the remote store
    async fn package(&self, request: PackageRequest<'_>) -> Result<PackagedArtifact>;

    /// Upload a packaged artifact under `reference`
    async fn push(&self, artifact: &PackagedArtifact, reference: &ArtifactReference) -> Result<()>;
}

/// Organization membership queries against the hosting service
#[async_trait]
pub trait MembershipLookup: Send + Sync {
    async fn is_member(&self, organization: AccountId, login: &str) -> Result<bool>;
}

/// Produces a provenance attestation for a pushed artifact
#[async_trait]
pub trait Attestor: Send + Sync {
    /// Returns the attestation id when the service reports one
    async fn attest(&self, reference: &ArtifactReference, digest: &str) -> Result<Option<String>>;
}

/// Detects the licenses actually present in a source tree
#[async_trait]
pub trait LicenseDetector: Send + Sync {
    /// `None` when detection is not available
    async fn detect(&self, tree: &Path) -> Result<Option<BTreeSet<String>>>;
}

/// Detector used when no detection tool is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLicenseDetection;

#[async_trait]
impl LicenseDetector for NoLicenseDetection {
    async fn detect(&self, _tree: &Path) -> Result<Option<BTreeSet<String>>> {
        Ok(None)
    }
}

/// Attestor used when attestation is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipAttestation;

#[async_trait]
impl Attestor for SkipAttestation {
    async fn attest(&self, reference: &ArtifactReference, _digest: &str) -> Result<Option<String>> {
        tracing::debug!("Attestation skipped for {reference}");
        Ok(None)
    }
}
