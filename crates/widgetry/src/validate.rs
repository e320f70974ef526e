//! Change Validator
//!
//! Diffs the base and head source declarations of each changed publisher and
//! walks every item through `New`, `Updated` or `Unchanged`. A base item
//! missing at head is an illegal deletion. Every `New` or `Updated` item is
//! checked out at its declared commit and validated against its manifest
//! before it becomes a [`PublishPlanEntry`].
//!
//! Any violation aborts the whole run: the plan is all or nothing.

use std::sync::Arc;
use tracing::{info, warn};

use crate::artifact::PackageRequest;
use crate::collection::{Collection, ItemKey, Packaging};
use crate::declarations::{DeclarationStore, RevisionRange};
use crate::error::{Result, ValidationError, WidgetryError};
use crate::external::{LicenseDetector, Packager, SourceCheckout};
use crate::identifier::Slug;
use crate::license::LicensePolicy;
use crate::manifest::read_manifest;
use crate::plan::{PublishPlan, PublishPlanEntry};
use crate::source::{SourceMap, SourceRecord};

/// State of one head item relative to base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemChange<'a> {
    New,
    Updated { base: &'a SourceRecord },
    Unchanged,
}

impl<'a> ItemChange<'a> {
    /// Classify a head record against its base counterpart
    pub fn classify(base: Option<&'a SourceRecord>, head: &SourceRecord) -> Self {
        match base {
            None => ItemChange::New,
            Some(base) if base == head => ItemChange::Unchanged,
            Some(base) => ItemChange::Updated { base },
        }
    }
}

pub struct ChangeValidator {
    checkout: Arc<dyn SourceCheckout>,
    packager: Arc<dyn Packager>,
    detector: Arc<dyn LicenseDetector>,
    policy: LicensePolicy,
}

impl ChangeValidator {
    pub fn new(
        checkout: Arc<dyn SourceCheckout>,
        packager: Arc<dyn Packager>,
        detector: Arc<dyn LicenseDetector>,
        policy: LicensePolicy,
    ) -> Self {
        Self {
            checkout,
            packager,
            detector,
            policy,
        }
    }

    /// Validate every changed publisher and build the publish plan
    ///
    /// Publishers are processed in the given order, collections in
    /// [`Collection::ALL`] order and items in head declaration order.
    pub async fn validate(
        &self,
        store: &DeclarationStore,
        revisions: &RevisionRange,
        publishers: &[Slug],
    ) -> Result<PublishPlan> {
        let mut plan = PublishPlan::new();

        for publisher in publishers {
            for collection in Collection::ALL {
                info!("[{publisher}] Validating {collection}...");
                let base = store.sources(collection, publisher, &revisions.base).await?;
                let head = store.sources(collection, publisher, &revisions.head).await?;
                self.validate_collection(collection, publisher, &base, &head, &mut plan)
                    .await?;
            }
        }

        Ok(plan)
    }

    async fn validate_collection(
        &self,
        collection: Collection,
        publisher: &Slug,
        base: &SourceMap,
        head: &SourceMap,
        plan: &mut PublishPlan,
    ) -> Result<()> {
        let key = |slug: &Slug| ItemKey::new(collection, publisher.clone(), slug.clone());

        if let Some(deleted) = base.keys().find(|slug| !head.contains_key(*slug)) {
            return Err(ValidationError::IllegalDeletion {
                item: key(deleted),
            }
            .into());
        }

        for (slug, source) in head {
            let item = key(slug);
            let change = ItemChange::classify(base.get(slug), source);
            match change {
                ItemChange::Unchanged => {
                    info!("{item} Unchanged: skipped");
                    continue;
                }
                ItemChange::New => info!("{item} New"),
                ItemChange::Updated { .. } => info!("{item} Updated"),
            }

            let entry = self.validate_item(item, source, change).await?;
            plan.push(entry);
        }

        Ok(())
    }

    async fn validate_item(
        &self,
        item: ItemKey,
        source: &SourceRecord,
        change: ItemChange<'_>,
    ) -> Result<PublishPlanEntry> {
        let head_version = crate::version::parse(&source.version).map_err(|_| {
            ValidationError::InvalidVersion {
                item: item.clone(),
                version: source.version.clone(),
            }
        })?;

        if let ItemChange::Updated { base } = change {
            let base_version = crate::version::parse(&base.version).map_err(|_| {
                ValidationError::InvalidVersion {
                    item: item.clone(),
                    version: base.version.clone(),
                }
            })?;
            if !crate::version::is_increment(&base_version, &head_version) {
                return Err(ValidationError::VersionNotIncremented {
                    item,
                    base: base.version.clone(),
                    head: source.version.clone(),
                }
                .into());
            }
        }

        // dropped, and its scratch directory removed, on every return path
        let tree = self.checkout.materialize(source).await?;
        let dir = tree.path();
        info!("{item} Working directory: {}", dir.display());

        let manifest = read_manifest(&dir, item.collection)
            .await
            .map_err(|err| match err {
                WidgetryError::Schema(source) => ValidationError::Manifest {
                    item: item.clone(),
                    source,
                }
                .into(),
                other => other,
            })?;

        if manifest.version != source.version {
            return Err(ValidationError::VersionMismatch {
                item,
                manifest: manifest.version,
                declared: source.version.clone(),
            }
            .into());
        }

        let detected = self.detector.detect(&dir).await?;
        self.policy
            .check(&manifest.license, detected.as_ref())
            .map_err(|reason| ValidationError::License {
                item: item.clone(),
                reason,
            })?;
        info!("{item} Metadata validation passed");

        match item.collection.packaging() {
            Packaging::Artifact { .. } => {
                info!("{item} Packaging (dry run)...");
                let artifact = self
                    .packager
                    .package(PackageRequest {
                        tree: &dir,
                        collection: item.collection,
                        manifest: &manifest,
                        source,
                    })
                    .await?;
                info!("{item} Packaged {}", artifact.digest);
            }
            Packaging::Unsupported => {
                warn!("{item} {} not fully supported yet", item.collection);
            }
        }

        Ok(PublishPlanEntry {
            collection: item.collection,
            publisher: item.publisher,
            slug: item.slug,
            source: source.clone(),
            manifest,
        })
    }
}
