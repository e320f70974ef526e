//! Publisher / Index Writer
//!
//! Applies a publish plan: every widget entry is packaged from a fresh
//! checkout, pushed, optionally attested, and recorded in the API tree
//! (metadata, version history, index). The registry index is an owned value
//! threaded through the entries and written once at the end.

use std::collections::BTreeSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};
use widgetry::{
    ArtifactReference, Attestor, ItemKey, PackageRequest, Packager, Packaging, PublishPlan,
    PublishPlanEntry, SourceCheckout, ValidationError, WidgetryError, read_manifest,
};

use crate::api::ApiStore;
use crate::error::{RegistryError, Result};
use crate::index::{IndexEntry, RegistryIndex};
use crate::meta::{ItemMetadata, VersionRecord};
use crate::special_files::{self, SpecialFileKind};
use crate::storage::BlobStorage;

/// Where and how items get published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Artifact registry host, e.g. `ghcr.io`
    pub registry: String,
    /// Namespace under the registry, usually the repository owner
    pub namespace: String,
    /// Schema tag the index documents must carry
    pub api_version: String,
    /// Publishers whose entries are flagged `official`
    pub official_publishers: BTreeSet<String>,
    /// Publishers whose entries are flagged `hidden`
    pub hidden_publishers: BTreeSet<String>,
}

impl PublishOptions {
    pub fn new(
        registry: impl Into<String>,
        namespace: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            namespace: namespace.into(),
            api_version: api_version.into(),
            official_publishers: BTreeSet::new(),
            hidden_publishers: BTreeSet::new(),
        }
    }
}

pub struct RegistryPublisher<B: BlobStorage> {
    store: ApiStore<B>,
    checkout: Arc<dyn SourceCheckout>,
    packager: Arc<dyn Packager>,
    attestor: Arc<dyn Attestor>,
    options: PublishOptions,
}

impl<B: BlobStorage> RegistryPublisher<B> {
    pub fn new(
        store: ApiStore<B>,
        checkout: Arc<dyn SourceCheckout>,
        packager: Arc<dyn Packager>,
        attestor: Arc<dyn Attestor>,
        options: PublishOptions,
    ) -> Self {
        Self {
            store,
            checkout,
            packager,
            attestor,
            options,
        }
    }

    /// Load the index, apply the plan and persist the result
    pub async fn run(&self, plan: &PublishPlan) -> Result<RegistryIndex> {
        let index = self.store.load_index(&self.options.api_version).await?;
        let mut index = self.apply(index, plan).await?;

        index.finalize(OffsetDateTime::now_utc());
        self.store.save_index(&index).await?;
        info!("Registry API index updated");
        Ok(index)
    }

    /// Apply every plan entry, in order, to `index`
    pub async fn apply(&self, mut index: RegistryIndex, plan: &PublishPlan) -> Result<RegistryIndex> {
        for entry in plan {
            self.apply_entry(&mut index, entry).await?;
        }
        Ok(index)
    }

    /// Publish one entry and upsert it into `index`
    ///
    /// Returns the index entry, or `None` when the collection cannot be
    /// published yet.
    pub async fn apply_entry(
        &self,
        index: &mut RegistryIndex,
        entry: &PublishPlanEntry,
    ) -> Result<Option<IndexEntry>> {
        let item = entry.key();
        if item.collection.packaging() == Packaging::Unsupported {
            warn!("{item} {} publishing not supported yet", item.collection);
            return Ok(None);
        }

        let tree = self.checkout.materialize(&entry.source).await?;
        let dir = tree.path();
        info!("{item} Working directory: {}", dir.display());

        // the tree at the declared commit is the authority, not the plan
        let manifest = read_manifest(&dir, item.collection).await?;
        if manifest.version != entry.source.version {
            return Err(WidgetryError::from(ValidationError::VersionMismatch {
                item,
                manifest: manifest.version,
                declared: entry.source.version.clone(),
            })
            .into());
        }

        let mut captured = Vec::new();
        for (kind, selection) in [
            (SpecialFileKind::Readme, manifest.readme.as_ref()),
            (SpecialFileKind::Changelog, manifest.changelog.as_ref()),
        ] {
            let file = special_files::capture(&dir, kind, selection)
                .await
                .map_err(|source| RegistryError::SpecialFile {
                    item: item.clone(),
                    source,
                })?;
            if let Some(file) = file {
                info!("{item} Captured {kind} from {}", file.file);
                captured.push((kind, file));
            }
        }

        let reference = ArtifactReference::new(
            &self.options.registry,
            &self.options.namespace,
            item.clone(),
            &manifest.version,
        )
        .map_err(WidgetryError::from)?;

        info!("{item} Publishing...");
        let artifact = self
            .packager
            .package(PackageRequest {
                tree: &dir,
                collection: item.collection,
                manifest: &manifest,
                source: &entry.source,
            })
            .await?;
        self.packager.push(&artifact, &reference).await?;
        info!("{item} Published: https://{reference}");

        if let Some(id) = self.attestor.attest(&reference, &artifact.digest).await? {
            info!("{item} Attested: {id}");
        }

        let published_at = artifact.created_at().unwrap_or_else(OffsetDateTime::now_utc);

        self.store.replace_files(&item, &captured).await?;
        let captured_kind = |kind: SpecialFileKind| captured.iter().any(|(k, _)| *k == kind);
        let meta = ItemMetadata {
            published_at,
            digest: artifact.digest.clone(),
            source: entry.source.clone(),
            manifest: manifest.clone(),
            readme: captured_kind(SpecialFileKind::Readme),
            changelog: captured_kind(SpecialFileKind::Changelog),
        };
        self.store.save_metadata(&item, &meta).await?;
        info!("{item} Details written");

        let mut history = self.store.load_history(&item).await?;
        let recorded = history.prepend(VersionRecord {
            version: manifest.version.clone(),
            published_at,
            digest: artifact.digest.clone(),
        });
        if recorded {
            self.store.save_history(&item, &history).await?;
            info!("{item} Versions list updated");
        } else {
            info!("{item} Version {} already recorded", manifest.version);
        }

        let index_entry = self.index_entry(&item, &manifest);
        let document = index.get_mut(item.collection).ok_or_else(|| {
            WidgetryError::Config(format!("No index loaded for {}", item.collection))
        })?;
        document.upsert(index_entry.clone());

        Ok(Some(index_entry))
    }

    fn index_entry(&self, item: &ItemKey, manifest: &widgetry::Manifest) -> IndexEntry {
        let publisher = item.publisher.as_str();
        IndexEntry {
            publisher: publisher.to_string(),
            slug: item.slug.to_string(),
            version: manifest.version.clone(),
            name: manifest.name.clone(),
            description: manifest.description.clone(),
            authors: manifest.author_names(),
            official: self.options.official_publishers.contains(publisher),
            hidden: self.options.hidden_publishers.contains(publisher),
        }
    }
}
