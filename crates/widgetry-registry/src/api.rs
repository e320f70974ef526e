//! Typed layout of the published API tree on top of a [`BlobStorage`]

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use widgetry::{Collection, ItemKey};

use crate::error::{RegistryError, Result};
use crate::index::{CollectionIndex, RegistryIndex};
use crate::meta::{ItemMetadata, VersionHistory};
use crate::special_files::{CapturedFile, SpecialFileKind};
use crate::storage::BlobStorage;

pub struct ApiStore<B: BlobStorage> {
    storage: Arc<B>,
}

impl<B: BlobStorage> Clone for ApiStore<B> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<B: BlobStorage> ApiStore<B> {
    pub fn new(storage: Arc<B>) -> Self {
        Self { storage }
    }

    pub fn index_key(collection: Collection) -> String {
        format!("index.{collection}.json")
    }

    pub fn item_prefix(item: &ItemKey) -> String {
        format!("{}/{}/{}", item.collection, item.publisher, item.slug)
    }

    pub fn meta_key(item: &ItemKey) -> String {
        format!("{}/meta.json", Self::item_prefix(item))
    }

    pub fn versions_key(item: &ItemKey) -> String {
        format!("{}/versions.json", Self::item_prefix(item))
    }

    pub fn files_prefix(item: &ItemKey) -> String {
        format!("{}/files", Self::item_prefix(item))
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if !self.storage.exists(key).await? {
            return Ok(None);
        }
        let bytes = self.storage.get(key).await?;
        let value = serde_json::from_slice(&bytes).map_err(|source| {
            RegistryError::Serialization {
                key: key.to_string(),
                source,
            }
        })?;
        Ok(Some(value))
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|source| RegistryError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.storage.put(key, bytes).await?;
        Ok(())
    }

    /// Load the index of every collection
    ///
    /// A missing document is bootstrapped empty with `api`; an existing one
    /// written for another schema tag is rejected.
    pub async fn load_index(&self, api: &str) -> Result<RegistryIndex> {
        let mut collections = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            let key = Self::index_key(collection);
            let index = match self.load::<CollectionIndex>(&key).await? {
                Some(index) if index.api != api => {
                    return Err(RegistryError::ApiVersionMismatch {
                        expected: api.to_string(),
                        found: index.api,
                    });
                }
                Some(index) => index,
                None => {
                    tracing::info!("{key} not found, starting an empty index");
                    CollectionIndex::empty(api)
                }
            };
            collections.push((collection, index));
        }
        Ok(RegistryIndex::new(collections))
    }

    pub async fn save_index(&self, index: &RegistryIndex) -> Result<()> {
        for (collection, document) in index.iter() {
            self.save(&Self::index_key(collection), document).await?;
        }
        Ok(())
    }

    pub async fn load_metadata(&self, item: &ItemKey) -> Result<Option<ItemMetadata>> {
        self.load(&Self::meta_key(item)).await
    }

    pub async fn save_metadata(&self, item: &ItemKey, meta: &ItemMetadata) -> Result<()> {
        self.save(&Self::meta_key(item), meta).await
    }

    /// Version history of an item; empty if it was never published
    pub async fn load_history(&self, item: &ItemKey) -> Result<VersionHistory> {
        Ok(self
            .load(&Self::versions_key(item))
            .await?
            .unwrap_or_default())
    }

    pub async fn save_history(&self, item: &ItemKey, history: &VersionHistory) -> Result<()> {
        self.save(&Self::versions_key(item), history).await
    }

    /// Replace the item's `files/` area with the captured special files
    pub async fn replace_files(
        &self,
        item: &ItemKey,
        captured: &[(SpecialFileKind, CapturedFile)],
    ) -> Result<()> {
        let prefix = Self::files_prefix(item);
        self.storage.delete_prefix(&prefix).await?;
        for (kind, file) in captured {
            self.storage
                .put(&format!("{prefix}/{}", kind.key()), file.content.clone())
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use widgetry::Slug;

    fn item() -> ItemKey {
        ItemKey::new(
            Collection::Widgets,
            Slug::parse("acme").unwrap(),
            Slug::parse("clock").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_layout_keys() {
        assert_eq!(ApiStore::<MemoryStorage>::index_key(Collection::Plugins), "index.plugins.json");
        assert_eq!(ApiStore::<MemoryStorage>::meta_key(&item()), "widgets/acme/clock/meta.json");
        assert_eq!(
            ApiStore::<MemoryStorage>::versions_key(&item()),
            "widgets/acme/clock/versions.json"
        );
    }

    #[tokio::test]
    async fn test_index_bootstrap_and_mismatch() {
        let storage = Arc::new(MemoryStorage::new());
        let store = ApiStore::new(storage.clone());

        let index = store.load_index("v1").await.unwrap();
        assert!(index.iter().all(|(_, doc)| doc.items.is_empty() && doc.api == "v1"));
        store.save_index(&index).await.unwrap();
        assert_eq!(storage.keys(), vec!["index.plugins.json", "index.widgets.json"]);

        let err = store.load_index("v2").await.unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(
            err.to_string(),
            "Expected API version v2, but current API version is v1"
        );
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let storage = Arc::new(MemoryStorage::new());
        storage.put("index.widgets.json", b"not json".to_vec()).await.unwrap();
        let store = ApiStore::new(storage);

        assert!(matches!(
            store.load_index("v1").await,
            Err(RegistryError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn test_replace_files_clears_stale_captures() {
        let storage = Arc::new(MemoryStorage::new());
        let store = ApiStore::new(storage.clone());
        let readme = CapturedFile {
            file: "README.md".into(),
            content: b"hi".to_vec(),
        };
        let changelog = CapturedFile {
            file: "CHANGELOG.md".into(),
            content: b"log".to_vec(),
        };

        store
            .replace_files(
                &item(),
                &[
                    (SpecialFileKind::Readme, readme.clone()),
                    (SpecialFileKind::Changelog, changelog),
                ],
            )
            .await
            .unwrap();
        store
            .replace_files(&item(), &[(SpecialFileKind::Readme, readme)])
            .await
            .unwrap();

        assert_eq!(storage.keys(), vec!["widgets/acme/clock/files/readme"]);
    }
}
