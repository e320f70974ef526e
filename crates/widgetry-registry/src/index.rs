//! Registry index documents
//!
//! One document per collection lists the latest version of every published
//! item. Entries are unique per `(publisher, slug)` and kept sorted by that
//! pair when persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use widgetry::Collection;

/// One published item as listed in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub publisher: String,
    pub slug: String,
    pub version: String,
    pub name: String,
    pub description: String,
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub official: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

/// `index.<collection>.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionIndex {
    /// Schema tag of the published API
    pub api: String,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub items: Vec<IndexEntry>,
}

impl CollectionIndex {
    /// Fresh index for a collection that has never been published
    pub fn empty(api: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            generated_at: OffsetDateTime::now_utc(),
            items: Vec::new(),
        }
    }

    pub fn find(&self, publisher: &str, slug: &str) -> Option<&IndexEntry> {
        self.items
            .iter()
            .find(|e| e.publisher == publisher && e.slug == slug)
    }

    /// Insert or replace the entry with the same publisher and slug
    ///
    /// Returns `true` when an existing entry was replaced.
    pub fn upsert(&mut self, entry: IndexEntry) -> bool {
        match self
            .items
            .iter_mut()
            .find(|e| e.publisher == entry.publisher && e.slug == entry.slug)
        {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.items.push(entry);
                false
            }
        }
    }

    /// Sort entries by publisher, then slug
    ///
    /// Both are safe identifiers, so byte order is the natural order.
    pub fn sort(&mut self) {
        self.items
            .sort_by(|a, b| (&a.publisher, &a.slug).cmp(&(&b.publisher, &b.slug)));
    }
}

/// The index documents of every collection, owned by a single writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryIndex {
    collections: BTreeMap<Collection, CollectionIndex>,
}

impl RegistryIndex {
    pub fn new(collections: impl IntoIterator<Item = (Collection, CollectionIndex)>) -> Self {
        Self {
            collections: collections.into_iter().collect(),
        }
    }

    pub fn get(&self, collection: Collection) -> Option<&CollectionIndex> {
        self.collections.get(&collection)
    }

    pub fn get_mut(&mut self, collection: Collection) -> Option<&mut CollectionIndex> {
        self.collections.get_mut(&collection)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Collection, &CollectionIndex)> {
        self.collections.iter().map(|(c, index)| (*c, index))
    }

    /// Stamp every document with `now` and sort its entries
    pub fn finalize(&mut self, now: OffsetDateTime) {
        for index in self.collections.values_mut() {
            index.generated_at = now;
            index.sort();
        }
    }
}
