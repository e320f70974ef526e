//! The publish plan handed from validation to publishing

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::collection::{Collection, ItemKey};
use crate::error::{Result, SchemaError};
use crate::identifier::Slug;
use crate::manifest::Manifest;
use crate::source::SourceRecord;

/// One validated change, ready to be published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishPlanEntry {
    pub collection: Collection,
    pub publisher: Slug,
    pub slug: Slug,
    pub source: SourceRecord,
    pub manifest: Manifest,
}

impl PublishPlanEntry {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.collection, self.publisher.clone(), self.slug.clone())
    }
}

/// Ordered list of plan entries, serialized as a JSON array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishPlan {
    entries: Vec<PublishPlanEntry>,
}

impl PublishPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PublishPlanEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PublishPlanEntry> {
        self.entries.iter()
    }

    /// Load a plan file, re-checking every record in it
    pub async fn read(path: &Path) -> Result<Self> {
        let file = path.display().to_string();
        let bytes = fs::read(path).await?;
        let plan: PublishPlan =
            serde_json::from_slice(&bytes).map_err(|source| SchemaError::Json {
                file: file.clone(),
                source,
            })?;

        for entry in plan.iter() {
            entry.source.validate()?;
            entry.manifest.validate()?;
        }
        Ok(plan)
    }

    /// Write the plan as JSON, creating parent directories as needed
    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_vec_pretty(self).map_err(|source| SchemaError::Json {
            file: path.display().to_string(),
            source,
        })?;
        fs::write(path, content).await?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a PublishPlan {
    type Item = &'a PublishPlanEntry;
    type IntoIter = std::slice::Iter<'a, PublishPlanEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Author;

    fn entry() -> PublishPlanEntry {
        PublishPlanEntry {
            collection: Collection::Widgets,
            publisher: Slug::parse("acme").unwrap(),
            slug: Slug::parse("clock").unwrap(),
            source: SourceRecord {
                repo: "https://github.com/acme/clock".into(),
                commit: "c".repeat(40),
                path: None,
                version: "0.1.0".into(),
            },
            manifest: Manifest {
                name: "Clock".into(),
                version: "0.1.0".into(),
                authors: vec![Author::Name("Ada".into())],
                license: "MIT".into(),
                description: "A clock".into(),
                homepage: "https://example.com".into(),
                readme: None,
                changelog: None,
            },
        }
    }

    #[tokio::test]
    async fn test_plan_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/plan.json");

        let mut plan = PublishPlan::new();
        plan.push(entry());
        plan.write(&path).await.unwrap();

        let loaded = PublishPlan::read(&path).await.unwrap();
        assert_eq!(loaded, plan);
        assert_eq!(loaded.iter().next().unwrap().key().to_string(), "[acme/clock] [widgets]");
    }

    #[tokio::test]
    async fn test_plan_is_a_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        PublishPlan::new().write(&path).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_tampered_plan_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");

        let mut value = serde_json::to_value(vec![entry()]).unwrap();
        value[0]["source"]["commit"] = serde_json::json!("not-a-commit");
        std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();
        assert!(PublishPlan::read(&path).await.is_err());

        value[0]["publisher"] = serde_json::json!("../etc");
        std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();
        assert!(PublishPlan::read(&path).await.is_err());
    }
}
