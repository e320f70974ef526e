//! Per-item metadata and version history documents

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use widgetry::{Manifest, SourceRecord};

/// `<collection>/<publisher>/<slug>/meta.json`, rewritten on every publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub digest: String,
    pub source: SourceRecord,
    pub manifest: Manifest,
    /// A readme was captured to `files/readme`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub readme: bool,
    /// A changelog was captured to `files/changelog`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub changelog: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub version: String,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub digest: String,
}

/// `<collection>/<publisher>/<slug>/versions.json`, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionHistory {
    pub items: Vec<VersionRecord>,
}

impl VersionHistory {
    pub fn latest(&self) -> Option<&VersionRecord> {
        self.items.first()
    }

    /// Record a newly published version at the front
    ///
    /// Re-applying the version already at the head is a no-op, so replaying
    /// a plan never duplicates history. Returns whether the history changed.
    pub fn prepend(&mut self, record: VersionRecord) -> bool {
        if self.latest().is_some_and(|head| head.version == record.version) {
            return false;
        }
        self.items.insert(0, record);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record(version: &str) -> VersionRecord {
        VersionRecord {
            version: version.into(),
            published_at: datetime!(2025-01-01 00:00:00 UTC),
            digest: format!("sha256:{}", "0".repeat(64)),
        }
    }

    #[test]
    fn test_history_is_newest_first() {
        let mut history = VersionHistory::default();
        for version in ["1.0.0", "1.1.0", "2.0.0"] {
            assert!(history.prepend(record(version)));
        }

        let versions: Vec<_> = history.items.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, vec!["2.0.0", "1.1.0", "1.0.0"]);
    }

    #[test]
    fn test_reapplying_head_is_noop() {
        let mut history = VersionHistory::default();
        history.prepend(record("1.0.0"));
        assert!(!history.prepend(record("1.0.0")));
        assert_eq!(history.items.len(), 1);
    }

    #[test]
    fn test_history_document_shape() {
        let mut history = VersionHistory::default();
        history.prepend(record("0.1.0"));

        let value = serde_json::to_value(&history).unwrap();
        assert_eq!(value["items"][0]["version"], "0.1.0");
        assert_eq!(value["items"][0]["publishedAt"], "2025-01-01T00:00:00Z");
        assert!(value["items"][0]["digest"].as_str().unwrap().starts_with("sha256:"));
    }
}
