//! Artifact packaging types
//!
//! Packaging turns a checked-out tree into a gzip'd tarball that is
//! byte-for-byte reproducible: entries are sorted, symlinks that stay inside
//! the tree are followed and ownership and timestamps are normalized. The
//! tarball is annotated with the standard OCI provenance keys before it is
//! handed to the artifact store.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use walkdir::WalkDir;

use crate::address::ContentAddress;
use crate::collection::Collection;
use crate::manifest::Manifest;
use crate::source::SourceRecord;

/// Annotation key filled in by the artifact store with the creation time
pub const ANNOTATION_CREATED: &str = "org.opencontainers.image.created";

const ANNOTATION_PREFIX: &str = "org.opencontainers.image";

/// Directories that never make it into an archive
const EXCLUDED_DIRS: [&str; 1] = [".git"];

/// A reproducible `tar.gz` of an item's source tree
#[derive(Debug, Clone)]
pub struct Archive {
    pub bytes: Vec<u8>,
    pub digest: String,
}

impl Archive {
    /// Archive every regular file and directory below `dir`
    ///
    /// Fails if a symlink resolves outside `dir` or forms a loop.
    pub fn from_dir(dir: &Path) -> io::Result<Self> {
        let entries = collect_entries(dir)?;

        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.mode(tar::HeaderMode::Deterministic);
        builder.follow_symlinks(true);

        for entry in &entries {
            if entry.is_dir {
                builder.append_dir(&entry.relative, &entry.absolute)?;
            } else {
                builder.append_path_with_name(&entry.absolute, &entry.relative)?;
            }
        }

        let bytes = builder.into_inner()?.finish()?;
        let digest = ContentAddress::digest(&bytes);
        Ok(Self { bytes, digest })
    }
}

struct ArchiveEntry {
    relative: PathBuf,
    absolute: PathBuf,
    is_dir: bool,
}

fn is_excluded(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir() && EXCLUDED_DIRS.iter().any(|name| entry.file_name() == *name)
}

/// Walk `root` depth-first in file name order, following symlinks that
/// stay inside it
fn collect_entries(root: &Path) -> io::Result<Vec<ArchiveEntry>> {
    let canonical_root = root.canonicalize()?;
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry));

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(io::Error::other)?
            .to_path_buf();

        if entry.path_is_symlink() {
            let target = entry.path().canonicalize()?;
            if !target.starts_with(&canonical_root) {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!(
                        "symlink {} points outside the source tree",
                        relative.display()
                    ),
                ));
            }
        }

        let file_type = entry.file_type();
        if file_type.is_dir() || file_type.is_file() {
            entries.push(ArchiveEntry {
                relative,
                absolute: entry.into_path(),
                is_dir: file_type.is_dir(),
            });
        }
    }
    Ok(entries)
}

/// Standard OCI provenance annotations for an item
pub fn provenance_annotations(
    manifest: &Manifest,
    source: &SourceRecord,
    vendor: &str,
) -> BTreeMap<String, String> {
    let authors = serde_json::to_string(&manifest.authors)
        .unwrap_or_else(|_| manifest.author_names().join(", "));

    [
        ("authors", authors),
        ("url", manifest.homepage.clone()),
        ("source", source.repo.clone()),
        ("version", manifest.version.clone()),
        ("revision", source.commit.clone()),
        ("vendor", vendor.to_string()),
        ("licenses", manifest.license.clone()),
        ("title", manifest.name.clone()),
        ("description", manifest.description.clone()),
    ]
    .into_iter()
    .map(|(key, value)| (format!("{ANNOTATION_PREFIX}.{key}"), value))
    .collect()
}

/// Everything a packager needs to build one item
#[derive(Debug, Clone, Copy)]
pub struct PackageRequest<'a> {
    /// Root of the item inside the checked-out tree
    pub tree: &'a Path,
    pub collection: Collection,
    pub manifest: &'a Manifest,
    pub source: &'a SourceRecord,
}

/// A locally staged artifact layout awaiting push
#[derive(Debug)]
pub struct StagedLayout {
    dir: TempDir,
    /// Packager-specific reference of the artifact inside `dir`
    pub reference: String,
}

impl StagedLayout {
    pub fn new(dir: TempDir, reference: impl Into<String>) -> Self {
        Self {
            dir,
            reference: reference.into(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Result of packaging an item
#[derive(Debug)]
pub struct PackagedArtifact {
    /// Content digest of the artifact manifest
    pub digest: String,
    /// Content digest of the archive layer
    pub layer_digest: String,
    pub annotations: BTreeMap<String, String>,
    pub staged: Option<StagedLayout>,
}

impl PackagedArtifact {
    /// Creation time recorded by the artifact store, if any
    pub fn created_at(&self) -> Option<OffsetDateTime> {
        self.annotations
            .get(ANNOTATION_CREATED)
            .and_then(|value| OffsetDateTime::parse(value, &Rfc3339).ok())
    }
}
