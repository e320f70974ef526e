//! Readme and changelog capture from a checked-out item

use std::fmt;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use widgetry::SpecialFile;

const EXTENSIONS: [&str; 4] = [".md", ".markdown", "", ".txt"];

/// Which special file is being captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialFileKind {
    Readme,
    Changelog,
}

impl SpecialFileKind {
    /// Candidate stems, in detection order
    pub fn stems(&self) -> &'static [&'static str] {
        match self {
            SpecialFileKind::Readme => &["README"],
            SpecialFileKind::Changelog => &["CHANGELOG", "CHANGES", "HISTORY"],
        }
    }

    /// Name of the captured copy under the item's `files/` area
    pub fn key(&self) -> &'static str {
        match self {
            SpecialFileKind::Readme => "readme",
            SpecialFileKind::Changelog => "changelog",
        }
    }
}

impl fmt::Display for SpecialFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Error, Debug)]
pub enum SpecialFileError {
    #[error("Cannot auto-detect {0}; please specify it explicitly")]
    NotDetected(SpecialFileKind),

    #[error("Specified {kind} '{file}' is not a valid file or symlinked file")]
    NotAFile { kind: SpecialFileKind, file: String },

    #[error("Failed to read {kind} '{file}': {source}")]
    Read {
        kind: SpecialFileKind,
        file: String,
        #[source]
        source: std::io::Error,
    },
}

/// A special file picked out of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFile {
    /// File name relative to the item directory
    pub file: String,
    pub content: Vec<u8>,
}

/// Regular file, with symlinks followed
async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

async fn auto_detect(dir: &Path, kind: SpecialFileKind) -> Option<String> {
    for stem in kind.stems() {
        for ext in EXTENSIONS {
            let file = format!("{stem}{ext}");
            if is_file(&dir.join(&file)).await {
                return Some(file);
            }
        }
    }
    None
}

/// Find the special file of `kind` in `dir` according to the manifest's selection
///
/// Absent: auto-detect, nothing found is fine. `true`: auto-detect, nothing
/// found is an error. `false`: disabled. A path: must be a regular file.
pub async fn find(
    dir: &Path,
    kind: SpecialFileKind,
    selection: Option<&SpecialFile>,
) -> Result<Option<String>, SpecialFileError> {
    match selection {
        None => Ok(auto_detect(dir, kind).await),
        Some(SpecialFile::Toggle(false)) => Ok(None),
        Some(SpecialFile::Toggle(true)) => auto_detect(dir, kind)
            .await
            .map(Some)
            .ok_or(SpecialFileError::NotDetected(kind)),
        Some(SpecialFile::Path(file)) => {
            if is_file(&dir.join(file)).await {
                Ok(Some(file.clone()))
            } else {
                Err(SpecialFileError::NotAFile {
                    kind,
                    file: file.clone(),
                })
            }
        }
    }
}

/// Find and read the special file of `kind`
pub async fn capture(
    dir: &Path,
    kind: SpecialFileKind,
    selection: Option<&SpecialFile>,
) -> Result<Option<CapturedFile>, SpecialFileError> {
    let Some(file) = find(dir, kind, selection).await? else {
        return Ok(None);
    };

    let content = fs::read(dir.join(&file))
        .await
        .map_err(|source| SpecialFileError::Read {
            kind,
            file: file.clone(),
            source,
        })?;
    Ok(Some(CapturedFile { file, content }))
}
