//! git-backed declaration reads and source checkouts

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};
use widgetry::{
    CheckedOutTree, DeclarationSource, ExternalError, Result, SourceCheckout, SourceRecord,
};

use crate::process::exec;

/// Reads declaration files from revisions of a local clone
#[derive(Debug, Clone)]
pub struct GitDeclarations {
    git: String,
    repo_dir: PathBuf,
}

impl GitDeclarations {
    pub fn new(git: impl Into<String>, repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            git: git.into(),
            repo_dir: repo_dir.into(),
        }
    }

    /// Fail unless `revision` names a commit in the clone
    async fn verify_revision(&self, revision: &str) -> Result<()> {
        let commit = format!("{revision}^{{commit}}");
        exec(
            &self.git,
            ["rev-parse", "--verify", "--quiet", &commit],
            Some(&self.repo_dir),
        )
        .await
        .map_err(|e| ExternalError {
            message: format!("unknown revision '{revision}': {}", e.message),
            ..e
        })?;
        Ok(())
    }
}

#[async_trait]
impl DeclarationSource for GitDeclarations {
    async fn file_exists(&self, path: &str, revision: &str) -> Result<bool> {
        self.verify_revision(revision).await?;
        // the revision resolves, so a failure here means the path is absent
        let object = format!("{revision}:{path}");
        let exists = exec(&self.git, ["cat-file", "-e", &object], Some(&self.repo_dir))
            .await
            .is_ok();
        Ok(exists)
    }

    async fn read_file(&self, path: &str, revision: &str) -> Result<String> {
        self.verify_revision(revision).await?;
        let object = format!("{revision}:{path}");
        let output = exec(&self.git, ["show", &object], Some(&self.repo_dir)).await?;
        Ok(output.stdout)
    }
}

/// Shallow-fetches upstream repositories at an exact commit
#[derive(Debug, Clone)]
pub struct GitCheckout {
    git: String,
}

impl GitCheckout {
    pub fn new(git: impl Into<String>) -> Self {
        Self { git: git.into() }
    }
}

#[async_trait]
impl SourceCheckout for GitCheckout {
    async fn materialize(&self, source: &SourceRecord) -> Result<CheckedOutTree> {
        let scratch = tempfile::Builder::new().prefix("widgetry-src-").tempdir()?;
        let dir = scratch.path();
        info!("Checking out {} at {}", source.repo, source.commit);

        exec(&self.git, ["init", "--quiet"], Some(dir)).await?;
        exec(&self.git, ["remote", "add", "origin", &source.repo], Some(dir)).await?;
        exec(
            &self.git,
            ["fetch", "--quiet", "--depth=1", "origin", &source.commit],
            Some(dir),
        )
        .await?;

        if let Some(path) = &source.path {
            debug!("Restricting checkout to {}", path);
            exec(&self.git, ["sparse-checkout", "init", "--cone"], Some(dir)).await?;
            exec(&self.git, ["sparse-checkout", "set", path], Some(dir)).await?;
        }

        exec(
            &self.git,
            ["checkout", "--quiet", "--detach", &source.commit],
            Some(dir),
        )
        .await?;

        Ok(CheckedOutTree::new(scratch, source.path.as_deref()))
    }
}
