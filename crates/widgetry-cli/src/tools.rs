//! Attestation and license detection backed by configured commands

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;
use widgetry::{ArtifactReference, Attestor, ExternalError, LicenseDetector, Result};

use crate::config::CommandSpec;
use crate::process::exec;

/// Runs `<command> <repository> <digest>` and reads the attestation id
/// from stdout
#[derive(Debug, Clone)]
pub struct CommandAttestor {
    command: CommandSpec,
    /// `owner/name` of the repository attestations are listed under
    repository: String,
}

impl CommandAttestor {
    pub fn new(command: CommandSpec, repository: impl Into<String>) -> Self {
        Self {
            command,
            repository: repository.into(),
        }
    }
}

#[async_trait]
impl Attestor for CommandAttestor {
    async fn attest(&self, reference: &ArtifactReference, digest: &str) -> Result<Option<String>> {
        let mut args = self.command.args.clone();
        args.push(reference.repository());
        args.push(digest.to_string());

        let output = exec(&self.command.program, &args, None).await?;
        if !output.stderr.is_empty() {
            debug!("{}", output.stderr.trim_end());
        }
        let id = output.stdout.trim();
        if id.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "https://github.com/{}/attestations/{id}",
            self.repository
        )))
    }
}

/// Runs `<command> <tree>` and parses the JSON array of SPDX ids it prints
#[derive(Debug, Clone)]
pub struct CommandLicenseDetector {
    command: CommandSpec,
}

impl CommandLicenseDetector {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

fn parse_detected(program: &str, stdout: &str) -> std::result::Result<BTreeSet<String>, ExternalError> {
    serde_json::from_str::<Vec<String>>(stdout.trim())
        .map(|licenses| licenses.into_iter().collect())
        .map_err(|e| {
            ExternalError::new(program, format!("expected a JSON array of licenses: {e}"))
                .with_output(stdout, "")
        })
}

#[async_trait]
impl LicenseDetector for CommandLicenseDetector {
    async fn detect(&self, tree: &Path) -> Result<Option<BTreeSet<String>>> {
        let mut args = self.command.args.clone();
        args.push(tree.to_string_lossy().into_owned());

        let output = exec(&self.command.program, &args, None).await?;
        let detected = parse_detected(&self.command.program, &output.stdout)?;
        Ok(Some(detected))
    }
}
