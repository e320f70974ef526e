//! Artifact packaging and pushing through the `oras` CLI
//!
//! Packaging pushes into a throwaway OCI layout on disk; nothing reaches a
//! remote registry until [`Packager::push`] copies the layout out.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;
use widgetry::artifact::provenance_annotations;
use widgetry::{
    Archive, ArtifactReference, ContentAddress, ExternalError, PackageRequest, PackagedArtifact,
    Packager, Packaging, Result, StagedLayout, WidgetryError,
};

use crate::process::exec;

const LAYER_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

/// Descriptor printed by `oras push --format json`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushDescriptor {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub artifact_type: Option<String>,
    pub reference: String,
}

impl PushDescriptor {
    pub fn parse(stdout: &str) -> std::result::Result<Self, ExternalError> {
        let invalid = |reason: String| {
            ExternalError::new("oras", format!("unexpected push output: {reason}"))
                .with_output(stdout, "")
        };

        let descriptor: Self =
            serde_json::from_str(stdout.trim()).map_err(|e| invalid(e.to_string()))?;
        if !ContentAddress::is_valid_digest(&descriptor.digest) {
            return Err(invalid(format!("invalid digest '{}'", descriptor.digest)));
        }
        Ok(descriptor)
    }
}

#[derive(Debug, Clone)]
pub struct OrasPackager {
    oras: String,
    vendor: String,
}

impl OrasPackager {
    pub fn new(oras: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            oras: oras.into(),
            vendor: vendor.into(),
        }
    }

    fn push_args(
        artifact_type: &str,
        annotations: &BTreeMap<String, String>,
        layout_ref: &str,
        archive_file: &str,
    ) -> Vec<String> {
        let mut args = vec![
            "push".to_string(),
            "--oci-layout".to_string(),
            "--artifact-type".to_string(),
            artifact_type.to_string(),
        ];
        for (key, value) in annotations {
            args.push("--annotation".to_string());
            args.push(format!("{key}={value}"));
        }
        args.extend([
            layout_ref.to_string(),
            format!("{archive_file}:{LAYER_MEDIA_TYPE}"),
            "--no-tty".to_string(),
            "--format".to_string(),
            "json".to_string(),
        ]);
        args
    }
}

#[async_trait]
impl Packager for OrasPackager {
    async fn package(&self, request: PackageRequest<'_>) -> Result<PackagedArtifact> {
        let artifact_type = match request.collection.packaging() {
            Packaging::Artifact { artifact_type } => artifact_type,
            Packaging::Unsupported => {
                return Err(WidgetryError::Config(format!(
                    "{} cannot be packaged",
                    request.collection
                )));
            }
        };

        let archive = archive_tree(request.tree.to_path_buf()).await?;
        debug!("Archived {} ({})", request.tree.display(), archive.digest);

        // oras only accepts relative file paths, so the archive and the
        // layout live side by side in the staging directory
        let staging = tempfile::Builder::new().prefix("widgetry-oci-").tempdir()?;
        let id = Uuid::new_v4().simple().to_string();
        let archive_file = format!("archive-{id}.tar.gz");
        let layout_ref = format!("dist-layout-{id}:v{}", request.manifest.version);
        tokio::fs::write(staging.path().join(&archive_file), &archive.bytes).await?;

        let annotations = provenance_annotations(request.manifest, request.source, &self.vendor);
        let args = Self::push_args(artifact_type, &annotations, &layout_ref, &archive_file);
        let output = exec(&self.oras, &args, Some(staging.path())).await?;
        let descriptor = PushDescriptor::parse(&output.stdout)?;
        debug!(
            "Staged {} as {} ({}, {} bytes, {})",
            descriptor.reference,
            descriptor.digest,
            descriptor.media_type,
            descriptor.size,
            descriptor.artifact_type.as_deref().unwrap_or(artifact_type)
        );

        Ok(PackagedArtifact {
            digest: descriptor.digest,
            layer_digest: archive.digest,
            annotations: descriptor.annotations,
            staged: Some(StagedLayout::new(staging, layout_ref)),
        })
    }

    async fn push(&self, artifact: &PackagedArtifact, reference: &ArtifactReference) -> Result<()> {
        let staged = artifact.staged.as_ref().ok_or_else(|| {
            WidgetryError::Config(format!("{reference} has no staged layout to push"))
        })?;

        info!("Pushing {}", reference);
        let target = reference.to_string();
        exec(
            &self.oras,
            [
                "cp",
                "--from-oci-layout",
                staged.reference.as_str(),
                target.as_str(),
                "--no-tty",
            ],
            Some(staged.path()),
        )
        .await?;
        Ok(())
    }
}

async fn archive_tree(tree: std::path::PathBuf) -> Result<Archive> {
    let archive = tokio::task::spawn_blocking(move || Archive::from_dir(Path::new(&tree)))
        .await
        .map_err(|e| WidgetryError::Io(std::io::Error::other(e)))??;
    Ok(archive)
}
