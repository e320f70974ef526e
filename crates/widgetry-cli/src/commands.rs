//! Subcommand entry points
//!
//! Each command wires the process-backed collaborators into the core and
//! registry types and runs one pipeline stage.

use std::sync::Arc;
use tracing::info;
use widgetry::{
    Attestor, Authorizer, ChangeValidator, DeclarationStore, LicenseDetector, NoLicenseDetection,
    PublishPlan, SkipAttestation,
};
use widgetry_registry::{ApiStore, FileSystemStorage, RegistryPublisher};

use crate::config::{AttestationMode, AuthorizeConfig, PublishConfig, ValidateConfig};
use crate::error::{CliError, Result};
use crate::git::{GitCheckout, GitDeclarations};
use crate::github::GhMembership;
use crate::oras::OrasPackager;
use crate::tools::{CommandAttestor, CommandLicenseDetector};

pub async fn authorize(config: AuthorizeConfig) -> Result<()> {
    if config.gate.publishers.is_empty() {
        info!("No publishers provided, skipping authorization check");
        return Ok(());
    }

    let store = DeclarationStore::new(Arc::new(GitDeclarations::new(
        &config.git_cli,
        &config.gate.declarations_dir,
    )));
    let authorizer = Authorizer::new(Arc::new(GhMembership::new(&config.gh_cli)));

    let permits = authorizer
        .check_publishers(
            &store,
            &config.gate.revisions,
            &config.gate.publishers,
            &config.actor,
        )
        .await?;

    info!(
        "{} authorized for {} publisher(s)",
        config.actor.login,
        permits.len()
    );
    Ok(())
}

pub async fn validate(config: ValidateConfig) -> Result<PublishPlan> {
    let plan = if config.gate.publishers.is_empty() {
        info!("No publishers provided, skipping validation");
        PublishPlan::new()
    } else {
        let store = DeclarationStore::new(Arc::new(GitDeclarations::new(
            &config.git_cli,
            &config.gate.declarations_dir,
        )));
        let detector: Arc<dyn LicenseDetector> = match config.license_detector {
            Some(command) => Arc::new(CommandLicenseDetector::new(command)),
            None => Arc::new(NoLicenseDetection),
        };
        let validator = ChangeValidator::new(
            Arc::new(GitCheckout::new(&config.git_cli)),
            Arc::new(OrasPackager::new(&config.oras_cli, &config.vendor)),
            detector,
            config.policy,
        );

        validator
            .validate(&store, &config.gate.revisions, &config.gate.publishers)
            .await?
    };

    plan.write(&config.plan_path).await?;
    info!(
        "Publish plan with {} item(s) written to {}",
        plan.len(),
        config.plan_path.display()
    );
    Ok(plan)
}

pub async fn publish(config: PublishConfig) -> Result<()> {
    let plan = PublishPlan::read(&config.plan_path).await?;
    if plan.is_empty() {
        info!("Publish plan is empty, nothing to publish");
        return Ok(());
    }

    let storage = FileSystemStorage::new(&config.api_dir)
        .await
        .map_err(|e| CliError::Registry(e.into()))?;
    let attestor: Arc<dyn Attestor> = match config.attestation {
        AttestationMode::Skip => Arc::new(SkipAttestation),
        AttestationMode::Command(command) => {
            Arc::new(CommandAttestor::new(command, &config.repository))
        }
    };

    let publisher = RegistryPublisher::new(
        ApiStore::new(Arc::new(storage)),
        Arc::new(GitCheckout::new(&config.git_cli)),
        Arc::new(OrasPackager::new(&config.oras_cli, &config.vendor)),
        attestor,
        config.options,
    );

    let index = publisher.run(&plan).await?;
    for (collection, document) in index.iter() {
        info!("Index for {} has {} item(s)", collection, document.items.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use widgetry::{LicensePolicy, RevisionRange};

    #[tokio::test]
    async fn test_validate_without_publishers_writes_empty_plan() {
        let dir = tempfile::tempdir().unwrap();
        let plan_path = dir.path().join("out/plan.json");
        let config = ValidateConfig {
            gate: GateConfig {
                revisions: RevisionRange::new("base", "head"),
                publishers: Vec::new(),
                declarations_dir: dir.path().to_path_buf(),
            },
            plan_path: plan_path.clone(),
            policy: LicensePolicy::default(),
            license_detector: None,
            git_cli: "git".into(),
            oras_cli: "oras".into(),
            vendor: "Widgetry".into(),
        };

        let plan = validate(config).await.unwrap();
        assert!(plan.is_empty());
        assert!(PublishPlan::read(&plan_path).await.unwrap().is_empty());
    }
}
