//! Command line and environment configuration
//!
//! Every input is read once here, from flags or their environment variables,
//! and turned into an explicit config value. Nothing below `main` reads the
//! environment.

use clap::{Args, Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use widgetry::{AccountId, Actor, LicensePolicy, RevisionRange, Slug};
use widgetry_registry::PublishOptions;

use crate::error::{CliError, Result};

#[derive(Parser, Debug)]
#[command(
    name = "widgetry",
    about = "Change control and publishing for the widgetry registry",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the author may change every touched publisher declaration
    Authorize(AuthorizeArgs),

    /// Validate changed source declarations and write the publish plan
    Validate(ValidateArgs),

    /// Publish every entry of a publish plan and update the registry API
    Publish(PublishArgs),
}

#[derive(Args, Debug)]
pub struct RevisionArgs {
    /// Base revision of the change
    #[arg(long, env = "BASE_SHA")]
    pub base_sha: String,

    /// Head revision of the change
    #[arg(long, env = "HEAD_SHA")]
    pub head_sha: String,

    /// Whitespace-separated publisher slugs touched by the change
    #[arg(long, env = "CHANGED_PUBLISHERS", default_value = "")]
    pub changed_publishers: String,

    /// Checkout of the declaration repository
    #[arg(long, env = "DECLARATIONS_DIR", default_value = ".")]
    pub declarations_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct ToolArgs {
    /// git executable
    #[arg(long, env = "GIT_CLI", default_value = "git")]
    pub git_cli: String,

    /// oras executable
    #[arg(long, env = "ORAS_CLI", default_value = "oras")]
    pub oras_cli: String,

    /// Vendor recorded in artifact annotations
    #[arg(long, env = "ARTIFACT_VENDOR", default_value = "Widgetry")]
    pub vendor: String,
}

#[derive(Args, Debug)]
pub struct AuthorizeArgs {
    #[command(flatten)]
    pub revisions: RevisionArgs,

    /// Login of the change author
    #[arg(long, env = "AUTHOR_LOGIN")]
    pub author_login: String,

    /// Numeric account id of the change author
    #[arg(long, env = "AUTHOR_ID")]
    pub author_id: u64,

    /// gh executable used for organization membership lookups
    #[arg(long, env = "GH_CLI", default_value = "gh")]
    pub gh_cli: String,

    #[arg(long, env = "GIT_CLI", default_value = "git")]
    pub git_cli: String,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub revisions: RevisionArgs,

    #[command(flatten)]
    pub tools: ToolArgs,

    /// Where to write the publish plan
    #[arg(long, env = "PUBLISH_PLAN_PATH")]
    pub publish_plan_path: PathBuf,

    /// Accepted SPDX license ids
    #[arg(
        long,
        env = "ACCEPTED_LICENSES",
        value_delimiter = ',',
        default_value = "Apache-2.0,BSD-3-Clause,MIT"
    )]
    pub accepted_licenses: Vec<String>,

    /// Command printing the JSON array of licenses detected in a tree;
    /// the tree path is appended as the last argument
    #[arg(long, env = "LICENSE_DETECTOR")]
    pub license_detector: Option<String>,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    #[command(flatten)]
    pub tools: ToolArgs,

    /// Publish plan written by `validate`
    #[arg(long, env = "PUBLISH_PLAN_PATH")]
    pub publish_plan_path: PathBuf,

    /// Root of the registry API tree
    #[arg(long, env = "API_DIR")]
    pub api_dir: PathBuf,

    /// Schema tag the index documents must carry
    #[arg(long, env = "API_VERSION")]
    pub api_version: String,

    /// Artifact registry host
    #[arg(long, env = "ARTIFACT_REGISTRY", default_value = "ghcr.io")]
    pub registry: String,

    /// Namespace under the artifact registry
    #[arg(long, env = "GITHUB_REPOSITORY_OWNER")]
    pub repository_owner: String,

    /// `owner/name` of the declaration repository, used in attestation links
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: String,

    /// Do not attest published artifacts
    #[arg(long, env = "SKIP_ATTESTATION")]
    pub skip_attestation: bool,

    /// Command producing a provenance attestation; the artifact repository
    /// and digest are appended, the attestation id is read from stdout
    #[arg(long, env = "ATTESTATION_COMMAND")]
    pub attestation_command: Option<String>,

    /// Publishers whose items are flagged official
    #[arg(long, env = "OFFICIAL_PUBLISHERS", value_delimiter = ',')]
    pub official_publishers: Vec<String>,

    /// Publishers whose items are flagged hidden
    #[arg(long, env = "HIDDEN_PUBLISHERS", value_delimiter = ',')]
    pub hidden_publishers: Vec<String>,
}

/// A command line split into program and leading arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Split on whitespace; quoting is not supported
    pub fn parse(command: &str, setting: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| CliError::Config(format!("{setting} cannot be empty")))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

/// Inputs shared by the gate commands
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub revisions: RevisionRange,
    pub publishers: Vec<Slug>,
    pub declarations_dir: PathBuf,
}

impl TryFrom<RevisionArgs> for GateConfig {
    type Error = CliError;

    fn try_from(args: RevisionArgs) -> Result<Self> {
        Ok(Self {
            revisions: RevisionRange::new(args.base_sha, args.head_sha),
            publishers: parse_publishers(&args.changed_publishers)?,
            declarations_dir: args.declarations_dir,
        })
    }
}

/// Parse the whitespace-separated publisher list, validating every slug
pub fn parse_publishers(list: &str) -> Result<Vec<Slug>> {
    list.split_whitespace()
        .map(|publisher| Slug::parse(publisher).map_err(|e| CliError::Core(e.into())))
        .collect()
}

#[derive(Debug, Clone)]
pub struct AuthorizeConfig {
    pub gate: GateConfig,
    pub actor: Actor,
    pub gh_cli: String,
    pub git_cli: String,
}

impl TryFrom<AuthorizeArgs> for AuthorizeConfig {
    type Error = CliError;

    fn try_from(args: AuthorizeArgs) -> Result<Self> {
        if args.author_login.trim().is_empty() {
            return Err(CliError::Config("AUTHOR_LOGIN cannot be empty".into()));
        }
        Ok(Self {
            gate: args.revisions.try_into()?,
            actor: Actor::new(args.author_login, AccountId(args.author_id)),
            gh_cli: args.gh_cli,
            git_cli: args.git_cli,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ValidateConfig {
    pub gate: GateConfig,
    pub plan_path: PathBuf,
    pub policy: LicensePolicy,
    pub license_detector: Option<CommandSpec>,
    pub git_cli: String,
    pub oras_cli: String,
    pub vendor: String,
}

impl TryFrom<ValidateArgs> for ValidateConfig {
    type Error = CliError;

    fn try_from(args: ValidateArgs) -> Result<Self> {
        let policy = LicensePolicy::new(
            args.accepted_licenses
                .iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty()),
        )
        .map_err(|e| CliError::Config(format!("ACCEPTED_LICENSES: {e}")))?;

        let license_detector = args
            .license_detector
            .as_deref()
            .map(|command| CommandSpec::parse(command, "LICENSE_DETECTOR"))
            .transpose()?;

        Ok(Self {
            gate: args.revisions.try_into()?,
            plan_path: args.publish_plan_path,
            policy,
            license_detector,
            git_cli: args.tools.git_cli,
            oras_cli: args.tools.oras_cli,
            vendor: args.tools.vendor,
        })
    }
}

/// How published artifacts get attested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationMode {
    Skip,
    Command(CommandSpec),
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub plan_path: PathBuf,
    pub api_dir: PathBuf,
    pub options: PublishOptions,
    pub repository: String,
    pub attestation: AttestationMode,
    pub git_cli: String,
    pub oras_cli: String,
    pub vendor: String,
}

impl TryFrom<PublishArgs> for PublishConfig {
    type Error = CliError;

    fn try_from(args: PublishArgs) -> Result<Self> {
        let attestation = match (args.skip_attestation, args.attestation_command.as_deref()) {
            (true, _) => AttestationMode::Skip,
            (false, Some(command)) => {
                AttestationMode::Command(CommandSpec::parse(command, "ATTESTATION_COMMAND")?)
            }
            (false, None) => {
                return Err(CliError::Config(
                    "ATTESTATION_COMMAND is required unless SKIP_ATTESTATION is set".into(),
                ));
            }
        };

        if args.api_version.trim().is_empty() {
            return Err(CliError::Config("API_VERSION cannot be empty".into()));
        }

        let publishers = |list: Vec<String>| -> BTreeSet<String> {
            list.into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        };

        let mut options =
            PublishOptions::new(args.registry, args.repository_owner, args.api_version);
        options.official_publishers = publishers(args.official_publishers);
        options.hidden_publishers = publishers(args.hidden_publishers);

        Ok(Self {
            plan_path: args.publish_plan_path,
            api_dir: args.api_dir,
            options,
            repository: args.repository,
            attestation,
            git_cli: args.tools.git_cli,
            oras_cli: args.tools.oras_cli,
            vendor: args.tools.vendor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("widgetry").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_publishers() {
        let publishers = parse_publishers("  acme\n widgetry-labs\tzeta ").unwrap();
        let names: Vec<_> = publishers.iter().map(Slug::as_str).collect();
        assert_eq!(names, vec!["acme", "widgetry-labs", "zeta"]);

        assert!(parse_publishers("").unwrap().is_empty());
        assert!(parse_publishers("acme ../etc").is_err());
    }

    #[test]
    fn test_authorize_args() {
        let cli = parse(&[
            "authorize",
            "--base-sha",
            "base",
            "--head-sha",
            "head",
            "--changed-publishers",
            "acme",
            "--author-login",
            "ada",
            "--author-id",
            "42",
        ]);
        let Commands::Authorize(args) = cli.command else {
            panic!("expected authorize");
        };
        let config = AuthorizeConfig::try_from(args).unwrap();
        assert_eq!(config.actor, Actor::new("ada", AccountId(42)));
        assert_eq!(config.gate.revisions, RevisionRange::new("base", "head"));
        assert_eq!(config.gate.publishers.len(), 1);
    }

    #[test]
    fn test_validate_license_settings() {
        let cli = parse(&[
            "validate",
            "--base-sha",
            "b",
            "--head-sha",
            "h",
            "--publish-plan-path",
            "plan.json",
            "--accepted-licenses",
            "MIT,ISC",
            "--license-detector",
            "detect-licenses --format json",
        ]);
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        let config = ValidateConfig::try_from(args).unwrap();
        assert!(config.policy.check("ISC", None).is_ok());
        assert!(config.policy.check("Apache-2.0", None).is_err());
        assert_eq!(
            config.license_detector,
            Some(CommandSpec {
                program: "detect-licenses".into(),
                args: vec!["--format".into(), "json".into()],
            })
        );
    }

    fn publish_args(extra: &[&str]) -> PublishArgs {
        let mut args = vec![
            "publish",
            "--publish-plan-path",
            "plan.json",
            "--api-dir",
            "api",
            "--api-version",
            "v1",
            "--repository-owner",
            "Widgetry",
            "--repository",
            "widgetry/registry",
        ];
        args.extend_from_slice(extra);
        match parse(&args).command {
            Commands::Publish(args) => args,
            _ => panic!("expected publish"),
        }
    }

    #[test]
    fn test_attestation_must_be_configured() {
        assert!(matches!(
            PublishConfig::try_from(publish_args(&[])),
            Err(CliError::Config(_))
        ));

        let config = PublishConfig::try_from(publish_args(&["--skip-attestation"])).unwrap();
        assert_eq!(config.attestation, AttestationMode::Skip);

        let config =
            PublishConfig::try_from(publish_args(&["--attestation-command", "attest --push"]))
                .unwrap();
        assert!(matches!(config.attestation, AttestationMode::Command(_)));
    }

    #[test]
    fn test_publisher_flags() {
        let config = PublishConfig::try_from(publish_args(&[
            "--skip-attestation",
            "--official-publishers",
            "widgetry, core",
            "--hidden-publishers",
            "widgetry-test",
        ]))
        .unwrap();

        assert!(config.options.official_publishers.contains("core"));
        assert!(config.options.official_publishers.contains("widgetry"));
        assert!(config.options.hidden_publishers.contains("widgetry-test"));
        assert_eq!(config.options.registry, "ghcr.io");
    }
}
