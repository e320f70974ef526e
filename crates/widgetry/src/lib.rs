//! # Widgetry
//!
//! Change-control core for a widget/plugin registry. Publishers declare, in
//! version-controlled YAML files, which items they own and at which upstream
//! commit and version each item sits. This crate provides the two gates that
//! run over a `(base, head)` pair of revisions:
//!
//! - the [`authz`] engine, which decides whether an actor may change a
//!   publisher's ownership declaration, and
//! - the [`validate`] state machine, which diffs source declarations, enforces
//!   the deletion/version/license rules and produces a [`PublishPlan`].
//!
//! Everything outside the core (git, the artifact store, membership lookups,
//! license detection, attestation) is reached through the traits in
//! [`external`] and [`declarations`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use widgetry::*;
//! use widgetry::memory::{MemoryCheckout, MemoryDeclarations, MemoryPackager};
//!
//! # async fn example() -> widgetry::Result<()> {
//! let declarations = MemoryDeclarations::new();
//! let store = DeclarationStore::new(Arc::new(declarations));
//! let validator = ChangeValidator::new(
//!     Arc::new(MemoryCheckout::new()),
//!     Arc::new(MemoryPackager::new()),
//!     Arc::new(NoLicenseDetection),
//!     LicensePolicy::default(),
//! );
//!
//! let revisions = RevisionRange::new("base-sha", "head-sha");
//! let publishers = vec![Slug::parse("acme")?];
//! let plan = validator.validate(&store, &revisions, &publishers).await?;
//! println!("{} item(s) ready to publish", plan.len());
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod artifact;
pub mod authz;
pub mod collection;
pub mod declarations;
pub mod error;
pub mod external;
pub mod identifier;
pub mod license;
pub mod manifest;
pub mod memory;
pub mod plan;
pub mod publisher;
pub mod reference;
pub mod source;
pub mod validate;
pub mod version;

pub use address::ContentAddress;
pub use artifact::{Archive, PackageRequest, PackagedArtifact, StagedLayout};
pub use authz::{Authorizer, Decision, DenyReason, PermitReason};
pub use collection::{Collection, ItemKey, Packaging};
pub use declarations::{DeclarationSource, DeclarationStore, RevisionRange};
pub use error::{
    AuthorizationError, ExternalError, Result, SchemaError, ValidationError, WidgetryError,
};
pub use external::{
    Attestor, CheckedOutTree, LicenseDetector, MembershipLookup, NoLicenseDetection, Packager,
    SkipAttestation, SourceCheckout,
};
pub use identifier::Slug;
pub use license::{LicenseError, LicenseExpression, LicensePolicy};
pub use manifest::{Author, Manifest, SpecialFile, read_manifest};
pub use plan::{PublishPlan, PublishPlanEntry};
pub use publisher::{AccountId, Actor, Owner, PublisherIdentity};
pub use reference::ArtifactReference;
pub use source::{SourceMap, SourceRecord};
pub use validate::{ChangeValidator, ItemChange};

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
