//! Authorization Engine
//!
//! Decides, per publisher, whether an actor may move a publisher declaration
//! from its base form to its head form. The decision only depends on the two
//! declarations, the actor and organization membership.
//!
//! The rules, in order:
//!
//! 1. Removing an existing declaration is never allowed. A publisher absent
//!    on both sides is skipped.
//! 2. A new declaration is allowed iff the actor owns it (is the declared
//!    user, or a member of the declared organization).
//! 3. The owner reference of an existing declaration cannot change.
//! 4. The owner may change anything else.
//! 5. Anyone else must be an extra maintainer in both the old and the new
//!    declaration.

use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::declarations::{DeclarationStore, RevisionRange};
use crate::error::{AuthorizationError, Result};
use crate::external::MembershipLookup;
use crate::identifier::Slug;
use crate::publisher::{Actor, Owner, PublisherIdentity};

/// Why a transition was permitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitReason {
    /// The publisher exists on neither side
    NeverExisted,
    UserOwner,
    OrganizationMember,
    ExtraMaintainer,
}

impl fmt::Display for PermitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PermitReason::NeverExisted => "Publisher does not exist on BASE or HEAD, skipping",
            PermitReason::UserOwner => "Authorized as user publisher",
            PermitReason::OrganizationMember => "Authorized as member of organization publisher",
            PermitReason::ExtraMaintainer => "Authorized as extra maintainer",
        };
        f.write_str(text)
    }
}

/// Why a transition was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    PublisherRemoved,
    IdentityChanged,
    MaintainersChanged,
    Unauthorized,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DenyReason::PublisherRemoved => "Existing publisher cannot be removed",
            DenyReason::IdentityChanged => "Identity of existing publisher cannot be changed",
            DenyReason::MaintainersChanged => {
                "Only the publisher owner or an authorized organization member can modify extra maintainers"
            }
            DenyReason::Unauthorized => "Unauthorized",
        };
        f.write_str(text)
    }
}

/// Outcome of authorizing one publisher transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Permit(PermitReason),
    Deny(DenyReason),
}

pub struct Authorizer {
    membership: Arc<dyn MembershipLookup>,
}

impl Authorizer {
    pub fn new(membership: Arc<dyn MembershipLookup>) -> Self {
        Self { membership }
    }

    /// Decide one transition from `old` to `new`
    pub async fn authorize(
        &self,
        old: Option<&PublisherIdentity>,
        new: Option<&PublisherIdentity>,
        actor: &Actor,
    ) -> Result<Decision> {
        let new = match (old, new) {
            (None, None) => return Ok(Decision::Permit(PermitReason::NeverExisted)),
            (Some(_), None) => return Ok(Decision::Deny(DenyReason::PublisherRemoved)),
            (_, Some(new)) => new,
        };

        let Some(old) = old else {
            return Ok(match self.ownership(new, actor).await? {
                Some(reason) => Decision::Permit(reason),
                None => Decision::Deny(DenyReason::Unauthorized),
            });
        };

        if old.owner != new.owner {
            return Ok(Decision::Deny(DenyReason::IdentityChanged));
        }

        if let Some(reason) = self.ownership(new, actor).await? {
            return Ok(Decision::Permit(reason));
        }

        if old.is_maintainer(actor.id) && new.is_maintainer(actor.id) {
            return Ok(Decision::Permit(PermitReason::ExtraMaintainer));
        }

        if old.extra_maintainers != new.extra_maintainers {
            return Ok(Decision::Deny(DenyReason::MaintainersChanged));
        }
        Ok(Decision::Deny(DenyReason::Unauthorized))
    }

    /// Whether the actor owns the declaration, and how
    async fn ownership(
        &self,
        identity: &PublisherIdentity,
        actor: &Actor,
    ) -> Result<Option<PermitReason>> {
        match identity.owner {
            Owner::User(id) if id == actor.id => Ok(Some(PermitReason::UserOwner)),
            Owner::User(_) => Ok(None),
            Owner::Organization(org) => {
                if self.membership.is_member(org, &actor.login).await? {
                    Ok(Some(PermitReason::OrganizationMember))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Authorize every changed publisher, stopping at the first denial
    pub async fn check_publishers(
        &self,
        store: &DeclarationStore,
        revisions: &RevisionRange,
        publishers: &[Slug],
        actor: &Actor,
    ) -> Result<Vec<(Slug, PermitReason)>> {
        let mut permits = Vec::with_capacity(publishers.len());

        for publisher in publishers {
            info!("[{publisher}] Authorizing...");

            let old = store.publisher(publisher, &revisions.base).await?;
            let new = store.publisher(publisher, &revisions.head).await?;

            match self.authorize(old.as_ref(), new.as_ref(), actor).await? {
                Decision::Permit(reason) => {
                    info!("[{publisher}] {reason}");
                    permits.push((publisher.clone(), reason));
                }
                Decision::Deny(reason) => {
                    return Err(AuthorizationError {
                        publisher: publisher.to_string(),
                        reason,
                    }
                    .into());
                }
            }
        }

        Ok(permits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDeclarations, StaticMembership};
    use crate::publisher::AccountId;
    use std::collections::BTreeSet;

    const ORG: AccountId = AccountId(1000);

    fn user(id: u64, maintainers: &[u64]) -> PublisherIdentity {
        PublisherIdentity {
            owner: Owner::User(AccountId(id)),
            extra_maintainers: maintainers.iter().copied().map(AccountId).collect(),
        }
    }

    fn org(maintainers: &[u64]) -> PublisherIdentity {
        PublisherIdentity {
            owner: Owner::Organization(ORG),
            extra_maintainers: maintainers.iter().copied().map(AccountId).collect(),
        }
    }

    fn authorizer() -> Authorizer {
        Authorizer::new(Arc::new(StaticMembership::new().with_member(ORG, "ada")))
    }

    fn actor(login: &str, id: u64) -> Actor {
        Actor::new(login, AccountId(id))
    }

    #[tokio::test]
    async fn test_removal_and_absence() {
        let authz = authorizer();
        let owner = actor("ada", 1);

        assert_eq!(
            authz.authorize(None, None, &owner).await.unwrap(),
            Decision::Permit(PermitReason::NeverExisted)
        );
        assert_eq!(
            authz.authorize(Some(&user(1, &[])), None, &owner).await.unwrap(),
            Decision::Deny(DenyReason::PublisherRemoved)
        );
    }

    #[tokio::test]
    async fn test_new_publisher_requires_ownership() {
        let authz = authorizer();

        assert_eq!(
            authz.authorize(None, Some(&user(1, &[])), &actor("ada", 1)).await.unwrap(),
            Decision::Permit(PermitReason::UserOwner)
        );
        assert_eq!(
            authz.authorize(None, Some(&user(1, &[])), &actor("bob", 2)).await.unwrap(),
            Decision::Deny(DenyReason::Unauthorized)
        );
        assert_eq!(
            authz.authorize(None, Some(&org(&[])), &actor("ada", 9)).await.unwrap(),
            Decision::Permit(PermitReason::OrganizationMember)
        );
        assert_eq!(
            authz.authorize(None, Some(&org(&[])), &actor("bob", 2)).await.unwrap(),
            Decision::Deny(DenyReason::Unauthorized)
        );
    }

    #[tokio::test]
    async fn test_identity_change_denied_for_everyone() {
        let authz = authorizer();
        let decision = authz
            .authorize(Some(&user(1, &[])), Some(&user(2, &[])), &actor("ada", 1))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::IdentityChanged));

        let decision = authz
            .authorize(Some(&org(&[])), Some(&user(1, &[])), &actor("ada", 1))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::IdentityChanged));
    }

    #[tokio::test]
    async fn test_owner_may_change_maintainers() {
        let authz = authorizer();
        let decision = authz
            .authorize(Some(&user(1, &[5])), Some(&user(1, &[6, 7])), &actor("ada", 1))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Permit(PermitReason::UserOwner));
    }

    #[tokio::test]
    async fn test_maintainer_must_be_listed_on_both_sides() {
        let authz = authorizer();
        let maintainer = actor("mo", 5);

        // order-independent comparison
        let decision = authz
            .authorize(Some(&user(1, &[5, 6])), Some(&user(1, &[6, 5])), &maintainer)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Permit(PermitReason::ExtraMaintainer));

        let decision = authz
            .authorize(Some(&user(1, &[5])), Some(&user(1, &[5, 8])), &maintainer)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Permit(PermitReason::ExtraMaintainer));

        // removing themselves leaves them listed on one side only
        let decision = authz
            .authorize(Some(&user(1, &[5])), Some(&user(1, &[])), &maintainer)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::MaintainersChanged));

        // adding themselves
        let decision = authz
            .authorize(Some(&user(1, &[])), Some(&user(1, &[5])), &maintainer)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::MaintainersChanged));

        let decision = authz
            .authorize(Some(&user(1, &[6])), Some(&user(1, &[6])), &maintainer)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::Unauthorized));
    }

    #[tokio::test]
    async fn test_check_publishers_stops_at_first_denial() {
        let declarations = MemoryDeclarations::new()
            .with_file("base", "publishers/zeta.yaml", "user: 2\n")
            .with_file("head", "publishers/acme.yaml", "user: 1\n")
            .with_file("head", "publishers/zeta.yaml", "user: 3\n");
        let store = DeclarationStore::new(Arc::new(declarations));
        let revisions = RevisionRange::new("base", "head");
        let publishers: Vec<Slug> = ["acme", "ghost", "zeta"]
            .into_iter()
            .map(|p| Slug::parse(p).unwrap())
            .collect();

        let err = authorizer()
            .check_publishers(&store, &revisions, &publishers, &actor("ada", 1))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "[zeta] Identity of existing publisher cannot be changed"
        );

        let permits = authorizer()
            .check_publishers(&store, &revisions, &publishers[..2], &actor("ada", 1))
            .await
            .unwrap();
        let reasons: BTreeSet<_> = permits.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(reasons.len(), 2);
        assert_eq!(permits[1].1, PermitReason::NeverExisted);
    }
}
