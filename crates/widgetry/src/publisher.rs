//! Publisher ownership declarations

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::SchemaError;

/// Immutable numeric account id of a user or organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who owns a publisher namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Organization(AccountId),
    User(AccountId),
}

/// The identity proposing a change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub login: String,
    pub id: AccountId,
}

impl Actor {
    pub fn new(login: impl Into<String>, id: AccountId) -> Self {
        Self {
            login: login.into(),
            id,
        }
    }
}

/// Parsed `publishers/<publisher>.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPublisher", into = "RawPublisher")]
pub struct PublisherIdentity {
    pub owner: Owner,
    /// Identities allowed to edit sources without being the owner
    pub extra_maintainers: BTreeSet<AccountId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPublisher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    organization: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extra_maintainers: Option<Vec<AccountId>>,
}

impl TryFrom<RawPublisher> for PublisherIdentity {
    type Error = SchemaError;

    fn try_from(raw: RawPublisher) -> Result<Self, Self::Error> {
        let owner = match (raw.organization, raw.user) {
            (Some(org), None) => Owner::Organization(org),
            (None, Some(user)) => Owner::User(user),
            _ => {
                return Err(SchemaError::InvalidPublisher {
                    reason: "exactly one of organization or user should be provided".into(),
                });
            }
        };

        Ok(Self {
            owner,
            extra_maintainers: raw.extra_maintainers.unwrap_or_default().into_iter().collect(),
        })
    }
}

impl From<PublisherIdentity> for RawPublisher {
    fn from(identity: PublisherIdentity) -> Self {
        let (organization, user) = match identity.owner {
            Owner::Organization(id) => (Some(id), None),
            Owner::User(id) => (None, Some(id)),
        };
        let extra_maintainers = (!identity.extra_maintainers.is_empty())
            .then(|| identity.extra_maintainers.into_iter().collect());
        RawPublisher {
            organization,
            user,
            extra_maintainers,
        }
    }
}

impl PublisherIdentity {
    pub fn is_maintainer(&self, id: AccountId) -> bool {
        self.extra_maintainers.contains(&id)
    }
}

/// Parse a publisher declaration document
pub fn parse_publisher(content: &str, file: &str) -> Result<PublisherIdentity, SchemaError> {
    serde_yaml::from_str(content).map_err(|source| SchemaError::Yaml {
        file: file.to_string(),
        source,
    })
}
