//! Organization membership lookups through the `gh` CLI

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use widgetry::{AccountId, MembershipLookup, Result};

use crate::process::exec;

/// Answers membership queries with the GitHub REST API
///
/// Organizations are declared by immutable id, so the login is resolved
/// first and cached for the rest of the run.
#[derive(Debug)]
pub struct GhMembership {
    gh: String,
    logins: Mutex<HashMap<AccountId, String>>,
}

impl GhMembership {
    pub fn new(gh: impl Into<String>) -> Self {
        Self {
            gh: gh.into(),
            logins: Mutex::new(HashMap::new()),
        }
    }

    async fn organization_login(&self, organization: AccountId) -> Result<String> {
        if let Some(login) = self.cached_login(organization) {
            return Ok(login);
        }

        let path = format!("organizations/{organization}");
        let output = exec(&self.gh, ["api", path.as_str(), "--jq", ".login"], None).await?;
        let login = output.stdout.trim().to_string();
        debug!("Organization {} is {}", organization, login);

        if let Ok(mut logins) = self.logins.lock() {
            logins.insert(organization, login.clone());
        }
        Ok(login)
    }

    fn cached_login(&self, organization: AccountId) -> Option<String> {
        self.logins
            .lock()
            .ok()
            .and_then(|logins| logins.get(&organization).cloned())
    }
}

/// `gh api` reports a non-member as 404, or 302 when the caller cannot see
/// the member list
fn is_not_member_response(stderr: &str) -> bool {
    stderr.contains("HTTP 404") || stderr.contains("HTTP 302")
}

#[async_trait]
impl MembershipLookup for GhMembership {
    async fn is_member(&self, organization: AccountId, login: &str) -> Result<bool> {
        let org = self.organization_login(organization).await?;
        let path = format!("orgs/{org}/members/{login}");

        match exec(&self.gh, ["api", path.as_str(), "--silent"], None).await {
            Ok(_) => Ok(true),
            Err(err) if is_not_member_response(&err.stderr) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_member_responses() {
        assert!(is_not_member_response("gh: Not Found (HTTP 404)"));
        assert!(is_not_member_response("gh: (HTTP 302)"));
        assert!(!is_not_member_response("gh: Bad credentials (HTTP 401)"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_membership_with_stub_cli() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("gh");
        std::fs::write(
            &script,
            r#"#!/bin/sh
case "$2" in
  organizations/7) echo acme-org ;;
  orgs/acme-org/members/ada) exit 0 ;;
  orgs/acme-org/members/*) echo "gh: Not Found (HTTP 404)" >&2; exit 1 ;;
  *) echo "gh: Server Error (HTTP 500)" >&2; exit 1 ;;
esac
"#,
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let lookup = GhMembership::new(script.to_string_lossy());
        assert!(lookup.is_member(AccountId(7), "ada").await.unwrap());
        assert!(!lookup.is_member(AccountId(7), "mallory").await.unwrap());
        assert!(lookup.is_member(AccountId(8), "ada").await.is_err());
    }
}
