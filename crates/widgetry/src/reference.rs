use std::fmt;

use crate::collection::ItemKey;
use crate::error::SchemaError;

/// Remote location of a published item version:
/// `<registry>/<namespace>/<collection>/<publisher>/<slug>:v<version>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    pub registry: String, // "ghcr.io"
    pub namespace: String, // lowercased repository owner
    pub item: ItemKey,
    pub tag: String, // "v1.2.0"
}

impl ArtifactReference {
    /// Build the reference for one version of an item
    ///
    /// The namespace is lowercased. Build metadata separators (`+`) are not
    /// allowed in OCI tags and are replaced by `_`.
    pub fn new(
        registry: &str,
        namespace: &str,
        item: ItemKey,
        version: &str,
    ) -> Result<Self, SchemaError> {
        let registry = registry.trim_end_matches('/');
        if registry.is_empty() || registry.contains(char::is_whitespace) {
            return Err(SchemaError::invalid_field(
                "registry",
                format!("invalid registry host '{registry}'"),
            ));
        }

        let namespace = namespace.to_lowercase();
        Self::validate_namespace(&namespace)?;

        let tag = format!("v{}", version.replace('+', "_"));
        Self::validate_tag(&tag)?;

        Ok(Self {
            registry: registry.to_string(),
            namespace,
            item,
            tag,
        })
    }

    /// Repository part of the reference, without the tag
    pub fn repository(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.registry, self.namespace, self.item.collection, self.item.publisher, self.item.slug
        )
    }

    /// Docker registry naming rules: lowercase, alphanumeric, dots, dashes, underscores
    fn validate_namespace(namespace: &str) -> Result<(), SchemaError> {
        if namespace.is_empty() || namespace.len() > 255 {
            return Err(SchemaError::invalid_field(
                "namespace",
                "namespace length must be 1-255 characters",
            ));
        }

        let valid_chars = namespace.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-' || c == '_'
        });
        if !valid_chars {
            return Err(SchemaError::invalid_field(
                "namespace",
                format!(
                    "'{namespace}' can only contain lowercase letters, digits, dots, dashes, and underscores"
                ),
            ));
        }

        let edges = ['.', '-', '_'];
        if namespace.starts_with(edges) || namespace.ends_with(edges) {
            return Err(SchemaError::invalid_field(
                "namespace",
                format!("'{namespace}' cannot start or end with '.', '-', or '_'"),
            ));
        }

        Ok(())
    }

    /// OCI tag rules: `[A-Za-z0-9_][A-Za-z0-9._-]{0,127}`
    fn validate_tag(tag: &str) -> Result<(), SchemaError> {
        let valid = tag.len() <= 128
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
        if !valid {
            return Err(SchemaError::invalid_field(
                "version",
                format!("'{tag}' is not a valid artifact tag"),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository(), self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::identifier::Slug;

    fn key() -> ItemKey {
        ItemKey::new(
            Collection::Widgets,
            Slug::parse("acme").unwrap(),
            Slug::parse("clock").unwrap(),
        )
    }

    #[test]
    fn test_reference_layout() {
        let reference = ArtifactReference::new("ghcr.io", "Widgetry-Org", key(), "1.2.0").unwrap();
        assert_eq!(reference.namespace, "widgetry-org");
        assert_eq!(reference.repository(), "ghcr.io/widgetry-org/widgets/acme/clock");
        assert_eq!(
            reference.to_string(),
            "ghcr.io/widgetry-org/widgets/acme/clock:v1.2.0"
        );
    }

    #[test]
    fn test_build_metadata_in_tag() {
        let reference = ArtifactReference::new("ghcr.io", "org", key(), "1.0.0-rc.1+build.5").unwrap();
        assert_eq!(reference.tag, "v1.0.0-rc.1_build.5");
    }

    #[test]
    fn test_invalid_namespace() {
        assert!(ArtifactReference::new("ghcr.io", "", key(), "1.0.0").is_err());
        assert!(ArtifactReference::new("ghcr.io", "-org", key(), "1.0.0").is_err());
        assert!(ArtifactReference::new("ghcr.io", "my org", key(), "1.0.0").is_err());
        assert!(ArtifactReference::new("", "org", key(), "1.0.0").is_err());
    }
}
