//! Content digests in the `<algorithm>:<hex>` form used by OCI descriptors

use sha2::{Digest, Sha256};

const SHA256_PREFIX: &str = "sha256:";

/// SHA-256 content addressing for archives and artifact manifests
pub struct ContentAddress;

impl ContentAddress {
    /// `sha256:<hex>` digest of content
    pub fn digest(content: &[u8]) -> String {
        format!("{SHA256_PREFIX}{:x}", Sha256::digest(content))
    }

    /// Whether a string is a well-formed `sha256:<64 hex>` digest
    pub fn is_valid_digest(digest: &str) -> bool {
        digest
            .strip_prefix(SHA256_PREFIX)
            .is_some_and(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
    }

    pub fn verify(content: &[u8], expected: &str) -> bool {
        Self::digest(content) == expected
    }
}
