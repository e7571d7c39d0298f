// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bundle ID Value Object
//!
//! Content-derived address of a bundle: the SHA-256 over the *sorted* SHA-256
//! digests of its member files. Sorting makes the id a function of the set of
//! member contents, independent of input order, which is what makes bundling
//! idempotent: re-running on the same inputs produces the same object names,
//! and rewriting an existing object with identical content is a no-op.
//!
//! ## Naming
//!
//! - Bundle object: `bundle-<hex-sha256>.tar` (or `.tar.gz` when compressed)
//! - Sidecar manifest: `bundle-<hex-sha256>.manifest.json`

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::MoverError;

/// Content hash identifying a bundle by its members.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId {
    hex: String,
}

impl BundleId {
    /// Derives the id from member content hashes (lowercase hex SHA-256).
    ///
    /// The input order is irrelevant; hashes are sorted before being folded
    /// into the digest.
    ///
    /// # Errors
    ///
    /// Returns `MoverError::InvalidConfiguration` when the member list is
    /// empty or an entry is not a 64-character hex digest.
    pub fn from_member_hashes<I, S>(hashes: I) -> Result<Self, MoverError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sorted: Vec<String> = hashes
            .into_iter()
            .map(|h| h.as_ref().to_ascii_lowercase())
            .collect();
        if sorted.is_empty() {
            return Err(MoverError::InvalidConfiguration(
                "Bundle must contain at least one member".to_string(),
            ));
        }
        for h in &sorted {
            if h.len() != 64 || !h.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(MoverError::InvalidConfiguration(format!(
                    "'{}' is not a SHA-256 hex digest",
                    h
                )));
            }
        }
        sorted.sort_unstable();

        let mut hasher = Sha256::new();
        for h in &sorted {
            hasher.update(h.as_bytes());
            hasher.update(b"\n");
        }
        Ok(BundleId {
            hex: hex::encode(hasher.finalize()),
        })
    }

    /// Parses a previously rendered id (used when reading manifests back).
    pub fn from_hex(hex_digest: &str) -> Result<Self, MoverError> {
        let lower = hex_digest.to_ascii_lowercase();
        if lower.len() != 64 || !lower.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(MoverError::InvalidConfiguration(format!(
                "'{}' is not a valid bundle id",
                hex_digest
            )));
        }
        Ok(BundleId { hex: lower })
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    /// Object name of the bundle archive.
    pub fn object_name(&self, compressed: bool) -> String {
        if compressed {
            format!("bundle-{}.tar.gz", self.hex)
        } else {
            format!("bundle-{}.tar", self.hex)
        }
    }

    /// Object name of the sidecar manifest.
    pub fn manifest_name(&self) -> String {
        format!("bundle-{}.manifest.json", self.hex)
    }
}

impl std::fmt::Display for BundleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_of(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Tests that the id is independent of member order (set semantics).
    #[test]
    fn test_order_independence() {
        let a = digest_of(b"alpha");
        let b = digest_of(b"beta");
        let c = digest_of(b"gamma");

        let forward = BundleId::from_member_hashes([&a, &b, &c]).unwrap();
        let reversed = BundleId::from_member_hashes([&c, &b, &a]).unwrap();
        assert_eq!(forward, reversed);
    }

    /// Tests that different member sets produce different ids.
    #[test]
    fn test_content_sensitivity() {
        let a = digest_of(b"alpha");
        let b = digest_of(b"beta");

        let one = BundleId::from_member_hashes([&a]).unwrap();
        let two = BundleId::from_member_hashes([&a, &b]).unwrap();
        assert_ne!(one, two);
    }

    /// Tests object and manifest naming.
    #[test]
    fn test_object_names() {
        let id = BundleId::from_member_hashes([digest_of(b"x")]).unwrap();
        let name = id.object_name(true);
        assert!(name.starts_with("bundle-"));
        assert!(name.ends_with(".tar.gz"));
        assert_eq!(id.object_name(false), format!("bundle-{}.tar", id.as_hex()));
        assert_eq!(id.manifest_name(), format!("bundle-{}.manifest.json", id.as_hex()));
    }

    /// Tests rejection of empty member lists and malformed digests.
    #[test]
    fn test_invalid_input() {
        assert!(BundleId::from_member_hashes(Vec::<String>::new()).is_err());
        assert!(BundleId::from_member_hashes(["nothex"]).is_err());
        assert!(BundleId::from_hex("xyz").is_err());

        let id = BundleId::from_member_hashes([digest_of(b"x")]).unwrap();
        let back = BundleId::from_hex(id.as_hex()).unwrap();
        assert_eq!(id, back);
    }
}
