// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bundle Manifest
//!
//! Sidecar record mapping a bundle back to its constituent files. The
//! manifest is the sole input `restore` needs besides the bundle object
//! itself, so it records everything required for reverse lookup and
//! integrity checking: per-entry relative path, size, archive offset, and
//! SHA-256, plus the digest of the whole bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use datamover_domain::services::datetime_serde;
use datamover_domain::{BundleId, MoverError};

/// One member file of a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the bundling root, `/`-separated.
    pub path: String,
    pub size: u64,
    /// Byte offset of the entry's header within the (uncompressed) tar
    /// stream.
    pub offset: u64,
    pub sha256: String,
}

/// Sidecar manifest for one bundle object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub bundle_id: BundleId,
    /// Object name of the bundle archive (`bundle-<hex>.tar[.gz]`).
    pub bundle_name: String,
    /// SHA-256 of the bundle object as written.
    pub bundle_sha256: String,
    pub compressed: bool,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    pub entries: Vec<ManifestEntry>,
}

impl BundleManifest {
    /// Object name of this manifest.
    pub fn manifest_name(&self) -> String {
        self.bundle_id.manifest_name()
    }

    pub fn total_member_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Writes the manifest next to the bundle, crash-safe
    /// (write-then-rename).
    pub fn save(&self, dir: &Path) -> Result<PathBuf, MoverError> {
        let final_path = dir.join(self.manifest_name());
        let tmp_path = dir.join(format!(".tmp-{}", self.manifest_name()));
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(final_path)
    }

    pub fn load(path: &Path) -> Result<Self, MoverError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BundleManifest {
        let digest = hex::encode([7u8; 32]);
        BundleManifest {
            bundle_id: BundleId::from_member_hashes([digest.clone()]).unwrap(),
            bundle_name: "bundle-abc.tar".to_string(),
            bundle_sha256: digest.clone(),
            compressed: false,
            created_at: Utc::now(),
            entries: vec![ManifestEntry {
                path: "reads/a.fastq".to_string(),
                size: 4096,
                offset: 0,
                sha256: digest,
            }],
        }
    }

    /// Tests save/load round trip through the crash-safe write path.
    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let manifest = sample();

        let path = manifest.save(dir.path()).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().ends_with(".manifest.json"));
        // No temp file left behind.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());

        let loaded = BundleManifest::load(&path).unwrap();
        assert_eq!(loaded.bundle_id, manifest.bundle_id);
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.total_member_bytes(), 4096);
    }
}
