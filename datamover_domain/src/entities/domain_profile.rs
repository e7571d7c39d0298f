// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Profile
//!
//! Per-research-domain transfer policy: which engines to prefer, how hard to
//! parallelize, when to bundle, and what the domain's file types compress
//! like. Profiles are static data owned by the process-wide registry in the
//! infrastructure layer; this module defines the model and the synthetic
//! *generic* profile returned for unknown domain tags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::services::transfer_engine::EngineKind;
use crate::value_objects::WorkerCount;

/// What a domain's signature file type compresses like and which engine
/// suits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTypeHint {
    /// Expected compression ratio (1.0 = incompressible).
    pub compression_ratio: f64,
    pub preferred_engine: EngineKind,
    pub description: String,
}

/// Bundling policy for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BundlingStrategy {
    pub enabled: bool,
    /// Bundling only pays off above this many small files.
    pub min_file_count: u64,
    pub target_bundle_size: u64,
}

impl Default for BundlingStrategy {
    fn default() -> Self {
        Self {
            enabled: false,
            min_file_count: 1_000,
            target_bundle_size: 256 * 1024 * 1024,
        }
    }
}

/// Transfer tuning knobs for a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOptimization {
    /// Engines in preference order; auto-selection respects this ordering.
    pub preferred_engines: Vec<EngineKind>,
    pub optimal_concurrency: usize,
    pub bundling: BundlingStrategy,
}

/// Security posture a domain requires of its transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRequirements {
    pub encryption_required: bool,
    pub checksum_required: bool,
}

/// Complete per-domain policy record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainProfile {
    pub name: String,
    /// Extension (dotless, lower-case) -> hint.
    pub file_type_hints: BTreeMap<String, FileTypeHint>,
    pub transfer: TransferOptimization,
    pub security: SecurityRequirements,
}

impl DomainProfile {
    /// Synthetic profile for unknown domain tags.
    ///
    /// Preference order is [bulk-parallel, multi-cloud-sync,
    /// archival-bundler]; concurrency is `min(32, 2 * cores)`; bundling is
    /// enabled only when more than half the files are small.
    pub fn generic(cores: usize, small_file_fraction: f64) -> Self {
        Self {
            name: "generic".to_string(),
            file_type_hints: BTreeMap::new(),
            transfer: TransferOptimization {
                preferred_engines: vec![
                    EngineKind::BulkParallel,
                    EngineKind::MultiCloudSync,
                    EngineKind::ArchivalBundler,
                ],
                optimal_concurrency: WorkerCount::default_for_cores(cores).get(),
                bundling: BundlingStrategy {
                    enabled: small_file_fraction > 0.5,
                    ..BundlingStrategy::default()
                },
            },
            security: SecurityRequirements {
                encryption_required: false,
                checksum_required: true,
            },
        }
    }

    /// Average compression ratio across the profile's file-type hints,
    /// falling back to the supplied default when the profile has none.
    pub fn typical_compression_ratio(&self, default: f64) -> f64 {
        if self.file_type_hints.is_empty() {
            return default;
        }
        let sum: f64 = self.file_type_hints.values().map(|h| h.compression_ratio).sum();
        sum / self.file_type_hints.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests the generic profile rules for concurrency and bundling.
    #[test]
    fn test_generic_profile() {
        let profile = DomainProfile::generic(8, 0.7);
        assert_eq!(profile.name, "generic");
        assert_eq!(profile.transfer.optimal_concurrency, 16);
        assert!(profile.transfer.bundling.enabled);
        assert_eq!(profile.transfer.preferred_engines[0], EngineKind::BulkParallel);

        let sparse = DomainProfile::generic(64, 0.2);
        assert_eq!(sparse.transfer.optimal_concurrency, 32);
        assert!(!sparse.transfer.bundling.enabled);
    }

    /// Tests compression-ratio averaging and the empty fallback.
    #[test]
    fn test_typical_compression_ratio() {
        let mut profile = DomainProfile::generic(4, 0.0);
        assert_eq!(profile.typical_compression_ratio(1.3), 1.3);

        profile.file_type_hints.insert(
            "vcf".to_string(),
            FileTypeHint {
                compression_ratio: 3.0,
                preferred_engine: EngineKind::ArchivalBundler,
                description: "variant calls".to_string(),
            },
        );
        profile.file_type_hints.insert(
            "bam".to_string(),
            FileTypeHint {
                compression_ratio: 1.0,
                preferred_engine: EngineKind::BulkParallel,
                description: "aligned reads".to_string(),
            },
        );
        assert!((profile.typical_compression_ratio(1.3) - 2.0).abs() < 1e-9);
    }
}
