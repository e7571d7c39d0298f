// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Profile Registry
//!
//! Static catalogue of per-research-domain transfer policy. Built once at
//! first use, immutable afterwards, accessed lock-free (`Lazy` +
//! read-only references). Unknown domain tags synthesize a *generic*
//! profile parameterized by the host's core count and the observed
//! small-file fraction.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use datamover_bootstrap::platform;
use datamover_domain::entities::domain_profile::{
    BundlingStrategy, DomainProfile, FileTypeHint, SecurityRequirements, TransferOptimization,
};
use datamover_domain::EngineKind;
#[cfg(test)]
use datamover_domain::WorkerCount;

fn hint(ratio: f64, engine: EngineKind, description: &str) -> FileTypeHint {
    FileTypeHint {
        compression_ratio: ratio,
        preferred_engine: engine,
        description: description.to_string(),
    }
}

fn profile(
    name: &str,
    hints: Vec<(&str, FileTypeHint)>,
    engines: Vec<EngineKind>,
    concurrency: usize,
    bundling: BundlingStrategy,
    security: SecurityRequirements,
) -> DomainProfile {
    DomainProfile {
        name: name.to_string(),
        file_type_hints: hints.into_iter().map(|(ext, hint)| (ext.to_string(), hint)).collect(),
        transfer: TransferOptimization {
            preferred_engines: engines,
            optimal_concurrency: concurrency,
            bundling,
        },
        security,
    }
}

static REGISTRY: Lazy<BTreeMap<&'static str, DomainProfile>> = Lazy::new(|| {
    let mut registry = BTreeMap::new();

    registry.insert(
        "genomics",
        profile(
            "genomics",
            vec![
                ("fastq", hint(2.8, EngineKind::ArchivalBundler, "raw sequencing reads")),
                ("vcf", hint(3.5, EngineKind::ArchivalBundler, "variant calls")),
                ("bam", hint(1.0, EngineKind::BulkParallel, "aligned reads, already compressed")),
                ("cram", hint(1.0, EngineKind::BulkParallel, "reference-compressed alignments")),
            ],
            vec![EngineKind::ArchivalBundler, EngineKind::BulkParallel, EngineKind::MultiCloudSync],
            16,
            BundlingStrategy {
                enabled: true,
                min_file_count: 500,
                target_bundle_size: 256 * 1024 * 1024,
            },
            SecurityRequirements {
                encryption_required: true,
                checksum_required: true,
            },
        ),
    );

    registry.insert(
        "climate",
        profile(
            "climate",
            vec![
                ("nc", hint(1.4, EngineKind::BulkParallel, "NetCDF model output")),
                ("grib", hint(1.2, EngineKind::BulkParallel, "gridded forecast data")),
                ("zarr", hint(1.0, EngineKind::MultiCloudSync, "chunked array store")),
            ],
            vec![EngineKind::BulkParallel, EngineKind::MultiCloudSync, EngineKind::ArchivalBundler],
            24,
            BundlingStrategy {
                enabled: false,
                ..BundlingStrategy::default()
            },
            SecurityRequirements {
                encryption_required: false,
                checksum_required: true,
            },
        ),
    );

    registry.insert(
        "astronomy",
        profile(
            "astronomy",
            vec![("fits", hint(1.3, EngineKind::BulkParallel, "imaging and spectra"))],
            vec![EngineKind::BulkParallel, EngineKind::ArchivalBundler, EngineKind::MultiCloudSync],
            24,
            BundlingStrategy {
                enabled: true,
                min_file_count: 2_000,
                target_bundle_size: 256 * 1024 * 1024,
            },
            SecurityRequirements {
                encryption_required: false,
                checksum_required: true,
            },
        ),
    );

    registry.insert(
        "geospatial",
        profile(
            "geospatial",
            vec![
                ("las", hint(1.6, EngineKind::BulkParallel, "lidar point clouds")),
                ("tif", hint(1.1, EngineKind::BulkParallel, "raster imagery")),
            ],
            vec![EngineKind::BulkParallel, EngineKind::MultiCloudSync, EngineKind::ArchivalBundler],
            16,
            BundlingStrategy {
                enabled: false,
                ..BundlingStrategy::default()
            },
            SecurityRequirements {
                encryption_required: false,
                checksum_required: true,
            },
        ),
    );

    registry.insert(
        "chemistry",
        profile(
            "chemistry",
            vec![
                ("pdb", hint(3.0, EngineKind::ArchivalBundler, "protein structures")),
                ("xyz", hint(2.5, EngineKind::ArchivalBundler, "trajectory frames")),
            ],
            vec![EngineKind::ArchivalBundler, EngineKind::BulkParallel, EngineKind::MultiCloudSync],
            8,
            BundlingStrategy {
                enabled: true,
                min_file_count: 1_000,
                target_bundle_size: 128 * 1024 * 1024,
            },
            SecurityRequirements {
                encryption_required: false,
                checksum_required: true,
            },
        ),
    );

    registry.insert(
        "machine_learning",
        profile(
            "machine_learning",
            vec![
                ("safetensors", hint(1.0, EngineKind::BulkParallel, "model weights")),
                ("ckpt", hint(1.1, EngineKind::BulkParallel, "training checkpoints")),
                ("tfrecord", hint(1.0, EngineKind::BulkParallel, "packed training shards")),
            ],
            vec![EngineKind::BulkParallel, EngineKind::MultiCloudSync, EngineKind::ArchivalBundler],
            32,
            BundlingStrategy {
                enabled: false,
                ..BundlingStrategy::default()
            },
            SecurityRequirements {
                encryption_required: false,
                checksum_required: true,
            },
        ),
    );

    registry
});

/// Looks up a static profile by domain tag.
pub fn lookup(domain: &str) -> Option<&'static DomainProfile> {
    REGISTRY.get(domain.trim().to_ascii_lowercase().as_str())
}

/// Every registered domain tag.
pub fn known_domains() -> Vec<&'static str> {
    REGISTRY.keys().copied().collect()
}

/// Profile for a domain tag, synthesizing the generic profile for unknown
/// tags.
pub fn profile_for(domain: Option<&str>, small_file_fraction: f64) -> DomainProfile {
    domain
        .and_then(lookup)
        .cloned()
        .unwrap_or_else(|| DomainProfile::generic(platform::logical_cores(), small_file_fraction))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests known tags resolve and carry sensible policy.
    #[test]
    fn test_known_domains() {
        let genomics = lookup("genomics").unwrap();
        assert!(genomics.transfer.bundling.enabled);
        assert_eq!(genomics.transfer.preferred_engines[0], EngineKind::ArchivalBundler);
        assert!(genomics.security.encryption_required);

        let climate = lookup("CLIMATE").unwrap();
        assert!(!climate.transfer.bundling.enabled);
        assert_eq!(climate.transfer.preferred_engines[0], EngineKind::BulkParallel);

        assert!(known_domains().contains(&"astronomy"));
    }

    /// Tests unknown tags synthesize the generic profile with the
    /// documented defaults.
    #[test]
    fn test_generic_fallback() {
        let generic = profile_for(Some("numismatics"), 0.8);
        assert_eq!(generic.name, "generic");
        assert!(generic.transfer.bundling.enabled);
        assert!(generic.transfer.optimal_concurrency <= WorkerCount::DEFAULT_CAP);

        let no_tag = profile_for(None, 0.1);
        assert!(!no_tag.transfer.bundling.enabled);
    }

    /// Tests repeated lookups return identical data (immutability).
    #[test]
    fn test_registry_stable() {
        assert_eq!(lookup("genomics"), lookup("genomics"));
    }
}
