// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Auto-Selection
//!
//! Pure, deterministic ranking of transfer engines for `engine = auto`
//! workflows. The infrastructure selector gathers the availability set and
//! capabilities, then delegates the ranking decision here so the rule stays
//! testable without subprocesses.
//!
//! ## Ranking rule
//!
//! 1. Engines that do not support both endpoint schemes are excluded.
//! 2. Domain-profile preference order contributes a base score.
//! 3. The dominant file-size class contributes a decisive bonus: median
//!    under 1 MiB prefers the archival bundler, median over 100 MiB prefers
//!    the bulk-parallel CLI, and a remote-to-remote pair prefers the
//!    multi-cloud sync engine.
//! 4. Ties break on declared capability count, then on engine kind order,
//!    so identical inputs always produce the identical choice.

use crate::entities::data_pattern::DataPattern;
use crate::entities::domain_profile::DomainProfile;
use crate::services::transfer_engine::{EngineCapabilities, EngineKind};
use crate::value_objects::UriScheme;

/// Median size below which a tree counts as small-object dominated (1 MiB).
const SMALL_MEDIAN: u64 = 1024 * 1024;

/// Median size above which a tree counts as large-object dominated
/// (100 MiB).
const LARGE_MEDIAN: u64 = 100 * 1024 * 1024;

/// Base score for the n-th profile preference.
const PREFERENCE_STEP: i64 = 10;

/// Bonus for matching the dominant size class or endpoint topology.
const SIZE_CLASS_BONUS: i64 = 25;

/// One candidate engine as seen by the ranking rule.
#[derive(Debug, Clone)]
pub struct EngineCandidate {
    pub kind: EngineKind,
    pub capabilities: EngineCapabilities,
    pub available: bool,
}

/// Ranks candidates for a transfer; the first entry is the choice.
///
/// Returns an empty vector when no candidate supports both schemes and is
/// available.
pub fn rank_engines(
    pattern: Option<&DataPattern>,
    profile: &DomainProfile,
    source_scheme: UriScheme,
    destination_scheme: UriScheme,
    candidates: &[EngineCandidate],
) -> Vec<EngineKind> {
    let mut scored: Vec<(i64, usize, EngineKind)> = candidates
        .iter()
        .filter(|c| c.available)
        .filter(|c| {
            c.capabilities.supports_scheme(source_scheme) && c.capabilities.supports_scheme(destination_scheme)
        })
        .map(|c| {
            let mut score = 0i64;

            if let Some(position) = profile.transfer.preferred_engines.iter().position(|&k| k == c.kind) {
                let rank = profile.transfer.preferred_engines.len() - position;
                score += rank as i64 * PREFERENCE_STEP;
            }

            if let Some(pattern) = pattern {
                let median = pattern.median_file_size_bytes;
                if pattern.total_files > 0 {
                    if median < SMALL_MEDIAN && c.kind == EngineKind::ArchivalBundler {
                        score += SIZE_CLASS_BONUS;
                    }
                    if median > LARGE_MEDIAN && c.kind == EngineKind::BulkParallel {
                        score += SIZE_CLASS_BONUS;
                    }
                }
            }

            if source_scheme == UriScheme::S3 && destination_scheme == UriScheme::S3 && c.kind == EngineKind::MultiCloudSync {
                score += SIZE_CLASS_BONUS;
            }

            (score, c.capabilities.feature_count(), c.kind)
        })
        .collect();

    // Score desc, capability count desc, kind order for full determinism.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
    scored.into_iter().map(|(_, _, kind)| kind).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(kind: EngineKind, features: usize, available: bool) -> EngineCandidate {
        EngineCandidate {
            kind,
            capabilities: EngineCapabilities {
                schemes: vec![UriScheme::File, UriScheme::S3],
                multipart: features > 0,
                checksum: features > 1,
                resume: features > 2,
                bandwidth_limit: features > 3,
            },
            available,
        }
    }

    fn all_candidates() -> Vec<EngineCandidate> {
        vec![
            candidate(EngineKind::BulkParallel, 2, true),
            candidate(EngineKind::MultiCloudSync, 4, true),
            candidate(EngineKind::ArchivalBundler, 2, true),
        ]
    }

    fn pattern_with_median(median: u64) -> DataPattern {
        let mut pattern = DataPattern::new("/data");
        pattern.total_files = 100;
        pattern.total_size_bytes = median * 100;
        pattern.median_file_size_bytes = median;
        pattern
    }

    /// Tests the small-median rule: a tiny-object tree picks the bundler
    /// even when the profile prefers the bulk-parallel CLI.
    #[test]
    fn test_small_median_prefers_bundler() {
        let profile = DomainProfile::generic(8, 0.9);
        let pattern = pattern_with_median(4 * 1024);
        let ranked = rank_engines(
            Some(&pattern),
            &profile,
            UriScheme::File,
            UriScheme::S3,
            &all_candidates(),
        );
        assert_eq!(ranked[0], EngineKind::ArchivalBundler);
    }

    /// Tests the large-median rule (S2: a 10 GiB object picks the
    /// bulk-parallel CLI, not the bundler).
    #[test]
    fn test_large_median_prefers_bulk_parallel() {
        let profile = DomainProfile::generic(8, 0.0);
        let pattern = pattern_with_median(10 * 1024 * 1024 * 1024);
        let ranked = rank_engines(
            Some(&pattern),
            &profile,
            UriScheme::File,
            UriScheme::S3,
            &all_candidates(),
        );
        assert_eq!(ranked[0], EngineKind::BulkParallel);
    }

    /// Tests remote-to-remote topology prefers the multi-cloud sync
    /// engine.
    #[test]
    fn test_remote_pair_prefers_sync() {
        let profile = DomainProfile::generic(8, 0.0);
        let pattern = pattern_with_median(10 * 1024 * 1024);
        let ranked = rank_engines(Some(&pattern), &profile, UriScheme::S3, UriScheme::S3, &all_candidates());
        assert_eq!(ranked[0], EngineKind::MultiCloudSync);
    }

    /// Tests unavailable engines and scheme mismatches are excluded.
    #[test]
    fn test_availability_and_scheme_filters() {
        let profile = DomainProfile::generic(8, 0.0);
        let mut candidates = all_candidates();
        candidates[0].available = false;
        candidates[2].capabilities.schemes = vec![UriScheme::File];

        let ranked = rank_engines(None, &profile, UriScheme::File, UriScheme::S3, &candidates);
        assert_eq!(ranked, vec![EngineKind::MultiCloudSync]);
    }

    /// Tests determinism: identical inputs produce identical rankings.
    #[test]
    fn test_deterministic() {
        let profile = DomainProfile::generic(8, 0.6);
        let pattern = pattern_with_median(512);
        let first = rank_engines(
            Some(&pattern),
            &profile,
            UriScheme::File,
            UriScheme::S3,
            &all_candidates(),
        );
        for _ in 0..10 {
            let again = rank_engines(
                Some(&pattern),
                &profile,
                UriScheme::File,
                UriScheme::S3,
                &all_candidates(),
            );
            assert_eq!(first, again);
        }
    }
}
