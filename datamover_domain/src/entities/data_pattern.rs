// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Data Pattern
//!
//! Structural summary of a source tree produced by the pattern analyzer and
//! consumed by the cost calculator, the recommendation engine, and engine
//! auto-selection.
//!
//! ## Invariants
//!
//! - `Σ file_types[*].count == total_files`
//! - `Σ file_types[*].total_size == total_size_bytes`
//! - Small-file bucket counts are cumulative:
//!   `under_1_kib <= under_10_kib <= under_100_kib <= under_1_mib`
//!
//! [`DataPattern::verify_invariants`] checks these after a merge of
//! per-worker histograms; a violation there means an accounting bug in the
//! analyzer, not bad user input.
//!
//! ## Fingerprint
//!
//! [`DataPattern::fingerprint`] is a SHA-256 over (absolute path, sorted
//! file-type table, total size, total file count). It serves as an
//! idempotency key: two analyses of an unchanged tree produce the same
//! fingerprint, so cached recommendations and cost scenarios can be reused.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

use crate::MoverError;

/// Threshold under which a file counts as "small" (1 MiB).
pub const SMALL_FILE_THRESHOLD: u64 = 1024 * 1024;

/// Default bundle target used for the bundle estimate (256 MiB).
pub const DEFAULT_BUNDLE_TARGET: u64 = 256 * 1024 * 1024;

/// Per-extension aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTypeStats {
    pub count: u64,
    pub total_size: u64,
}

/// Cumulative small-file histogram.
///
/// Buckets are cumulative by construction: a 500-byte file increments all
/// four counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SmallFileBuckets {
    pub under_1_kib: u64,
    pub under_10_kib: u64,
    pub under_100_kib: u64,
    pub under_1_mib: u64,
    /// Total bytes held in files at or under 1 MiB.
    pub small_file_bytes: u64,
    /// Share of all files that are at or under 1 MiB, in [0, 100].
    pub small_file_percentage: f64,
}

impl SmallFileBuckets {
    /// Folds one file size into the cumulative buckets.
    pub fn record(&mut self, size: u64) {
        if size <= 1024 {
            self.under_1_kib += 1;
        }
        if size <= 10 * 1024 {
            self.under_10_kib += 1;
        }
        if size <= 100 * 1024 {
            self.under_100_kib += 1;
        }
        if size <= SMALL_FILE_THRESHOLD {
            self.under_1_mib += 1;
            self.small_file_bytes += size;
        }
    }

    /// Merges another worker's buckets into this one.
    pub fn merge(&mut self, other: &SmallFileBuckets) {
        self.under_1_kib += other.under_1_kib;
        self.under_10_kib += other.under_10_kib;
        self.under_100_kib += other.under_100_kib;
        self.under_1_mib += other.under_1_mib;
        self.small_file_bytes += other.small_file_bytes;
    }

    /// Recomputes the percentage once the total file count is known.
    pub fn finalize(&mut self, total_files: u64) {
        self.small_file_percentage = if total_files == 0 {
            0.0
        } else {
            (self.under_1_mib as f64 / total_files as f64) * 100.0
        };
    }

    pub fn is_cumulative(&self) -> bool {
        self.under_1_kib <= self.under_10_kib
            && self.under_10_kib <= self.under_100_kib
            && self.under_100_kib <= self.under_1_mib
    }
}

/// Research-domain detection result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainHints {
    /// Domains with confidence >= 0.5 (or explicitly hinted), ordered by
    /// confidence descending then name.
    pub detected_domains: Vec<String>,
    /// Confidence per domain in [0, 1], monotone in evidence strength.
    pub confidence: HashMap<String, f64>,
}

impl DomainHints {
    /// Best detected domain, if any.
    pub fn primary(&self) -> Option<&str> {
        self.detected_domains.first().map(String::as_str)
    }
}

/// Request/bundle efficiency estimates derived from the histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EfficiencySummary {
    /// PUT requests a naive per-file upload would issue.
    pub estimated_put_requests: u64,
    /// Bundles a small-file pass would produce at the default target size.
    pub estimated_bundles: u64,
    /// Monthly savings of the bundled scenario over the naive one (USD).
    pub bundling_cost_savings: f64,
    /// Monthly savings of lifecycle tiering (USD).
    pub storage_class_savings: f64,
}

/// Structural summary of a source tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPattern {
    /// Absolute path that was analyzed.
    pub source_path: String,
    pub total_files: u64,
    pub total_size_bytes: u64,
    /// Wall-clock duration of the walk, in milliseconds.
    pub analysis_time_ms: u64,
    /// Extension (lower-cased, dotless; empty string for none) -> aggregate.
    pub file_types: BTreeMap<String, FileTypeStats>,
    pub file_sizes: SmallFileBuckets,
    /// Approximate median file size derived from a log2 histogram.
    pub median_file_size_bytes: u64,
    pub domain_hints: DomainHints,
    pub efficiency: EfficiencySummary,
}

impl DataPattern {
    /// Creates an empty pattern for the given root.
    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            total_files: 0,
            total_size_bytes: 0,
            analysis_time_ms: 0,
            file_types: BTreeMap::new(),
            file_sizes: SmallFileBuckets::default(),
            median_file_size_bytes: 0,
            domain_hints: DomainHints::default(),
            efficiency: EfficiencySummary::default(),
        }
    }

    /// Share of files at or under 1 MiB, in [0, 1].
    pub fn small_file_fraction(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.file_sizes.under_1_mib as f64 / self.total_files as f64
        }
    }

    /// Count of files strictly larger than the small-file threshold.
    pub fn large_file_count(&self) -> u64 {
        self.total_files.saturating_sub(self.file_sizes.under_1_mib)
    }

    /// Bytes held in files larger than the small-file threshold.
    pub fn large_file_bytes(&self) -> u64 {
        self.total_size_bytes.saturating_sub(self.file_sizes.small_file_bytes)
    }

    /// Bundles a small-file pass would produce for the given target size.
    pub fn estimated_bundles(&self, target_bundle_size: u64) -> u64 {
        if self.file_sizes.small_file_bytes == 0 || target_bundle_size == 0 {
            return 0;
        }
        self.file_sizes.small_file_bytes.div_ceil(target_bundle_size)
    }

    /// Stable fingerprint of (path, sorted type table, totals).
    ///
    /// `file_types` is a `BTreeMap`, so iteration order is already the
    /// sorted order the fingerprint requires.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source_path.as_bytes());
        hasher.update(b"\0");
        for (ext, stats) in &self.file_types {
            hasher.update(ext.as_bytes());
            hasher.update(stats.count.to_be_bytes());
            hasher.update(stats.total_size.to_be_bytes());
        }
        hasher.update(self.total_size_bytes.to_be_bytes());
        hasher.update(self.total_files.to_be_bytes());
        hex::encode(hasher.finalize())
    }

    /// Checks the accounting invariants after a histogram merge.
    pub fn verify_invariants(&self) -> Result<(), MoverError> {
        let count_sum: u64 = self.file_types.values().map(|s| s.count).sum();
        if count_sum != self.total_files {
            return Err(MoverError::InternalError(format!(
                "file type counts sum to {} but total_files is {}",
                count_sum, self.total_files
            )));
        }
        let size_sum: u64 = self.file_types.values().map(|s| s.total_size).sum();
        if size_sum != self.total_size_bytes {
            return Err(MoverError::InternalError(format!(
                "file type sizes sum to {} but total_size_bytes is {}",
                size_sum, self.total_size_bytes
            )));
        }
        if !self.file_sizes.is_cumulative() {
            return Err(MoverError::InternalError(
                "small-file buckets are not cumulative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Normalizes a file name into the extension key used by `file_types`:
/// lower-cased, without the dot, empty string when there is none.
pub fn extension_key(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}
