// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pattern Analyzer
//!
//! Walks a source tree and produces its [`DataPattern`]: file-type
//! histogram, cumulative small-file buckets, an approximate size median,
//! domain hints, and efficiency estimates.
//!
//! ## Algorithm
//!
//! Single pass, bounded concurrency: one walker thread feeds file paths
//! into a channel; `min(logical cores, 8)` workers stat files and fold
//! them into thread-local histograms that are merged at completion. The
//! walk is pure with respect to the filesystem snapshot it observes (no
//! writes).
//!
//! ## Failure model
//!
//! Unreadable entries are logged and skipped; the walk only fails when the
//! root itself is inaccessible or the analysis is cancelled. Cancellation
//! is observed between files on every worker, comfortably within the
//! 10-second visibility contract.

use crossbeam::channel;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use datamover_bootstrap::platform;
use datamover_bootstrap::shutdown::CancellationToken;
use datamover_domain::entities::data_pattern::{extension_key, DataPattern, FileTypeStats, SmallFileBuckets};
use datamover_domain::services::cost_model::StorageClass;
use datamover_domain::services::domain_detection;
use datamover_domain::{CostCalculator, MoverError, WorkerCount};

/// Region assumed for the pre-recommendation efficiency estimates.
const ESTIMATE_REGION: &str = "us-east-1";

/// Per-worker accumulation state.
struct LocalStats {
    types: HashMap<String, FileTypeStats>,
    buckets: SmallFileBuckets,
    /// log2 size histogram; slot i counts files with size in
    /// [2^i, 2^(i+1)).
    size_histogram: [u64; 64],
    total_files: u64,
    total_bytes: u64,
    skipped: u64,
}

impl Default for LocalStats {
    fn default() -> Self {
        LocalStats {
            types: HashMap::default(),
            buckets: SmallFileBuckets::default(),
            size_histogram: [0u64; 64],
            total_files: 0,
            total_bytes: 0,
            skipped: 0,
        }
    }
}

impl LocalStats {
    fn record(&mut self, name: &str, size: u64) {
        let entry = self.types.entry(extension_key(name)).or_default();
        entry.count += 1;
        entry.total_size += size;
        self.buckets.record(size);
        let slot = if size == 0 { 0 } else { 63 - size.leading_zeros() as usize };
        self.size_histogram[slot.min(63)] += 1;
        self.total_files += 1;
        self.total_bytes += size;
    }

    fn merge(&mut self, other: LocalStats) {
        for (ext, stats) in other.types {
            let entry = self.types.entry(ext).or_default();
            entry.count += stats.count;
            entry.total_size += stats.total_size;
        }
        self.buckets.merge(&other.buckets);
        for (slot, count) in other.size_histogram.iter().enumerate() {
            self.size_histogram[slot] += count;
        }
        self.total_files += other.total_files;
        self.total_bytes += other.total_bytes;
        self.skipped += other.skipped;
    }

    /// Approximate median from the log2 histogram: the midpoint of the
    /// bucket holding the middle file.
    fn approximate_median(&self) -> u64 {
        if self.total_files == 0 {
            return 0;
        }
        let middle = self.total_files.div_ceil(2);
        let mut seen = 0u64;
        for (slot, count) in self.size_histogram.iter().enumerate() {
            seen += count;
            if seen >= middle {
                let low = 1u64 << slot;
                return if slot == 0 { 1 } else { low + low / 2 };
            }
        }
        0
    }
}

/// The pattern analyzer.
pub struct PatternAnalyzer {
    workers: usize,
    calculator: CostCalculator,
}

impl PatternAnalyzer {
    /// Analyzer with the walk concurrency derived from the host
    /// (`min(cores, 8)`).
    pub fn new(calculator: CostCalculator) -> Self {
        Self {
            workers: WorkerCount::for_analysis(platform::logical_cores()).get(),
            calculator,
        }
    }

    /// Analyzer with an explicit worker count (tests pin this to 2).
    pub fn with_workers(calculator: CostCalculator, workers: usize) -> Self {
        Self {
            workers: workers.clamp(1, 8),
            calculator,
        }
    }

    /// Analyzes a source tree.
    ///
    /// # Errors
    ///
    /// - `MoverError::PathNotFound` / `PermissionDenied` when the root is
    ///   inaccessible
    /// - `MoverError::Cancelled` when the token fires mid-walk
    pub async fn analyze(
        &self,
        path: &Path,
        domain_hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<DataPattern, MoverError> {
        let root = path.to_path_buf();
        let workers = self.workers;
        let token = cancel.clone();
        let hint = domain_hint.map(str::to_string);
        let calculator = self.calculator.clone();

        tokio::task::spawn_blocking(move || Self::analyze_blocking(&calculator, &root, hint.as_deref(), workers, &token))
            .await
            .map_err(|e| MoverError::InternalError(format!("analysis task panicked: {}", e)))?
    }

    fn analyze_blocking(
        calculator: &CostCalculator,
        root: &PathBuf,
        hint: Option<&str>,
        workers: usize,
        cancel: &CancellationToken,
    ) -> Result<DataPattern, MoverError> {
        let started = Instant::now();

        let metadata = std::fs::metadata(root).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MoverError::PathNotFound(root.display().to_string()),
            std::io::ErrorKind::PermissionDenied => MoverError::PermissionDenied(root.display().to_string()),
            _ => MoverError::from(e),
        })?;
        if !metadata.is_dir() && !metadata.is_file() {
            return Err(MoverError::InvalidConfiguration(format!(
                "{} is neither a file nor a directory",
                root.display()
            )));
        }

        let (sender, receiver) = channel::bounded::<PathBuf>(4096);
        let merged = std::thread::scope(|scope| -> Result<LocalStats, MoverError> {
            let mut handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                let receiver = receiver.clone();
                let token = cancel.clone();
                handles.push(scope.spawn(move || -> Result<LocalStats, MoverError> {
                    let mut local = LocalStats::default();
                    for path in receiver.iter() {
                        if token.is_cancelled() {
                            return Err(MoverError::Cancelled);
                        }
                        match std::fs::symlink_metadata(&path) {
                            Ok(metadata) if metadata.is_file() => {
                                let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                                local.record(&name, metadata.len());
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::warn!("skipping unreadable file {}: {}", path.display(), e);
                                local.skipped += 1;
                            }
                        }
                    }
                    Ok(local)
                }));
            }
            drop(receiver);

            // Walker: feed file paths; directory read errors are logged
            // and skipped per the failure model.
            let mut walk_skipped = 0u64;
            for entry in walkdir::WalkDir::new(root).follow_links(false) {
                if cancel.is_cancelled() {
                    break;
                }
                match entry {
                    Ok(entry) if entry.file_type().is_file() => {
                        if sender.send(entry.into_path()).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("skipping unreadable entry under {}: {}", root.display(), e);
                        walk_skipped += 1;
                    }
                }
            }
            drop(sender);

            let mut merged = LocalStats::default();
            for handle in handles {
                let local = handle
                    .join()
                    .map_err(|_| MoverError::InternalError("analysis worker panicked".to_string()))??;
                merged.merge(local);
            }
            merged.skipped += walk_skipped;
            Ok(merged)
        })?;

        if cancel.is_cancelled() {
            return Err(MoverError::Cancelled);
        }

        let mut pattern = DataPattern::new(root.display().to_string());
        pattern.total_files = merged.total_files;
        pattern.total_size_bytes = merged.total_bytes;
        pattern.file_types = merged.types.iter().map(|(k, v)| (k.clone(), *v)).collect();
        pattern.file_sizes = merged.buckets;
        pattern.file_sizes.finalize(pattern.total_files);
        pattern.median_file_size_bytes = merged.approximate_median();
        pattern.analysis_time_ms = started.elapsed().as_millis() as u64;
        domain_detection::annotate(&mut pattern, hint);

        pattern.efficiency.estimated_put_requests = pattern.total_files;
        pattern.efficiency.estimated_bundles =
            pattern.estimated_bundles(datamover_domain::entities::data_pattern::DEFAULT_BUNDLE_TARGET);
        pattern.efficiency.bundling_cost_savings = calculator
            .bundling_savings(&pattern, ESTIMATE_REGION, StorageClass::Standard)
            .unwrap_or(0.0);
        pattern.efficiency.storage_class_savings = calculator
            .tiering_savings(&pattern, ESTIMATE_REGION, StorageClass::Standard)
            .unwrap_or(0.0);

        pattern.verify_invariants()?;
        if merged.skipped > 0 {
            tracing::warn!(
                "analysis of {} skipped {} unreadable entries",
                root.display(),
                merged.skipped
            );
        }
        Ok(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> PatternAnalyzer {
        PatternAnalyzer::with_workers(CostCalculator::with_default_rates(), 2)
    }

    fn build_tree(files: &[(&str, usize)]) -> tempfile::TempDir {
        let dir = tempfile::TempDir::new().unwrap();
        for (name, size) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, vec![0u8; *size]).unwrap();
        }
        dir
    }

    /// Tests histogram accounting and the pattern invariants on a mixed
    /// tree.
    #[tokio::test]
    async fn test_analyze_mixed_tree() {
        let dir = build_tree(&[
            ("reads/sample1.fastq", 4096),
            ("reads/sample2.fastq", 4096),
            ("reads/sample2.FASTQ", 512),
            ("meta/run.json", 100),
            ("README", 10),
        ]);

        let pattern = analyzer()
            .analyze(dir.path(), None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(pattern.total_files, 5);
        assert_eq!(pattern.total_size_bytes, 4096 + 4096 + 512 + 100 + 10);
        // Case-folded extension accounting.
        assert_eq!(pattern.file_types["fastq"].count, 3);
        assert_eq!(pattern.file_types["json"].count, 1);
        assert_eq!(pattern.file_types[""].count, 1);
        pattern.verify_invariants().unwrap();
        assert!(pattern.file_sizes.is_cumulative());
        assert_eq!(pattern.file_sizes.under_1_mib, 5);
    }

    /// Tests domain detection flows through analysis (S1: a fastq tree is
    /// genomics).
    #[tokio::test]
    async fn test_domain_detection_through_analysis() {
        let files: Vec<(String, usize)> = (0..40).map(|i| (format!("reads/r{}.fastq", i), 1024)).collect();
        let refs: Vec<(&str, usize)> = files.iter().map(|(n, s)| (n.as_str(), *s)).collect();
        let dir = build_tree(&refs);

        let pattern = analyzer()
            .analyze(dir.path(), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(pattern.domain_hints.primary(), Some("genomics"));
        assert!(pattern.domain_hints.confidence["genomics"] >= 0.8);
        assert!(pattern.efficiency.bundling_cost_savings >= 0.0);
        assert_eq!(pattern.efficiency.estimated_put_requests, 40);
    }

    /// Tests the missing-root and cancelled error paths.
    #[tokio::test]
    async fn test_error_paths() {
        let missing = analyzer()
            .analyze(Path::new("/nonexistent/tree"), None, &CancellationToken::new())
            .await;
        assert!(matches!(missing, Err(MoverError::PathNotFound(_))));

        let dir = build_tree(&[("a.dat", 10)]);
        let cancelled_token = CancellationToken::new();
        cancelled_token.cancel();
        let cancelled = analyzer().analyze(dir.path(), None, &cancelled_token).await;
        assert!(matches!(cancelled, Err(MoverError::Cancelled)));
    }

    /// Tests the fingerprint is stable across repeated analyses of an
    /// unchanged tree (idempotency key).
    #[tokio::test]
    async fn test_fingerprint_idempotent() {
        let dir = build_tree(&[("a.vcf", 100), ("b.vcf", 200)]);
        let token = CancellationToken::new();

        let first = analyzer().analyze(dir.path(), None, &token).await.unwrap();
        let second = analyzer().analyze(dir.path(), None, &token).await.unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    /// Tests the median approximation lands in the right bucket.
    #[tokio::test]
    async fn test_median_approximation() {
        let dir = build_tree(&[("a.dat", 1000), ("b.dat", 1100), ("c.dat", 900), ("d.dat", 100_000)]);
        let pattern = analyzer()
            .analyze(dir.path(), None, &CancellationToken::new())
            .await
            .unwrap();
        // Middle of the distribution sits near 1 KiB; the log2 bucket
        // midpoint must land within a factor of two.
        assert!(pattern.median_file_size_bytes >= 512);
        assert!(pattern.median_file_size_bytes <= 2048);
    }
}
