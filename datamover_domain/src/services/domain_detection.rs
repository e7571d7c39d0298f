// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Detection
//!
//! Rule-based, open-set research-domain detection over an extension
//! histogram. Each known domain carries a set of signature extensions; the
//! observed fraction of signature files is compared against a threshold τ
//! (default 0.15) to produce a confidence:
//!
//! ```text
//! confidence = min(1, observed_fraction / τ)
//! ```
//!
//! A domain is emitted when its confidence reaches 0.5, or when the caller
//! explicitly hinted it (in which case confidence is clamped to at least
//! 0.8). Multiple domains can co-occur; the result is ordered by confidence
//! descending, ties broken lexicographically, so detection is deterministic.

use std::collections::BTreeMap;

use crate::entities::data_pattern::{DataPattern, DomainHints, FileTypeStats};

/// Signature extensions for one research domain.
#[derive(Debug, Clone, Copy)]
pub struct DomainSignature {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

/// Known domain signatures. Extensions are dotless and lower-case, matching
/// the normalization applied by the pattern analyzer.
pub const DOMAIN_SIGNATURES: &[DomainSignature] = &[
    DomainSignature {
        name: "genomics",
        extensions: &["fastq", "fq", "bam", "sam", "cram", "vcf", "bcf", "fasta", "fa", "bai", "gff", "bed"],
    },
    DomainSignature {
        name: "climate",
        extensions: &["nc", "nc4", "grib", "grb", "grb2", "hdf", "h5", "zarr"],
    },
    DomainSignature {
        name: "astronomy",
        extensions: &["fits", "fit", "fts"],
    },
    DomainSignature {
        name: "geospatial",
        extensions: &["las", "laz", "tif", "tiff", "shp", "gpkg", "geojson", "kml"],
    },
    DomainSignature {
        name: "chemistry",
        extensions: &["pdb", "mol2", "xyz", "sdf", "cif", "mol"],
    },
    DomainSignature {
        name: "machine_learning",
        extensions: &["ckpt", "pth", "pt", "safetensors", "onnx", "npz", "npy", "tfrecord"],
    },
];

/// Default extension-fraction threshold τ.
pub const DEFAULT_FRACTION_THRESHOLD: f64 = 0.15;

/// Minimum confidence for a domain to be emitted without a hint.
pub const EMIT_THRESHOLD: f64 = 0.5;

/// Confidence floor applied to explicitly hinted domains.
pub const HINT_FLOOR: f64 = 0.8;

/// Detects research domains from an extension histogram.
///
/// `hint` is the caller-supplied domain tag, if any; it is always emitted
/// with confidence of at least [`HINT_FLOOR`].
pub fn detect(
    file_types: &BTreeMap<String, FileTypeStats>,
    total_files: u64,
    hint: Option<&str>,
) -> DomainHints {
    detect_with_threshold(file_types, total_files, hint, DEFAULT_FRACTION_THRESHOLD)
}

/// Detection with an explicit threshold, for callers that tune τ.
pub fn detect_with_threshold(
    file_types: &BTreeMap<String, FileTypeStats>,
    total_files: u64,
    hint: Option<&str>,
    threshold: f64,
) -> DomainHints {
    let mut hints = DomainHints::default();
    let threshold = threshold.max(f64::EPSILON);

    for signature in DOMAIN_SIGNATURES {
        let matching: u64 = signature
            .extensions
            .iter()
            .filter_map(|ext| file_types.get(*ext))
            .map(|stats| stats.count)
            .sum();
        if total_files == 0 || matching == 0 {
            continue;
        }
        let fraction = matching as f64 / total_files as f64;
        let confidence = (fraction / threshold).min(1.0);
        hints.confidence.insert(signature.name.to_string(), confidence);
    }

    if let Some(hinted) = hint {
        let hinted = hinted.trim().to_ascii_lowercase();
        if !hinted.is_empty() {
            let entry = hints.confidence.entry(hinted).or_insert(0.0);
            if *entry < HINT_FLOOR {
                *entry = HINT_FLOOR;
            }
        }
    }

    let mut emitted: Vec<(String, f64)> = hints
        .confidence
        .iter()
        .filter(|(_, &c)| c >= EMIT_THRESHOLD)
        .map(|(name, &c)| (name.clone(), c))
        .collect();
    // Confidence descending, then lexicographic for determinism.
    emitted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    hints.detected_domains = emitted.into_iter().map(|(name, _)| name).collect();
    hints
}

/// Convenience wrapper folding detection into an existing pattern.
pub fn annotate(pattern: &mut DataPattern, hint: Option<&str>) {
    pattern.domain_hints = detect(&pattern.file_types, pattern.total_files, hint);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(entries: &[(&str, u64)]) -> BTreeMap<String, FileTypeStats> {
        entries
            .iter()
            .map(|(ext, count)| {
                (
                    ext.to_string(),
                    FileTypeStats {
                        count: *count,
                        total_size: *count * 1024,
                    },
                )
            })
            .collect()
    }

    /// Tests a pure genomics tree saturates confidence at 1.0 (S1 expects
    /// >= 0.8).
    #[test]
    fn test_pure_genomics_tree() {
        let types = histogram(&[("fastq", 10_000)]);
        let hints = detect(&types, 10_000, None);
        assert_eq!(hints.primary(), Some("genomics"));
        assert!((hints.confidence["genomics"] - 1.0).abs() < 1e-9);
    }

    /// Tests the fraction/τ confidence curve and the 0.5 emit cutoff.
    #[test]
    fn test_confidence_curve() {
        // 9% signature files: confidence 0.09 / 0.15 = 0.6 -> emitted.
        let types = histogram(&[("nc", 9), ("txt", 91)]);
        let hints = detect(&types, 100, None);
        assert!(hints.detected_domains.contains(&"climate".to_string()));
        assert!((hints.confidence["climate"] - 0.6).abs() < 1e-9);

        // 6% signature files: confidence 0.4 -> tracked but not emitted.
        let types = histogram(&[("nc", 6), ("txt", 94)]);
        let hints = detect(&types, 100, None);
        assert!(!hints.detected_domains.contains(&"climate".to_string()));
        assert!(hints.confidence.contains_key("climate"));
    }

    /// Tests confidence is monotone in evidence strength.
    #[test]
    fn test_confidence_monotone_in_evidence() {
        let mut last = 0.0;
        for signature_count in [1u64, 5, 10, 20, 40] {
            let types = histogram(&[("fits", signature_count), ("log", 100 - signature_count)]);
            let hints = detect(&types, 100, None);
            let confidence = hints.confidence.get("astronomy").copied().unwrap_or(0.0);
            assert!(confidence >= last);
            last = confidence;
        }
    }

    /// Tests caller hints are clamped to at least 0.8 even with no
    /// signature evidence.
    #[test]
    fn test_hint_floor() {
        let types = histogram(&[("dat", 50)]);
        let hints = detect(&types, 50, Some("genomics"));
        assert!(hints.detected_domains.contains(&"genomics".to_string()));
        assert!(hints.confidence["genomics"] >= HINT_FLOOR);

        // A hint never lowers an earned confidence.
        let types = histogram(&[("fastq", 50)]);
        let hints = detect(&types, 50, Some("genomics"));
        assert!((hints.confidence["genomics"] - 1.0).abs() < 1e-9);
    }

    /// Tests co-occurring domains order by confidence then name.
    #[test]
    fn test_deterministic_ordering() {
        let types = histogram(&[("fastq", 30), ("nc", 30), ("log", 40)]);
        let hints = detect(&types, 100, None);
        // Both saturate at 1.0; ties break lexicographically.
        assert_eq!(hints.detected_domains, vec!["climate".to_string(), "genomics".to_string()]);
    }

    /// Tests the empty-tree edge case.
    #[test]
    fn test_empty_tree() {
        let hints = detect(&BTreeMap::new(), 0, None);
        assert!(hints.detected_domains.is_empty());

        let hinted = detect(&BTreeMap::new(), 0, Some("climate"));
        assert_eq!(hinted.primary(), Some("climate"));
    }
}
