// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The analyze -> generate-config -> validate pipeline: a configuration
//! generated from a real tree must serialize, reload, and validate
//! cleanly.

use datamover_bootstrap::shutdown::CancellationToken;
use datamover_domain::CostCalculator;

use datamover::application::use_cases::generate_config::{self, ConfigTemplate};
use datamover::application::use_cases::validate_config;
use datamover::infrastructure::analysis::PatternAnalyzer;
use datamover::infrastructure::config::{load_project, render_project};

use crate::common::build_tree;

/// generate-config(analyze(P)) is well-formed and `validate` passes, for
/// every template and both file formats.
#[tokio::test]
async fn generated_config_round_trips_and_validates() {
    let source = tempfile::TempDir::new().unwrap();
    build_tree(source.path(), 300, 4 * 1024, "fastq");

    let analyzer = PatternAnalyzer::with_workers(CostCalculator::with_default_rates(), 2);
    let pattern = analyzer
        .analyze(source.path(), None, &CancellationToken::new())
        .await
        .unwrap();

    let out_dir = tempfile::TempDir::new().unwrap();
    for template in [ConfigTemplate::Minimal, ConfigTemplate::Optimized, ConfigTemplate::Comprehensive] {
        let config = generate_config::run(&pattern, template, &[]).unwrap();

        for file_name in ["project.yaml", "project.toml"] {
            let path = out_dir.path().join(file_name);
            let rendered = render_project(&config, &path).unwrap();
            std::fs::write(&path, rendered).unwrap();

            let reloaded = load_project(&path).unwrap();
            assert_eq!(reloaded, config);

            let outcome = validate_config::run(&path).unwrap();
            assert!(
                outcome.report.is_valid(),
                "{:?}/{}: {:?}",
                template,
                file_name,
                outcome.report.errors
            );
        }
    }
}

/// The generated profile reflects the analyzed tree (path, counts,
/// detected domain).
#[tokio::test]
async fn generated_config_reflects_pattern() {
    let source = tempfile::TempDir::new().unwrap();
    build_tree(source.path(), 120, 2 * 1024, "fastq");

    let analyzer = PatternAnalyzer::with_workers(CostCalculator::with_default_rates(), 2);
    let pattern = analyzer
        .analyze(source.path(), None, &CancellationToken::new())
        .await
        .unwrap();
    let config = generate_config::run(&pattern, ConfigTemplate::Optimized, &[]).unwrap();

    let profile = &config.data_profiles["primary-data"];
    assert_eq!(profile.path, source.path().display().to_string());
    assert_eq!(profile.expected_file_count, Some(120));
    assert!(profile.file_kinds.contains(&"fastq".to_string()));
    assert_eq!(config.project.domain.as_deref(), Some("genomics"));
}
