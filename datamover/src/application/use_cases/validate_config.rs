// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Validate-Config Use Case
//!
//! Loads a project configuration file and runs the domain validation
//! rules over it. Parse failures are errors; semantic problems come back
//! inside the [`ValidationReport`] so the CLI can show all of them at
//! once.

use std::path::Path;

use datamover_domain::{MoverError, ProjectConfiguration, ValidationReport};

use crate::infrastructure::config::loader;

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub config: ProjectConfiguration,
    pub report: ValidationReport,
}

/// Loads and validates a configuration file.
pub fn run(path: &Path) -> Result<ValidationOutcome, MoverError> {
    let config = loader::load_project(path)?;
    let report = config.validate();
    Ok(ValidationOutcome { config, report })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests a valid file yields a clean report and a parse failure is an
    /// error, not a report entry.
    #[test]
    fn test_validate_flow() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("good.yaml");
        std::fs::write(
            &good,
            r#"
project:
  name: lab
data_profiles:
  data:
    path: /data
destinations:
  archive:
    uri: s3://bucket/data
    region: us-east-1
workflows:
  - name: up
    source: data
    destination: archive
"#,
        )
        .unwrap();
        let outcome = run(&good).unwrap();
        assert!(outcome.report.is_valid());

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "workflows: {not: [valid").unwrap();
        assert!(matches!(run(&bad), Err(MoverError::ParseError(_))));
    }

    /// Tests semantic problems land in the report.
    #[test]
    fn test_semantic_errors_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dangling.yaml");
        std::fs::write(
            &path,
            r#"
project:
  name: lab
workflows:
  - name: up
    source: ghost-profile
    destination: ghost-destination
"#,
        )
        .unwrap();
        let outcome = run(&path).unwrap();
        assert!(!outcome.report.is_valid());
        assert_eq!(outcome.report.errors.len(), 2);
    }
}
