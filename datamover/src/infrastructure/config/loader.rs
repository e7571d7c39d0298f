// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration Loader
//!
//! Reads a project configuration file into the domain model. The format is
//! chosen by extension: `.yaml`/`.yml` parse as YAML, `.toml` as TOML,
//! `.json` as JSON. Parse failures carry the underlying parser's position
//! information so users can find the offending line.

use std::path::Path;

use datamover_domain::{MoverError, ProjectConfiguration};

/// Loads and parses a project configuration file.
///
/// # Errors
///
/// - `MoverError::PathNotFound` when the file does not exist
/// - `MoverError::ParseError` for malformed content or an unknown
///   extension
pub fn load_project(path: &Path) -> Result<ProjectConfiguration, MoverError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MoverError::PathNotFound(path.display().to_string()),
        std::io::ErrorKind::PermissionDenied => MoverError::PermissionDenied(path.display().to_string()),
        _ => MoverError::from(e),
    })?;
    parse_project(&content, extension_of(path))
        .map_err(|e| MoverError::ParseError(format!("{}: {}", path.display(), e)))
}

/// Serializes a configuration in the format matching `path`'s extension.
pub fn render_project(config: &ProjectConfiguration, path: &Path) -> Result<String, MoverError> {
    match extension_of(path) {
        "toml" => toml::to_string_pretty(config).map_err(|e| MoverError::SerializationError(e.to_string())),
        "json" => serde_json::to_string_pretty(config).map_err(|e| MoverError::SerializationError(e.to_string())),
        _ => serde_yaml::to_string(config).map_err(|e| MoverError::SerializationError(e.to_string())),
    }
}

fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("yaml")
}

fn parse_project(content: &str, extension: &str) -> Result<ProjectConfiguration, String> {
    match extension.to_ascii_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        "toml" => toml::from_str(content).map_err(|e| e.to_string()),
        "json" => serde_json::from_str(content).map_err(|e| e.to_string()),
        other => Err(format!(
            "unsupported configuration extension '{}' (expected yaml, toml, or json)",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_YAML: &str = r#"
project:
  name: sequencing-archive
  owner: lab
  domain: genomics
data_profiles:
  raw-reads:
    path: /data/reads
destinations:
  archive:
    uri: s3://lab-archive/reads
    region: us-east-1
workflows:
  - name: nightly-upload
    source: raw-reads
    destination: archive
    engine: auto
"#;

    /// Tests YAML parsing with serde defaults filling the omitted
    /// sections.
    #[test]
    fn test_load_yaml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("project.yaml");
        std::fs::write(&path, MINIMAL_YAML).unwrap();

        let config = load_project(&path).unwrap();
        assert_eq!(config.project.name, "sequencing-archive");
        assert_eq!(config.workflows.len(), 1);
        assert!(config.workflows[0].enabled, "enabled defaults to true");
        assert_eq!(config.settings.max_concurrent_workflows, 3);
        assert!(config.validate().is_valid());
    }

    /// Tests the round trip through render + load for YAML and TOML.
    #[test]
    fn test_render_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let yaml_path = dir.path().join("project.yaml");
        std::fs::write(&yaml_path, MINIMAL_YAML).unwrap();
        let config = load_project(&yaml_path).unwrap();

        for name in ["copy.yaml", "copy.toml", "copy.json"] {
            let path = dir.path().join(name);
            let rendered = render_project(&config, &path).unwrap();
            std::fs::write(&path, rendered).unwrap();
            let reloaded = load_project(&path).unwrap();
            assert_eq!(reloaded, config, "round trip failed for {}", name);
        }
    }

    /// Tests the error kinds for missing files and malformed content.
    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            load_project(Path::new("/nonexistent/project.yaml")),
            Err(MoverError::PathNotFound(_))
        ));

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "project: [unclosed").unwrap();
        assert!(matches!(load_project(&path), Err(MoverError::ParseError(_))));
    }
}
