// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Project Configuration
//!
//! The externally supplied, declarative plan the datamover executes: data
//! profiles (what to move), destinations (where to), workflows (how), and
//! optimization flags. The configuration is owned by its loader and immutable
//! from the core's viewpoint; a running execution works from a snapshot so
//! concurrent edits cannot affect it.
//!
//! ## Validation
//!
//! [`ProjectConfiguration::validate`] produces a [`ValidationReport`] with
//! errors (config is unusable), warnings (config is usable but suspicious),
//! and suggestions (config could be improved). Validation never touches the
//! filesystem; existence checks happen at execution time where they can be
//! classified and retried properly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use crate::services::transfer_engine::EngineKind;
use crate::value_objects::RemoteUri;
use crate::MoverError;

/// Pattern for profile, destination, and workflow names.
fn name_pattern() -> &'static regex::Regex {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").unwrap())
}

/// Project-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub name: String,
    #[serde(default)]
    pub owner: String,
    /// Free-form research-domain tag ("genomics", "climate", ...).
    #[serde(default)]
    pub domain: Option<String>,
    /// Advisory monthly budget ceiling in USD.
    #[serde(default)]
    pub budget: Option<f64>,
}

/// A named local data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProfile {
    /// Absolute source path.
    pub path: String,
    #[serde(default)]
    pub expected_size_bytes: Option<u64>,
    #[serde(default)]
    pub expected_file_count: Option<u64>,
    /// Declared file kinds (extensions), used as analysis hints.
    #[serde(default)]
    pub file_kinds: Vec<String>,
}

/// A named transfer destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// `scheme://authority/prefix` form; see [`RemoteUri`].
    pub uri: String,
    #[serde(default)]
    pub storage_class: Option<String>,
    #[serde(default)]
    pub encryption: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Engine selection for a workflow: automatic or pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EngineChoice {
    Auto,
    Fixed(EngineKind),
}

impl Default for EngineChoice {
    fn default() -> Self {
        EngineChoice::Auto
    }
}

impl TryFrom<String> for EngineChoice {
    type Error = MoverError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("auto") {
            Ok(EngineChoice::Auto)
        } else {
            Ok(EngineChoice::Fixed(EngineKind::from_str(&value)?))
        }
    }
}

impl From<EngineChoice> for String {
    fn from(choice: EngineChoice) -> Self {
        match choice {
            EngineChoice::Auto => "auto".to_string(),
            EngineChoice::Fixed(kind) => kind.as_str().to_string(),
        }
    }
}

/// Kind of a processing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Analyze,
    Transfer,
    Bundle,
    Compress,
    Validate,
    Verify,
    Cleanup,
    Report,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Analyze => "analyze",
            StepKind::Transfer => "transfer",
            StepKind::Bundle => "bundle",
            StepKind::Compress => "compress",
            StepKind::Validate => "validate",
            StepKind::Verify => "verify",
            StepKind::Cleanup => "cleanup",
            StepKind::Report => "report",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One pre- or post-processing step in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStep {
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: StepKind,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl ProcessingStep {
    pub fn new(name: impl Into<String>, step_type: StepKind) -> Self {
        Self {
            name: name.into(),
            step_type,
            parameters: BTreeMap::new(),
        }
    }

    /// Integer parameter lookup with a default.
    pub fn param_u64(&self, key: &str, default: u64) -> u64 {
        self.parameters.get(key).and_then(|v| v.as_u64()).unwrap_or(default)
    }

    pub fn param_bool(&self, key: &str, default: bool) -> bool {
        self.parameters.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }
}

/// Retry policy for workflow steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "RetryPolicy::default_max_attempts")]
    pub max_attempts: u32,
    /// Exponential backoff base, in seconds.
    #[serde(default = "RetryPolicy::default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    /// Backoff ceiling, in seconds.
    #[serde(default = "RetryPolicy::default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
}

impl RetryPolicy {
    fn default_max_attempts() -> u32 {
        3
    }

    fn default_backoff_base_secs() -> u64 {
        30
    }

    fn default_backoff_cap_secs() -> u64 {
        300
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            backoff_base_secs: Self::default_backoff_base_secs(),
            backoff_cap_secs: Self::default_backoff_cap_secs(),
        }
    }
}

/// Per-workflow transfer tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Parallel streams for the transfer step; 0 means derive from the
    /// domain profile.
    #[serde(default)]
    pub concurrency: usize,
    /// Multipart part size in MiB; absent means the engine default.
    #[serde(default)]
    pub part_size_mib: Option<u64>,
    /// Per-workflow timeout in seconds.
    #[serde(default = "WorkflowSettings::default_timeout_secs")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl WorkflowSettings {
    fn default_timeout_secs() -> u64 {
        2 * 60 * 60
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            concurrency: 0,
            part_size_mib: None,
            timeout_seconds: Self::default_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Behavior of post-processing when the transfer partially succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnPartialSuccess {
    #[serde(default = "OnPartialSuccess::default_true")]
    pub run_report: bool,
    #[serde(default)]
    pub run_cleanup: bool,
}

impl OnPartialSuccess {
    fn default_true() -> bool {
        true
    }
}

impl Default for OnPartialSuccess {
    fn default() -> Self {
        Self {
            run_report: true,
            run_cleanup: false,
        }
    }
}

/// One named transfer workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default = "Workflow::default_enabled")]
    pub enabled: bool,
    /// Data profile name.
    pub source: String,
    /// Destination name.
    pub destination: String,
    #[serde(default)]
    pub engine: EngineChoice,
    /// Cron-style schedule handled by an external scheduler; carried opaque.
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub pre_processing: Vec<ProcessingStep>,
    #[serde(default)]
    pub post_processing: Vec<ProcessingStep>,
    #[serde(default)]
    pub configuration: WorkflowSettings,
    #[serde(default)]
    pub on_partial_success: OnPartialSuccess,
}

impl Workflow {
    fn default_enabled() -> bool {
        true
    }
}

/// Feature flags for automatic optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationFlags {
    #[serde(default = "OptimizationFlags::default_true")]
    pub auto_bundle: bool,
    #[serde(default)]
    pub auto_compression: bool,
    #[serde(default)]
    pub auto_storage_class: bool,
    #[serde(default = "OptimizationFlags::default_true")]
    pub auto_concurrency: bool,
}

impl OptimizationFlags {
    fn default_true() -> bool {
        true
    }
}

impl Default for OptimizationFlags {
    fn default() -> Self {
        Self {
            auto_bundle: true,
            auto_compression: false,
            auto_storage_class: false,
            auto_concurrency: true,
        }
    }
}

/// Engine-level settings carried in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Root of the persisted-state layout; absent means the platform data
    /// directory default chosen by the caller.
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default = "EngineSettings::default_max_concurrent")]
    pub max_concurrent_workflows: usize,
    #[serde(default = "EngineSettings::default_poll_interval_ms")]
    pub progress_poll_interval_ms: u64,
}

impl EngineSettings {
    fn default_max_concurrent() -> usize {
        3
    }

    fn default_poll_interval_ms() -> u64 {
        500
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            max_concurrent_workflows: Self::default_max_concurrent(),
            progress_poll_interval_ms: Self::default_poll_interval_ms(),
        }
    }
}

/// Result of configuration validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn suggest(&mut self, msg: impl Into<String>) {
        self.suggestions.push(msg.into());
    }
}

/// The complete declarative plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfiguration {
    pub project: ProjectMeta,
    #[serde(default)]
    pub data_profiles: BTreeMap<String, DataProfile>,
    #[serde(default)]
    pub destinations: BTreeMap<String, Destination>,
    #[serde(default)]
    pub workflows: Vec<Workflow>,
    #[serde(default)]
    pub optimization: OptimizationFlags,
    #[serde(default)]
    pub settings: EngineSettings,
}

impl ProjectConfiguration {
    /// Looks up a workflow by name.
    pub fn workflow(&self, name: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.name == name)
    }

    /// Validates internal consistency without touching the filesystem.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.project.name.trim().is_empty() {
            report.error("project.name must not be empty");
        }
        if let Some(budget) = self.project.budget {
            if budget <= 0.0 {
                report.error(format!("project.budget must be positive, got {}", budget));
            }
        }

        for (name, profile) in &self.data_profiles {
            if !name_pattern().is_match(name) {
                report.error(format!(
                    "data profile name '{}' must match [A-Za-z0-9][A-Za-z0-9_-]*",
                    name
                ));
            }
            if !profile.path.starts_with('/') {
                report.error(format!(
                    "data profile '{}': path '{}' must be absolute",
                    name, profile.path
                ));
            }
        }

        for (name, dest) in &self.destinations {
            if !name_pattern().is_match(name) {
                report.error(format!(
                    "destination name '{}' must match [A-Za-z0-9][A-Za-z0-9_-]*",
                    name
                ));
            }
            match RemoteUri::parse(&dest.uri) {
                Ok(_) => {}
                Err(e) => report.error(format!("destination '{}': {}", name, e)),
            }
            if dest.region.is_none() {
                report.warn(format!(
                    "destination '{}' has no region; cost estimates fall back to the default region",
                    name
                ));
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for workflow in &self.workflows {
            if !name_pattern().is_match(&workflow.name) {
                report.error(format!(
                    "workflow name '{}' must match [A-Za-z0-9][A-Za-z0-9_-]*",
                    workflow.name
                ));
            }
            if !seen.insert(&workflow.name) {
                report.error(format!("duplicate workflow name '{}'", workflow.name));
            }
            if !self.data_profiles.contains_key(&workflow.source) {
                report.error(format!(
                    "workflow '{}' references unknown data profile '{}'",
                    workflow.name, workflow.source
                ));
            }
            if !self.destinations.contains_key(&workflow.destination) {
                report.error(format!(
                    "workflow '{}' references unknown destination '{}'",
                    workflow.name, workflow.destination
                ));
            }
            if workflow.configuration.concurrency > 128 {
                report.error(format!(
                    "workflow '{}': concurrency {} exceeds the maximum of 128",
                    workflow.name, workflow.configuration.concurrency
                ));
            }
            if workflow.configuration.retry.max_attempts == 0 {
                report.error(format!(
                    "workflow '{}': retry.max_attempts must be at least 1",
                    workflow.name
                ));
            }
            if workflow.configuration.timeout_seconds < 60 {
                report.warn(format!(
                    "workflow '{}': timeout of {}s is unusually short",
                    workflow.name, workflow.configuration.timeout_seconds
                ));
            }
            if !workflow.enabled {
                report.warn(format!("workflow '{}' is disabled", workflow.name));
            }
        }

        if self.workflows.is_empty() {
            report.warn("configuration defines no workflows");
        }
        if self.settings.max_concurrent_workflows == 0 {
            report.error("settings.max_concurrent_workflows must be at least 1");
        }
        if !self.optimization.auto_bundle {
            report.suggest("enable optimization.auto_bundle to cut PUT-request costs for small-file trees");
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> ProjectConfiguration {
        let mut config = ProjectConfiguration {
            project: ProjectMeta {
                name: "sequencing-archive".to_string(),
                owner: "lab".to_string(),
                domain: Some("genomics".to_string()),
                budget: Some(500.0),
            },
            data_profiles: BTreeMap::new(),
            destinations: BTreeMap::new(),
            workflows: Vec::new(),
            optimization: OptimizationFlags::default(),
            settings: EngineSettings::default(),
        };
        config.data_profiles.insert(
            "raw-reads".to_string(),
            DataProfile {
                path: "/data/reads".to_string(),
                expected_size_bytes: None,
                expected_file_count: None,
                file_kinds: vec!["fastq".to_string()],
            },
        );
        config.destinations.insert(
            "archive".to_string(),
            Destination {
                uri: "s3://lab-archive/reads".to_string(),
                storage_class: Some("standard".to_string()),
                encryption: None,
                region: Some("us-east-1".to_string()),
            },
        );
        config.workflows.push(Workflow {
            name: "nightly-upload".to_string(),
            enabled: true,
            source: "raw-reads".to_string(),
            destination: "archive".to_string(),
            engine: EngineChoice::Auto,
            schedule: None,
            pre_processing: Vec::new(),
            post_processing: Vec::new(),
            configuration: WorkflowSettings::default(),
            on_partial_success: OnPartialSuccess::default(),
        });
        config
    }

    /// Tests that a well-formed configuration validates cleanly.
    #[test]
    fn test_valid_config_passes() {
        let report = minimal_config().validate();
        assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
    }

    /// Tests cross-reference checks: workflows must point at declared
    /// profiles and destinations.
    #[test]
    fn test_dangling_references_are_errors() {
        let mut config = minimal_config();
        config.workflows[0].source = "nope".to_string();
        config.workflows[0].destination = "missing".to_string();
        let report = config.validate();
        assert_eq!(report.errors.len(), 2);
    }

    /// Tests duplicate workflow names and relative paths are rejected.
    #[test]
    fn test_duplicates_and_relative_paths() {
        let mut config = minimal_config();
        let dup = config.workflows[0].clone();
        config.workflows.push(dup);
        config.data_profiles.get_mut("raw-reads").unwrap().path = "relative/path".to_string();
        let report = config.validate();
        assert!(report.errors.iter().any(|e| e.contains("duplicate workflow")));
        assert!(report.errors.iter().any(|e| e.contains("must be absolute")));
    }

    /// Tests the destination URI is parsed with the real URI rules.
    #[test]
    fn test_bad_destination_uri() {
        let mut config = minimal_config();
        config.destinations.get_mut("archive").unwrap().uri = "gopher://x/y".to_string();
        let report = config.validate();
        assert!(!report.is_valid());
    }

    /// Tests engine choice parsing from config strings.
    #[test]
    fn test_engine_choice_serde() {
        let auto: EngineChoice = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(auto, EngineChoice::Auto);
        let fixed: EngineChoice = serde_json::from_str("\"bulk-parallel\"").unwrap();
        assert_eq!(fixed, EngineChoice::Fixed(EngineKind::BulkParallel));
        assert!(serde_json::from_str::<EngineChoice>("\"warp-drive\"").is_err());
    }

    /// Tests YAML round-trip of a full configuration document.
    #[test]
    fn test_yaml_round_trip() {
        let config = minimal_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: ProjectConfiguration = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, back);
    }
}
