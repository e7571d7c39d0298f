// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Generate-Config Use Case
//!
//! Builds a ready-to-edit project configuration from an analyzed source
//! tree. Three templates:
//!
//! - **minimal**: one profile, one destination, one workflow, defaults
//!   everywhere
//! - **optimized**: adds bundling/verification steps when the pattern
//!   warrants them and tunes concurrency from the domain profile
//! - **comprehensive**: optimized plus every optional knob spelled out
//!   (schedule placeholder, explicit retry policy, cleanup step)
//!
//! The generated configuration always passes `validate`; that property is
//! pinned by a test.

use std::collections::BTreeMap;

use datamover_domain::entities::project_config::{
    DataProfile, Destination, EngineChoice, EngineSettings, OnPartialSuccess, OptimizationFlags, ProcessingStep,
    ProjectConfiguration, ProjectMeta, RetryPolicy, StepKind, Workflow, WorkflowSettings,
};
use datamover_domain::{DataPattern, MoverError};

use crate::infrastructure::profiles;

/// Template flavor of the generated configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigTemplate {
    Minimal,
    Optimized,
    Comprehensive,
}

impl std::str::FromStr for ConfigTemplate {
    type Err = MoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(ConfigTemplate::Minimal),
            "optimized" => Ok(ConfigTemplate::Optimized),
            "comprehensive" => Ok(ConfigTemplate::Comprehensive),
            other => Err(MoverError::InvalidConfiguration(format!(
                "unknown template '{}' (expected minimal, optimized, or comprehensive)",
                other
            ))),
        }
    }
}

/// Generates a configuration for an analyzed tree.
pub fn run(
    pattern: &DataPattern,
    template: ConfigTemplate,
    overrides: &[(String, String)],
) -> Result<ProjectConfiguration, MoverError> {
    let domain = pattern.domain_hints.primary().map(str::to_string);
    let profile = profiles::profile_for(domain.as_deref(), pattern.small_file_fraction());

    let project_name = domain
        .clone()
        .map(|d| format!("{}-project", d))
        .unwrap_or_else(|| "research-project".to_string());

    let mut config = ProjectConfiguration {
        project: ProjectMeta {
            name: project_name.clone(),
            owner: String::new(),
            domain,
            budget: None,
        },
        data_profiles: BTreeMap::new(),
        destinations: BTreeMap::new(),
        workflows: Vec::new(),
        optimization: OptimizationFlags::default(),
        settings: EngineSettings::default(),
    };

    config.data_profiles.insert(
        "primary-data".to_string(),
        DataProfile {
            path: pattern.source_path.clone(),
            expected_size_bytes: Some(pattern.total_size_bytes),
            expected_file_count: Some(pattern.total_files),
            file_kinds: pattern
                .file_types
                .keys()
                .filter(|k| !k.is_empty())
                .take(8)
                .cloned()
                .collect(),
        },
    );
    config.destinations.insert(
        "archive".to_string(),
        Destination {
            uri: format!("s3://{}-archive/primary-data", project_name),
            storage_class: Some("standard".to_string()),
            encryption: profile.security.encryption_required.then(|| "sse-s3".to_string()),
            region: Some("us-east-1".to_string()),
        },
    );

    let bundling_worthwhile = profile.transfer.bundling.enabled
        && pattern.file_sizes.under_1_mib >= profile.transfer.bundling.min_file_count;

    let mut workflow = Workflow {
        name: "primary-upload".to_string(),
        enabled: true,
        source: "primary-data".to_string(),
        destination: "archive".to_string(),
        engine: EngineChoice::Auto,
        schedule: None,
        pre_processing: Vec::new(),
        post_processing: Vec::new(),
        configuration: WorkflowSettings::default(),
        on_partial_success: OnPartialSuccess::default(),
    };

    match template {
        ConfigTemplate::Minimal => {}
        ConfigTemplate::Optimized | ConfigTemplate::Comprehensive => {
            if bundling_worthwhile {
                let mut bundle = ProcessingStep::new("bundle-small-files", StepKind::Bundle);
                bundle.parameters.insert(
                    "target_bundle_size_mib".to_string(),
                    serde_json::json!(profile.transfer.bundling.target_bundle_size / (1024 * 1024)),
                );
                workflow.pre_processing.push(bundle);
            }
            workflow
                .post_processing
                .push(ProcessingStep::new("verify-transfer", StepKind::Verify));
            workflow.configuration.concurrency = profile.transfer.optimal_concurrency.clamp(1, 128);
        }
    }
    if template == ConfigTemplate::Comprehensive {
        workflow
            .pre_processing
            .insert(0, ProcessingStep::new("validate-inputs", StepKind::Validate));
        workflow
            .post_processing
            .push(ProcessingStep::new("cleanup-staging", StepKind::Cleanup));
        workflow.schedule = Some("0 2 * * *".to_string());
        workflow.configuration.retry = RetryPolicy::default();
        config.project.budget = Some(1_000.0);
    }
    config.workflows.push(workflow);

    apply_overrides(&mut config, overrides)?;
    Ok(config)
}

/// Applies `key=value` overrides to a generated configuration.
fn apply_overrides(config: &mut ProjectConfiguration, overrides: &[(String, String)]) -> Result<(), MoverError> {
    for (key, value) in overrides {
        match key.as_str() {
            "project.name" => config.project.name = value.clone(),
            "project.owner" => config.project.owner = value.clone(),
            "project.domain" => config.project.domain = Some(value.clone()),
            "project.budget" => {
                config.project.budget = Some(value.parse::<f64>().map_err(|_| {
                    MoverError::InvalidConfiguration(format!("invalid override: budget '{}' is not a number", value))
                })?)
            }
            "destination.uri" => {
                datamover_domain::RemoteUri::parse(value)?;
                if let Some(destination) = config.destinations.get_mut("archive") {
                    destination.uri = value.clone();
                }
            }
            "destination.region" => {
                if let Some(destination) = config.destinations.get_mut("archive") {
                    destination.region = Some(value.clone());
                }
            }
            "workflow.engine" => {
                let choice: EngineChoice = EngineChoice::try_from(value.clone())?;
                if let Some(workflow) = config.workflows.first_mut() {
                    workflow.engine = choice;
                }
            }
            other => {
                return Err(MoverError::InvalidConfiguration(format!(
                    "invalid override key '{}'",
                    other
                )))
            }
        }
    }
    Ok(())
}
