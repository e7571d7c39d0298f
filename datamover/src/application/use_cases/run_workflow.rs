// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Run-Workflow Use Case
//!
//! Loads a configuration, validates it, and either submits the named
//! workflow for execution or (with `--dry-run`) returns the full plan and
//! estimates without touching external state.

use std::path::Path;

use datamover_domain::{ExecutionId, MoverError};

use crate::application::services::workflow_engine::{ExecutionPlan, WorkflowEngine};
use crate::infrastructure::config::loader;

/// Result of a run request.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Started(ExecutionId),
    Planned(Box<ExecutionPlan>),
}

/// Submits or plans a workflow run.
pub async fn run(
    engine: &WorkflowEngine,
    config_path: &Path,
    workflow_name: &str,
    dry_run: bool,
) -> Result<RunOutcome, MoverError> {
    let config = loader::load_project(config_path)?;
    let report = config.validate();
    if !report.is_valid() {
        return Err(MoverError::InvalidConfiguration(format!(
            "configuration has {} error(s); run 'datamover validate' for details",
            report.errors.len()
        )));
    }

    if dry_run {
        let plan = engine.dry_run(&config, workflow_name).await?;
        Ok(RunOutcome::Planned(Box::new(plan)))
    } else {
        let id = engine.submit(&config, workflow_name).await?;
        Ok(RunOutcome::Started(id))
    }
}
