// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Recover Use Case
//!
//! Drives the recovery manager from the CLI: builds the plan and decides
//! whether to execute it based on the requested strategy and flags.
//!
//! - `auto`: execute the plan when it is recommended; otherwise return it
//!   for the user to act on.
//! - `manual`: always return the plan without executing.
//! - `retry`: resume regardless of the plan's own strategy (still gated
//!   behind `--force` for manual/remediate plans).

use datamover_domain::{MoverError, RecoveryPlan};

use crate::application::services::recovery_manager::RecoveryManager;
use crate::application::use_cases::show_workflow::parse_execution_id;

/// Requested recovery mode from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMode {
    Auto,
    Manual,
    Retry,
}

#[derive(Debug, Clone)]
pub struct RecoverRequest {
    pub execution_id: String,
    pub mode: RecoveryMode,
    pub dry_run: bool,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct RecoverOutcome {
    pub plan: RecoveryPlan,
    pub executed: bool,
}

/// Plans (and possibly executes) recovery for a failed execution.
pub async fn run(manager: &RecoveryManager, request: &RecoverRequest) -> Result<RecoverOutcome, MoverError> {
    let id = parse_execution_id(&request.execution_id)?;
    let plan = manager.plan(&id).await?;

    if request.dry_run {
        return Ok(RecoverOutcome { plan, executed: false });
    }

    let should_execute = match request.mode {
        RecoveryMode::Manual => false,
        RecoveryMode::Auto => plan.recommended || request.force,
        RecoveryMode::Retry => true,
    };
    if !should_execute {
        return Ok(RecoverOutcome { plan, executed: false });
    }

    manager.execute(&id, &plan, request.force || request.mode == RecoveryMode::Retry).await?;
    Ok(RecoverOutcome { plan, executed: true })
}
