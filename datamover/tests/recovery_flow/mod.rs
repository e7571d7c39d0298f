// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Failure-and-recovery flow: a workflow fails mid-run, the recovery
//! manager plans, and a resume completes the remaining suffix with event
//! history preserved across both runs.

use std::sync::Arc;
use std::time::Duration;

use datamover_domain::{ExecutionState, RecoveryStrategy, StepKind};

use datamover::application::services::recovery_manager::RecoveryManager;
use datamover::application::use_cases::recover::{self, RecoverRequest, RecoveryMode};

use crate::common::{build_tree, harness, project_config, Scripted, ScriptedEngine};

/// A five-step workflow failing at the transfer resumes from the
/// checkpoint: only the failed suffix is re-run and events from both runs
/// stay ordered.
#[tokio::test]
async fn recover_resumes_from_checkpoint() {
    let source = tempfile::TempDir::new().unwrap();
    build_tree(source.path(), 50, 2048, "fastq");

    let scripted = ScriptedEngine::new(vec![Scripted::FailUnknown, Scripted::SucceedWithSourceTotals]);
    let fixture = harness(scripted);
    // bundle pre-step + verify/cleanup post-steps => 6 steps total.
    let config = project_config(source.path(), true, true);

    let id = fixture.engine.submit(&config, "move-data").await.unwrap();
    let failed = fixture
        .engine
        .wait_for_terminal(&id, Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(failed.state, ExecutionState::Failed);
    // Analyze and bundle completed; the checkpoint points past them.
    assert_eq!(failed.checkpoint.last_successful_step, Some(1));
    let first_run_events = failed.events.len();

    let manager = RecoveryManager::new(
        Arc::clone(&fixture.store) as Arc<dyn datamover_domain::ExecutionStore>,
        fixture.engine.clone(),
    );

    // An unknown failure plans as manual; the caller overrides with the
    // retry strategy.
    let planned = recover::run(
        &manager,
        &RecoverRequest {
            execution_id: id.to_string(),
            mode: RecoveryMode::Manual,
            dry_run: false,
            force: false,
        },
    )
    .await
    .unwrap();
    assert_eq!(planned.plan.strategy, RecoveryStrategy::Manual);
    assert!(!planned.executed);

    let retried = recover::run(
        &manager,
        &RecoverRequest {
            execution_id: id.to_string(),
            mode: RecoveryMode::Retry,
            dry_run: false,
            force: true,
        },
    )
    .await
    .unwrap();
    assert!(retried.executed);

    let resumed = fixture
        .engine
        .wait_for_terminal(&id, Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(resumed.state, ExecutionState::Completed);

    // The pre-transfer steps were not re-run.
    assert_eq!(resumed.steps[0].attempts, 1);
    let bundle = resumed
        .steps
        .iter()
        .find(|s| s.step_type == StepKind::Bundle)
        .unwrap();
    assert_eq!(bundle.attempts, 1);

    // Events from both runs, strictly ordered.
    assert!(resumed.events.len() > first_run_events);
    let sequences: Vec<u64> = resumed.events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (0..resumed.events.len() as u64).collect::<Vec<_>>());
}

/// A transient failure past the first step plans as
/// resume-from-checkpoint and is recommended.
#[tokio::test]
async fn transient_failure_plans_resume() {
    let source = tempfile::TempDir::new().unwrap();
    build_tree(source.path(), 10, 1024, "nc");

    let scripted = ScriptedEngine::new(vec![
        Scripted::FailTransient,
        Scripted::FailTransient,
        Scripted::FailTransient,
    ]);
    let fixture = harness(scripted);
    let config = project_config(source.path(), true, false);

    let id = fixture.engine.submit(&config, "move-data").await.unwrap();
    fixture
        .engine
        .wait_for_terminal(&id, Duration::from_secs(30))
        .await
        .unwrap();

    let manager = RecoveryManager::new(
        Arc::clone(&fixture.store) as Arc<dyn datamover_domain::ExecutionStore>,
        fixture.engine.clone(),
    );
    let outcome = recover::run(
        &manager,
        &RecoverRequest {
            execution_id: id.to_string(),
            mode: RecoveryMode::Auto,
            dry_run: true,
            force: false,
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.plan.strategy, RecoveryStrategy::ResumeFromCheckpoint);
    assert!(outcome.plan.recommended);
    assert!(!outcome.executed, "dry run never executes");
    // The plan lists only the remaining suffix.
    assert_eq!(
        outcome.plan.steps,
        vec!["primary_transfer".to_string(), "report".to_string()]
    );
}
