// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Full workflow lifecycle against a scripted backend: small-file
//! bundling end to end, retry behavior, and persistence of snapshots,
//! checkpoints, and event logs.

use std::time::Duration;

use datamover_domain::{ExecutionState, ExecutionStore, StepKind, StepStatus};

use crate::common::{build_tree, harness, project_config, Scripted, ScriptedEngine};

/// A small-file tree flows through analyze -> bundle -> transfer ->
/// verify -> cleanup -> report and completes with every file accounted
/// for.
#[tokio::test]
async fn small_file_bundling_workflow_completes() {
    let source = tempfile::TempDir::new().unwrap();
    build_tree(source.path(), 500, 4 * 1024, "fastq");

    let scripted = ScriptedEngine::new(vec![Scripted::SucceedWithSourceTotals]);
    let fixture = harness(scripted.clone());
    let config = project_config(source.path(), true, true);

    let id = fixture.engine.submit(&config, "move-data").await.unwrap();
    let execution = fixture
        .engine
        .wait_for_terminal(&id, Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(execution.state, ExecutionState::Completed);
    assert!((execution.progress - 1.0).abs() < 1e-9);

    // The transfer saw the staging directory, not the raw source.
    let requests = scripted.requests.lock();
    assert_eq!(requests.len(), 1);
    let staged = requests[0].source.local_path().unwrap();
    assert_ne!(staged, source.path());
    assert!(staged.starts_with(fixture.data_dir.path().join("staging")));
    drop(requests);

    // The analyze step recorded the genomics tree.
    let analyze = &execution.steps[0];
    assert_eq!(analyze.step_type, StepKind::Analyze);
    let analyze_output = analyze.output.as_ref().unwrap();
    assert_eq!(analyze_output["total_files"], serde_json::json!(500));
    assert!(analyze_output["detected_domains"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("genomics")));

    // The bundle step collapsed 500 tiny files into a handful of
    // archives.
    let bundle = execution
        .steps
        .iter()
        .find(|s| s.step_type == StepKind::Bundle)
        .unwrap();
    let bundle_output = bundle.output.as_ref().unwrap();
    assert_eq!(bundle_output["bundled_files"], serde_json::json!(500));
    assert!(bundle_output["bundles"].as_u64().unwrap() <= 10);

    // Cleanup removed the staging directory.
    let cleanup = execution
        .steps
        .iter()
        .find(|s| s.step_type == StepKind::Cleanup)
        .unwrap();
    assert_eq!(cleanup.status, StepStatus::Completed);

    // Persistence: snapshot, checkpoint, and an ordered event log.
    let loaded = fixture.store.load(&id).await.unwrap();
    assert_eq!(loaded.state, ExecutionState::Completed);
    let checkpoint = fixture.store.load_checkpoint(&id).await.unwrap().unwrap();
    assert_eq!(checkpoint.last_successful_step, Some(execution.total_steps - 1));

    let log_path = fixture.data_dir.path().join("logs").join(format!("{}.log", id));
    let log = std::fs::read_to_string(log_path).unwrap();
    let mut last_sequence = None;
    for line in log.lines() {
        let event: datamover_domain::ExecutionEvent = serde_json::from_str(line).unwrap();
        if let Some(previous) = last_sequence {
            assert!(event.sequence > previous, "event log must be strictly ordered");
        }
        last_sequence = Some(event.sequence);
    }
    assert!(last_sequence.is_some(), "event log must not be empty");
}

/// A transient transfer failure is retried and the workflow still
/// completes.
#[tokio::test]
async fn transient_failure_retries_to_completion() {
    let source = tempfile::TempDir::new().unwrap();
    build_tree(source.path(), 20, 1024, "fastq");

    let scripted = ScriptedEngine::new(vec![Scripted::FailTransient, Scripted::SucceedWithSourceTotals]);
    let fixture = harness(scripted.clone());
    let config = project_config(source.path(), false, false);

    let id = fixture.engine.submit(&config, "move-data").await.unwrap();
    let execution = fixture
        .engine
        .wait_for_terminal(&id, Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(execution.state, ExecutionState::Completed);
    let transfer = execution
        .steps
        .iter()
        .find(|s| s.step_type == StepKind::Transfer)
        .unwrap();
    assert_eq!(transfer.attempts, 2);
    assert_eq!(scripted.requests.lock().len(), 2, "both attempts reached the backend");
}

/// Exhausting the retry budget fails the execution with the transient
/// class recorded.
#[tokio::test]
async fn retry_budget_exhaustion_fails() {
    let source = tempfile::TempDir::new().unwrap();
    build_tree(source.path(), 5, 1024, "dat");

    let scripted = ScriptedEngine::new(vec![
        Scripted::FailTransient,
        Scripted::FailTransient,
        Scripted::FailTransient,
    ]);
    let fixture = harness(scripted);
    let config = project_config(source.path(), false, false);

    let id = fixture.engine.submit(&config, "move-data").await.unwrap();
    let execution = fixture
        .engine
        .wait_for_terminal(&id, Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(execution.state, ExecutionState::Failed);
    assert_eq!(execution.error_class, Some(datamover_domain::ErrorClass::Transient));
    let transfer = execution
        .steps
        .iter()
        .find(|s| s.step_type == StepKind::Transfer)
        .unwrap();
    assert_eq!(transfer.attempts, 3, "the full budget was used");
}
