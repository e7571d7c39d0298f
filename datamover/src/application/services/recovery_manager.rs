// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Recovery Manager
//!
//! Turns a failed execution into a [`RecoveryPlan`] and optionally
//! executes it. Strategy selection is keyed off the failure's error class
//! and the checkpoint position:
//!
//! - transient + checkpoint beyond the first step → resume-from-checkpoint
//! - transient otherwise → auto-retry
//! - configuration → remediate (the plan enumerates the fix)
//! - integrity after its one-shot retry, or unknown → manual
//! - resource → remediate with mitigation advice
//!
//! Risk reflects the destructiveness of the action: re-running a step is
//! low risk, editing configuration is medium, and anything touching
//! possibly-corrupt data is high.

use std::sync::Arc;

use datamover_domain::{
    ErrorClass, ExecutionId, ExecutionState, ExecutionStore, MoverError, RecoveryPlan, RecoveryRisk, RecoveryStrategy,
    WorkflowExecution,
};

use super::workflow_engine::WorkflowEngine;

/// Produces and executes recovery plans for failed executions.
pub struct RecoveryManager {
    store: Arc<dyn ExecutionStore>,
    engine: WorkflowEngine,
}

impl RecoveryManager {
    pub fn new(store: Arc<dyn ExecutionStore>, engine: WorkflowEngine) -> Self {
        Self { store, engine }
    }

    /// Builds the recovery plan for a failed execution.
    ///
    /// # Errors
    ///
    /// - `ExecutionNotFound` for an unknown id
    /// - `NotRecoverable` when the execution is not in the failed state
    pub async fn plan(&self, id: &ExecutionId) -> Result<RecoveryPlan, MoverError> {
        let execution = self.store.load(id).await?;
        if execution.state != ExecutionState::Failed {
            return Err(MoverError::NotRecoverable(format!(
                "execution {} is {} (recovery applies to failed executions)",
                id, execution.state
            )));
        }
        Ok(Self::plan_for(&execution))
    }

    /// Pure strategy selection over a failed execution snapshot.
    pub fn plan_for(execution: &WorkflowExecution) -> RecoveryPlan {
        let class = execution.error_class.unwrap_or(ErrorClass::Unknown);
        let error_text = execution.error.clone().unwrap_or_else(|| "unknown failure".to_string());
        // A checkpoint is worth resuming from once real work (anything
        // past the initial analysis) has completed.
        let checkpoint_nontrivial = execution
            .checkpoint
            .last_successful_step
            .map(|index| index >= 1)
            .unwrap_or(false);
        let remaining = execution.remaining_step_names();

        let mut notes = vec![format!("failure class: {}", class), format!("error: {}", error_text)];

        match class {
            ErrorClass::Transient if checkpoint_nontrivial => RecoveryPlan {
                strategy: RecoveryStrategy::ResumeFromCheckpoint,
                steps: remaining,
                risk: RecoveryRisk::Low,
                recommended: true,
                notes,
            },
            ErrorClass::Transient => RecoveryPlan {
                strategy: RecoveryStrategy::AutoRetry,
                steps: remaining,
                risk: RecoveryRisk::Low,
                recommended: true,
                notes,
            },
            ErrorClass::Configuration => {
                let mut steps = vec![
                    format!("Fix the reported problem: {}", error_text),
                    "Re-validate the project configuration (datamover validate)".to_string(),
                    "Re-run recovery with --strategy retry".to_string(),
                ];
                steps.extend(remaining.into_iter().map(|s| format!("then re-run step '{}'", s)));
                RecoveryPlan {
                    strategy: RecoveryStrategy::Remediate,
                    steps,
                    risk: RecoveryRisk::Medium,
                    recommended: false,
                    notes,
                }
            }
            ErrorClass::Resource => {
                notes.push("free disk space or raise quota before retrying".to_string());
                RecoveryPlan {
                    strategy: RecoveryStrategy::Remediate,
                    steps: vec![
                        format!("Mitigate the resource shortage: {}", error_text),
                        "Re-run recovery with --strategy retry".to_string(),
                    ],
                    risk: RecoveryRisk::Medium,
                    recommended: false,
                    notes,
                }
            }
            ErrorClass::Integrity => {
                notes.push("data corruption risk; verify source and destination objects".to_string());
                RecoveryPlan {
                    strategy: RecoveryStrategy::Manual,
                    steps: vec![
                        "Compare source checksums against the manifest records".to_string(),
                        "Delete the suspect destination objects".to_string(),
                        "Re-run the workflow once the data is verified".to_string(),
                    ],
                    risk: RecoveryRisk::High,
                    recommended: false,
                    notes,
                }
            }
            ErrorClass::Cancelled | ErrorClass::Unknown => RecoveryPlan {
                strategy: RecoveryStrategy::Manual,
                steps: vec![
                    "Inspect the execution event log for the failing step".to_string(),
                    "Review the subprocess output tail attached to the error".to_string(),
                ],
                risk: RecoveryRisk::High,
                recommended: false,
                notes,
            },
        }
    }

    /// Executes a plan. Only the resume-style strategies are executable;
    /// remediate/manual plans are returned to the caller for action.
    pub async fn execute(&self, id: &ExecutionId, plan: &RecoveryPlan, force: bool) -> Result<(), MoverError> {
        match plan.strategy {
            RecoveryStrategy::AutoRetry | RecoveryStrategy::ResumeFromCheckpoint => self.engine.resume(id).await,
            RecoveryStrategy::Remediate | RecoveryStrategy::Manual => {
                if force {
                    tracing::warn!(execution_id = %id, "forcing resume despite {} plan", plan.strategy);
                    return self.engine.resume(id).await;
                }
                Err(MoverError::NotRecoverable(format!(
                    "plan strategy '{}' requires manual action (use --force to resume anyway)",
                    plan.strategy
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datamover_domain::entities::project_config::{
        DataProfile, Destination, EngineChoice, OnPartialSuccess, OptimizationFlags, Workflow, WorkflowSettings,
    };
    use datamover_domain::WorkflowSnapshot;

    fn failed_execution(error: MoverError, last_successful: Option<usize>) -> WorkflowExecution {
        let snapshot = WorkflowSnapshot {
            project_name: "proj".to_string(),
            project_domain: None,
            workflow: Workflow {
                name: "wf".to_string(),
                enabled: true,
                source: "src".to_string(),
                destination: "dst".to_string(),
                engine: EngineChoice::Auto,
                schedule: None,
                pre_processing: Vec::new(),
                post_processing: Vec::new(),
                configuration: WorkflowSettings::default(),
                on_partial_success: OnPartialSuccess::default(),
            },
            profile: DataProfile {
                path: "/data".to_string(),
                expected_size_bytes: None,
                expected_file_count: None,
                file_kinds: Vec::new(),
            },
            destination: Destination {
                uri: "s3://bucket/x".to_string(),
                storage_class: None,
                encryption: None,
                region: None,
            },
            optimization: OptimizationFlags::default(),
        };
        let mut execution = WorkflowExecution::new(snapshot);
        execution.transition_to(ExecutionState::Running).unwrap();
        execution.checkpoint.last_successful_step = last_successful;
        execution.fail(&error).unwrap();
        execution
    }

    /// Tests transient failures with a meaningful checkpoint resume from
    /// it (scenario: a 3-step run failing past the transfer).
    #[test]
    fn test_transient_with_checkpoint_resumes() {
        let execution = failed_execution(MoverError::Timeout("socket".to_string()), Some(1));
        let plan = RecoveryManager::plan_for(&execution);
        assert_eq!(plan.strategy, RecoveryStrategy::ResumeFromCheckpoint);
        assert_eq!(plan.risk, RecoveryRisk::Low);
        assert!(plan.recommended);
        // Only the remaining suffix is listed.
        assert_eq!(plan.steps, vec!["report".to_string()]);
    }

    /// Tests transient failures without useful progress fall back to
    /// auto-retry.
    #[test]
    fn test_transient_without_checkpoint_retries() {
        let execution = failed_execution(MoverError::NetworkError("reset".to_string()), None);
        let plan = RecoveryManager::plan_for(&execution);
        assert_eq!(plan.strategy, RecoveryStrategy::AutoRetry);
        assert!(plan.recommended);
    }

    /// Tests configuration failures produce an enumerated remediation.
    #[test]
    fn test_configuration_remediates() {
        let execution = failed_execution(MoverError::PermissionDenied("s3://bucket".to_string()), Some(0));
        let plan = RecoveryManager::plan_for(&execution);
        assert_eq!(plan.strategy, RecoveryStrategy::Remediate);
        assert_eq!(plan.risk, RecoveryRisk::Medium);
        assert!(!plan.recommended);
        assert!(plan.steps.iter().any(|s| s.contains("Permission denied")));
    }

    /// Tests integrity and unknown failures demand manual recovery at
    /// high risk.
    #[test]
    fn test_manual_strategies() {
        let integrity = failed_execution(MoverError::ChecksumMismatch("bundle".to_string()), Some(2));
        let plan = RecoveryManager::plan_for(&integrity);
        assert_eq!(plan.strategy, RecoveryStrategy::Manual);
        assert_eq!(plan.risk, RecoveryRisk::High);
        assert!(!plan.recommended);

        let unknown = failed_execution(MoverError::InternalError("??".to_string()), Some(2));
        assert_eq!(RecoveryManager::plan_for(&unknown).strategy, RecoveryStrategy::Manual);
    }
}
