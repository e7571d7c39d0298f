// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Workflow Execution
//!
//! A single run of a named workflow: its state machine, step list, progress,
//! append-only event log, and checkpoint. The execution is exclusively owned
//! by the workflow engine for its lifetime; other components receive
//! short-lived borrowed references or serialized snapshots.
//!
//! ## State machine
//!
//! ```text
//! pending ─start→ running ─complete→ completed
//!                   │
//!                   ├─fail→ failed ─resume→ running
//!                   ├─cancel→ cancelled
//!                   └─pause→ paused ─resume→ running
//! ```
//!
//! Terminal states (completed, failed, cancelled) forbid further transitions
//! except `resume` from `failed` or `paused`. A cancel issued before the run
//! starts moves `pending` straight to `cancelled`. Every transition is
//! recorded in the event log.
//!
//! ## Step expansion
//!
//! For a workflow W the engine composes
//! `[analyze] ++ W.pre_processing ++ [primary_transfer] ++ W.post_processing
//! ++ [report]`. Progress weights default to 0.05 per auxiliary step and
//! 0.70 for the transfer, renormalized to sum to 1.
//!
//! ## Progress monotonicity
//!
//! `progress` never decreases within a run. A retried step resets its own
//! step-level progress, but the execution-level figure holds at its
//! high-water mark until the retry passes the previous point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::project_config::{
    DataProfile, Destination, OptimizationFlags, ProcessingStep, ProjectConfiguration, StepKind, Workflow,
};
use crate::error::ErrorClass;
use crate::events::{EventKind, ExecutionEvent};
use crate::services::datetime_serde;
use crate::value_objects::ExecutionId;
use crate::MoverError;

/// Lifecycle state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Completed | ExecutionState::Failed | ExecutionState::Cancelled
        )
    }

    /// Whether the state machine permits `self -> next`.
    pub fn can_transition_to(&self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Running, Paused)
                | (Paused, Running)
                | (Paused, Cancelled)
                | (Failed, Running)
        )
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionState::Pending => "pending",
            ExecutionState::Running => "running",
            ExecutionState::Paused => "paused",
            ExecutionState::Completed => "completed",
            ExecutionState::Failed => "failed",
            ExecutionState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle state of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// One step in the expanded plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub step_type: StepKind,
    pub status: StepStatus,
    #[serde(default, with = "datetime_serde::optional")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, with = "datetime_serde::optional")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    /// Attempts consumed so far (1 on the first try).
    #[serde(default)]
    pub attempts: u32,
    /// Opaque output passed as context to the next step.
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    /// Normalized share of execution progress this step carries.
    pub weight: f64,
    /// Step-local progress in [0, 1].
    #[serde(default)]
    pub progress: f64,
    /// Extra parameters carried over from the workflow definition.
    #[serde(default)]
    pub parameters: std::collections::BTreeMap<String, serde_json::Value>,
}

impl StepRecord {
    fn from_step(step: &ProcessingStep, weight: f64) -> Self {
        Self {
            name: step.name.clone(),
            step_type: step.step_type,
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            error: None,
            attempts: 0,
            output: None,
            weight,
            progress: 0.0,
            parameters: step.parameters.clone(),
        }
    }

    fn builtin(name: &str, kind: StepKind, weight: f64) -> Self {
        Self::from_step(&ProcessingStep::new(name, kind), weight)
    }

    /// Contribution of this step toward execution progress, in [0, 1].
    fn progress_fraction(&self) -> f64 {
        match self.status {
            StepStatus::Completed | StepStatus::Skipped => 1.0,
            StepStatus::Running => self.progress.clamp(0.0, 1.0),
            StepStatus::Pending | StepStatus::Failed => 0.0,
        }
    }
}

/// Durable resume point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Index of the last step that completed successfully.
    pub last_successful_step: Option<usize>,
    /// Opaque engine state (the step runner serializes its scratch here).
    #[serde(default)]
    pub engine_state: Option<String>,
}

/// Frozen copy of the configuration slice a run depends on.
///
/// Taken at submission time so concurrent configuration edits cannot affect
/// a running execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub project_name: String,
    pub project_domain: Option<String>,
    pub workflow: Workflow,
    pub profile: DataProfile,
    pub destination: Destination,
    pub optimization: OptimizationFlags,
}

impl WorkflowSnapshot {
    /// Resolves and freezes the pieces of `config` that `workflow_name`
    /// references.
    pub fn capture(config: &ProjectConfiguration, workflow_name: &str) -> Result<Self, MoverError> {
        let workflow = config
            .workflow(workflow_name)
            .ok_or_else(|| MoverError::WorkflowNotFound(workflow_name.to_string()))?;
        let profile = config.data_profiles.get(&workflow.source).ok_or_else(|| {
            MoverError::InvalidConfiguration(format!(
                "workflow '{}' references unknown data profile '{}'",
                workflow_name, workflow.source
            ))
        })?;
        let destination = config.destinations.get(&workflow.destination).ok_or_else(|| {
            MoverError::InvalidConfiguration(format!(
                "workflow '{}' references unknown destination '{}'",
                workflow_name, workflow.destination
            ))
        })?;
        Ok(Self {
            project_name: config.project.name.clone(),
            project_domain: config.project.domain.clone(),
            workflow: workflow.clone(),
            profile: profile.clone(),
            destination: destination.clone(),
            optimization: config.optimization,
        })
    }
}

/// Weight assigned to the primary transfer step before renormalization.
const TRANSFER_WEIGHT: f64 = 0.70;
/// Weight assigned to every other step before renormalization.
const AUXILIARY_WEIGHT: f64 = 0.05;

/// A single run of a named workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub workflow_name: String,
    pub snapshot: WorkflowSnapshot,
    pub state: ExecutionState,
    pub steps: Vec<StepRecord>,
    /// Index of the step currently (or next) executing.
    pub current_step: usize,
    pub total_steps: usize,
    /// Overall progress in [0, 1]; monotone within a run.
    pub progress: f64,
    pub events: Vec<ExecutionEvent>,
    pub checkpoint: Checkpoint,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "datetime_serde::optional")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, with = "datetime_serde::optional")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_class: Option<ErrorClass>,
    #[serde(default)]
    pub partial_success: bool,
    /// Dry-run executions plan but never touch external state.
    #[serde(default)]
    pub dry_run: bool,
}

impl WorkflowExecution {
    /// Creates a pending execution with the expanded step plan.
    pub fn new(snapshot: WorkflowSnapshot) -> Self {
        let steps = Self::expand_steps(&snapshot.workflow);
        let total_steps = steps.len();
        let workflow_name = snapshot.workflow.name.clone();
        let mut execution = Self {
            id: ExecutionId::new(),
            workflow_name: workflow_name.clone(),
            snapshot,
            state: ExecutionState::Pending,
            steps,
            current_step: 0,
            total_steps,
            progress: 0.0,
            events: Vec::new(),
            checkpoint: Checkpoint::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            error_class: None,
            partial_success: false,
            dry_run: false,
        };
        execution.record_event(ExecutionEvent::new(
            EventKind::ExecutionCreated,
            format!("execution created for workflow '{}'", workflow_name),
        ));
        execution
    }

    /// Expands a workflow into the ordered step plan with normalized
    /// weights.
    pub fn expand_steps(workflow: &Workflow) -> Vec<StepRecord> {
        let mut steps = Vec::with_capacity(3 + workflow.pre_processing.len() + workflow.post_processing.len());
        steps.push(StepRecord::builtin("analyze", StepKind::Analyze, AUXILIARY_WEIGHT));
        for step in &workflow.pre_processing {
            steps.push(StepRecord::from_step(step, AUXILIARY_WEIGHT));
        }
        steps.push(StepRecord::builtin(
            "primary_transfer",
            StepKind::Transfer,
            TRANSFER_WEIGHT,
        ));
        for step in &workflow.post_processing {
            steps.push(StepRecord::from_step(step, AUXILIARY_WEIGHT));
        }
        steps.push(StepRecord::builtin("report", StepKind::Report, AUXILIARY_WEIGHT));

        let total: f64 = steps.iter().map(|s| s.weight).sum();
        for step in &mut steps {
            step.weight /= total;
        }
        steps
    }

    /// Appends an event, assigning the next sequence number.
    pub fn record_event(&mut self, mut event: ExecutionEvent) {
        event.sequence = self.events.len() as u64;
        self.events.push(event);
    }

    /// Applies a state transition, enforcing the machine and logging it.
    pub fn transition_to(&mut self, next: ExecutionState) -> Result<(), MoverError> {
        if !self.state.can_transition_to(next) {
            return Err(MoverError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        let previous = self.state;
        self.state = next;
        match next {
            ExecutionState::Running if self.started_at.is_none() => self.started_at = Some(Utc::now()),
            ExecutionState::Completed | ExecutionState::Failed | ExecutionState::Cancelled => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }
        self.record_event(
            ExecutionEvent::new(EventKind::StateChanged, format!("{} -> {}", previous, next))
                .with_data("from", serde_json::json!(previous.to_string()))
                .with_data("to", serde_json::json!(next.to_string())),
        );
        Ok(())
    }

    /// Marks the execution failed, recording the classified error.
    pub fn fail(&mut self, error: &MoverError) -> Result<(), MoverError> {
        self.error = Some(error.to_string());
        self.error_class = Some(error.error_class());
        self.record_event(
            ExecutionEvent::new(EventKind::ErrorClassified, error.to_string())
                .with_data("class", serde_json::json!(error.error_class().to_string())),
        );
        self.transition_to(ExecutionState::Failed)
    }

    /// Clears failure bookkeeping and re-enters `running` for a resume.
    pub fn resume_run(&mut self) -> Result<(), MoverError> {
        self.transition_to(ExecutionState::Running)?;
        self.error = None;
        self.error_class = None;
        self.completed_at = None;
        // The failed step goes back to pending for its fresh attempt run.
        if let Some(step) = self.steps.get_mut(self.current_step) {
            if step.status == StepStatus::Failed {
                step.status = StepStatus::Pending;
                step.error = None;
                step.progress = 0.0;
            }
        }
        Ok(())
    }

    pub fn step_started(&mut self, index: usize) {
        if let Some(step) = self.steps.get_mut(index) {
            step.status = StepStatus::Running;
            step.started_at = Some(Utc::now());
            step.attempts += 1;
            let event = ExecutionEvent::new(EventKind::StepStarted, format!("step '{}' started", step.name))
                .with_data("index", serde_json::json!(index))
                .with_data("attempt", serde_json::json!(step.attempts));
            self.current_step = index;
            self.record_event(event);
        }
    }

    pub fn step_completed(&mut self, index: usize, output: Option<serde_json::Value>) {
        if let Some(step) = self.steps.get_mut(index) {
            step.status = StepStatus::Completed;
            step.completed_at = Some(Utc::now());
            step.duration_ms = step
                .started_at
                .zip(step.completed_at)
                .map(|(s, e)| (e - s).num_milliseconds().max(0) as u64);
            step.progress = 1.0;
            step.output = output;
            let event = ExecutionEvent::new(EventKind::StepCompleted, format!("step '{}' completed", step.name))
                .with_data("index", serde_json::json!(index));
            self.checkpoint.last_successful_step = Some(index);
            self.record_event(event);
        }
        self.recompute_progress();
    }

    pub fn step_failed(&mut self, index: usize, error: &MoverError) {
        if let Some(step) = self.steps.get_mut(index) {
            step.status = StepStatus::Failed;
            step.completed_at = Some(Utc::now());
            step.error = Some(error.to_string());
            let event = ExecutionEvent::new(EventKind::StepFailed, format!("step '{}' failed: {}", step.name, error))
                .with_data("index", serde_json::json!(index))
                .with_data("class", serde_json::json!(error.error_class().to_string()));
            self.record_event(event);
        }
    }

    pub fn step_skipped(&mut self, index: usize, reason: &str) {
        if let Some(step) = self.steps.get_mut(index) {
            step.status = StepStatus::Skipped;
            let event = ExecutionEvent::new(
                EventKind::StepSkipped,
                format!("step '{}' skipped: {}", step.name, reason),
            )
            .with_data("index", serde_json::json!(index));
            self.record_event(event);
        }
        self.recompute_progress();
    }

    /// Resets a failed step for another attempt.
    pub fn step_retried(&mut self, index: usize, delay_secs: f64) {
        if let Some(step) = self.steps.get_mut(index) {
            step.status = StepStatus::Pending;
            step.error = None;
            step.progress = 0.0;
            let event = ExecutionEvent::new(
                EventKind::StepRetried,
                format!("step '{}' scheduled for retry in {:.1}s", step.name, delay_secs),
            )
            .with_data("index", serde_json::json!(index))
            .with_data("attempt", serde_json::json!(step.attempts));
            self.record_event(event);
        }
    }

    /// Updates a running step's local progress and folds it into the
    /// execution figure.
    pub fn update_step_progress(&mut self, index: usize, fraction: f64) {
        if let Some(step) = self.steps.get_mut(index) {
            if step.status == StepStatus::Running {
                step.progress = fraction.clamp(0.0, 1.0);
            }
        }
        self.recompute_progress();
    }

    /// Recomputes the weighted execution progress, holding the high-water
    /// mark so the figure stays monotone within a run.
    pub fn recompute_progress(&mut self) {
        let computed: f64 = self.steps.iter().map(|s| s.weight * s.progress_fraction()).sum();
        if computed > self.progress {
            self.progress = computed.min(1.0);
        }
    }

    /// First step index a resume should execute.
    pub fn resume_index(&self) -> usize {
        self.checkpoint.last_successful_step.map(|i| i + 1).unwrap_or(0)
    }

    /// Names of the steps a resume would run.
    pub fn remaining_step_names(&self) -> Vec<String> {
        self.steps
            .iter()
            .skip(self.resume_index())
            .map(|s| s.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::project_config::{EngineChoice, OnPartialSuccess, WorkflowSettings};

    fn snapshot_with_steps(pre: usize, post: usize) -> WorkflowSnapshot {
        let mut workflow = Workflow {
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
        };
        for i in 0..pre {
            workflow
                .pre_processing
                .push(ProcessingStep::new(format!("pre-{}", i), StepKind::Bundle));
        }
        for i in 0..post {
            workflow
                .post_processing
                .push(ProcessingStep::new(format!("post-{}", i), StepKind::Verify));
        }
        WorkflowSnapshot {
            project_name: "proj".to_string(),
            project_domain: None,
            workflow,
            profile: DataProfile {
                path: "/data".to_string(),
                expected_size_bytes: None,
                expected_file_count: None,
                file_kinds: Vec::new(),
            },
            destination: Destination {
                uri: "s3://bucket/prefix".to_string(),
                storage_class: None,
                encryption: None,
                region: None,
            },
            optimization: OptimizationFlags::default(),
        }
    }

    /// Tests step expansion ordering and weight normalization.
    #[test]
    fn test_step_expansion() {
        let execution = WorkflowExecution::new(snapshot_with_steps(2, 1));
        let names: Vec<&str> = execution.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["analyze", "pre-0", "pre-1", "primary_transfer", "post-0", "report"]);

        let total: f64 = execution.steps.iter().map(|s| s.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);

        let transfer = &execution.steps[3];
        assert!(transfer.weight > 0.7, "transfer keeps the dominant weight");
    }

    /// Tests legal and illegal state transitions.
    #[test]
    fn test_state_machine() {
        let mut execution = WorkflowExecution::new(snapshot_with_steps(0, 0));
        assert_eq!(execution.state, ExecutionState::Pending);

        execution.transition_to(ExecutionState::Running).unwrap();
        execution.transition_to(ExecutionState::Paused).unwrap();
        execution.transition_to(ExecutionState::Running).unwrap();
        execution.transition_to(ExecutionState::Completed).unwrap();

        // Completed is terminal.
        let err = execution.transition_to(ExecutionState::Running).unwrap_err();
        assert!(matches!(err, MoverError::InvalidStateTransition { .. }));
    }

    /// Tests the failed -> running resume edge and its bookkeeping.
    #[test]
    fn test_fail_and_resume() {
        let mut execution = WorkflowExecution::new(snapshot_with_steps(0, 0));
        execution.transition_to(ExecutionState::Running).unwrap();
        execution.step_started(0);
        execution.step_failed(0, &MoverError::Timeout("walk".to_string()));
        execution.fail(&MoverError::Timeout("walk".to_string())).unwrap();
        assert_eq!(execution.state, ExecutionState::Failed);
        assert_eq!(execution.error_class, Some(ErrorClass::Transient));

        execution.resume_run().unwrap();
        assert_eq!(execution.state, ExecutionState::Running);
        assert!(execution.error.is_none());
        assert_eq!(execution.steps[0].status, StepStatus::Pending);
    }

    /// Tests progress monotonicity across step completion and a retry.
    #[test]
    fn test_progress_monotone() {
        let mut execution = WorkflowExecution::new(snapshot_with_steps(0, 0));
        execution.transition_to(ExecutionState::Running).unwrap();

        execution.step_started(0);
        execution.step_completed(0, None);
        let after_analyze = execution.progress;
        assert!(after_analyze > 0.0);

        execution.step_started(1);
        execution.update_step_progress(1, 0.5);
        let mid_transfer = execution.progress;
        assert!(mid_transfer > after_analyze);

        // Retry resets the step but the execution figure holds.
        execution.step_failed(1, &MoverError::NetworkError("reset".to_string()));
        execution.step_retried(1, 0.0);
        execution.recompute_progress();
        assert!(execution.progress >= mid_transfer);

        execution.step_started(1);
        execution.step_completed(1, None);
        execution.step_started(2);
        execution.step_completed(2, None);
        assert!((execution.progress - 1.0).abs() < 1e-9);
    }

    /// Tests the event log is append-only with dense sequence numbers.
    #[test]
    fn test_event_log_ordering() {
        let mut execution = WorkflowExecution::new(snapshot_with_steps(1, 0));
        execution.transition_to(ExecutionState::Running).unwrap();
        execution.step_started(0);
        execution.step_completed(0, None);

        let sequences: Vec<u64> = execution.events.iter().map(|e| e.sequence).collect();
        let expected: Vec<u64> = (0..execution.events.len() as u64).collect();
        assert_eq!(sequences, expected);
    }

    /// Tests checkpoint bookkeeping and resume-index arithmetic.
    #[test]
    fn test_checkpoint_resume_index() {
        let mut execution = WorkflowExecution::new(snapshot_with_steps(1, 1));
        execution.transition_to(ExecutionState::Running).unwrap();
        assert_eq!(execution.resume_index(), 0);

        execution.step_started(0);
        execution.step_completed(0, None);
        execution.step_started(1);
        execution.step_completed(1, None);
        assert_eq!(execution.checkpoint.last_successful_step, Some(1));
        assert_eq!(execution.resume_index(), 2);
        assert_eq!(
            execution.remaining_step_names(),
            vec!["primary_transfer".to_string(), "post-0".to_string(), "report".to_string()]
        );
    }

    /// Tests snapshot capture fails cleanly for unknown workflows.
    #[test]
    fn test_snapshot_unknown_workflow() {
        let config = ProjectConfiguration {
            project: crate::entities::project_config::ProjectMeta {
                name: "p".to_string(),
                owner: String::new(),
                domain: None,
                budget: None,
            },
            data_profiles: Default::default(),
            destinations: Default::default(),
            workflows: Vec::new(),
            optimization: Default::default(),
            settings: Default::default(),
        };
        let err = WorkflowSnapshot::capture(&config, "ghost").unwrap_err();
        assert!(matches!(err, MoverError::WorkflowNotFound(_)));
    }
}
