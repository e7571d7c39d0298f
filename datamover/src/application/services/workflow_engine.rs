// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Workflow Engine
//!
//! Owns workflow executions end to end: step sequencing, retries with
//! backoff, per-step timeouts, progress aggregation, cancellation,
//! checkpointing, and persistence. One tokio task drives each execution
//! (steps are totally ordered within a run); a second task polls progress
//! and feeds registered callbacks. A semaphore caps concurrently running
//! executions at `max_concurrent_workflows` (default 3); submissions
//! beyond the cap stay `pending` until a permit frees up.
//!
//! ## Retries
//!
//! Steps get `max_attempts` tries (default 3, overridable per step via a
//! `max_attempts` parameter). Backoff is exponential from the workflow's
//! retry policy base with +/-20% jitter, capped at the policy ceiling.
//! Only transient errors use the full budget; integrity errors are
//! retried exactly once; everything else fails the execution immediately.
//!
//! ## Cancellation
//!
//! `cancel` flips the execution's token. The token is observed between
//! steps, during backoff sleeps, and inside every blocking point of the
//! step runner (which forwards it to subprocesses via terminate-then-
//! kill), so a cancelled execution reaches the `cancelled` state well
//! inside the 30-second contract.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use datamover_bootstrap::shutdown::CancellationToken;
use datamover_domain::entities::project_config::{RetryPolicy, StepKind};
use datamover_domain::services::cost_model::StorageClass;
use datamover_domain::{
    CostCalculator, CostScenario, DataPattern, ErrorClass, EventKind, ExecutionEvent, ExecutionId, ExecutionState,
    ExecutionStore, MoverError, ProjectConfiguration, WorkflowExecution, WorkflowSnapshot,
};

use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::runtime::{ResourceGovernor, StepRunner, StepScratch};

/// Callback invoked with the execution's progress in [0, 1].
pub type ProgressCallback = Box<dyn Fn(f64) + Send + Sync>;

/// Summary row for `workflow list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub id: ExecutionId,
    pub workflow_name: String,
    pub state: ExecutionState,
    pub progress: f64,
}

/// One step of a dry-run plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedStep {
    pub name: String,
    pub step_type: StepKind,
    pub weight: f64,
    pub estimated_duration_secs: f64,
}

/// Full dry-run output: the plan plus cost and time estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub workflow_name: String,
    pub steps: Vec<PlannedStep>,
    pub pattern: Option<DataPattern>,
    pub cost_scenarios: Vec<CostScenario>,
    pub estimated_total_secs: f64,
}

struct ActiveExecution {
    shared: Arc<RwLock<WorkflowExecution>>,
    token: CancellationToken,
    workflow_name: String,
}

struct Inner {
    store: Arc<dyn ExecutionStore>,
    runner: Arc<StepRunner>,
    governor: Arc<ResourceGovernor>,
    metrics: Arc<MetricsService>,
    active: Mutex<HashMap<ExecutionId, ActiveExecution>>,
    callbacks: Mutex<HashMap<ExecutionId, Vec<ProgressCallback>>>,
    poll_interval: Duration,
}

/// The workflow engine.
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<Inner>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        runner: Arc<StepRunner>,
        governor: Arc<ResourceGovernor>,
        metrics: Arc<MetricsService>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                runner,
                governor,
                metrics,
                active: Mutex::new(HashMap::new()),
                callbacks: Mutex::new(HashMap::new()),
                poll_interval,
            }),
        }
    }

    /// Submits a workflow for execution, returning the new execution id.
    ///
    /// # Errors
    ///
    /// - `WorkflowNotFound` for an unknown workflow name
    /// - `AlreadyRunning` when a non-terminal execution of the same
    ///   workflow exists
    /// - `InvalidConfiguration` for disabled workflows
    pub async fn submit(&self, config: &ProjectConfiguration, workflow_name: &str) -> Result<ExecutionId, MoverError> {
        let snapshot = WorkflowSnapshot::capture(config, workflow_name)?;
        if !snapshot.workflow.enabled {
            return Err(MoverError::InvalidConfiguration(format!(
                "workflow '{}' is disabled",
                workflow_name
            )));
        }
        {
            let active = self.inner.active.lock();
            let running = active
                .values()
                .any(|a| a.workflow_name == workflow_name && !a.shared.read().state.is_terminal());
            if running {
                return Err(MoverError::AlreadyRunning(workflow_name.to_string()));
            }
        }

        let execution = WorkflowExecution::new(snapshot);
        let id = execution.id;
        self.inner.store.save(&execution).await?;

        let shared = Arc::new(RwLock::new(execution));
        let token = CancellationToken::new();
        self.inner.active.lock().insert(
            id,
            ActiveExecution {
                shared: Arc::clone(&shared),
                token: token.clone(),
                workflow_name: workflow_name.to_string(),
            },
        );
        tokio::spawn(Self::drive(
            Arc::clone(&self.inner),
            shared,
            token,
            0,
            StepScratch::default(),
        ));
        tracing::info!(execution_id = %id, workflow = workflow_name, "execution submitted");
        Ok(id)
    }

    /// Builds the full plan and estimates without touching external
    /// state.
    pub async fn dry_run(&self, config: &ProjectConfiguration, workflow_name: &str) -> Result<ExecutionPlan, MoverError> {
        let snapshot = WorkflowSnapshot::capture(config, workflow_name)?;
        let steps = WorkflowExecution::expand_steps(&snapshot.workflow);

        // Analysis only reads the source tree; failures degrade the plan
        // to weight-only estimates instead of failing the dry run.
        let token = CancellationToken::new();
        let pattern = self.inner.runner.analyze_source(&snapshot, &token).await.ok();

        let profile = StepRunner::profile_for(&snapshot, pattern.as_ref());
        let calculator = CostCalculator::with_default_rates();
        let region = snapshot.destination.region.clone().unwrap_or_else(|| "us-east-1".to_string());
        let class = snapshot
            .destination
            .storage_class
            .as_deref()
            .and_then(|s| s.parse::<StorageClass>().ok())
            .unwrap_or(StorageClass::Standard);
        let cost_scenarios = match pattern.as_ref() {
            Some(pattern) => calculator.default_scenarios(pattern, Some(&profile), &region, class)?,
            None => Vec::new(),
        };

        // Time estimates assume ~100 MiB/s sustained transfer throughput.
        const ASSUMED_BPS: f64 = 100.0 * 1024.0 * 1024.0;
        let total_bytes = pattern.as_ref().map(|p| p.total_size_bytes).unwrap_or(0) as f64;
        let planned: Vec<PlannedStep> = steps
            .iter()
            .map(|step| {
                let estimated = match step.step_type {
                    StepKind::Transfer => (total_bytes / ASSUMED_BPS).max(1.0),
                    StepKind::Bundle | StepKind::Compress => (total_bytes / (2.0 * ASSUMED_BPS)).max(1.0),
                    StepKind::Analyze => pattern
                        .as_ref()
                        .map(|p| (p.analysis_time_ms as f64 / 1000.0).max(0.1))
                        .unwrap_or(1.0),
                    _ => 1.0,
                };
                PlannedStep {
                    name: step.name.clone(),
                    step_type: step.step_type,
                    weight: step.weight,
                    estimated_duration_secs: estimated,
                }
            })
            .collect();
        let estimated_total_secs = planned.iter().map(|s| s.estimated_duration_secs).sum();

        Ok(ExecutionPlan {
            workflow_name: workflow_name.to_string(),
            steps: planned,
            pattern,
            cost_scenarios,
            estimated_total_secs,
        })
    }

    /// Snapshot of one execution (live or persisted).
    pub async fn get_execution(&self, id: &ExecutionId) -> Result<WorkflowExecution, MoverError> {
        let live = {
            let active = self.inner.active.lock();
            active.get(id).map(|a| a.shared.read().clone())
        };
        match live {
            Some(execution) => Ok(execution),
            None => self.inner.store.load(id).await,
        }
    }

    /// Summaries of all non-terminal executions.
    pub fn list_active(&self) -> Vec<ExecutionSummary> {
        let active = self.inner.active.lock();
        let mut rows: Vec<ExecutionSummary> = active
            .values()
            .map(|a| {
                let execution = a.shared.read();
                ExecutionSummary {
                    id: execution.id,
                    workflow_name: execution.workflow_name.clone(),
                    state: execution.state,
                    progress: execution.progress,
                }
            })
            .filter(|row| !row.state.is_terminal())
            .collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    /// Requests cancellation of a running execution.
    ///
    /// # Errors
    ///
    /// - `ExecutionNotFound` for an unknown id
    /// - `InvalidConfiguration` when the execution is already terminal
    pub async fn cancel(&self, id: &ExecutionId) -> Result<(), MoverError> {
        let live = {
            let active = self.inner.active.lock();
            active.get(id).map(|a| (Arc::clone(&a.shared), a.token.clone()))
        };
        if let Some((shared, token)) = live {
            shared.write().record_event(ExecutionEvent::new(
                EventKind::CancellationRequested,
                "cancellation requested by caller",
            ));
            token.cancel();
            tracing::info!(execution_id = %id, "cancellation requested");
            return Ok(());
        }

        let execution = self.inner.store.load(id).await?;
        Err(MoverError::InvalidConfiguration(format!(
            "execution {} is not running (state: {})",
            id, execution.state
        )))
    }

    /// Resumes a failed or paused execution from its checkpoint.
    pub async fn resume(&self, id: &ExecutionId) -> Result<(), MoverError> {
        if self.inner.active.lock().contains_key(id) {
            return Err(MoverError::AlreadyRunning(id.to_string()));
        }
        let mut execution = self.inner.store.load(id).await?;
        if !matches!(execution.state, ExecutionState::Failed | ExecutionState::Paused) {
            return Err(MoverError::NotRecoverable(format!(
                "execution {} is {} (resume requires failed or paused)",
                id, execution.state
            )));
        }

        // Prefer the independently persisted checkpoint; the snapshot's
        // embedded copy may predate the last step completion on crash.
        if let Some(checkpoint) = self.inner.store.load_checkpoint(id).await? {
            execution.checkpoint = checkpoint;
        }
        let scratch = StepScratch::from_engine_state(execution.checkpoint.engine_state.as_deref());
        let start_index = execution.resume_index();
        execution.current_step = start_index.min(execution.total_steps.saturating_sub(1));
        execution.resume_run()?;
        self.inner.store.save(&execution).await?;

        let workflow_name = execution.workflow_name.clone();
        let shared = Arc::new(RwLock::new(execution));
        let token = CancellationToken::new();
        self.inner.active.lock().insert(
            *id,
            ActiveExecution {
                shared: Arc::clone(&shared),
                token: token.clone(),
                workflow_name,
            },
        );
        tokio::spawn(Self::drive(Arc::clone(&self.inner), shared, token, start_index, scratch));
        tracing::info!(execution_id = %id, start_index, "execution resumed from checkpoint");
        Ok(())
    }

    /// Registers a progress callback for an execution.
    pub fn register_progress_callback(&self, id: &ExecutionId, callback: ProgressCallback) {
        self.inner.callbacks.lock().entry(*id).or_default().push(callback);
    }

    /// Waits until the execution reaches a terminal state (used by
    /// `--follow` and tests).
    pub async fn wait_for_terminal(&self, id: &ExecutionId, timeout: Duration) -> Result<WorkflowExecution, MoverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let execution = self.get_execution(id).await?;
            if execution.state.is_terminal() {
                return Ok(execution);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(MoverError::Timeout(format!(
                    "execution {} still {} after {:?}",
                    id, execution.state, timeout
                )));
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Cancels all active executions and waits for them to drain.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        let tokens: Vec<CancellationToken> = {
            let active = self.inner.active.lock();
            active.values().map(|a| a.token.clone()).collect()
        };
        for token in tokens {
            token.cancel();
        }
        let deadline = tokio::time::Instant::now() + drain_timeout;
        while !self.inner.active.lock().is_empty() {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!("shutdown drain timed out with executions still active");
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    // ----- driver -----

    async fn drive(
        inner: Arc<Inner>,
        shared: Arc<RwLock<WorkflowExecution>>,
        token: CancellationToken,
        start_index: usize,
        mut scratch: StepScratch,
    ) {
        let id = shared.read().id;
        let mut last_logged = 0u64;

        // Bound concurrent executions; stay pending until a permit frees.
        let permit = tokio::select! {
            permit = inner.governor.acquire_workflow() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    let _ = shared.write().fail(&e);
                    Self::persist(&inner, &shared, &mut last_logged).await;
                    Self::finish(&inner, &id).await;
                    return;
                }
            },
            _ = token.cancelled() => {
                // Cancelled while waiting for a permit: the run never
                // started, so only the state machine moves.
                let _ = shared.write().transition_to(ExecutionState::Cancelled);
                Self::persist(&inner, &shared, &mut last_logged).await;
                Self::finish(&inner, &id).await;
                return;
            }
        };

        if shared.read().state == ExecutionState::Pending {
            if shared.write().transition_to(ExecutionState::Running).is_err() {
                Self::finish(&inner, &id).await;
                return;
            }
        }
        inner.metrics.workflow_started();
        Self::persist(&inner, &shared, &mut last_logged).await;

        let poller = tokio::spawn(Self::poll_progress(Arc::clone(&inner), Arc::clone(&shared), id));

        let outcome = Self::run_steps(&inner, &shared, &token, start_index, &mut scratch, &mut last_logged).await;

        match outcome {
            Ok(()) => {
                if shared.write().transition_to(ExecutionState::Completed).is_ok() {
                    inner.metrics.workflow_completed();
                }
            }
            Err(MoverError::Cancelled) => {
                if shared.write().transition_to(ExecutionState::Cancelled).is_ok() {
                    inner.metrics.workflow_cancelled();
                }
                // Partial artifacts stay in place unless a step opted into
                // scrubbing them on cancel.
                let wants_cleanup = shared.read().steps.iter().any(|step| {
                    step.parameters
                        .get("cleanup_on_cancel")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false)
                });
                if wants_cleanup {
                    if let Some(dir) = scratch.staging_dir.take() {
                        let _ = tokio::fs::remove_dir_all(&dir).await;
                    }
                }
            }
            Err(error) => {
                if shared.write().fail(&error).is_ok() {
                    inner.metrics.workflow_failed();
                }
            }
        }
        Self::persist(&inner, &shared, &mut last_logged).await;

        drop(permit);
        poller.abort();
        Self::finish(&inner, &id).await;

        let final_state = shared.read().state;
        tracing::info!(execution_id = %id, state = %final_state, "execution finished");
    }

    async fn run_steps(
        inner: &Arc<Inner>,
        shared: &Arc<RwLock<WorkflowExecution>>,
        token: &CancellationToken,
        start_index: usize,
        scratch: &mut StepScratch,
        last_logged: &mut u64,
    ) -> Result<(), MoverError> {
        let (total, retry_policy, partial_policy) = {
            let execution = shared.read();
            (
                execution.total_steps,
                execution.snapshot.workflow.configuration.retry,
                execution.snapshot.workflow.on_partial_success,
            )
        };

        for index in start_index..total {
            if token.is_cancelled() {
                return Err(MoverError::Cancelled);
            }

            let (step_kind, step_max_attempts, step_timeout_secs, partial) = {
                let execution = shared.read();
                let step = &execution.steps[index];
                (
                    step.step_type,
                    step.parameters
                        .get("max_attempts")
                        .and_then(|v| v.as_u64())
                        .map(|n| n as u32),
                    step.parameters
                        .get("timeout_seconds")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(execution.snapshot.workflow.configuration.timeout_seconds),
                    execution.partial_success,
                )
            };

            // Partial-success policy: report runs, cleanup is skipped,
            // unless the workflow says otherwise.
            if partial {
                let skip = match step_kind {
                    StepKind::Cleanup => !partial_policy.run_cleanup,
                    StepKind::Report => !partial_policy.run_report,
                    _ => false,
                };
                if skip {
                    shared.write().step_skipped(index, "partial-success policy");
                    Self::persist(inner, shared, last_logged).await;
                    continue;
                }
            }

            let max_attempts = step_max_attempts.unwrap_or(retry_policy.max_attempts).max(1);
            let step_timeout = Duration::from_secs(step_timeout_secs.max(1));

            loop {
                shared.write().step_started(index);
                Self::persist(inner, shared, last_logged).await;
                let attempt = shared.read().steps[index].attempts;
                let step_started_at = tokio::time::Instant::now();

                let attempt_result =
                    match tokio::time::timeout(step_timeout, inner.runner.run_step(shared, index, scratch, token)).await
                    {
                        Ok(result) => result,
                        Err(_) => Err(MoverError::Timeout(format!(
                            "step exceeded its {}s budget",
                            step_timeout.as_secs()
                        ))),
                    };

                match attempt_result {
                    Ok(output) => {
                        inner
                            .metrics
                            .observe_step_duration(step_kind, step_started_at.elapsed().as_secs_f64());
                        let checkpoint = {
                            let mut execution = shared.write();
                            execution.step_completed(index, Some(output));
                            execution.checkpoint.engine_state = scratch.to_engine_state().ok();
                            execution.record_event(ExecutionEvent::new(
                                EventKind::CheckpointSaved,
                                format!("checkpoint after step {}", index),
                            ));
                            execution.checkpoint.clone()
                        };
                        let id = shared.read().id;
                        if let Err(e) = inner.store.save_checkpoint(&id, &checkpoint).await {
                            tracing::warn!(execution_id = %id, "failed to persist checkpoint: {}", e);
                        }
                        Self::persist(inner, shared, last_logged).await;
                        break;
                    }
                    Err(MoverError::Cancelled) => {
                        shared.write().step_failed(index, &MoverError::Cancelled);
                        Self::persist(inner, shared, last_logged).await;
                        return Err(MoverError::Cancelled);
                    }
                    Err(error) => {
                        shared.write().step_failed(index, &error);

                        // Transient errors use the attempt budget;
                        // integrity errors get exactly one retry.
                        let allowed = match error.error_class() {
                            ErrorClass::Transient => max_attempts,
                            ErrorClass::Integrity => max_attempts.min(2),
                            _ => attempt,
                        };
                        if attempt < allowed && !token.is_cancelled() {
                            let delay = backoff_delay(&retry_policy, attempt);
                            shared.write().step_retried(index, delay.as_secs_f64());
                            Self::persist(inner, shared, last_logged).await;
                            tracing::warn!(
                                step = index,
                                attempt,
                                "step failed ({}); retrying in {:.1}s",
                                error,
                                delay.as_secs_f64()
                            );
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = token.cancelled() => return Err(MoverError::Cancelled),
                            }
                            continue;
                        }
                        Self::persist(inner, shared, last_logged).await;
                        return Err(error);
                    }
                }
            }
        }
        Ok(())
    }

    async fn poll_progress(inner: Arc<Inner>, shared: Arc<RwLock<WorkflowExecution>>, id: ExecutionId) {
        let mut interval = tokio::time::interval(inner.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let (progress, terminal) = {
                let execution = shared.read();
                (execution.progress, execution.state.is_terminal())
            };
            {
                let callbacks = inner.callbacks.lock();
                if let Some(listeners) = callbacks.get(&id) {
                    for callback in listeners {
                        callback(progress);
                    }
                }
            }
            if terminal {
                break;
            }
        }
    }

    /// Persists the snapshot and appends any events not yet logged.
    async fn persist(inner: &Arc<Inner>, shared: &Arc<RwLock<WorkflowExecution>>, last_logged: &mut u64) {
        let (clone, new_events) = {
            let execution = shared.read();
            let new_events: Vec<ExecutionEvent> = execution
                .events
                .iter()
                .filter(|e| e.sequence >= *last_logged)
                .cloned()
                .collect();
            (execution.clone(), new_events)
        };
        if let Err(e) = inner.store.save(&clone).await {
            tracing::warn!(execution_id = %clone.id, "failed to persist snapshot: {}", e);
        }
        for event in &new_events {
            if let Err(e) = inner.store.append_log(&clone.id, event).await {
                tracing::warn!(execution_id = %clone.id, "failed to append event log: {}", e);
            }
        }
        *last_logged = clone.events.len() as u64;
    }

    async fn finish(inner: &Arc<Inner>, id: &ExecutionId) {
        inner.active.lock().remove(id);
        inner.callbacks.lock().remove(id);
    }
}

/// Exponential backoff with +/-20% jitter, capped by the policy ceiling.
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base = policy.backoff_base_secs.saturating_mul(1u64 << exponent);
    let capped = base.min(policy.backoff_cap_secs) as f64;
    let jitter = 1.0 + (rand::random::<f64>() * 0.4 - 0.2);
    Duration::from_secs_f64((capped * jitter).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use datamover_domain::entities::project_config::{
        DataProfile, Destination, EngineChoice, OnPartialSuccess, OptimizationFlags, ProjectMeta, Workflow,
        WorkflowSettings,
    };
    use datamover_domain::services::transfer_engine::{EngineCapabilities, EngineKind, TransferEngine};
    use datamover_domain::{
        CostCalculator, TransferId, TransferProgress, TransferRequest, TransferResult, UriScheme,
    };
    use std::collections::VecDeque;

    use crate::infrastructure::analysis::PatternAnalyzer;
    use crate::infrastructure::bundling::Bundler;
    use crate::infrastructure::engines::EngineSelector;
    use crate::infrastructure::persistence::JsonExecutionStore;

    #[derive(Clone)]
    enum MockBehavior {
        Succeed { bytes: u64, files: u64 },
        FailTransient,
        FailUnknown,
        Hang,
    }

    struct MockEngine {
        behaviors: Mutex<VecDeque<MockBehavior>>,
        cancel_token: CancellationToken,
    }

    impl MockEngine {
        fn scripted(behaviors: Vec<MockBehavior>) -> Arc<Self> {
            Arc::new(Self {
                behaviors: Mutex::new(behaviors.into()),
                cancel_token: CancellationToken::new(),
            })
        }

        fn next(&self) -> MockBehavior {
            self.behaviors
                .lock()
                .pop_front()
                .unwrap_or(MockBehavior::Succeed { bytes: 0, files: 0 })
        }
    }

    #[async_trait]
    impl TransferEngine for MockEngine {
        fn name(&self) -> &str {
            "mock"
        }

        fn kind(&self) -> EngineKind {
            EngineKind::BulkParallel
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities {
                schemes: vec![UriScheme::File, UriScheme::S3],
                multipart: true,
                checksum: true,
                resume: false,
                bandwidth_limit: false,
            }
        }

        async fn upload(&self, request: &TransferRequest) -> Result<TransferResult, MoverError> {
            match self.next() {
                MockBehavior::Succeed { bytes, files } => Ok(TransferResult::succeeded(
                    request.id,
                    EngineKind::BulkParallel,
                    bytes,
                    files,
                    Duration::from_millis(5),
                )),
                MockBehavior::FailTransient => Err(MoverError::NetworkError("simulated timeout".to_string())),
                MockBehavior::FailUnknown => Err(MoverError::InternalError("simulated crash".to_string())),
                MockBehavior::Hang => {
                    self.cancel_token.cancelled().await;
                    Err(MoverError::Cancelled)
                }
            }
        }

        async fn download(&self, request: &TransferRequest) -> Result<TransferResult, MoverError> {
            self.upload(request).await
        }

        async fn sync(&self, request: &TransferRequest) -> Result<TransferResult, MoverError> {
            self.upload(request).await
        }

        fn progress(&self, _transfer_id: &TransferId) -> Option<TransferProgress> {
            None
        }

        async fn cancel(&self, _transfer_id: &TransferId) -> Result<(), MoverError> {
            self.cancel_token.cancel();
            Ok(())
        }
    }

    struct Fixture {
        engine: WorkflowEngine,
        config: ProjectConfiguration,
        _source: tempfile::TempDir,
        _data: tempfile::TempDir,
    }

    fn fixture(mock: Arc<MockEngine>) -> Fixture {
        let source = tempfile::TempDir::new().unwrap();
        for i in 0..5 {
            std::fs::write(source.path().join(format!("r{}.fastq", i)), vec![0u8; 256]).unwrap();
        }
        let data = tempfile::TempDir::new().unwrap();

        let store = Arc::new(JsonExecutionStore::open(data.path()).unwrap());
        let metrics = Arc::new(MetricsService::new().unwrap());
        let governor = Arc::new(ResourceGovernor::new(3));
        let selector = Arc::new(EngineSelector::new(vec![mock as Arc<dyn TransferEngine>]));
        let runner = Arc::new(StepRunner::new(
            PatternAnalyzer::with_workers(CostCalculator::with_default_rates(), 2),
            Bundler::default(),
            selector,
            Arc::clone(&metrics),
            Arc::clone(&governor),
            data.path().join("staging"),
            data.path().join("manifests"),
            Duration::from_millis(20),
        ));
        let engine = WorkflowEngine::new(store, runner, governor, metrics, Duration::from_millis(20));

        let mut config = ProjectConfiguration {
            project: ProjectMeta {
                name: "test-project".to_string(),
                owner: "tests".to_string(),
                domain: Some("genomics".to_string()),
                budget: None,
            },
            data_profiles: Default::default(),
            destinations: Default::default(),
            workflows: Vec::new(),
            optimization: OptimizationFlags::default(),
            settings: Default::default(),
        };
        config.data_profiles.insert(
            "reads".to_string(),
            DataProfile {
                path: source.path().display().to_string(),
                expected_size_bytes: None,
                expected_file_count: None,
                file_kinds: vec!["fastq".to_string()],
            },
        );
        config.destinations.insert(
            "archive".to_string(),
            Destination {
                uri: "s3://bucket/reads".to_string(),
                storage_class: Some("standard".to_string()),
                encryption: None,
                region: Some("us-east-1".to_string()),
            },
        );
        config.workflows.push(Workflow {
            name: "upload".to_string(),
            enabled: true,
            source: "reads".to_string(),
            destination: "archive".to_string(),
            engine: EngineChoice::Fixed(EngineKind::BulkParallel),
            schedule: None,
            pre_processing: Vec::new(),
            post_processing: Vec::new(),
            configuration: WorkflowSettings {
                concurrency: 4,
                part_size_mib: None,
                timeout_seconds: 30,
                retry: RetryPolicy {
                    max_attempts: 3,
                    backoff_base_secs: 0,
                    backoff_cap_secs: 0,
                },
            },
            on_partial_success: OnPartialSuccess::default(),
        });

        Fixture {
            engine,
            config,
            _source: source,
            _data: data,
        }
    }

    /// Tests a full run to completion: state machine, progress, events,
    /// checkpoint position.
    #[tokio::test]
    async fn test_execute_to_completion() {
        let fixture = fixture(MockEngine::scripted(vec![MockBehavior::Succeed {
            bytes: 1280,
            files: 5,
        }]));

        let id = fixture.engine.submit(&fixture.config, "upload").await.unwrap();
        let execution = fixture
            .engine
            .wait_for_terminal(&id, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(execution.state, ExecutionState::Completed);
        assert!((execution.progress - 1.0).abs() < 1e-9);
        assert!(execution
            .steps
            .iter()
            .all(|s| s.status == datamover_domain::StepStatus::Completed));
        assert_eq!(execution.checkpoint.last_successful_step, Some(execution.total_steps - 1));

        // Event log is dense and ordered.
        let sequences: Vec<u64> = execution.events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (0..execution.events.len() as u64).collect::<Vec<_>>());
    }

    /// Tests transient failures are retried with backoff and eventually
    /// succeed (scenario: simulated network timeout on the first
    /// attempt).
    #[tokio::test]
    async fn test_retry_on_transient_failure() {
        let fixture = fixture(MockEngine::scripted(vec![
            MockBehavior::FailTransient,
            MockBehavior::Succeed { bytes: 1280, files: 5 },
        ]));

        let id = fixture.engine.submit(&fixture.config, "upload").await.unwrap();
        let execution = fixture
            .engine
            .wait_for_terminal(&id, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(execution.state, ExecutionState::Completed);
        let transfer = execution
            .steps
            .iter()
            .find(|s| s.step_type == StepKind::Transfer)
            .unwrap();
        assert_eq!(transfer.attempts, 2);
        assert!(execution.events.iter().any(|e| e.kind == EventKind::StepRetried));
    }

    /// Tests non-retryable failures surface immediately with the error
    /// classified.
    #[tokio::test]
    async fn test_unknown_error_fails_fast() {
        let fixture = fixture(MockEngine::scripted(vec![MockBehavior::FailUnknown]));

        let id = fixture.engine.submit(&fixture.config, "upload").await.unwrap();
        let execution = fixture
            .engine
            .wait_for_terminal(&id, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(execution.state, ExecutionState::Failed);
        assert_eq!(execution.error_class, Some(ErrorClass::Unknown));
        let transfer = execution
            .steps
            .iter()
            .find(|s| s.step_type == StepKind::Transfer)
            .unwrap();
        assert_eq!(transfer.attempts, 1, "unknown errors must not burn retries");
    }

    /// Tests cancellation mid-transfer reaches `cancelled` and the
    /// subprocess-equivalent is told to stop.
    #[tokio::test]
    async fn test_cancel_during_transfer() {
        let fixture = fixture(MockEngine::scripted(vec![MockBehavior::Hang]));

        let id = fixture.engine.submit(&fixture.config, "upload").await.unwrap();

        // Let the execution get into the hanging transfer step.
        tokio::time::sleep(Duration::from_millis(300)).await;
        fixture.engine.cancel(&id).await.unwrap();

        let execution = fixture
            .engine
            .wait_for_terminal(&id, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(execution.state, ExecutionState::Cancelled);
        assert!(execution
            .events
            .iter()
            .any(|e| e.kind == EventKind::CancellationRequested));

        // Cancelling a terminal execution reports not-running.
        assert!(fixture.engine.cancel(&id).await.is_err());
    }

    /// Tests resume-from-checkpoint re-runs only the failed suffix and
    /// keeps the event history of both runs.
    #[tokio::test]
    async fn test_resume_from_checkpoint() {
        let fixture = fixture(MockEngine::scripted(vec![
            MockBehavior::FailUnknown,
            MockBehavior::Succeed { bytes: 1280, files: 5 },
        ]));

        let id = fixture.engine.submit(&fixture.config, "upload").await.unwrap();
        let failed = fixture
            .engine
            .wait_for_terminal(&id, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(failed.state, ExecutionState::Failed);
        let events_after_failure = failed.events.len();
        // Analyze succeeded, so the checkpoint sits at step 0.
        assert_eq!(failed.checkpoint.last_successful_step, Some(0));

        fixture.engine.resume(&id).await.unwrap();
        let resumed = fixture
            .engine
            .wait_for_terminal(&id, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(resumed.state, ExecutionState::Completed);
        // The analyze step was not re-run.
        assert_eq!(resumed.steps[0].attempts, 1);
        // Events from both runs, still strictly ordered.
        assert!(resumed.events.len() > events_after_failure);
        let sequences: Vec<u64> = resumed.events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (0..resumed.events.len() as u64).collect::<Vec<_>>());
    }

    /// Tests dry-run returns the full plan without creating an execution.
    #[tokio::test]
    async fn test_dry_run_no_side_effects() {
        let fixture = fixture(MockEngine::scripted(vec![]));

        let plan = fixture.engine.dry_run(&fixture.config, "upload").await.unwrap();
        let names: Vec<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["analyze", "primary_transfer", "report"]);
        assert!(plan.pattern.is_some());
        assert_eq!(plan.cost_scenarios.len(), 4);
        assert!(plan.estimated_total_secs > 0.0);

        // No execution was persisted or started.
        assert!(fixture.engine.list_active().is_empty());
        let store = JsonExecutionStore::open(fixture._data.path()).unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    /// Tests duplicate submission of a running workflow is rejected.
    #[tokio::test]
    async fn test_already_running() {
        let fixture = fixture(MockEngine::scripted(vec![MockBehavior::Hang]));

        let id = fixture.engine.submit(&fixture.config, "upload").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let duplicate = fixture.engine.submit(&fixture.config, "upload").await;
        assert!(matches!(duplicate, Err(MoverError::AlreadyRunning(_))));

        let ghost = fixture.engine.submit(&fixture.config, "no-such-workflow").await;
        assert!(matches!(ghost, Err(MoverError::WorkflowNotFound(_))));

        fixture.engine.cancel(&id).await.unwrap();
        fixture
            .engine
            .wait_for_terminal(&id, Duration::from_secs(10))
            .await
            .unwrap();
    }

    /// Tests progress callbacks fire while the execution runs.
    #[tokio::test]
    async fn test_progress_callbacks() {
        let fixture = fixture(MockEngine::scripted(vec![MockBehavior::Succeed {
            bytes: 1280,
            files: 5,
        }]));

        let observed = Arc::new(Mutex::new(Vec::<f64>::new()));
        let sink = Arc::clone(&observed);

        let id = fixture.engine.submit(&fixture.config, "upload").await.unwrap();
        fixture
            .engine
            .register_progress_callback(&id, Box::new(move |p| sink.lock().push(p)));

        fixture
            .engine
            .wait_for_terminal(&id, Duration::from_secs(10))
            .await
            .unwrap();

        let samples = observed.lock();
        // Monotone samples within the run.
        for pair in samples.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    /// Tests the backoff schedule is exponential, jittered, and capped.
    #[test]
    fn test_backoff_delay() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff_base_secs: 30,
            backoff_cap_secs: 300,
        };
        for attempt in 1..=6u32 {
            let nominal = (30u64 * (1 << (attempt - 1))).min(300) as f64;
            let delay = backoff_delay(&policy, attempt).as_secs_f64();
            assert!(delay >= nominal * 0.8 - 1e-9, "attempt {}: {} < {}", attempt, delay, nominal);
            assert!(delay <= nominal * 1.2 + 1e-9, "attempt {}: {} > {}", attempt, delay, nominal);
        }
    }
}
