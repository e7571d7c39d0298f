// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared fixtures: a scripted transfer engine and configuration
//! builders.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use datamover_domain::entities::project_config::{
    DataProfile, Destination, EngineChoice, OnPartialSuccess, OptimizationFlags, ProcessingStep, ProjectConfiguration,
    ProjectMeta, RetryPolicy, StepKind, Workflow, WorkflowSettings,
};
use datamover_domain::services::transfer_engine::{EngineCapabilities, EngineKind, TransferEngine};
use datamover_domain::{
    CostCalculator, MoverError, TransferId, TransferProgress, TransferRequest, TransferResult, UriScheme,
};

use datamover::application::services::workflow_engine::WorkflowEngine;
use datamover::infrastructure::analysis::PatternAnalyzer;
use datamover::infrastructure::bundling::Bundler;
use datamover::infrastructure::engines::EngineSelector;
use datamover::infrastructure::metrics::MetricsService;
use datamover::infrastructure::persistence::JsonExecutionStore;
use datamover::infrastructure::runtime::{ResourceGovernor, StepRunner};

/// One scripted response of the fake backend.
#[derive(Clone)]
pub enum Scripted {
    /// Report success, echoing the local source's real totals.
    SucceedWithSourceTotals,
    FailTransient,
    FailUnknown,
}

/// Transfer engine that replays a script and records every request.
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Scripted>>,
    pub requests: Mutex<Vec<TransferRequest>>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn next(&self) -> Scripted {
        self.script
            .lock()
            .pop_front()
            .unwrap_or(Scripted::SucceedWithSourceTotals)
    }
}

#[async_trait]
impl TransferEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
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
        self.requests.lock().push(request.clone());
        match self.next() {
            Scripted::SucceedWithSourceTotals => {
                let (files, bytes) = request
                    .source
                    .local_path()
                    .map(|path| walk_totals(&path))
                    .unwrap_or((0, 0));
                Ok(TransferResult::succeeded(
                    request.id,
                    EngineKind::BulkParallel,
                    bytes,
                    files,
                    Duration::from_millis(10),
                ))
            }
            Scripted::FailTransient => Err(MoverError::Timeout("scripted timeout".to_string())),
            Scripted::FailUnknown => Err(MoverError::InternalError("scripted crash".to_string())),
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
        Ok(())
    }
}

fn walk_totals(path: &Path) -> (u64, u64) {
    let mut files = 0u64;
    let mut bytes = 0u64;
    for entry in walkdir::WalkDir::new(path).into_iter().flatten() {
        if entry.file_type().is_file() {
            files += 1;
            bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    (files, bytes)
}

/// Writes `count` files of `size` bytes with the given extension.
pub fn build_tree(dir: &Path, count: usize, size: usize, extension: &str) {
    for i in 0..count {
        std::fs::write(dir.join(format!("file-{:05}.{}", i, extension)), vec![7u8; size]).unwrap();
    }
}

/// A one-workflow configuration over `source`, with optional bundle
/// pre-step and verify/cleanup post-steps.
pub fn project_config(source: &Path, with_bundle: bool, with_post: bool) -> ProjectConfiguration {
    let mut config = ProjectConfiguration {
        project: ProjectMeta {
            name: "integration".to_string(),
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
        "data".to_string(),
        DataProfile {
            path: source.display().to_string(),
            expected_size_bytes: None,
            expected_file_count: None,
            file_kinds: vec!["fastq".to_string()],
        },
    );
    config.destinations.insert(
        "archive".to_string(),
        Destination {
            uri: "s3://integration-bucket/data".to_string(),
            storage_class: Some("standard".to_string()),
            encryption: None,
            region: Some("us-east-1".to_string()),
        },
    );

    let mut workflow = Workflow {
        name: "move-data".to_string(),
        enabled: true,
        source: "data".to_string(),
        destination: "archive".to_string(),
        engine: EngineChoice::Fixed(EngineKind::BulkParallel),
        schedule: None,
        pre_processing: Vec::new(),
        post_processing: Vec::new(),
        configuration: WorkflowSettings {
            concurrency: 4,
            part_size_mib: None,
            timeout_seconds: 60,
            retry: RetryPolicy {
                max_attempts: 3,
                backoff_base_secs: 0,
                backoff_cap_secs: 0,
            },
        },
        on_partial_success: OnPartialSuccess::default(),
    };
    if with_bundle {
        let mut bundle = ProcessingStep::new("bundle-small", StepKind::Bundle);
        bundle
            .parameters
            .insert("target_bundle_size_mib".to_string(), serde_json::json!(64));
        workflow.pre_processing.push(bundle);
    }
    if with_post {
        workflow
            .post_processing
            .push(ProcessingStep::new("verify", StepKind::Verify));
        workflow
            .post_processing
            .push(ProcessingStep::new("cleanup", StepKind::Cleanup));
    }
    config.workflows.push(workflow);
    config
}

/// Engine + store fixture over a scripted backend.
pub struct Harness {
    pub engine: WorkflowEngine,
    pub store: Arc<JsonExecutionStore>,
    pub data_dir: tempfile::TempDir,
}

pub fn harness(scripted: Arc<ScriptedEngine>) -> Harness {
    let data_dir = tempfile::TempDir::new().unwrap();
    let store = Arc::new(JsonExecutionStore::open(data_dir.path()).unwrap());
    let metrics = Arc::new(MetricsService::new().unwrap());
    let governor = Arc::new(ResourceGovernor::new(3));
    let selector = Arc::new(EngineSelector::new(vec![scripted as Arc<dyn TransferEngine>]));
    let runner = Arc::new(StepRunner::new(
        PatternAnalyzer::with_workers(CostCalculator::with_default_rates(), 2),
        Bundler::default(),
        selector,
        Arc::clone(&metrics),
        Arc::clone(&governor),
        data_dir.path().join("staging"),
        data_dir.path().join("manifests"),
        Duration::from_millis(20),
    ));
    let engine = WorkflowEngine::new(
        Arc::clone(&store) as Arc<dyn datamover_domain::ExecutionStore>,
        runner,
        governor,
        metrics,
        Duration::from_millis(20),
    );
    Harness {
        engine,
        store,
        data_dir,
    }
}
