// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Step Runner
//!
//! Executes one workflow step against the infrastructure: analysis,
//! bundling, compression, the primary transfer, validation, verification,
//! cleanup, and reporting. The workflow engine owns sequencing, retries,
//! and timeouts; the runner owns the side effects of a single attempt.
//!
//! ## Scratch and checkpointing
//!
//! Steps communicate through a [`StepScratch`] record (the analyzed
//! pattern, the staging directory, the transfer outcome). The engine
//! serializes the scratch into the checkpoint's opaque `engine_state`
//! after every successful step, which is exactly what a resume needs to
//! rehydrate.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use datamover_bootstrap::shutdown::CancellationToken;
use datamover_domain::entities::project_config::{EngineChoice, StepKind};
use datamover_domain::entities::transfer::ChecksumMode;
use datamover_domain::services::transfer_engine::{EngineKind, TransferEngine};
use datamover_domain::{
    DataPattern, DomainProfile, MoverError, PartSize, RemoteUri, TransferRequest, TransferResult, WorkerCount,
    WorkflowExecution, WorkflowSnapshot,
};

use crate::infrastructure::analysis::PatternAnalyzer;
use crate::infrastructure::bundling::{BundleInput, Bundler, BundlerConfig};
use crate::infrastructure::engines::archive_bundler::{BundleIndex, INDEX_OBJECT_NAME};
use crate::infrastructure::engines::EngineSelector;
use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::profiles;
use crate::infrastructure::runtime::resource_governor::ResourceGovernor;

/// Inter-step state; serialized into the checkpoint as opaque engine
/// state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepScratch {
    pub pattern: Option<DataPattern>,
    /// Staging directory produced by a bundle/compress pre-step.
    pub staging_dir: Option<String>,
    /// Overrides the transfer source when a pre-step staged data.
    pub effective_source: Option<String>,
    pub transfer_result: Option<TransferResult>,
}

impl StepScratch {
    pub fn to_engine_state(&self) -> Result<String, MoverError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_engine_state(state: Option<&str>) -> Self {
        state
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}

/// Executes individual workflow steps.
pub struct StepRunner {
    analyzer: PatternAnalyzer,
    bundler: Bundler,
    selector: Arc<EngineSelector>,
    metrics: Arc<MetricsService>,
    governor: Arc<ResourceGovernor>,
    staging_base: PathBuf,
    /// Audit mirror for bundle manifests (`<data-dir>/manifests`).
    manifest_mirror: PathBuf,
    progress_poll_interval: Duration,
}

impl StepRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        analyzer: PatternAnalyzer,
        bundler: Bundler,
        selector: Arc<EngineSelector>,
        metrics: Arc<MetricsService>,
        governor: Arc<ResourceGovernor>,
        staging_base: PathBuf,
        manifest_mirror: PathBuf,
        progress_poll_interval: Duration,
    ) -> Self {
        Self {
            analyzer,
            bundler,
            selector,
            metrics,
            governor,
            staging_base,
            manifest_mirror,
            progress_poll_interval,
        }
    }

    pub fn selector(&self) -> &Arc<EngineSelector> {
        &self.selector
    }

    /// Analyzes the snapshot's source; shared with dry-run planning.
    pub async fn analyze_source(
        &self,
        snapshot: &WorkflowSnapshot,
        cancel: &CancellationToken,
    ) -> Result<DataPattern, MoverError> {
        self.analyzer
            .analyze(
                std::path::Path::new(&snapshot.profile.path),
                snapshot.project_domain.as_deref(),
                cancel,
            )
            .await
    }

    /// Resolves the effective domain profile for a run.
    pub fn profile_for(snapshot: &WorkflowSnapshot, pattern: Option<&DataPattern>) -> DomainProfile {
        let detected = pattern.and_then(|p| p.domain_hints.primary().map(str::to_string));
        let domain = snapshot.project_domain.clone().or(detected);
        let small_fraction = pattern.map(|p| p.small_file_fraction()).unwrap_or(0.0);
        profiles::profile_for(domain.as_deref(), small_fraction)
    }

    /// Runs one attempt of the step at `index`.
    pub async fn run_step(
        &self,
        shared: &Arc<RwLock<WorkflowExecution>>,
        index: usize,
        scratch: &mut StepScratch,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, MoverError> {
        let (step_kind, parameters, snapshot, execution_id, partial) = {
            let execution = shared.read();
            let step = execution
                .steps
                .get(index)
                .ok_or_else(|| MoverError::InternalError(format!("step index {} out of range", index)))?;
            (
                step.step_type,
                step.parameters.clone(),
                execution.snapshot.clone(),
                execution.id,
                execution.partial_success,
            )
        };

        if cancel.is_cancelled() {
            return Err(MoverError::Cancelled);
        }

        match step_kind {
            StepKind::Analyze => self.run_analyze(&snapshot, scratch, cancel).await,
            StepKind::Bundle => {
                let staging = self.staging_base.join(execution_id.to_string());
                self.run_bundle(&snapshot, &parameters, scratch, &staging, cancel).await
            }
            StepKind::Compress => {
                let staging = self.staging_base.join(execution_id.to_string());
                self.run_compress(&snapshot, &parameters, scratch, &staging, cancel).await
            }
            StepKind::Transfer => self.run_transfer(shared, index, &snapshot, scratch, cancel).await,
            StepKind::Validate => self.run_validate(&snapshot, scratch).await,
            StepKind::Verify => self.run_verify(&snapshot, scratch),
            StepKind::Cleanup => self.run_cleanup(scratch),
            StepKind::Report => self.run_report(shared, scratch, partial),
        }
    }

    async fn run_analyze(
        &self,
        snapshot: &WorkflowSnapshot,
        scratch: &mut StepScratch,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, MoverError> {
        let pattern = self.analyze_source(snapshot, cancel).await?;
        let output = serde_json::json!({
            "fingerprint": pattern.fingerprint(),
            "total_files": pattern.total_files,
            "total_size_bytes": pattern.total_size_bytes,
            "small_file_percentage": pattern.file_sizes.small_file_percentage,
            "detected_domains": pattern.domain_hints.detected_domains,
            "estimated_bundles": pattern.efficiency.estimated_bundles,
        });
        scratch.pattern = Some(pattern);
        Ok(output)
    }

    async fn run_bundle(
        &self,
        snapshot: &WorkflowSnapshot,
        parameters: &std::collections::BTreeMap<String, serde_json::Value>,
        scratch: &mut StepScratch,
        staging: &std::path::Path,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, MoverError> {
        let source = PathBuf::from(&snapshot.profile.path);
        let compress = parameters
            .get("compress")
            .and_then(|v| v.as_bool())
            .unwrap_or(snapshot.optimization.auto_compression);
        let target_bundle_size = parameters
            .get("target_bundle_size_mib")
            .and_then(|v| v.as_u64())
            .map(|mib| mib * 1024 * 1024)
            .unwrap_or(self.bundler.config().target_bundle_size);

        let bundler = Bundler::new(BundlerConfig {
            target_bundle_size,
            compress,
            ..*self.bundler.config()
        });
        let staging_path = staging.to_path_buf();
        let manifest_mirror = self.manifest_mirror.clone();
        let token = cancel.clone();
        let (bundle_count, member_count, passthrough): (usize, usize, Vec<String>) =
            tokio::task::spawn_blocking(move || -> Result<_, MoverError> {
                let inputs = BundleInput::scan(&source)?;
                let plan = bundler.plan(inputs);
                std::fs::create_dir_all(&staging_path)?;
                std::fs::create_dir_all(&manifest_mirror)?;
                let mut written = Vec::with_capacity(plan.bundles.len());
                for bundle in &plan.bundles {
                    if token.is_cancelled() {
                        return Err(MoverError::Cancelled);
                    }
                    let bundle = bundler.write_bundle(bundle, &staging_path)?;
                    // Manifests also land in the durable audit mirror so
                    // restores work after staging cleanup.
                    std::fs::copy(
                        &bundle.manifest_path,
                        manifest_mirror.join(bundle.manifest.manifest_name()),
                    )?;
                    written.push(bundle);
                }
                // Oversize files bypass bundling but still have to reach
                // the destination: stage them alongside the bundles
                // (hard links when the filesystem allows, copies
                // otherwise) so the transfer addresses one tree.
                for through in &plan.passthrough {
                    if token.is_cancelled() {
                        return Err(MoverError::Cancelled);
                    }
                    let target = staging_path.join(&through.relative_path);
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    if !target.exists() && std::fs::hard_link(&through.absolute_path, &target).is_err() {
                        std::fs::copy(&through.absolute_path, &target)?;
                    }
                }
                let index = BundleIndex {
                    bundles: written.iter().map(|w| w.manifest.bundle_name.clone()).collect(),
                    manifests: written.iter().map(|w| w.manifest.manifest_name()).collect(),
                    passthrough_files: plan.passthrough.iter().map(|p| p.relative_path.clone()).collect(),
                    total_member_files: plan.bundled_file_count() as u64,
                };
                std::fs::write(staging_path.join(INDEX_OBJECT_NAME), serde_json::to_vec_pretty(&index)?)?;
                Ok((
                    written.len(),
                    plan.bundled_file_count(),
                    index.passthrough_files,
                ))
            })
            .await
            .map_err(|e| MoverError::InternalError(format!("bundle task panicked: {}", e)))??;

        scratch.staging_dir = Some(staging.display().to_string());
        scratch.effective_source = Some(staging.display().to_string());
        Ok(serde_json::json!({
            "bundles": bundle_count,
            "bundled_files": member_count,
            "passthrough_files": passthrough.len(),
            "staging_dir": staging.display().to_string(),
            "compressed": compress,
        }))
    }

    async fn run_compress(
        &self,
        snapshot: &WorkflowSnapshot,
        parameters: &std::collections::BTreeMap<String, serde_json::Value>,
        scratch: &mut StepScratch,
        staging: &std::path::Path,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, MoverError> {
        use flate2::write::GzEncoder;
        use std::io::Write;

        let source = PathBuf::from(
            scratch
                .effective_source
                .clone()
                .unwrap_or_else(|| snapshot.profile.path.clone()),
        );
        let min_size = parameters.get("min_size_bytes").and_then(|v| v.as_u64()).unwrap_or(1024);
        let staging_path = staging.join("compressed");
        let token = cancel.clone();

        let (compressed, copied): (u64, u64) = tokio::task::spawn_blocking(move || -> Result<_, MoverError> {
            let mut compressed = 0u64;
            let mut copied = 0u64;
            for input in BundleInput::scan(&source)? {
                if token.is_cancelled() {
                    return Err(MoverError::Cancelled);
                }
                let already_compressed = matches!(
                    input.relative_path.rsplit('.').next(),
                    Some("gz") | Some("zip") | Some("bam") | Some("cram") | Some("laz")
                );
                let dest = staging_path.join(&input.relative_path);
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                if input.size >= min_size && !already_compressed {
                    let target = staging_path.join(format!("{}.gz", input.relative_path));
                    let mut encoder = GzEncoder::new(std::fs::File::create(&target)?, flate2::Compression::default());
                    let mut reader = std::fs::File::open(&input.absolute_path)?;
                    std::io::copy(&mut reader, &mut encoder)?;
                    encoder.finish()?.flush()?;
                    compressed += 1;
                } else {
                    std::fs::copy(&input.absolute_path, &dest)?;
                    copied += 1;
                }
            }
            Ok((compressed, copied))
        })
        .await
        .map_err(|e| MoverError::InternalError(format!("compress task panicked: {}", e)))??;

        scratch.staging_dir = Some(staging.display().to_string());
        scratch.effective_source = Some(staging.join("compressed").display().to_string());
        Ok(serde_json::json!({
            "compressed_files": compressed,
            "copied_files": copied,
        }))
    }

    async fn run_transfer(
        &self,
        shared: &Arc<RwLock<WorkflowExecution>>,
        index: usize,
        snapshot: &WorkflowSnapshot,
        scratch: &mut StepScratch,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, MoverError> {
        let profile = Self::profile_for(snapshot, scratch.pattern.as_ref());

        let source_string = scratch
            .effective_source
            .clone()
            .unwrap_or_else(|| snapshot.profile.path.clone());
        let source = RemoteUri::parse(&source_string)?;
        let destination = RemoteUri::parse(&snapshot.destination.uri)?;

        let settings = &snapshot.workflow.configuration;
        let concurrency = if settings.concurrency > 0 {
            WorkerCount::new(settings.concurrency)?
        } else if snapshot.optimization.auto_concurrency {
            WorkerCount::new(profile.transfer.optimal_concurrency.clamp(1, 128))?
        } else {
            WorkerCount::default_for_cores(datamover_bootstrap::platform::logical_cores())
        };
        let part_size = match settings.part_size_mib {
            Some(mib) => PartSize::from_mib(mib)?,
            None => PartSize::default(),
        };

        let mut request = TransferRequest::new(source.clone(), destination.clone());
        request.concurrency = concurrency;
        request.part_size = part_size;
        request.timeout_seconds = settings.timeout_seconds;
        request.checksum_mode = if profile.security.checksum_required {
            ChecksumMode::Sha256
        } else {
            ChecksumMode::Disabled
        };

        let engine: Arc<dyn TransferEngine> = match snapshot.workflow.engine {
            EngineChoice::Fixed(kind) => self.selector.resolve_fixed(kind).await?,
            // A bundle/compress pre-step already staged the tree into a
            // few large objects, so re-bundling would be wrong: go
            // straight to the bulk path when it is available.
            EngineChoice::Auto if scratch.effective_source.is_some() => {
                match self.selector.resolve_fixed(EngineKind::BulkParallel).await {
                    Ok(engine) => engine,
                    Err(_) => {
                        self.selector
                            .auto_select(None, &profile, &source, &destination)
                            .await?
                    }
                }
            }
            EngineChoice::Auto => {
                self.selector
                    .auto_select(scratch.pattern.as_ref(), &profile, &source, &destination)
                    .await?
            }
        };
        tracing::info!(engine = engine.name(), transfer_id = %request.id, "starting primary transfer");

        let _subprocess_permit = self.governor.acquire_subprocess().await?;

        let transfer = engine.upload(&request);
        tokio::pin!(transfer);
        let mut poll = tokio::time::interval(self.progress_poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                result = &mut transfer => break result,
                _ = poll.tick() => {
                    if let Some(progress) = engine.progress(&request.id) {
                        if let Some(total) = progress.bytes_total {
                            if total > 0 {
                                let fraction = progress.bytes_transferred as f64 / total as f64;
                                shared.write().update_step_progress(index, fraction);
                            }
                        }
                        if let Some(speed) = progress.current_speed_bps {
                            self.metrics.record_speed(speed);
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::info!(transfer_id = %request.id, "cancellation requested; stopping transfer");
                    engine.cancel(&request.id).await?;
                    // The engine unwinds the subprocess and reports
                    // Cancelled from the pinned future.
                    break (&mut transfer).await;
                }
            }
        };

        let result = result?;
        self.metrics.record_transfer(&result);
        if result.partial_success {
            let mut execution = shared.write();
            execution.partial_success = true;
        }
        let output = serde_json::json!({
            "engine": result.engine,
            "bytes_transferred": result.bytes_transferred,
            "files_transferred": result.files_transferred,
            "failed_files": result.failed_files,
            "partial_success": result.partial_success,
            "duration_ms": result.duration_ms,
        });
        scratch.transfer_result = Some(result);
        Ok(output)
    }

    async fn run_validate(
        &self,
        snapshot: &WorkflowSnapshot,
        scratch: &mut StepScratch,
    ) -> Result<serde_json::Value, MoverError> {
        let mut checks = Vec::new();

        let source = PathBuf::from(&snapshot.profile.path);
        if !source.exists() {
            return Err(MoverError::PathNotFound(snapshot.profile.path.clone()));
        }
        checks.push("source path exists");

        let destination = RemoteUri::parse(&snapshot.destination.uri)?;
        checks.push("destination URI well-formed");

        match snapshot.workflow.engine {
            EngineChoice::Fixed(kind) => {
                self.selector.resolve_fixed(kind).await?;
                checks.push("pinned engine available");
            }
            EngineChoice::Auto => {
                let profile = Self::profile_for(snapshot, scratch.pattern.as_ref());
                let source_uri = RemoteUri::parse(&snapshot.profile.path)?;
                self.selector
                    .auto_select(scratch.pattern.as_ref(), &profile, &source_uri, &destination)
                    .await?;
                checks.push("at least one engine available");
            }
        }

        Ok(serde_json::json!({ "checks_passed": checks }))
    }

    fn run_verify(&self, snapshot: &WorkflowSnapshot, scratch: &mut StepScratch) -> Result<serde_json::Value, MoverError> {
        let result = scratch
            .transfer_result
            .as_ref()
            .ok_or_else(|| MoverError::InvalidConfiguration("verify step requires a completed transfer".to_string()))?;

        if !result.success && !result.partial_success {
            return Err(MoverError::TruncatedUpload(format!(
                "transfer {} moved no data",
                result.transfer_id
            )));
        }
        if let Some(pattern) = scratch.pattern.as_ref() {
            if pattern.total_size_bytes > 0 && result.bytes_transferred == 0 && scratch.effective_source.is_none() {
                return Err(MoverError::TruncatedUpload(format!(
                    "source holds {} bytes but the transfer reported none",
                    pattern.total_size_bytes
                )));
            }
        }

        let _ = snapshot;
        Ok(serde_json::json!({
            "verified_files": result.files_transferred,
            "failed_files": result.failed_files.len(),
            "bytes": result.bytes_transferred,
        }))
    }

    fn run_cleanup(&self, scratch: &mut StepScratch) -> Result<serde_json::Value, MoverError> {
        let removed = match scratch.staging_dir.take() {
            Some(dir) => {
                let path = PathBuf::from(&dir);
                if path.exists() {
                    std::fs::remove_dir_all(&path)?;
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        scratch.effective_source = None;
        Ok(serde_json::json!({ "staging_removed": removed }))
    }

    fn run_report(
        &self,
        shared: &Arc<RwLock<WorkflowExecution>>,
        scratch: &mut StepScratch,
        partial: bool,
    ) -> Result<serde_json::Value, MoverError> {
        let execution = shared.read();
        let files_processed = scratch
            .transfer_result
            .as_ref()
            .map(|r| r.files_transferred)
            .unwrap_or(0);
        let failed = scratch
            .transfer_result
            .as_ref()
            .map(|r| r.failed_files.len() as u64)
            .unwrap_or(0);
        let success_rate = if files_processed + failed == 0 {
            100.0
        } else {
            (files_processed as f64 / (files_processed + failed) as f64) * 100.0
        };

        Ok(serde_json::json!({
            "workflow": execution.workflow_name,
            "execution_id": execution.id.to_string(),
            "total_files_processed": files_processed,
            "failed_files": failed,
            "success_rate": success_rate,
            "bytes_transferred": scratch.transfer_result.as_ref().map(|r| r.bytes_transferred).unwrap_or(0),
            "partial_success": partial,
            "steps_completed": execution
                .steps
                .iter()
                .filter(|s| s.status == datamover_domain::StepStatus::Completed)
                .count(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests scratch round trips through the opaque engine-state string
    /// and tolerates garbage input.
    #[test]
    fn test_scratch_round_trip() {
        let mut scratch = StepScratch::default();
        scratch.staging_dir = Some("/tmp/staging".to_string());
        scratch.effective_source = Some("/tmp/staging".to_string());

        let state = scratch.to_engine_state().unwrap();
        let rehydrated = StepScratch::from_engine_state(Some(&state));
        assert_eq!(rehydrated.staging_dir.as_deref(), Some("/tmp/staging"));

        let garbage = StepScratch::from_engine_state(Some("not json"));
        assert!(garbage.staging_dir.is_none());
        let absent = StepScratch::from_engine_state(None);
        assert!(absent.pattern.is_none());
    }
}
