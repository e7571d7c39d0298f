// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Archival Bundler Adapter
//!
//! Composite engine for small-file trees: stages bundles (plus their
//! manifests and an index object) into a temporary area via the bundling
//! engine, then delegates the actual byte movement to the bulk-parallel
//! adapter. Files larger than the bundle cap pass through and are uploaded
//! unchanged from the original source.
//!
//! The index object (`bundle-index.json`) is written beside the bundles so
//! a later `download` can discover the manifests without listing the
//! remote prefix.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use datamover_domain::services::transfer_engine::{EngineCapabilities, EngineKind, TransferEngine};
use datamover_domain::{
    MoverError, RemoteUri, TransferId, TransferProgress, TransferRequest, TransferResult, UriScheme,
};

use super::bulk_parallel::BulkParallelEngine;
use crate::infrastructure::bundling::{BundleInput, BundleManifest, Bundler, WrittenBundle};

/// Name of the index object written beside the bundles.
pub const INDEX_OBJECT_NAME: &str = "bundle-index.json";

/// Discovery record for a bundled upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleIndex {
    pub bundles: Vec<String>,
    pub manifests: Vec<String>,
    pub passthrough_files: Vec<String>,
    pub total_member_files: u64,
}

struct ActiveComposite {
    inner_engine: Arc<BulkParallelEngine>,
    inner_id: Mutex<Option<TransferId>>,
    /// Bytes and files completed by already-finished sub-transfers.
    completed: Mutex<(u64, u64)>,
}

/// Composite archival-bundler engine.
pub struct ArchiveBundlerEngine {
    bundler: Bundler,
    inner: Arc<BulkParallelEngine>,
    name: String,
    transfers: Arc<Mutex<HashMap<TransferId, Arc<ActiveComposite>>>>,
}

impl ArchiveBundlerEngine {
    pub fn new(bundler: Bundler, inner: Arc<BulkParallelEngine>) -> Self {
        let name = format!("archival-bundler (over {})", inner.name());
        Self {
            bundler,
            inner,
            name,
            transfers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Stages bundles for a source tree and returns the staging handle.
    fn stage(
        bundler: &Bundler,
        source_root: &Path,
        files: Option<&[String]>,
        staging: &Path,
    ) -> Result<(Vec<WrittenBundle>, BundleIndex), MoverError> {
        let mut inputs = BundleInput::scan(source_root)?;
        if let Some(list) = files {
            let allowed: std::collections::BTreeSet<&str> = list.iter().map(String::as_str).collect();
            inputs.retain(|input| allowed.contains(input.relative_path.as_str()));
        }
        let plan = bundler.plan(inputs);
        let written = bundler.write_all(&plan, staging)?;

        let index = BundleIndex {
            bundles: written.iter().map(|w| w.manifest.bundle_name.clone()).collect(),
            manifests: written.iter().map(|w| w.manifest.manifest_name()).collect(),
            passthrough_files: plan.passthrough.iter().map(|p| p.relative_path.clone()).collect(),
            total_member_files: plan.bundled_file_count() as u64,
        };
        let index_path = staging.join(INDEX_OBJECT_NAME);
        let tmp = staging.join(format!(".tmp-{}", INDEX_OBJECT_NAME));
        std::fs::write(&tmp, serde_json::to_vec_pretty(&index)?)?;
        std::fs::rename(&tmp, &index_path)?;

        Ok((written, index))
    }

    /// Runs one delegated sub-transfer, wiring its id into the composite
    /// progress record.
    async fn run_inner(
        &self,
        composite: &Arc<ActiveComposite>,
        request: TransferRequest,
        upload: bool,
    ) -> Result<TransferResult, MoverError> {
        *composite.inner_id.lock() = Some(request.id);
        let result = if upload {
            self.inner.upload(&request).await
        } else {
            self.inner.download(&request).await
        };
        *composite.inner_id.lock() = None;
        if let Ok(ref done) = result {
            let mut completed = composite.completed.lock();
            completed.0 += done.bytes_transferred;
            completed.1 += done.files_transferred;
        }
        result
    }

    fn sub_request(template: &TransferRequest, source: RemoteUri, destination: RemoteUri) -> TransferRequest {
        TransferRequest {
            id: TransferId::new(),
            source,
            destination,
            files: None,
            ..template.clone()
        }
    }
}

#[async_trait]
impl TransferEngine for ArchiveBundlerEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EngineKind {
        EngineKind::ArchivalBundler
    }

    async fn is_available(&self) -> bool {
        // Bundling is in-process; availability reduces to the delegate CLI.
        self.inner.is_available().await
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
        let source_root = request.source.local_path().ok_or_else(|| {
            MoverError::InvalidConfiguration("archival-bundler upload requires a local source".to_string())
        })?;
        let started = Instant::now();

        let composite = Arc::new(ActiveComposite {
            inner_engine: Arc::clone(&self.inner),
            inner_id: Mutex::new(None),
            completed: Mutex::new((0, 0)),
        });
        self.transfers.lock().insert(request.id, Arc::clone(&composite));

        let outcome = async {
            // Bundling is CPU/IO heavy; keep it off the async workers.
            let bundler = self.bundler.clone();
            let staging = tempfile::TempDir::new()?;
            let staging_path = staging.path().to_path_buf();
            let files = request.files.clone();
            let source_for_stage = source_root.clone();
            let (_written, index) = tokio::task::spawn_blocking(move || {
                Self::stage(&bundler, &source_for_stage, files.as_deref(), &staging_path)
            })
            .await
            .map_err(|e| MoverError::InternalError(format!("staging task panicked: {}", e)))??;

            // 1. Bundles, manifests, and the index object.
            let staging_uri = RemoteUri::parse(&staging.path().display().to_string())?;
            let bundles_request = Self::sub_request(request, staging_uri, request.destination.clone());
            let bundle_result = self.run_inner(&composite, bundles_request, true).await?;

            // 2. Oversize files go up unchanged from the original source.
            let mut passthrough_result: Option<TransferResult> = None;
            if !index.passthrough_files.is_empty() {
                let mut sub = Self::sub_request(request, request.source.clone(), request.destination.clone());
                sub.files = Some(index.passthrough_files.clone());
                passthrough_result = Some(self.run_inner(&composite, sub, true).await?);
            }

            let (bytes, _) = *composite.completed.lock();
            let mut failed = bundle_result.failed_files.clone();
            let mut files_processed = index.total_member_files;
            if let Some(ref pass) = passthrough_result {
                failed.extend(pass.failed_files.iter().cloned());
                files_processed += pass.files_transferred;
            }

            let mut result = TransferResult::succeeded(
                request.id,
                EngineKind::ArchivalBundler,
                bytes,
                files_processed,
                started.elapsed(),
            );
            if !failed.is_empty() {
                result = result.with_failures(failed);
            }
            result.retry_count = bundle_result.retry_count;
            Ok(result)
        }
        .await;

        self.transfers.lock().remove(&request.id);
        outcome
    }

    async fn download(&self, request: &TransferRequest) -> Result<TransferResult, MoverError> {
        let dest_root = request.destination.local_path().ok_or_else(|| {
            MoverError::InvalidConfiguration("archival-bundler download requires a local destination".to_string())
        })?;
        let started = Instant::now();

        let composite = Arc::new(ActiveComposite {
            inner_engine: Arc::clone(&self.inner),
            inner_id: Mutex::new(None),
            completed: Mutex::new((0, 0)),
        });
        self.transfers.lock().insert(request.id, Arc::clone(&composite));

        let outcome = async {
            // Pull the whole prefix (bundles + manifests + index) into a
            // staging area, then restore members to the destination.
            let staging = tempfile::TempDir::new()?;
            let staging_uri = RemoteUri::parse(&staging.path().display().to_string())?;
            let pull = Self::sub_request(request, request.source.clone(), staging_uri);
            self.run_inner(&composite, pull, false).await?;

            let index_path = staging.path().join(INDEX_OBJECT_NAME);
            let index: BundleIndex = serde_json::from_slice(&std::fs::read(&index_path)?)?;

            let bundler = self.bundler.clone();
            let staging_path = staging.path().to_path_buf();
            let dest = dest_root.clone();
            let manifests = index.manifests.clone();
            let restored: u64 = tokio::task::spawn_blocking(move || -> Result<u64, MoverError> {
                let mut total = 0u64;
                for manifest_name in &manifests {
                    let manifest = BundleManifest::load(&staging_path.join(manifest_name))?;
                    let bundle_path = staging_path.join(&manifest.bundle_name);
                    total += bundler.restore(&manifest, &bundle_path, &dest)?;
                }
                Ok(total)
            })
            .await
            .map_err(|e| MoverError::InternalError(format!("restore task panicked: {}", e)))??;

            let (bytes, _) = *composite.completed.lock();
            Ok(TransferResult::succeeded(
                request.id,
                EngineKind::ArchivalBundler,
                bytes,
                restored,
                started.elapsed(),
            ))
        }
        .await;

        self.transfers.lock().remove(&request.id);
        outcome
    }

    async fn sync(&self, request: &TransferRequest) -> Result<TransferResult, MoverError> {
        // Content-addressed bundle names make re-upload reconciliation
        // free: unchanged inputs produce identical object names.
        self.upload(request).await
    }

    fn progress(&self, transfer_id: &TransferId) -> Option<TransferProgress> {
        let composite = {
            let transfers = self.transfers.lock();
            transfers.get(transfer_id).cloned()
        }?;
        let (completed_bytes, completed_files) = *composite.completed.lock();
        let inner_id = *composite.inner_id.lock();

        let mut progress = inner_id
            .and_then(|id| composite.inner_engine.progress(&id))
            .unwrap_or_else(|| TransferProgress::new(*transfer_id));
        progress.transfer_id = *transfer_id;
        progress.bytes_transferred += completed_bytes;
        progress.files_done += completed_files;
        progress.bytes_total = None;
        progress.percentage = 0.0;
        Some(progress)
    }

    async fn cancel(&self, transfer_id: &TransferId) -> Result<(), MoverError> {
        let composite = {
            let transfers = self.transfers.lock();
            transfers.get(transfer_id).cloned()
        };
        if let Some(composite) = composite {
            let inner_id = *composite.inner_id.lock();
            if let Some(inner_id) = inner_id {
                composite.inner_engine.cancel(&inner_id).await?;
            }
        }
        Ok(())
    }
}
