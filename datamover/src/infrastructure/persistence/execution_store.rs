// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # JSON Execution Store
//!
//! File-backed implementation of the domain's `ExecutionStore` port.
//! Layout under the data directory:
//!
//! ```text
//! <data-dir>/
//! ├── executions/<id>.json        execution snapshots
//! ├── executions/<id>.checkpoint  last checkpoint (JSON)
//! ├── manifests/                  bundle manifests copied for audit
//! └── logs/<id>.log               append-only event log (JSON lines)
//! ```
//!
//! Snapshots and checkpoints are written crash-safe (write to a temp name
//! in the same directory, then rename); the event log is append-only.
//! Files are created user-only (0600) where the platform supports it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use datamover_domain::{Checkpoint, ExecutionEvent, ExecutionId, ExecutionStore, MoverError, WorkflowExecution};

/// File-backed execution store.
pub struct JsonExecutionStore {
    root: PathBuf,
}

impl JsonExecutionStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, MoverError> {
        let root = root.into();
        for sub in ["executions", "manifests", "logs"] {
            std::fs::create_dir_all(root.join(sub))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Audit copy of every bundle manifest produced by a bundle step.
    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join("manifests")
    }

    fn snapshot_path(&self, id: &ExecutionId) -> PathBuf {
        self.root.join("executions").join(format!("{}.json", id))
    }

    fn checkpoint_path(&self, id: &ExecutionId) -> PathBuf {
        self.root.join("executions").join(format!("{}.checkpoint", id))
    }

    fn log_path(&self, id: &ExecutionId) -> PathBuf {
        self.root.join("logs").join(format!("{}.log", id))
    }

    /// Crash-safe write: temp file in the target directory, fsync, rename.
    async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), MoverError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), MoverError> {
            let directory = path
                .parent()
                .ok_or_else(|| MoverError::InternalError(format!("{} has no parent", path.display())))?;
            let mut temp = tempfile::NamedTempFile::new_in(directory)?;
            use std::io::Write;
            temp.write_all(&bytes)?;
            temp.flush()?;
            temp.as_file().sync_all()?;
            restrict_permissions(temp.path());
            temp.persist(&path)
                .map_err(|e| MoverError::IoError(format!("persisting {}: {}", path.display(), e.error)))?;
            Ok(())
        })
        .await
        .map_err(|e| MoverError::InternalError(format!("write task panicked: {}", e)))?
    }
}

/// Best-effort user-only permissions.
fn restrict_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

#[async_trait]
impl ExecutionStore for JsonExecutionStore {
    async fn save(&self, execution: &WorkflowExecution) -> Result<(), MoverError> {
        let bytes = serde_json::to_vec_pretty(execution)?;
        Self::write_atomic(&self.snapshot_path(&execution.id), bytes).await
    }

    async fn load(&self, id: &ExecutionId) -> Result<WorkflowExecution, MoverError> {
        let path = self.snapshot_path(id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MoverError::ExecutionNotFound(id.to_string()),
                _ => MoverError::from(e),
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn list(&self) -> Result<Vec<ExecutionId>, MoverError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(self.root.join("executions")).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".json") {
                if let Ok(id) = ExecutionId::from_string(stem) {
                    ids.push(id);
                }
            }
        }
        // ULIDs sort chronologically.
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, id: &ExecutionId) -> Result<(), MoverError> {
        let snapshot = self.snapshot_path(id);
        if !snapshot.exists() {
            return Err(MoverError::ExecutionNotFound(id.to_string()));
        }
        tokio::fs::remove_file(&snapshot).await?;
        let _ = tokio::fs::remove_file(self.checkpoint_path(id)).await;
        let _ = tokio::fs::remove_file(self.log_path(id)).await;
        Ok(())
    }

    async fn save_checkpoint(&self, id: &ExecutionId, checkpoint: &Checkpoint) -> Result<(), MoverError> {
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        Self::write_atomic(&self.checkpoint_path(id), bytes).await
    }

    async fn load_checkpoint(&self, id: &ExecutionId) -> Result<Option<Checkpoint>, MoverError> {
        match tokio::fs::read(self.checkpoint_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MoverError::from(e)),
        }
    }

    async fn append_log(&self, id: &ExecutionId, event: &ExecutionEvent) -> Result<(), MoverError> {
        use tokio::io::AsyncWriteExt;
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let path = self.log_path(id);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        restrict_permissions(&path);
        Ok(())
    }
}
