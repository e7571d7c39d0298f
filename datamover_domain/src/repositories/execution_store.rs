// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Store Port
//!
//! Persistence contract for workflow executions, their checkpoints, and
//! their append-only event logs. The domain defines the operations; the
//! infrastructure layer supplies the durable implementation (JSON files with
//! write-then-rename under the data directory).
//!
//! ## Durability contract
//!
//! - `save` must be crash-safe: a reader never observes a torn snapshot.
//! - `save_checkpoint` is serialized per execution (one writer).
//! - `append_log` is append-only; entries keep their happens-before order.

use async_trait::async_trait;

use crate::entities::workflow_execution::{Checkpoint, WorkflowExecution};
use crate::events::ExecutionEvent;
use crate::value_objects::ExecutionId;
use crate::MoverError;

/// Durable store for execution state.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persists the full execution snapshot (crash-safe).
    async fn save(&self, execution: &WorkflowExecution) -> Result<(), MoverError>;

    /// Loads an execution snapshot.
    ///
    /// # Errors
    ///
    /// `MoverError::ExecutionNotFound` when no snapshot exists for the id.
    async fn load(&self, id: &ExecutionId) -> Result<WorkflowExecution, MoverError>;

    /// Lists all persisted execution ids, oldest first.
    async fn list(&self) -> Result<Vec<ExecutionId>, MoverError>;

    /// Removes an execution and its artifacts.
    async fn delete(&self, id: &ExecutionId) -> Result<(), MoverError>;

    /// Persists the checkpoint independently of the snapshot.
    async fn save_checkpoint(&self, id: &ExecutionId, checkpoint: &Checkpoint) -> Result<(), MoverError>;

    /// Loads the last persisted checkpoint, if any.
    async fn load_checkpoint(&self, id: &ExecutionId) -> Result<Option<Checkpoint>, MoverError>;

    /// Appends one event to the execution's on-disk log.
    async fn append_log(&self, id: &ExecutionId, event: &ExecutionEvent) -> Result<(), MoverError>;
}
