// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resource Governor
//!
//! Process-wide token semaphores bounding concurrent work: workflow
//! permits cap simultaneous executions (default 3), subprocess permits cap
//! simultaneously running transfer CLIs. Permits are owned guards, so
//! every exit path (success, error, cancel, panic-unwind into drop)
//! releases its token.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use datamover_bootstrap::platform;
use datamover_domain::MoverError;

/// Default cap on concurrently running workflow executions.
pub const DEFAULT_MAX_CONCURRENT_WORKFLOWS: usize = 3;

/// Token semaphores for workflows and subprocesses.
pub struct ResourceGovernor {
    workflow_tokens: Arc<Semaphore>,
    subprocess_tokens: Arc<Semaphore>,
    max_workflows: usize,
}

impl ResourceGovernor {
    pub fn new(max_workflows: usize) -> Self {
        let max_workflows = max_workflows.max(1);
        Self {
            workflow_tokens: Arc::new(Semaphore::new(max_workflows)),
            subprocess_tokens: Arc::new(Semaphore::new(platform::logical_cores().max(2))),
            max_workflows,
        }
    }

    pub fn max_workflows(&self) -> usize {
        self.max_workflows
    }

    pub fn available_workflow_permits(&self) -> usize {
        self.workflow_tokens.available_permits()
    }

    /// Waits for a workflow slot. The permit releases on drop.
    pub async fn acquire_workflow(&self) -> Result<OwnedSemaphorePermit, MoverError> {
        Arc::clone(&self.workflow_tokens)
            .acquire_owned()
            .await
            .map_err(|_| MoverError::InternalError("workflow semaphore closed".to_string()))
    }

    /// Waits for a subprocess slot. The permit releases on drop.
    pub async fn acquire_subprocess(&self) -> Result<OwnedSemaphorePermit, MoverError> {
        Arc::clone(&self.subprocess_tokens)
            .acquire_owned()
            .await
            .map_err(|_| MoverError::InternalError("subprocess semaphore closed".to_string()))
    }
}

impl Default for ResourceGovernor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_WORKFLOWS)
    }
}
