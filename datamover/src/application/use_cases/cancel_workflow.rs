// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cancel-Workflow Use Case
//!
//! Requests cooperative cancellation of a running execution. The ack
//! returns as soon as the signal is delivered; the execution itself
//! drains to `cancelled` within the 30-second contract.

use datamover_domain::MoverError;

use crate::application::services::workflow_engine::WorkflowEngine;
use crate::application::use_cases::show_workflow::parse_execution_id;

/// Signals cancellation for the given execution id.
pub async fn run(engine: &WorkflowEngine, raw_id: &str) -> Result<(), MoverError> {
    let id = parse_execution_id(raw_id)?;
    engine.cancel(&id).await
}
