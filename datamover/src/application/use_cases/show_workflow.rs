// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Show-Workflow Use Case
//!
//! Status lookup for a single execution and the active-execution listing.

use datamover_domain::{ExecutionId, MoverError, WorkflowExecution};

use crate::application::services::workflow_engine::{ExecutionSummary, WorkflowEngine};

/// Parses a CLI-supplied execution id.
pub fn parse_execution_id(raw: &str) -> Result<ExecutionId, MoverError> {
    ExecutionId::from_string(raw).map_err(|_| MoverError::ExecutionNotFound(raw.to_string()))
}

/// Snapshot of one execution (live or persisted).
pub async fn status(engine: &WorkflowEngine, raw_id: &str) -> Result<WorkflowExecution, MoverError> {
    let id = parse_execution_id(raw_id)?;
    engine.get_execution(&id).await
}

/// Summaries of currently active executions.
pub fn list(engine: &WorkflowEngine) -> Vec<ExecutionSummary> {
    engine.list_active()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests malformed ids surface as not-found instead of a parse
    /// panic.
    #[test]
    fn test_bad_id_is_not_found() {
        assert!(matches!(
            parse_execution_id("definitely-not-a-ulid"),
            Err(MoverError::ExecutionNotFound(_))
        ));
        let valid = ExecutionId::new();
        assert_eq!(parse_execution_id(&valid.to_string()).unwrap(), valid);
    }
}
