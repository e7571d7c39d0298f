// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Events
//!
//! Append-only audit records for a workflow execution. Events are appended
//! in happens-before order of the operations they record and carry a
//! per-execution sequence number, so a replay of the log plus the last
//! checkpoint suffices to reconstruct the execution history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::services::datetime_serde;

/// Kind of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ExecutionCreated,
    StateChanged,
    StepStarted,
    StepCompleted,
    StepFailed,
    StepRetried,
    StepSkipped,
    CheckpointSaved,
    ErrorClassified,
    RecoveryPlanned,
    ProgressMilestone,
    CancellationRequested,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::ExecutionCreated => "execution_created",
            EventKind::StateChanged => "state_changed",
            EventKind::StepStarted => "step_started",
            EventKind::StepCompleted => "step_completed",
            EventKind::StepFailed => "step_failed",
            EventKind::StepRetried => "step_retried",
            EventKind::StepSkipped => "step_skipped",
            EventKind::CheckpointSaved => "checkpoint_saved",
            EventKind::ErrorClassified => "error_classified",
            EventKind::RecoveryPlanned => "recovery_planned",
            EventKind::ProgressMilestone => "progress_milestone",
            EventKind::CancellationRequested => "cancellation_requested",
        };
        write!(f, "{}", s)
    }
}

/// One entry in an execution's audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub event_id: Uuid,
    /// Monotone per-execution sequence number, assigned on append.
    pub sequence: u64,
    #[serde(with = "datetime_serde")]
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub message: String,
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl ExecutionEvent {
    /// Creates an event with sequence 0; the owning execution assigns the
    /// real sequence number on append.
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            kind,
            message: message.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests event construction and data attachment.
    #[test]
    fn test_event_construction() {
        let event = ExecutionEvent::new(EventKind::StepFailed, "transfer step failed")
            .with_data("attempt", serde_json::json!(2))
            .with_data("error_class", serde_json::json!("transient"));
        assert_eq!(event.kind, EventKind::StepFailed);
        assert_eq!(event.data.len(), 2);
        assert_eq!(event.sequence, 0);
    }

    /// Tests snake_case serialization of kinds for the on-disk log.
    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&EventKind::CheckpointSaved).unwrap();
        assert_eq!(json, "\"checkpoint_saved\"");
    }
}
