// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution ID Value Object
//!
//! Identifier for a single workflow execution. The id doubles as the stem of
//! every on-disk artifact belonging to the execution (`executions/<id>.json`,
//! `executions/<id>.checkpoint`, `logs/<id>.log`), so the string form must be
//! filesystem-safe, which the 26-character ULID alphabet guarantees.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use ulid::Ulid;

use super::generic_id::{GenericId, IdCategory};
use crate::MoverError;

/// Unique identifier for a [`WorkflowExecution`](crate::entities::WorkflowExecution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutionId(GenericId<ExecutionMarker>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct ExecutionMarker;

impl IdCategory for ExecutionMarker {
    fn category_name() -> &'static str {
        "execution"
    }

    fn validate_id(ulid: &Ulid) -> Result<(), MoverError> {
        if ulid.0 == 0 {
            return Err(MoverError::InvalidConfiguration(
                "Execution ID cannot be nil ULID".to_string(),
            ));
        }

        // Reject ids stamped implausibly far in the future; they are almost
        // always the product of clock damage or hand-edited snapshots.
        let now = chrono::Utc::now().timestamp_millis() as u64;
        let one_day_ms = 24 * 60 * 60 * 1000;
        if ulid.timestamp_ms() > now + one_day_ms {
            return Err(MoverError::InvalidConfiguration(
                "Execution ID timestamp is too far in the future".to_string(),
            ));
        }

        Ok(())
    }
}

impl ExecutionId {
    pub fn new() -> Self {
        Self(GenericId::new())
    }

    pub fn from_string(s: &str) -> Result<Self, MoverError> {
        Ok(Self(GenericId::from_string(s)?))
    }

    pub fn from_ulid(ulid: Ulid) -> Result<Self, MoverError> {
        Ok(Self(GenericId::from_ulid(ulid)?))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0.as_ulid()
    }

    pub fn datetime(&self) -> chrono::DateTime<chrono::Utc> {
        self.0.datetime()
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
