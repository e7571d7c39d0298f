// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Worker Count Value Object
//!
//! Validated concurrency level for transfer backends and the pattern
//! analyzer. Backends receive this value as their worker/transfer flag, so
//! the bounds exist to keep a misconfigured workflow from fork-bombing the
//! host or serializing a large transfer down to one stream.

use serde::{Deserialize, Serialize};

use crate::MoverError;

/// Validated worker count in the range 1..=128.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerCount {
    count: usize,
}

impl WorkerCount {
    pub const MIN: usize = 1;
    pub const MAX: usize = 128;

    /// Cap applied when deriving a default from the core count.
    pub const DEFAULT_CAP: usize = 32;

    /// Creates a worker count with bounds validation.
    pub fn new(count: usize) -> Result<Self, MoverError> {
        if !(Self::MIN..=Self::MAX).contains(&count) {
            return Err(MoverError::InvalidConfiguration(format!(
                "Worker count {} must be between {} and {}",
                count,
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(WorkerCount { count })
    }

    /// Default concurrency for a host with `cores` logical cores:
    /// `min(32, 2 * cores)`, never below 1.
    pub fn default_for_cores(cores: usize) -> Self {
        let count = (2 * cores.max(1)).min(Self::DEFAULT_CAP);
        WorkerCount { count }
    }

    /// Worker count for the filesystem walk: `min(cores, 8)`.
    pub fn for_analysis(cores: usize) -> Self {
        WorkerCount {
            count: cores.clamp(1, 8),
        }
    }

    pub fn get(&self) -> usize {
        self.count
    }
}

impl std::fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.count)
    }
}
