// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Recovery Plan
//!
//! Model of a proposed recovery for a failed execution. The recovery manager
//! derives the strategy from the failure's [`ErrorClass`](crate::ErrorClass)
//! and the checkpoint position; the caller either executes the plan (auto
//! path) or presents it for interactive confirmation.

use serde::{Deserialize, Serialize};

/// How to recover a failed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryStrategy {
    /// Re-run the failed step; for transient failures with no useful
    /// checkpoint.
    AutoRetry,
    /// Rehydrate engine state and continue at the step after the
    /// checkpoint.
    ResumeFromCheckpoint,
    /// The failure is a configuration problem; the plan enumerates the fix.
    Remediate,
    /// Unknown or corruption-risk failure; human judgement required.
    Manual,
}

impl std::fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecoveryStrategy::AutoRetry => "auto-retry",
            RecoveryStrategy::ResumeFromCheckpoint => "resume-from-checkpoint",
            RecoveryStrategy::Remediate => "remediate",
            RecoveryStrategy::Manual => "manual",
        };
        write!(f, "{}", s)
    }
}

/// Risk of executing a recovery plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryRisk {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RecoveryRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecoveryRisk::Low => "low",
            RecoveryRisk::Medium => "medium",
            RecoveryRisk::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// A proposed recovery for one failed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub strategy: RecoveryStrategy,
    /// Ordered actions: remaining workflow steps for resume strategies,
    /// remediation instructions otherwise.
    pub steps: Vec<String>,
    pub risk: RecoveryRisk,
    /// Whether executing the plan without confirmation is advisable.
    pub recommended: bool,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests kebab-case serialization used by the CLI `--strategy` flag.
    #[test]
    fn test_strategy_serialization() {
        let json = serde_json::to_string(&RecoveryStrategy::ResumeFromCheckpoint).unwrap();
        assert_eq!(json, "\"resume-from-checkpoint\"");
        let back: RecoveryStrategy = serde_json::from_str("\"auto-retry\"").unwrap();
        assert_eq!(back, RecoveryStrategy::AutoRetry);
    }

    /// Tests risk ordering used when comparing alternative plans.
    #[test]
    fn test_risk_ordering() {
        assert!(RecoveryRisk::Low < RecoveryRisk::Medium);
        assert!(RecoveryRisk::Medium < RecoveryRisk::High);
    }
}
