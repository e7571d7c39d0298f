// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Entities
//!
//! Core business objects of the datamover: the declarative project
//! configuration, the structural data pattern, the transfer model, domain
//! profiles, workflow executions, and recovery plans.

pub mod data_pattern;
pub mod domain_profile;
pub mod project_config;
pub mod recovery;
pub mod transfer;
pub mod workflow_execution;

pub use data_pattern::{DataPattern, DomainHints, EfficiencySummary, FileTypeStats, SmallFileBuckets};
pub use domain_profile::{BundlingStrategy, DomainProfile, FileTypeHint, SecurityRequirements, TransferOptimization};
pub use project_config::{
    DataProfile, Destination, EngineChoice, EngineSettings, OnPartialSuccess, OptimizationFlags, ProcessingStep,
    ProjectConfiguration, ProjectMeta, RetryPolicy, StepKind, ValidationReport, Workflow, WorkflowSettings,
};
pub use recovery::{RecoveryPlan, RecoveryRisk, RecoveryStrategy};
pub use transfer::{ChecksumMode, TransferFilters, TransferProgress, TransferRequest, TransferResult};
pub use workflow_execution::{
    Checkpoint, ExecutionState, StepRecord, StepStatus, WorkflowExecution, WorkflowSnapshot,
};
