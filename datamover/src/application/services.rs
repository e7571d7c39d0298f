// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Services
//!
//! Long-lived orchestrators: the workflow engine and the recovery
//! manager.

pub mod recovery_manager;
pub mod workflow_engine;

pub use recovery_manager::RecoveryManager;
pub use workflow_engine::{ExecutionPlan, ExecutionSummary, PlannedStep, ProgressCallback, WorkflowEngine};
