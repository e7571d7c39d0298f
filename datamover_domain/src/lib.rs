// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Research Datamover Domain
//!
//! Pure business logic for the research data-movement orchestrator:
//! entities, value objects, domain services, events, and the ports the
//! infrastructure layer implements. This crate has no runtime dependencies;
//! everything here is deterministic given its inputs, which is what makes
//! the cost model, domain detection, and engine auto-selection unit-testable
//! without subprocesses or a filesystem.
//!
//! ## Layering
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │              datamover (binary)               │
//! │  application services, use cases, adapters    │
//! └───────────────────────┬───────────────────────┘
//! ┌───────────────────────┴───────────────────────┐
//! │            datamover-domain (this)            │
//! │  entities, value objects, services, ports     │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Core concepts
//!
//! - **DataPattern**: structural summary of a source tree (histograms,
//!   small-file buckets, domain hints, efficiency estimates).
//! - **CostCalculator**: pure pricing model over a replaceable rate table.
//! - **TransferEngine**: the port implemented by the bulk-parallel CLI,
//!   multi-cloud sync, and archival bundler adapters.
//! - **WorkflowExecution**: state machine, step plan, progress, event log,
//!   and checkpoint for one run of a named workflow.
//! - **MoverError**: unified error type with the transient / configuration /
//!   integrity / resource / cancelled / unknown taxonomy.

pub mod entities;
pub mod error;
pub mod events;
pub mod repositories;
pub mod services;
pub mod value_objects;

// Tests are organized as:
// - Unit tests: #[cfg(test)] modules within each source file
// - Integration tests: tests/ directory of the datamover crate

pub use entities::{
    Checkpoint, DataPattern, DataProfile, Destination, DomainProfile, EngineChoice, EngineSettings, ExecutionState,
    OnPartialSuccess, OptimizationFlags, ProcessingStep, ProjectConfiguration, RecoveryPlan, RecoveryRisk,
    RecoveryStrategy, RetryPolicy, StepKind, StepRecord, StepStatus, TransferProgress, TransferRequest,
    TransferResult, ValidationReport, Workflow, WorkflowExecution, WorkflowSettings, WorkflowSnapshot,
};
pub use error::{ErrorClass, MoverError};
pub use events::{EventKind, ExecutionEvent};
pub use repositories::ExecutionStore;
pub use services::{
    CostCalculator, CostScenario, EngineCapabilities, EngineKind, RateTable, Recommendation, RecommendationService,
    StorageClass, TransferEngine,
};
pub use value_objects::{BundleId, ExecutionId, PartSize, RemoteUri, TransferId, UriScheme, WorkerCount};
