// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI lint profiles
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Research Datamover
//!
//! Intelligent research data-movement orchestrator: analyzes local data,
//! selects and drives a transfer backend, applies domain-aware
//! optimizations (bundling, tiering, compression), estimates costs, and
//! reports progress and failures in real time.
//!
//! ## Architecture Overview
//!
//! The system follows Clean Architecture and Domain-Driven Design
//! principles across three crates:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Bootstrap (entry point)                    │
//! │  (CLI parsing, signals, shutdown, exit codes, platform)     │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Application Layer                          │
//! │  (Workflow Engine, Recovery Manager, Use Cases)             │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! │  (Entities, Value Objects, Domain Services, Ports)          │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Infrastructure Layer                         │
//! │  (Analyzer, Transfer Adapters, Bundling, Persistence)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Concepts
//!
//! ### Workflows
//! A workflow names a source data profile, a destination, and a step
//! sequence. The engine expands it into
//! `[analyze] ++ pre ++ [primary_transfer] ++ post ++ [report]` and runs
//! the steps in order with retries, checkpoints, and an append-only event
//! log.
//!
//! ### Transfer engines
//! Three adapters implement the same port: a bulk-parallel CLI for
//! many-object and large-object moves, a multi-cloud sync CLI for
//! incremental reconciliation, and an archival bundler that packs small
//! files into content-addressed tar bundles before upload. `engine: auto`
//! picks deterministically from the data pattern, the domain profile, and
//! backend availability.
//!
//! ### Recovery
//! Failures are classified (transient, configuration, integrity,
//! resource, cancelled, unknown); the recovery manager turns a failed
//! execution plus its checkpoint into an executable recovery plan.

pub mod application;
pub mod infrastructure;
pub mod presentation;

// Tests are organized as:
// - Unit tests: #[cfg(test)] modules within each source file
// - Integration tests: separate files in tests/ directory

// Re-export domain types for convenient access
pub use datamover_domain::{
    DataPattern, EngineKind, ErrorClass, ExecutionId, ExecutionState, MoverError, ProjectConfiguration,
    Recommendation, RecoveryPlan, TransferRequest, TransferResult, WorkflowExecution,
};
