// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Runtime
//!
//! Step execution and process-wide concurrency bounds.

pub mod resource_governor;
pub mod step_runner;

pub use resource_governor::{ResourceGovernor, DEFAULT_MAX_CONCURRENT_WORKFLOWS};
pub use step_runner::{StepRunner, StepScratch};
