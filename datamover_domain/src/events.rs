// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Events
//!
//! Append-only audit events recorded by workflow executions.

pub mod execution_event;

pub use execution_event::{EventKind, ExecutionEvent};
