// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Analysis
//!
//! The pattern analyzer: bounded-concurrency filesystem walk producing the
//! domain's `DataPattern`.

pub mod pattern_analyzer;

pub use pattern_analyzer::PatternAnalyzer;
