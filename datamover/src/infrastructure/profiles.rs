// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Profiles
//!
//! Static per-research-domain transfer policy registry.

pub mod registry;

pub use registry::{known_domains, lookup, profile_for};
