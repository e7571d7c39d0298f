// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bundling
//!
//! The bundling engine (first-fit-decreasing packing into tar archives)
//! and its sidecar manifests.

pub mod bundler;
pub mod manifest;

pub use bundler::{BundleInput, BundlePlan, Bundler, BundlerConfig, PlannedBundle, WrittenBundle};
pub use manifest::{BundleManifest, ManifestEntry};
