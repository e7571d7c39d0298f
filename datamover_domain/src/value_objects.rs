// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Value Objects
//!
//! Immutable, validated values used throughout the datamover: identifiers,
//! URIs, sizes, and content addresses. Value objects are compared by value,
//! validated at construction, and cheap to copy or clone.

pub mod bundle_id;
pub mod execution_id;
pub mod generic_id;
pub mod part_size;
pub mod remote_uri;
pub mod transfer_id;
pub mod worker_count;

pub use bundle_id::BundleId;
pub use execution_id::ExecutionId;
pub use generic_id::{GenericId, IdCategory};
pub use part_size::PartSize;
pub use remote_uri::{RemoteUri, UriScheme};
pub use transfer_id::TransferId;
pub use worker_count::WorkerCount;
