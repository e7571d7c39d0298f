// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Generic ID Value Object
//!
//! Shared ULID-backed identifier machinery for the datamover system. Each
//! concrete identifier (execution id, transfer id) is a thin newtype over
//! [`GenericId`] with a marker type implementing [`IdCategory`], which gives
//! every id family its own validation rules and category name while sharing
//! one implementation.
//!
//! ## Design
//!
//! - **ULID-based**: lexicographically sortable, timestamp-prefixed, compact.
//! - **Type safety**: an execution id cannot be passed where a transfer id is
//!   expected; the marker type makes them distinct at compile time.
//! - **String form**: ids serialize as their canonical 26-character ULID
//!   string, which is what appears in file names and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::marker::PhantomData;
use ulid::Ulid;

use crate::MoverError;

/// Category hook for a family of identifiers.
///
/// Implementations provide the category name used in error messages and any
/// extra validation beyond well-formedness of the ULID itself.
pub trait IdCategory {
    /// Human-readable category name ("execution", "transfer", ...).
    fn category_name() -> &'static str;

    /// Category-specific validation applied on construction from external
    /// input.
    fn validate_id(ulid: &Ulid) -> Result<(), MoverError>;
}

/// ULID-backed identifier parameterized by an [`IdCategory`] marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenericId<M: IdCategory> {
    ulid: Ulid,
    _marker: PhantomData<M>,
}

impl<M: IdCategory> GenericId<M> {
    /// Creates a new random identifier stamped with the current time.
    pub fn new() -> Self {
        Self {
            ulid: Ulid::new(),
            _marker: PhantomData,
        }
    }

    /// Wraps an existing ULID, applying category validation.
    pub fn from_ulid(ulid: Ulid) -> Result<Self, MoverError> {
        M::validate_id(&ulid)?;
        Ok(Self {
            ulid,
            _marker: PhantomData,
        })
    }

    /// Parses the canonical 26-character string form.
    pub fn from_string(s: &str) -> Result<Self, MoverError> {
        let ulid = Ulid::from_string(s).map_err(|e| {
            MoverError::InvalidConfiguration(format!("Invalid {} ID '{}': {}", M::category_name(), s, e))
        })?;
        Self::from_ulid(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Milliseconds since the Unix epoch embedded in the identifier.
    pub fn timestamp_ms(&self) -> u64 {
        self.ulid.timestamp_ms()
    }

    pub fn datetime(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(self.timestamp_ms() as i64).unwrap_or_else(chrono::Utc::now)
    }

    pub fn is_nil(&self) -> bool {
        self.ulid.0 == 0
    }

    /// Re-runs category validation (useful after deserialization).
    pub fn validate(&self) -> Result<(), MoverError> {
        M::validate_id(&self.ulid)
    }

    #[cfg(test)]
    pub fn nil() -> Self {
        Self {
            ulid: Ulid(0),
            _marker: PhantomData,
        }
    }
}

impl<M: IdCategory> Default for GenericId<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: IdCategory> Display for GenericId<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ulid)
    }
}

// Ids serialize as their canonical string form so they read naturally in
// JSON snapshots, file names, and the CLI.
impl<M: IdCategory> Serialize for GenericId<M> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.ulid.to_string())
    }
}

impl<'de, M: IdCategory> Deserialize<'de> for GenericId<M> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_string(&s).map_err(serde::de::Error::custom)
    }
}
