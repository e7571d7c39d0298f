// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Part Size Value Object
//!
//! Type-safe multipart part size used when driving transfer backends. Part
//! sizes are validated at creation time so adapters never have to re-check
//! bounds before handing the value to a subprocess flag.
//!
//! ## Constraints
//!
//! - **Minimum (5 MiB)**: the smallest part most object stores accept for a
//!   non-final multipart part.
//! - **Maximum (5 GiB)**: the largest single part object stores accept.
//! - **Default (64 MiB)**: the bulk-parallel backend default; the multi-cloud
//!   sync backend uses 128 MiB.
//!
//! ## Usage Examples
//!
//! ```
//! use datamover_domain::value_objects::PartSize;
//!
//! let part = PartSize::from_mib(64).unwrap();
//! assert_eq!(part.bytes(), 64 * 1024 * 1024);
//! assert_eq!(format!("{}", part), "64MiB");
//!
//! assert!(PartSize::new(1024).is_err()); // below the 5 MiB floor
//! ```

use serde::{Deserialize, Serialize};

use crate::MoverError;

const MIB: u64 = 1024 * 1024;

/// Validated multipart part size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartSize {
    bytes: u64,
}

impl PartSize {
    /// Minimum part size (5 MiB).
    pub const MIN_BYTES: u64 = 5 * MIB;

    /// Maximum part size (5 GiB).
    pub const MAX_BYTES: u64 = 5 * 1024 * MIB;

    /// Default part size for the bulk-parallel backend (64 MiB).
    pub const DEFAULT_BYTES: u64 = 64 * MIB;

    /// Creates a part size with bounds validation.
    ///
    /// # Errors
    ///
    /// Returns `MoverError::InvalidConfiguration` when the size is outside
    /// the 5 MiB..=5 GiB range.
    pub fn new(bytes: u64) -> Result<Self, MoverError> {
        if bytes < Self::MIN_BYTES {
            return Err(MoverError::InvalidConfiguration(format!(
                "Part size {} is below the minimum of {} bytes",
                bytes,
                Self::MIN_BYTES
            )));
        }
        if bytes > Self::MAX_BYTES {
            return Err(MoverError::InvalidConfiguration(format!(
                "Part size {} exceeds the maximum of {} bytes",
                bytes,
                Self::MAX_BYTES
            )));
        }
        Ok(PartSize { bytes })
    }

    /// Creates a part size from mebibytes.
    pub fn from_mib(mib: u64) -> Result<Self, MoverError> {
        Self::new(mib * MIB)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn mib(&self) -> u64 {
        self.bytes / MIB
    }

    /// Number of parts needed for an object of the given size.
    pub fn parts_needed(&self, object_size: u64) -> u64 {
        if object_size == 0 {
            return 0;
        }
        object_size.div_ceil(self.bytes)
    }
}

impl Default for PartSize {
    fn default() -> Self {
        PartSize {
            bytes: Self::DEFAULT_BYTES,
        }
    }
}

impl std::fmt::Display for PartSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}MiB", self.mib())
    }
}
