// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transfer ID Value Object
//!
//! Identifier for a single transfer submitted to a transfer engine. Progress
//! polling and cancellation are keyed by this id, so it must stay stable for
//! the lifetime of the transfer including retries (a retry reuses the id and
//! starts a new monotone progress sequence).

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use ulid::Ulid;

use super::generic_id::{GenericId, IdCategory};
use crate::MoverError;

/// Unique identifier for a [`TransferRequest`](crate::entities::TransferRequest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransferId(GenericId<TransferMarker>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct TransferMarker;

impl IdCategory for TransferMarker {
    fn category_name() -> &'static str {
        "transfer"
    }

    fn validate_id(ulid: &Ulid) -> Result<(), MoverError> {
        if ulid.0 == 0 {
            return Err(MoverError::InvalidConfiguration(
                "Transfer ID cannot be nil ULID".to_string(),
            ));
        }
        Ok(())
    }
}

impl TransferId {
    pub fn new() -> Self {
        Self(GenericId::new())
    }

    pub fn from_string(s: &str) -> Result<Self, MoverError> {
        Ok(Self(GenericId::from_string(s)?))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0.as_ulid()
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_id_round_trip() {
        let id = TransferId::new();
        let parsed = TransferId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_transfer_id_serde() {
        let id = TransferId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: TransferId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
