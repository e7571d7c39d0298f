// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transfer Engine Port
//!
//! The domain-side contract every transfer backend adapter implements. The
//! domain defines *what* a transfer engine can do; the infrastructure layer
//! supplies adapters that drive external executables (bulk-parallel CLI,
//! multi-cloud sync CLI) or compose other engines (archival bundler).
//!
//! ## Contract highlights
//!
//! - `upload`/`download`/`sync` return a terminal [`TransferResult`]; partial
//!   success is a *successful* result with `partial_success = true` and a
//!   failed-entry list, not an error.
//! - `progress` is poll-style and must reflect updates at least every 2
//!   seconds or 16 MiB while a transfer is active.
//! - `cancel` is idempotent and returns even if the transfer is already
//!   terminal.
//! - Errors crossing this boundary are already classified into the
//!   [`ErrorClass`](crate::ErrorClass) taxonomy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::entities::{TransferProgress, TransferRequest, TransferResult};
use crate::value_objects::{TransferId, UriScheme};
use crate::MoverError;

/// Identifier for a transfer backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// Bulk-parallel CLI: many small objects, S3-style stores.
    BulkParallel,
    /// Multi-cloud sync CLI: heterogeneous backends, incremental sync.
    MultiCloudSync,
    /// Archival bundler: stages bundles, uploads via the bulk-parallel CLI.
    ArchivalBundler,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [
        EngineKind::BulkParallel,
        EngineKind::MultiCloudSync,
        EngineKind::ArchivalBundler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::BulkParallel => "bulk-parallel",
            EngineKind::MultiCloudSync => "multi-cloud-sync",
            EngineKind::ArchivalBundler => "archival-bundler",
        }
    }
}

impl Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = MoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bulk-parallel" => Ok(EngineKind::BulkParallel),
            "multi-cloud-sync" => Ok(EngineKind::MultiCloudSync),
            "archival-bundler" => Ok(EngineKind::ArchivalBundler),
            other => Err(MoverError::InvalidConfiguration(format!(
                "Unknown transfer engine '{}' (expected bulk-parallel, multi-cloud-sync, or archival-bundler)",
                other
            ))),
        }
    }
}

/// Declared capabilities of an engine, used by auto-selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCapabilities {
    /// URI schemes the engine can read from and write to.
    pub schemes: Vec<UriScheme>,
    pub multipart: bool,
    pub checksum: bool,
    pub resume: bool,
    pub bandwidth_limit: bool,
}

impl EngineCapabilities {
    pub fn supports_scheme(&self, scheme: UriScheme) -> bool {
        self.schemes.contains(&scheme)
    }

    /// Feature count used as the auto-selection tie-breaker.
    pub fn feature_count(&self) -> usize {
        [self.multipart, self.checksum, self.resume, self.bandwidth_limit]
            .iter()
            .filter(|&&b| b)
            .count()
    }
}

/// Uniform interface over heterogeneous transfer backends.
///
/// Implementations own their subprocess lifecycle: dedicated working
/// directory, output ring buffer, terminate-then-kill cancellation, and no
/// orphan processes on any exit path.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Human-readable adapter name (includes the driven executable).
    fn name(&self) -> &str;

    fn kind(&self) -> EngineKind;

    /// Checks that the backing executable is present and runnable.
    async fn is_available(&self) -> bool;

    fn capabilities(&self) -> EngineCapabilities;

    /// Copies local data to the destination.
    async fn upload(&self, request: &TransferRequest) -> Result<TransferResult, MoverError>;

    /// Copies remote data to a local destination.
    async fn download(&self, request: &TransferRequest) -> Result<TransferResult, MoverError>;

    /// One-way mirror reconciliation; idempotent. Deletes extraneous
    /// destination entries only when the request asks for it.
    async fn sync(&self, request: &TransferRequest) -> Result<TransferResult, MoverError>;

    /// Poll-style progress snapshot for a live (or recently finished)
    /// transfer. `None` when the id is unknown.
    fn progress(&self, transfer_id: &TransferId) -> Option<TransferProgress>;

    /// Idempotent cancellation; returns Ok even if already terminal.
    async fn cancel(&self, transfer_id: &TransferId) -> Result<(), MoverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests kind parsing including the error path for unknown engines.
    #[test]
    fn test_engine_kind_round_trip() {
        for kind in EngineKind::ALL {
            assert_eq!(EngineKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(EngineKind::from_str("ftp").is_err());
    }

    /// Tests kebab-case serde representation used in config files.
    #[test]
    fn test_engine_kind_serde() {
        let json = serde_json::to_string(&EngineKind::MultiCloudSync).unwrap();
        assert_eq!(json, "\"multi-cloud-sync\"");
    }

    /// Tests the feature-count tie-breaker arithmetic.
    #[test]
    fn test_feature_count() {
        let caps = EngineCapabilities {
            schemes: vec![UriScheme::File, UriScheme::S3],
            multipart: true,
            checksum: true,
            resume: false,
            bandwidth_limit: false,
        };
        assert_eq!(caps.feature_count(), 2);
        assert!(caps.supports_scheme(UriScheme::S3));
    }
}
