// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transfer Model
//!
//! Request, progress, and result types exchanged with transfer engines.
//!
//! ## Ownership and mutability
//!
//! - [`TransferRequest`] is immutable after submission; retries reuse the
//!   same request (and id) verbatim.
//! - [`TransferProgress`] has a single writer (the adapter owning the
//!   transfer) and many readers. `bytes_transferred` is monotone within one
//!   attempt; a retry starts a new monotone sequence.
//! - [`TransferResult`] is terminal. Partial success is a successful result
//!   carrying the failed-entry list, not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::services::datetime_serde;
use crate::services::transfer_engine::EngineKind;
use crate::value_objects::{PartSize, RemoteUri, TransferId, WorkerCount};

/// Checksum behavior requested of an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumMode {
    /// No end-to-end checksum verification.
    Disabled,
    /// SHA-256 verification where the backend supports it.
    #[default]
    Sha256,
}

/// Include/exclude glob filters for sync-style transfers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFilters {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl TransferFilters {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// An immutable transfer order handed to an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: TransferId,
    pub source: RemoteUri,
    pub destination: RemoteUri,
    /// Explicit file list relative to the source; `None` means the whole
    /// tree.
    #[serde(default)]
    pub files: Option<Vec<String>>,
    pub concurrency: WorkerCount,
    pub part_size: PartSize,
    #[serde(default)]
    pub checksum_mode: ChecksumMode,
    /// Per-transfer timeout in seconds.
    pub timeout_seconds: u64,
    /// For sync: delete destination entries missing from the source.
    #[serde(default)]
    pub delete_extraneous: bool,
    #[serde(default)]
    pub filters: TransferFilters,
}

impl TransferRequest {
    /// Creates a request with engine defaults for tuning knobs.
    pub fn new(source: RemoteUri, destination: RemoteUri) -> Self {
        Self {
            id: TransferId::new(),
            source,
            destination,
            files: None,
            concurrency: WorkerCount::default_for_cores(4),
            part_size: PartSize::default(),
            checksum_mode: ChecksumMode::default(),
            timeout_seconds: 2 * 60 * 60,
            delete_extraneous: false,
            filters: TransferFilters::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Point-in-time progress snapshot of a live transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub transfer_id: TransferId,
    pub bytes_transferred: u64,
    /// Total bytes when known up front.
    pub bytes_total: Option<u64>,
    /// In [0, 100]; when `bytes_total` is known this is
    /// `100 * bytes_transferred / bytes_total`.
    pub percentage: f64,
    /// EWMA transfer speed in bytes per second; absent until determined.
    pub current_speed_bps: Option<f64>,
    /// Estimated seconds remaining; absent when speed is undetermined.
    pub eta_seconds: Option<u64>,
    pub files_done: u64,
    pub files_total: Option<u64>,
    #[serde(with = "datetime_serde")]
    pub last_update: DateTime<Utc>,
}

impl TransferProgress {
    pub fn new(transfer_id: TransferId) -> Self {
        Self {
            transfer_id,
            bytes_transferred: 0,
            bytes_total: None,
            percentage: 0.0,
            current_speed_bps: None,
            eta_seconds: None,
            files_done: 0,
            files_total: None,
            last_update: Utc::now(),
        }
    }

    /// Recomputes the percentage from the byte counters, clamped to
    /// [0, 100].
    pub fn recompute_percentage(&mut self) {
        self.percentage = match self.bytes_total {
            Some(total) if total > 0 => ((self.bytes_transferred as f64 / total as f64) * 100.0).clamp(0.0, 100.0),
            _ => 0.0,
        };
    }
}

/// Terminal outcome of a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer_id: TransferId,
    pub engine: EngineKind,
    pub success: bool,
    /// Some entries failed while others succeeded.
    #[serde(default)]
    pub partial_success: bool,
    pub duration_ms: u64,
    pub bytes_transferred: u64,
    pub files_transferred: u64,
    #[serde(default)]
    pub failed_files: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
}

impl TransferResult {
    /// A fully successful result.
    pub fn succeeded(transfer_id: TransferId, engine: EngineKind, bytes: u64, files: u64, duration: Duration) -> Self {
        Self {
            transfer_id,
            engine,
            success: true,
            partial_success: false,
            duration_ms: duration.as_millis() as u64,
            bytes_transferred: bytes,
            files_transferred: files,
            failed_files: Vec::new(),
            error: None,
            retry_count: 0,
        }
    }

    /// Marks the listed entries as failed, flipping to partial success when
    /// at least one entry succeeded too.
    pub fn with_failures(mut self, failed: Vec<String>) -> Self {
        if !failed.is_empty() {
            self.partial_success = self.files_transferred > 0;
            self.success = self.partial_success;
            self.failed_files = failed;
        }
        self
    }
}
