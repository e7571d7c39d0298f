// /////////////////////////////////////////////////////////////////////////////
// Research Datamover
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Error Types
//!
//! This module defines the unified error type for the datamover system and the
//! failure taxonomy that drives retry and recovery decisions.
//!
//! ## Overview
//!
//! Every fallible operation in the system returns [`MoverError`]. Raw failures
//! from the filesystem, subprocesses, and serialization are classified into a
//! small set of [`ErrorClass`] categories before they cross a component
//! boundary:
//!
//! - **Transient**: network timeouts, throttling, interrupted streams.
//!   Eligible for automatic retry with backoff.
//! - **Configuration**: missing files, bad URIs, unknown engines, permission
//!   problems. Fixable by the user; a remediation plan is produced instead of
//!   a retry.
//! - **Integrity**: checksum mismatches and truncated uploads. Retried once,
//!   then surfaced as a data-integrity failure.
//! - **Resource**: disk full, out of memory, quota exceeded. Not retryable;
//!   mitigation is recommended.
//! - **Cancelled**: cooperative cancellation. Terminal and non-retryable.
//! - **Unknown**: everything else. Surfaced verbatim and escalated.
//!
//! The workflow engine decides retry-versus-surface purely from the class, so
//! adapters must map their raw failures onto the most specific variant they
//! can justify.
//!
//! ## Usage Examples
//!
//! ```
//! use datamover_domain::{ErrorClass, MoverError};
//!
//! let error = MoverError::Throttled("SlowDown from object store".to_string());
//! assert_eq!(error.error_class(), ErrorClass::Transient);
//! assert!(error.is_retryable());
//!
//! let error = MoverError::ChecksumMismatch("bundle-a1b2 digest mismatch".to_string());
//! assert_eq!(error.error_class(), ErrorClass::Integrity);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure taxonomy used for retry and recovery decisions.
///
/// The class is derived from the concrete [`MoverError`] variant and recorded
/// in the execution event log whenever a classification decision is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Network timeout, throttling, 5xx from the object store, interrupted
    /// stream. Retryable with backoff.
    Transient,
    /// Missing file, bad URI, unknown engine, permission denied. Needs a
    /// remediation plan, not a retry.
    Configuration,
    /// Checksum mismatch or truncated upload. Retried once, then fatal.
    Integrity,
    /// Disk full, out of memory, quota exceeded. Fatal with mitigation advice.
    Resource,
    /// Cooperative cancellation. Terminal.
    Cancelled,
    /// Anything else. Surfaced verbatim, non-retryable, escalated.
    Unknown,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Transient => write!(f, "transient"),
            ErrorClass::Configuration => write!(f, "configuration"),
            ErrorClass::Integrity => write!(f, "integrity"),
            ErrorClass::Resource => write!(f, "resource"),
            ErrorClass::Cancelled => write!(f, "cancelled"),
            ErrorClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// Unified error type for the datamover system.
///
/// Variants are grouped by the taxonomy class they map to; see
/// [`MoverError::error_class`]. Message payloads carry enough context to be
/// shown to the user without further lookups (step name and subprocess tail
/// are attached by the workflow engine where applicable).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MoverError {
    // --- Configuration ---
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("Workflow already running: {0}")]
    AlreadyRunning(String),

    #[error("Transfer engine unavailable: {0}")]
    EngineUnavailable(String),

    // --- Transient ---
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Interrupted stream: {0}")]
    InterruptedStream(String),

    // --- Integrity ---
    #[error("Checksum mismatch: {0}")]
    ChecksumMismatch(String),

    #[error("Truncated upload: {0}")]
    TruncatedUpload(String),

    // --- Resource ---
    #[error("Disk full: {0}")]
    DiskFull(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    // --- Cancelled ---
    #[error("Operation cancelled")]
    Cancelled,

    // --- Unknown / internal ---
    #[error("Execution not recoverable: {0}")]
    NotRecoverable(String),

    #[error("Invalid state transition from '{from}' to '{to}'")]
    InvalidStateTransition { from: String, to: String },

    #[error("Subprocess '{engine}' failed (exit code {code:?}): {tail}")]
    SubprocessFailed {
        engine: String,
        code: Option<i32>,
        tail: String,
    },

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl MoverError {
    /// Maps this error onto the failure taxonomy.
    pub fn error_class(&self) -> ErrorClass {
        match self {
            MoverError::PathNotFound(_)
            | MoverError::PermissionDenied(_)
            | MoverError::UnsupportedScheme(_)
            | MoverError::InvalidConfiguration(_)
            | MoverError::ParseError(_)
            | MoverError::WorkflowNotFound(_)
            | MoverError::ExecutionNotFound(_)
            | MoverError::AlreadyRunning(_)
            | MoverError::EngineUnavailable(_) => ErrorClass::Configuration,

            MoverError::NetworkError(_)
            | MoverError::Throttled(_)
            | MoverError::Timeout(_)
            | MoverError::InterruptedStream(_) => ErrorClass::Transient,

            MoverError::ChecksumMismatch(_) | MoverError::TruncatedUpload(_) => ErrorClass::Integrity,

            MoverError::DiskFull(_) | MoverError::OutOfMemory(_) | MoverError::QuotaExceeded(_) => {
                ErrorClass::Resource
            }

            MoverError::Cancelled => ErrorClass::Cancelled,

            MoverError::NotRecoverable(_)
            | MoverError::InvalidStateTransition { .. }
            | MoverError::SubprocessFailed { .. }
            | MoverError::IoError(_)
            | MoverError::SerializationError(_)
            | MoverError::InternalError(_) => ErrorClass::Unknown,
        }
    }

    /// Whether the workflow engine may retry the failed operation.
    ///
    /// Transient errors are retried up to the step's attempt budget; integrity
    /// errors are retried exactly once (enforced by the engine, not here).
    pub fn is_retryable(&self) -> bool {
        matches!(self.error_class(), ErrorClass::Transient | ErrorClass::Integrity)
    }
}

impl From<std::io::Error> for MoverError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => MoverError::PathNotFound(err.to_string()),
            ErrorKind::PermissionDenied => MoverError::PermissionDenied(err.to_string()),
            ErrorKind::TimedOut => MoverError::Timeout(err.to_string()),
            ErrorKind::Interrupted | ErrorKind::UnexpectedEof => MoverError::InterruptedStream(err.to_string()),
            ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                MoverError::NetworkError(err.to_string())
            }
            ErrorKind::StorageFull => MoverError::DiskFull(err.to_string()),
            _ => MoverError::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for MoverError {
    fn from(err: serde_json::Error) -> Self {
        MoverError::SerializationError(err.to_string())
    }
}
